//! Follow predicate
//!
//! Best-effort "does this user follow the target account" check. The API
//! implementation pages through the user's following list with their own
//! access token. Callers must treat any failure as not-following; an
//! inability to confirm is never a confirmation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::identity::VerifiedIdentity;

const TWITTER_API_BASE: &str = "https://api.twitter.com/2";

/// Following lists can be long; fetch the maximum page size.
const PAGE_SIZE: u32 = 1000;

#[async_trait]
pub trait FollowPredicate: Send + Sync {
    /// Whether `user` follows the configured target account. Best-effort:
    /// errors propagate so the caller can fail closed.
    async fn is_following(&self, user: &VerifiedIdentity) -> Result<bool>;
}

/// Twitter API v2 following-list scan.
pub struct ApiFollowChecker {
    client: reqwest::Client,
    target_user_id: String,
}

#[derive(Debug, Deserialize)]
struct FollowingPage {
    #[serde(default)]
    data: Vec<FollowedUser>,
    #[serde(default)]
    meta: PageMeta,
}

#[derive(Debug, Deserialize)]
struct FollowedUser {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct PageMeta {
    next_token: Option<String>,
}

impl ApiFollowChecker {
    pub fn new(target_user_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            target_user_id: target_user_id.into(),
        }
    }

    async fn fetch_page(
        &self,
        user: &VerifiedIdentity,
        pagination_token: Option<&str>,
    ) -> Result<FollowingPage> {
        let url = format!("{}/users/{}/following", TWITTER_API_BASE, user.account_id);

        let mut request = self
            .client
            .get(&url)
            .bearer_auth(&user.access_token)
            .query(&[
                ("max_results", PAGE_SIZE.to_string()),
                ("user.fields", "id".to_string()),
            ]);
        if let Some(token) = pagination_token {
            request = request.query(&[("pagination_token", token)]);
        }

        let response = request
            .send()
            .await
            .context("Failed to fetch following list")?;

        if !response.status().is_success() {
            let text = response.text().await?;
            anyhow::bail!("Following list fetch failed: {}", text);
        }

        response
            .json()
            .await
            .context("Failed to parse following list")
    }
}

#[async_trait]
impl FollowPredicate for ApiFollowChecker {
    async fn is_following(&self, user: &VerifiedIdentity) -> Result<bool> {
        let mut pagination_token: Option<String> = None;

        loop {
            let page = self.fetch_page(user, pagination_token.as_deref()).await?;

            if page.data.iter().any(|u| u.id == self.target_user_id) {
                return Ok(true);
            }

            match page.meta.next_token {
                Some(next) => {
                    debug!("Paging following list for @{}", user.handle);
                    pagination_token = Some(next);
                }
                None => return Ok(false),
            }
        }
    }
}
