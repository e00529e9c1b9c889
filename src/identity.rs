//! Identity provider
//!
//! OAuth2 authorization-code flow (with plain PKCE) against the Twitter v2
//! API. The trait is the seam the server depends on; everything
//! platform-specific lives in `TwitterOAuth`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

const TWITTER_AUTHORIZE_URL: &str = "https://twitter.com/i/oauth2/authorize";
const TWITTER_TOKEN_URL: &str = "https://api.twitter.com/2/oauth2/token";
const TWITTER_ME_URL: &str = "https://api.twitter.com/2/users/me";

/// Scopes needed to read the user's profile and following list.
const OAUTH_SCOPES: &str = "tweet.read users.read follows.read";

/// Outcome of a completed handshake. The access token rides along so the
/// follow predicate can query on the user's behalf.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub account_id: String,
    pub handle: String,
    pub display_name: String,
    pub access_token: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Authorization URL the user's browser is redirected to. `state` round-
    /// trips the session id; `code_verifier` is echoed as a plain PKCE
    /// challenge.
    fn authorize_url(&self, state: &str, code_verifier: &str) -> String;

    /// Exchanges the callback code for the authenticated user's identity.
    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<VerifiedIdentity>;
}

#[derive(Debug, Clone)]
pub struct TwitterOAuth {
    client_id: String,
    client_secret: String,
    callback_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct MeResponse {
    data: MeData,
}

#[derive(Debug, Deserialize)]
struct MeData {
    id: String,
    name: String,
    username: String,
}

impl TwitterOAuth {
    pub fn new(client_id: String, client_secret: String, callback_url: String) -> Self {
        Self {
            client_id,
            client_secret,
            callback_url,
            client: reqwest::Client::new(),
        }
    }

    async fn fetch_token(&self, code: &str, code_verifier: &str) -> Result<String> {
        debug!("Exchanging authorization code for access token");

        let response = self
            .client
            .post(TWITTER_TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.callback_url.as_str()),
                ("code_verifier", code_verifier),
            ])
            .send()
            .await
            .context("Failed to reach token endpoint")?;

        if !response.status().is_success() {
            let text = response.text().await?;
            anyhow::bail!("Token exchange failed: {}", text);
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token response")?;

        Ok(token.access_token)
    }

    async fn fetch_me(&self, access_token: &str) -> Result<MeData> {
        debug!("Fetching authenticated user profile");

        let response = self
            .client
            .get(TWITTER_ME_URL)
            .bearer_auth(access_token)
            .query(&[("user.fields", "id,name,username")])
            .send()
            .await
            .context("Failed to fetch user profile")?;

        if !response.status().is_success() {
            let text = response.text().await?;
            anyhow::bail!("User profile fetch failed: {}", text);
        }

        let me: MeResponse = response
            .json()
            .await
            .context("Failed to parse user profile")?;

        Ok(me.data)
    }
}

#[async_trait]
impl IdentityProvider for TwitterOAuth {
    fn authorize_url(&self, state: &str, code_verifier: &str) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}&code_challenge={}&code_challenge_method=plain",
            TWITTER_AUTHORIZE_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.callback_url),
            urlencoding::encode(OAUTH_SCOPES),
            urlencoding::encode(state),
            urlencoding::encode(code_verifier),
        )
    }

    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<VerifiedIdentity> {
        let access_token = self.fetch_token(code, code_verifier).await?;
        let me = self.fetch_me(&access_token).await?;

        info!("Identity verified: @{}", me.username);

        Ok(VerifiedIdentity {
            account_id: me.id,
            handle: me.username,
            display_name: me.name,
            access_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorize_url_carries_state_and_challenge() {
        let oauth = TwitterOAuth::new(
            "client123".to_string(),
            "secret".to_string(),
            "http://localhost:3000/auth/twitter/callback".to_string(),
        );

        let url = oauth.authorize_url("sess-1", "verifier-xyz");
        assert!(url.starts_with(TWITTER_AUTHORIZE_URL));
        assert!(url.contains("state=sess-1"));
        assert!(url.contains("code_challenge=verifier-xyz"));
        assert!(url.contains("code_challenge_method=plain"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fauth%2Ftwitter%2Fcallback"));
    }
}
