//! Follow-Verify Server
//!
//! HTTP surface: wallet session binding, the OAuth start/callback pair, the
//! read-only follow verification, the one-time reward claim, and the
//! per-wallet claim-status listing.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{Html, Redirect},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::claim::ClaimService;
use crate::config::Config;
use crate::follow::FollowPredicate;
use crate::identity::IdentityProvider;
use crate::record::ClaimStatusEntry;
use crate::session::SessionBinder;
use crate::store::CredentialStore;
use crate::verification::VerificationService;

pub struct AppState {
    pub verification: VerificationService,
    pub claims: ClaimService,
    pub store: Arc<dyn CredentialStore>,
    pub sessions: SessionBinder,
    pub identity: Arc<dyn IdentityProvider>,
    pub predicate: Arc<dyn FollowPredicate>,
    pub target_user_id: String,
    pub started_at: std::time::Instant,
}

pub fn create_router(state: Arc<AppState>, allowed_origin: &str) -> Router {
    let cors = match allowed_origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true),
        Err(_) => {
            warn!(
                "Invalid CORS origin {:?}, falling back to permissive",
                allowed_origin
            );
            CorsLayer::permissive()
        }
    };

    Router::new()
        .route("/health", get(health_handler))
        .route("/session/wallet", post(save_wallet_handler))
        .route("/auth/twitter", get(auth_start_handler))
        .route("/auth/twitter/callback", get(auth_callback_handler))
        .route("/verify-follow", post(verify_follow_handler))
        .route("/claim-reward", post(claim_reward_handler))
        .route("/claim-status/:wallet_address", get(claim_status_handler))
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// GET /health
// ============================================================================

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    #[serde(rename = "targetUserId")]
    target_user_id: String,
    #[serde(rename = "verificationCount")]
    verification_count: usize,
    uptime_secs: u64,
    version: String,
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        target_user_id: state.target_user_id.clone(),
        verification_count: state.store.len(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// POST /session/wallet - bind a wallet to the upcoming OAuth flow
// ============================================================================

#[derive(Debug, Deserialize)]
struct SaveWalletRequest {
    #[serde(default)]
    wallet_address: String,
}

#[derive(Debug, Serialize)]
struct SaveWalletResponse {
    success: bool,
    session_id: String,
}

async fn save_wallet_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SaveWalletRequest>,
) -> Result<Json<SaveWalletResponse>, (StatusCode, Json<serde_json::Value>)> {
    if request.wallet_address.is_empty() {
        return Err(wallet_required());
    }

    let session_id = state.sessions.bind_wallet(&request.wallet_address);
    Ok(Json(SaveWalletResponse {
        success: true,
        session_id,
    }))
}

// ============================================================================
// GET /auth/twitter - redirect the popup to the provider authorize URL
// ============================================================================

#[derive(Debug, Deserialize)]
struct AuthStartQuery {
    session_id: String,
}

async fn auth_start_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuthStartQuery>,
) -> Result<Redirect, (StatusCode, Json<serde_json::Value>)> {
    let pending = state.sessions.get(&query.session_id).ok_or((
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": "Unknown session" })),
    ))?;

    let url = state
        .identity
        .authorize_url(&query.session_id, &pending.code_verifier);
    Ok(Redirect::temporary(&url))
}

// ============================================================================
// GET /auth/twitter/callback - complete handshake, evaluate follow, issue
// ============================================================================

#[derive(Debug, Deserialize)]
struct AuthCallbackQuery {
    #[serde(default)]
    code: String,
    #[serde(default)]
    state: String,
}

async fn auth_callback_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuthCallbackQuery>,
) -> Html<String> {
    let Some(pending) = state.sessions.take(&query.state) else {
        return Html(popup_page(None));
    };
    if query.code.is_empty() {
        return Html(popup_page(None));
    }

    let identity = match state
        .identity
        .exchange_code(&query.code, &pending.code_verifier)
        .await
    {
        Ok(identity) => identity,
        Err(e) => {
            error!("Identity handshake failed: {:#}", e);
            return Html(popup_page(None));
        }
    };

    // Fail closed: an inability to confirm following is not following.
    let follows = match state.predicate.is_following(&identity).await {
        Ok(follows) => follows,
        Err(e) => {
            warn!("Follow check failed for @{}: {:#}", identity.handle, e);
            false
        }
    };

    let token = state.verification.issue(
        &pending.wallet_address,
        &identity.account_id,
        &identity.handle,
        follows,
    );

    Html(popup_page(Some(&token)))
}

/// Popup page that reports the outcome to the opener window and closes.
fn popup_page(token: Option<&str>) -> String {
    let message = match token {
        Some(token) => format!(
            "{{ type: 'TWITTER_AUTH_COMPLETE', success: true, token: '{}' }}",
            token
        ),
        None => {
            "{ type: 'TWITTER_AUTH_COMPLETE', success: false, error: 'Authentication failed' }"
                .to_string()
        }
    };
    let body = match token {
        Some(_) => "Authentication successful! You can close this window.",
        None => "Authentication failed. Please try again.",
    };
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <title>Twitter Auth</title>
  <script>
    window.opener.postMessage({message}, '*');
    window.close();
  </script>
</head>
<body>{body}</body>
</html>"#
    )
}

// ============================================================================
// POST /verify-follow - read-only confirmation for an issued token
// ============================================================================

#[derive(Debug, Deserialize)]
struct TokenRequest {
    #[serde(default)]
    token: String,
    #[serde(default)]
    wallet_address: String,
}

#[derive(Debug, Serialize)]
struct VerifyResponse {
    verified: bool,
    #[serde(rename = "twitterHandle", skip_serializing_if = "Option::is_none")]
    twitter_handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn verify_follow_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<VerifyResponse>, (StatusCode, Json<serde_json::Value>)> {
    if request.wallet_address.is_empty() {
        return Err(wallet_required());
    }
    if request.token.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "verified": false,
                "error": "Verification token is required"
            })),
        ));
    }

    match state
        .verification
        .check_verification(&request.token, &request.wallet_address)
    {
        Ok(outcome) => Ok(Json(VerifyResponse {
            verified: outcome.verified,
            twitter_handle: Some(outcome.handle),
            error: None,
        })),
        Err(e) => Ok(Json(VerifyResponse {
            verified: false,
            twitter_handle: None,
            error: Some(e.to_string()),
        })),
    }
}

// ============================================================================
// POST /claim-reward - the exactly-once grant
// ============================================================================

#[derive(Debug, Serialize)]
struct ClaimResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    energy: Option<u32>,
    #[serde(rename = "twitterHandle", skip_serializing_if = "Option::is_none")]
    twitter_handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn claim_reward_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<ClaimResponse>, (StatusCode, Json<serde_json::Value>)> {
    if request.wallet_address.is_empty() {
        return Err(wallet_required());
    }
    if request.token.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "success": false,
                "error": "Verification token is required"
            })),
        ));
    }

    match state.claims.claim(&request.token, &request.wallet_address) {
        Ok(receipt) => {
            info!(
                "Claiming reward for {} (@{}): {} energy",
                request.wallet_address, receipt.handle, receipt.energy
            );
            Ok(Json(ClaimResponse {
                success: true,
                message: Some(format!("Successfully claimed {} energy", receipt.energy)),
                energy: Some(receipt.energy),
                twitter_handle: Some(receipt.handle),
                error: None,
            }))
        }
        Err(e) => Ok(Json(ClaimResponse {
            success: false,
            message: None,
            energy: None,
            twitter_handle: None,
            error: Some(e.to_string()),
        })),
    }
}

// ============================================================================
// GET /claim-status/:wallet_address
// ============================================================================

#[derive(Debug, Serialize)]
struct ClaimStatusResponse {
    claims: Vec<ClaimStatusEntry>,
}

async fn claim_status_handler(
    State(state): State<Arc<AppState>>,
    Path(wallet_address): Path<String>,
) -> Json<ClaimStatusResponse> {
    Json(ClaimStatusResponse {
        claims: state.claims.status_for_wallet(&wallet_address),
    })
}

fn wallet_required() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": "Wallet address is required" })),
    )
}

/// Run the server
pub async fn run_server(config: &Config, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state, &config.cors.allowed_origin);
    let addr = format!("{}:{}", config.server.host, config.server.port);

    info!("Starting Follow-Verify server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
