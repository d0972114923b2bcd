//! Anonymous token issuance and verification.
//!
//! Clients present a stable self-generated `anon_…` id so a reconnecting
//! browser keeps its seat; the id is trusted for continuity only. The JWT
//! binds it for the session and is what host-only operations key on.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AppState;
use crate::metrics;

/// Bankroll shown to fresh anonymous users. Cosmetic until they buy into a
/// seat.
const STARTING_CHIPS: u32 = 1_000;

const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Claims {
    /// User id, `anon_…` for anonymous users.
    pub sub: String,
    /// Display name.
    pub name: String,
    pub anon: bool,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies access tokens.
pub struct AuthService {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl AuthService {
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue(&self, user_id: &str, username: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            name: username.to_string(),
            anon: true,
            iat: now.timestamp(),
            exp: (now + chrono::Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding, &Validation::default()).map(|data| data.claims)
    }
}

/// A client-supplied anonymous id must be prefixed, bounded, and free of
/// anything that is not url-safe.
fn valid_anon_id(id: &str) -> bool {
    let Some(rest) = id.strip_prefix("anon_") else {
        return false;
    };
    (8..=64).contains(&rest.len())
        && rest
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnonymousRequest {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnonymousUser {
    pub id: String,
    pub username: String,
    pub is_anonymous: bool,
    pub chips: u32,
}

#[derive(Debug, Serialize)]
pub struct AnonymousResponse {
    pub token: String,
    pub user: AnonymousUser,
}

/// `POST /api/auth/anonymous` — mint a token for an anonymous user,
/// reusing the client's stable id when it is well-formed.
pub async fn anonymous(
    State(state): State<AppState>,
    body: Option<Json<AnonymousRequest>>,
) -> impl IntoResponse {
    let request = body.map(|Json(b)| b).unwrap_or_default();

    let id = match request.client_id {
        Some(id) if valid_anon_id(&id) => id,
        _ => format!("anon_{}", Uuid::new_v4().simple()),
    };
    let username = request
        .username
        .map(|name| name.trim().chars().take(24).collect::<String>())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("guest_{}", &id[5..9.min(id.len())]));

    match state.auth.issue(&id, &username) {
        Ok(token) => {
            metrics::anonymous_tokens_issued();
            metrics::http_requests_total("POST", "/api/auth/anonymous", 200);
            (
                StatusCode::OK,
                Json(AnonymousResponse {
                    token,
                    user: AnonymousUser {
                        id,
                        username,
                        is_anonymous: true,
                        chips: STARTING_CHIPS,
                    },
                }),
            )
                .into_response()
        }
        Err(err) => {
            tracing::error!("failed to sign token: {err}");
            metrics::http_requests_total("POST", "/api/auth/anonymous", 500);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
