use axum::http::HeaderMap;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

const JWT_ISSUER: &str = "genmedia-session";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            v.strip_prefix("Bearer ")
                .or_else(|| v.strip_prefix("bearer "))
        })
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Sessions are minted by the identity provider; this mirrors its format so
/// local tooling and tests can produce valid tokens.
pub fn issue_session_token(
    user_id: &str,
    jwt_secret: &str,
    ttl_seconds: i64,
) -> Result<(String, i64), String> {
    if ttl_seconds <= 0 {
        return Err("session ttl must be positive".to_string());
    }
    let iat = Utc::now().timestamp();
    let exp = iat
        .checked_add(ttl_seconds)
        .ok_or_else(|| "invalid jwt expiration".to_string())?;
    let claims = SessionClaims {
        sub: user_id.to_string(),
        iat,
        exp,
        iss: JWT_ISSUER.to_string(),
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .map_err(|e| format!("jwt issue failed: {e}"))?;
    Ok((token, exp))
}

pub fn verify_session_token(token: &str, jwt_secret: &str) -> Result<SessionClaims, String> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[JWT_ISSUER]);
    let data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| format!("jwt verify failed: {e}"))?;
    if data.claims.sub.trim().is_empty() {
        return Err("session token has no subject".to_string());
    }
    Ok(data.claims)
}
