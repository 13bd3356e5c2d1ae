use std::collections::HashMap;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use tailor_core::config::{AuthConfig, AuthMode};
use tailor_core::domain::profile::UserId;

/// Identity header honored when auth is disabled, for local development.
const USER_HEADER: &str = "x-user-id";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("openid discovery failed: {0}")]
    Discovery(String),
    #[error("jwks fetch failed: {0}")]
    Fetch(String),
    #[error("jwks contained no usable RSA signing keys")]
    NoUsableKeys,
}

/// Request-level rejection. Bodies and status codes are part of the public
/// API contract and must not change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthRejection {
    Missing,
    Invalid,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Missing => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Missing token" })))
                    .into_response()
            }
            Self::Invalid => {
                (StatusCode::FORBIDDEN, Json(json!({ "error": "Invalid token" }))).into_response()
            }
        }
    }
}

/// Resolves the calling user from request headers. Built once at startup so
/// a misconfigured identity provider fails the boot, not the first request.
#[derive(Clone)]
pub enum AuthVerifier {
    Disabled,
    StaticTokens { tokens: HashMap<String, String> },
    Jwks { keys: HashMap<String, DecodingKey>, validation: Validation },
}

impl AuthVerifier {
    pub async fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        match config.mode {
            AuthMode::Disabled => Ok(Self::Disabled),
            AuthMode::StaticToken => {
                let tokens = config
                    .static_tokens
                    .iter()
                    .map(|entry| (entry.token.expose_secret().to_string(), entry.user_id.clone()))
                    .collect();
                Ok(Self::StaticTokens { tokens })
            }
            AuthMode::Jwks => {
                let client = reqwest::Client::new();
                let issuer = config.issuer.as_deref().unwrap_or_default();
                let jwks_uri = match &config.jwks_uri {
                    Some(uri) => uri.clone(),
                    None => discover_jwks_uri(&client, issuer).await?,
                };

                let document = fetch_jwks(&client, &jwks_uri).await?;
                let keys = index_rsa_keys(document);
                if keys.is_empty() {
                    return Err(AuthError::NoUsableKeys);
                }
                info!(
                    event_name = "auth.jwks.loaded",
                    correlation_id = "bootstrap",
                    jwks_uri = %jwks_uri,
                    key_count = keys.len(),
                    "jwks signing keys loaded"
                );

                let mut validation = Validation::new(Algorithm::RS256);
                if let Some(audience) = &config.audience {
                    validation.set_audience(&[audience]);
                }
                if let Some(issuer) = &config.issuer {
                    validation.set_issuer(&[issuer]);
                }
                Ok(Self::Jwks { keys, validation })
            }
        }
    }

    pub fn verify(&self, headers: &HeaderMap) -> Result<UserId, AuthRejection> {
        match self {
            Self::Disabled => {
                let user = header_value(headers, USER_HEADER).ok_or(AuthRejection::Missing)?;
                Ok(UserId(user))
            }
            Self::StaticTokens { tokens } => {
                let token = bearer_token(headers).ok_or(AuthRejection::Missing)?;
                let user = tokens.get(&token).ok_or(AuthRejection::Invalid)?;
                Ok(UserId(user.clone()))
            }
            Self::Jwks { keys, validation } => {
                let token = bearer_token(headers).ok_or(AuthRejection::Missing)?;

                let header = decode_header(&token).map_err(|error| {
                    warn!(
                        event_name = "auth.token.rejected",
                        error = %error,
                        "token header could not be decoded"
                    );
                    AuthRejection::Invalid
                })?;
                let kid = header.kid.ok_or(AuthRejection::Invalid)?;
                let key = keys.get(&kid).ok_or_else(|| {
                    warn!(
                        event_name = "auth.token.rejected",
                        kid = %kid,
                        "token signed with unknown key id"
                    );
                    AuthRejection::Invalid
                })?;

                let data = decode::<Claims>(&token, key, validation).map_err(|error| {
                    warn!(
                        event_name = "auth.token.rejected",
                        error = %error,
                        "token failed validation"
                    );
                    AuthRejection::Invalid
                })?;
                Ok(claims_user(data.claims))
            }
        }
    }
}

/// Resolves the user and stashes it as a request extension for handlers.
pub async fn require_user(
    State(verifier): State<AuthVerifier>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthRejection> {
    let user = verifier.verify(request.headers())?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    preferred_username: Option<String>,
    sub: String,
}

fn claims_user(claims: Claims) -> UserId {
    let user = claims
        .email
        .filter(|value| !value.trim().is_empty())
        .or(claims.preferred_username.filter(|value| !value.trim().is_empty()))
        .unwrap_or(claims.sub);
    UserId(user)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ").map(|token| token.trim().to_string())
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let value = headers.get(name)?.to_str().ok()?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct OidcDiscovery {
    #[serde(alias = "jwksUri")]
    jwks_uri: String,
}

#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    #[serde(default)]
    kid: Option<String>,
    kty: String,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
}

async fn discover_jwks_uri(client: &reqwest::Client, issuer: &str) -> Result<String, AuthError> {
    let url = format!("{}/.well-known/openid-configuration", issuer.trim_end_matches('/'));
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|error| AuthError::Discovery(format!("request to {url} failed: {error}")))?;
    if !response.status().is_success() {
        return Err(AuthError::Discovery(format!("status {} from {url}", response.status())));
    }
    let document: OidcDiscovery = response
        .json()
        .await
        .map_err(|error| AuthError::Discovery(format!("invalid discovery document: {error}")))?;
    Ok(document.jwks_uri)
}

async fn fetch_jwks(client: &reqwest::Client, jwks_uri: &str) -> Result<JwksDocument, AuthError> {
    let response = client
        .get(jwks_uri)
        .send()
        .await
        .map_err(|error| AuthError::Fetch(format!("request to {jwks_uri} failed: {error}")))?;
    if !response.status().is_success() {
        return Err(AuthError::Fetch(format!("status {} from {jwks_uri}", response.status())));
    }
    response
        .json()
        .await
        .map_err(|error| AuthError::Fetch(format!("invalid jwks document: {error}")))
}

fn index_rsa_keys(document: JwksDocument) -> HashMap<String, DecodingKey> {
    let mut keys = HashMap::new();
    for jwk in document.keys {
        let (Some(kid), Some(n), Some(e)) = (jwk.kid, jwk.n, jwk.e) else {
            continue;
        };
        if jwk.kty != "RSA" {
            continue;
        }
        match DecodingKey::from_rsa_components(&n, &e) {
            Ok(key) => {
                keys.insert(kid, key);
            }
            Err(error) => {
                warn!(
                    event_name = "auth.jwks.key_skipped",
                    kid = %kid,
                    error = %error,
                    "skipping jwks key with invalid RSA components"
                );
            }
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use axum::http::{header, HeaderMap, StatusCode};
    use axum::response::IntoResponse;

    use tailor_core::config::{AuthConfig, AuthMode, StaticToken};
    use tailor_core::domain::profile::UserId;

    use super::{
        claims_user, index_rsa_keys, AuthRejection, AuthVerifier, Claims, JwksDocument,
        OidcDiscovery,
    };

    fn static_config() -> AuthConfig {
        AuthConfig {
            mode: AuthMode::StaticToken,
            issuer: None,
            audience: None,
            jwks_uri: None,
            static_tokens: vec![StaticToken {
                token: "portal-token".to_string().into(),
                user_id: "casey@example.com".to_string(),
            }],
        }
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, format!("Bearer {token}").parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn static_tokens_resolve_their_configured_user() {
        let verifier = AuthVerifier::from_config(&static_config()).await.expect("build verifier");

        let user = verifier.verify(&bearer("portal-token")).expect("token accepted");
        assert_eq!(user, UserId("casey@example.com".to_string()));

        assert_eq!(verifier.verify(&bearer("wrong-token")), Err(AuthRejection::Invalid));
        assert_eq!(verifier.verify(&HeaderMap::new()), Err(AuthRejection::Missing));
    }

    #[tokio::test]
    async fn non_bearer_authorization_counts_as_missing() {
        let verifier = AuthVerifier::from_config(&static_config()).await.expect("build verifier");

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Basic cGFzc3dvcmQ=".parse().unwrap());

        assert_eq!(verifier.verify(&headers), Err(AuthRejection::Missing));
    }

    #[test]
    fn disabled_mode_reads_the_development_user_header() {
        let verifier = AuthVerifier::Disabled;

        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", "dev@example.com".parse().unwrap());
        assert_eq!(verifier.verify(&headers), Ok(UserId("dev@example.com".to_string())));

        assert_eq!(verifier.verify(&HeaderMap::new()), Err(AuthRejection::Missing));
    }

    #[test]
    fn claims_prefer_email_then_username_then_subject() {
        let full = Claims {
            email: Some("casey@example.com".to_string()),
            preferred_username: Some("casey".to_string()),
            sub: "oid-123".to_string(),
        };
        assert_eq!(claims_user(full).0, "casey@example.com");

        let no_email = Claims {
            email: None,
            preferred_username: Some("casey".to_string()),
            sub: "oid-123".to_string(),
        };
        assert_eq!(claims_user(no_email).0, "casey");

        let subject_only =
            Claims { email: Some("  ".to_string()), preferred_username: None, sub: "oid-123".to_string() };
        assert_eq!(claims_user(subject_only).0, "oid-123");
    }

    #[test]
    fn jwks_documents_index_only_usable_rsa_keys() {
        let document: JwksDocument = serde_json::from_str(
            r#"{
                "keys": [
                    {"kid": "key-1", "kty": "RSA", "n": "qLGLvHRq-E1Y", "e": "AQAB"},
                    {"kid": "key-2", "kty": "EC", "crv": "P-256"},
                    {"kty": "RSA", "n": "unkeyed", "e": "AQAB"}
                ]
            }"#,
        )
        .expect("document parses");

        let keys = index_rsa_keys(document);

        assert_eq!(keys.len(), 1);
        assert!(keys.contains_key("key-1"));
    }

    #[test]
    fn discovery_documents_accept_both_field_spellings() {
        let snake: OidcDiscovery =
            serde_json::from_str(r#"{"jwks_uri": "https://issuer.example.com/keys"}"#)
                .expect("snake_case parses");
        assert_eq!(snake.jwks_uri, "https://issuer.example.com/keys");

        let camel: OidcDiscovery =
            serde_json::from_str(r#"{"jwksUri": "https://issuer.example.com/keys"}"#)
                .expect("camelCase parses");
        assert_eq!(camel.jwks_uri, "https://issuer.example.com/keys");
    }

    #[test]
    fn rejections_keep_their_contract_status_codes() {
        assert_eq!(AuthRejection::Missing.into_response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthRejection::Invalid.into_response().status(), StatusCode::FORBIDDEN);
    }
}
