use axum::http::HeaderMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Authenticated user resolved from the `Authorization: Bearer <token>`
/// header. The token is opaque to this service — the external identity
/// provider owns verification; we only learn the caller's id.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

/// Pull the bearer token out of an `Authorization` header value.
fn bearer_token(header: Option<&str>) -> Result<&str, AppError> {
    let header = header.ok_or_else(|| AppError::Unauthorized {
        message: "Missing Authorization header".to_string(),
    })?;
    header.strip_prefix("Bearer ").ok_or_else(|| AppError::Unauthorized {
        message: "Authorization header must use Bearer scheme".to_string(),
    })
}

/// Resolve the caller from the request headers. Handlers call this after
/// their body has deserialized, so malformed input is rejected before the
/// identity provider is ever contacted.
pub async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AuthenticatedUser, AppError> {
    let header = headers.get("authorization").and_then(|v| v.to_str().ok());
    let token = bearer_token(header)?;
    state.identity.verify_token(token).await
}

#[derive(Debug, serde::Deserialize)]
struct IdentityUser {
    id: Uuid,
}

/// Client for the external auth provider (GoTrue-compatible API): verifies
/// bearer tokens and, for account erasure, deletes the identity itself.
#[derive(Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    service_key: String,
}

impl IdentityClient {
    pub fn new(base_url: String, anon_key: String, service_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            anon_key,
            service_key,
        }
    }

    /// Resolve a bearer token to a user. Any provider-side rejection is
    /// indistinguishable from a bad token: the caller sees 401.
    pub async fn verify_token(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        let response = self
            .http
            .get(format!("{}/auth/v1/user", self.base_url))
            .bearer_auth(token)
            .header("apikey", &self.anon_key)
            .send()
            .await
            .map_err(|err| {
                tracing::warn!("Identity provider unreachable: {}", err);
                AppError::Unauthorized {
                    message: "Unauthorized".to_string(),
                }
            })?;

        if !response.status().is_success() {
            return Err(AppError::Unauthorized {
                message: "Unauthorized".to_string(),
            });
        }

        let user = response.json::<IdentityUser>().await.map_err(|err| {
            tracing::warn!("Identity provider returned malformed user payload: {}", err);
            AppError::Unauthorized {
                message: "Unauthorized".to_string(),
            }
        })?;

        Ok(AuthenticatedUser { user_id: user.id })
    }

    /// Permanently delete the identity behind `user_id`. Used as the last
    /// step of account erasure, after all owned rows are gone.
    pub async fn delete_identity(&self, user_id: Uuid) -> Result<(), AppError> {
        let response = self
            .http
            .delete(format!("{}/auth/v1/admin/users/{}", self.base_url, user_id))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .send()
            .await
            .map_err(|err| AppError::Internal(format!("identity delete request failed: {err}")))?;

        if !response.status().is_success() {
            return Err(AppError::Internal(format!(
                "identity provider returned {} deleting user {}",
                response.status(),
                user_id
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::bearer_token;
    use crate::error::AppError;

    #[test]
    fn missing_header_is_unauthorized() {
        let err = bearer_token(None).expect_err("missing header must fail");
        assert!(matches!(err, AppError::Unauthorized { .. }));
    }

    #[test]
    fn non_bearer_scheme_is_rejected() {
        let err = bearer_token(Some("Basic dXNlcjpwYXNz")).expect_err("wrong scheme must fail");
        assert!(matches!(err, AppError::Unauthorized { .. }));
    }

    #[test]
    fn bearer_token_is_extracted() {
        assert_eq!(bearer_token(Some("Bearer abc123")).unwrap(), "abc123");
    }
}
