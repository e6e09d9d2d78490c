/*
 * Responsibility
 * - authorization-code relying-party flow against the OIDC provider
 * - state handles are single-use (stored via KeyValueStore::take), nonce is
 *   bound to the state and checked against the id_token
 * - verified identities are looked up or provisioned in the directory
 */
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::config::OidcConfig;
use crate::repos::error::RepoError;
use crate::repos::{NewUser, UserDirectory, UserRecord};
use crate::services::store::{KeyValueStore, StoreError};

const STATE_PREFIX: &str = "oidc_state:";

#[derive(Debug, Error)]
pub enum AuthFlowError {
    /// Unknown, expired, or replayed state handle.
    #[error("invalid or expired login state")]
    InvalidState,

    #[error("callback is missing the authorization code")]
    MissingCode,

    #[error("code exchange failed: {0}")]
    Exchange(String),

    #[error("id_token verification failed: {0}")]
    Verification(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Directory(#[from] RepoError),
}

/// Where to send the browser to start a login.
#[derive(Debug)]
pub struct LoginRedirect {
    pub authorize_url: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

#[async_trait]
pub trait IdentityFlow: Send + Sync + 'static {
    async fn begin(&self) -> Result<LoginRedirect, AuthFlowError>;

    /// Exchanges the callback for a verified user. Provisions a directory
    /// entry on first login.
    async fn complete(&self, params: CallbackParams) -> Result<UserRecord, AuthFlowError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[allow(dead_code)]
    access_token: String,
    id_token: String,
}

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: Option<String>,
    n: String,
    e: String,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    nonce: Option<String>,
    name: Option<String>,
    email: Option<String>,
}

/// A `kid` in the token header must match a published key; falling back to
/// an arbitrary key would verify against material the token never named.
/// Only a header without `kid` may use the set's single first key.
fn select_jwk<'a>(keys: &'a [Jwk], kid: Option<&str>) -> Result<&'a Jwk, AuthFlowError> {
    match kid {
        Some(kid) => keys
            .iter()
            .find(|k| k.kid.as_deref() == Some(kid))
            .ok_or_else(|| AuthFlowError::Verification("no matching JWKS key".into())),
        None => keys
            .first()
            .ok_or_else(|| AuthFlowError::Verification("provider JWKS is empty".into())),
    }
}

pub struct OidcClient {
    config: OidcConfig,
    http: reqwest::Client,
    states: Arc<dyn KeyValueStore>,
    directory: Arc<dyn UserDirectory>,
    default_role: String,
    auto_approve: bool,
}

impl OidcClient {
    pub fn new(
        config: OidcConfig,
        states: Arc<dyn KeyValueStore>,
        directory: Arc<dyn UserDirectory>,
        default_role: String,
        auto_approve: bool,
    ) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            states,
            directory,
            default_role,
            auto_approve,
        }
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AuthFlowError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.config.redirect_uri),
            ("client_id", &self.config.client_id),
            ("client_secret", &self.config.client_secret),
        ];
        let response = self
            .http
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthFlowError::Exchange(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthFlowError::Exchange(format!(
                "token endpoint returned {status}: {body}"
            )));
        }
        response
            .json()
            .await
            .map_err(|e| AuthFlowError::Exchange(e.to_string()))
    }

    async fn verify_id_token(
        &self,
        id_token: &str,
        expected_nonce: &str,
    ) -> Result<IdTokenClaims, AuthFlowError> {
        let header = jsonwebtoken::decode_header(id_token)
            .map_err(|e| AuthFlowError::Verification(e.to_string()))?;

        // Keys rotate on provider restart; fetch per login rather than cache
        // a stale set.
        let jwks: JwksResponse = self
            .http
            .get(&self.config.jwks_url)
            .send()
            .await
            .map_err(|e| AuthFlowError::Verification(format!("jwks fetch failed: {e}")))?
            .json()
            .await
            .map_err(|e| AuthFlowError::Verification(format!("jwks parse failed: {e}")))?;

        let jwk = select_jwk(&jwks.keys, header.kid.as_deref())?;

        let key = jsonwebtoken::DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
            .map_err(|e| AuthFlowError::Verification(e.to_string()))?;

        let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::RS256);
        validation.set_audience(&[&self.config.client_id]);
        validation.set_issuer(&[&self.config.issuer]);

        let data = jsonwebtoken::decode::<IdTokenClaims>(id_token, &key, &validation)
            .map_err(|e| AuthFlowError::Verification(e.to_string()))?;

        if data.claims.nonce.as_deref() != Some(expected_nonce) {
            return Err(AuthFlowError::Verification("nonce mismatch".into()));
        }
        Ok(data.claims)
    }

    async fn find_or_provision(&self, claims: IdTokenClaims) -> Result<UserRecord, AuthFlowError> {
        if let Some(user) = self.directory.find_by_subject(&claims.sub).await? {
            return Ok(user);
        }

        let email = claims.email.unwrap_or_else(|| {
            tracing::warn!(sub = %claims.sub, "id_token carries no email claim, synthesizing one");
            format!("{}@example.invalid", claims.sub)
        });
        let display_name = claims.name.unwrap_or_else(|| claims.sub.clone());
        let role = self.directory.find_or_create_role(&self.default_role).await?;

        let user = self
            .directory
            .create(NewUser {
                oidc_id: claims.sub,
                email,
                display_name,
                password_hash: None,
                local: false,
                force_password_change: false,
                approved: self.auto_approve,
                role_id: role.id,
            })
            .await?;
        tracing::info!(user_id = user.id, role = %user.role, approved = user.approved, "provisioned new user");
        Ok(user)
    }
}

#[async_trait]
impl IdentityFlow for OidcClient {
    async fn begin(&self) -> Result<LoginRedirect, AuthFlowError> {
        let state = Uuid::new_v4().to_string();
        let nonce = Uuid::new_v4().to_string();

        self.states
            .put(
                &format!("{STATE_PREFIX}{state}"),
                &nonce,
                self.config.state_ttl,
            )
            .await?;

        let mut url = Url::parse(&self.config.authorize_url)
            .map_err(|e| AuthFlowError::Exchange(format!("bad authorize URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &self.config.scopes)
            .append_pair("state", &state)
            .append_pair("nonce", &nonce);

        Ok(LoginRedirect {
            authorize_url: url.into(),
        })
    }

    async fn complete(&self, params: CallbackParams) -> Result<UserRecord, AuthFlowError> {
        // State first: an unknown handle means the code (if any) was never
        // requested by us, so it must not reach the token endpoint.
        let state = params.state.ok_or(AuthFlowError::InvalidState)?;
        let nonce = self
            .states
            .take(&format!("{STATE_PREFIX}{state}"))
            .await?
            .ok_or(AuthFlowError::InvalidState)?;

        let code = params.code.ok_or(AuthFlowError::MissingCode)?;

        let tokens = self.exchange_code(&code).await?;
        let claims = self.verify_id_token(&tokens.id_token, &nonce).await?;
        self.find_or_provision(claims).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwk(kid: Option<&str>) -> Jwk {
        Jwk {
            kid: kid.map(str::to_string),
            n: "AQAB".into(),
            e: "AQAB".into(),
        }
    }

    #[test]
    fn kid_selects_the_matching_key() {
        let keys = [jwk(Some("1")), jwk(Some("2"))];
        let selected = select_jwk(&keys, Some("2")).unwrap();
        assert_eq!(selected.kid.as_deref(), Some("2"));
    }

    #[test]
    fn unmatched_kid_is_rejected_not_defaulted() {
        let keys = [jwk(Some("1"))];
        let err = select_jwk(&keys, Some("rotated-away")).unwrap_err();
        assert!(matches!(err, AuthFlowError::Verification(_)));
    }

    #[test]
    fn absent_kid_uses_the_single_published_key() {
        let keys = [jwk(Some("1"))];
        let selected = select_jwk(&keys, None).unwrap();
        assert_eq!(selected.kid.as_deref(), Some("1"));
    }

    #[test]
    fn empty_jwks_is_rejected() {
        assert!(select_jwk(&[], None).is_err());
        assert!(select_jwk(&[], Some("1")).is_err());
    }
}
