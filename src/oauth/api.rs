//! Exchange of signed JWT assertions for access tokens.

use tracing::debug;

use super::{
    signer::{JwsSigner, SignerError},
    utils::{check_status, ServerError},
    Token, TokenRequest, JWT_BEARER_GRANT_TYPE,
};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("signer: {0}")]
    Signer(#[from] SignerError),
    #[error("form encoding: {0}")]
    Form(#[from] serde_urlencoded::ser::Error),
    #[error("reqwest: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("server: {0}")]
    Server(#[from] ServerError),
}

impl ApiError {
    /// Whether the token endpoint refused the assertion or its credentials.
    pub fn is_authorization_failure(&self) -> bool {
        matches!(self, Self::Server(ServerError { status_code, .. }) if matches!(status_code, 400 | 401 | 403))
    }
}

#[derive(Debug)]
pub struct OAuthApi {
    pub client: reqwest::Client,
    pub endpoint: String,
    pub signer: JwsSigner,
}

impl OAuthApi {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, signer: JwsSigner) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            signer,
        }
    }

    /// Signs `request` and trades the assertion for a token.
    pub async fn authenticate(&self, request: &TokenRequest) -> Result<Token, ApiError> {
        let assertion = self.signer.sign(request)?;
        let params = &[
            ("grant_type", JWT_BEARER_GRANT_TYPE),
            ("assertion", assertion.as_str()),
        ];
        let params = serde_urlencoded::to_string(params)?;

        let req = self
            .client
            .post(self.endpoint.as_str())
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(params)
            .build()?;

        debug!(
            message = "Requesting token",
            endpoint = %self.endpoint,
            issuer = %request.claims.issuer,
            scope = %request.claims.scope,
        );

        let res = self.client.execute(req).await?;
        let res = check_status(res).await?;
        let token = res.json().await?;
        Ok(token)
    }
}

#[async_trait::async_trait]
impl super::TokenFetcher<TokenRequest> for OAuthApi {
    type Error = ApiError;

    async fn fetch(&self, key: &TokenRequest) -> Result<Token, Self::Error> {
        self.authenticate(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_authorization_failures() {
        let rejected = ApiError::Server(ServerError {
            status_code: 400,
            message: "invalid_grant".into(),
        });
        assert!(rejected.is_authorization_failure());

        let unavailable = ApiError::Server(ServerError {
            status_code: 503,
            message: String::new(),
        });
        assert!(!unavailable.is_authorization_failure());
    }
}
