//! Authorize using the client credentials flow.

use tracing::debug;

use super::{api::ApiError, utils::check_status, Credentials, Token};

/// Fetches tokens for a client id/secret pair.
///
/// The pair is the cache key, so one instance serves any number of clients
/// against the same endpoint and scopes.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client: reqwest::Client,
    pub endpoint: String,
    pub scopes: Vec<String>,
}

impl ClientCredentials {
    /// Perform the client credentials flow.
    pub async fn perform(&self, credentials: &Credentials) -> Result<Token, ApiError> {
        let scope = self.scopes.join(" ");
        let params = &[
            ("grant_type", "client_credentials"),
            ("client_id", credentials.identity.as_str()),
            ("client_secret", credentials.credential.as_str()),
            ("scope", scope.as_str()),
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
            message = "Requesting client credentials token",
            endpoint = %self.endpoint,
            client_id = %credentials.identity,
        );

        let res = self.client.execute(req).await?;
        let res = check_status(res).await?;
        let token = res.json().await?;
        Ok(token)
    }
}

#[async_trait::async_trait]
impl super::TokenFetcher<Credentials> for ClientCredentials {
    type Error = ApiError;

    async fn fetch(&self, key: &Credentials) -> Result<Token, Self::Error> {
        self.perform(key).await
    }
}
