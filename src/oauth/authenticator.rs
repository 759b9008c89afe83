//! Attaches OAuth2 access tokens to outgoing requests.

use std::sync::Arc;

use reqwest::header::{HeaderValue, InvalidHeaderValue, AUTHORIZATION};
use tracing::debug;

use super::{
    signer::SignerError, JwsSigner, OAuthApi, Token, TokenCache, TokenFetcher, TokenRequest,
    TokenRequestBuilder,
};
use crate::config::{CredentialType, Properties};

#[derive(Debug, thiserror::Error)]
pub enum Error<FetchError> {
    #[error("token fetch: {0}")]
    Fetch(#[source] FetchError),
    #[error("invalid authorization header: {0}")]
    Header(#[from] InvalidHeaderValue),
}

enum Source<Fetcher> {
    ServiceAccount {
        builder: TokenRequestBuilder,
        cache: TokenCache<TokenRequest, Fetcher>,
    },
    BearerToken(Arc<Token>),
}

pub struct OAuthAuthenticator<Fetcher = OAuthApi> {
    source: Source<Fetcher>,
}

impl OAuthAuthenticator<OAuthApi> {
    /// Wires the authenticator described by `properties`.
    ///
    /// For service accounts this parses the signing key, so a misconfigured
    /// algorithm or key fails here rather than on the first request.
    pub fn from_properties(
        client: reqwest::Client,
        properties: &Properties,
    ) -> Result<Self, SignerError> {
        match properties.credential_type {
            CredentialType::BearerToken => Ok(Self::bearer(properties.credential.clone())),
            CredentialType::ServiceAccount => {
                let signer =
                    JwsSigner::new(properties.signature_algorithm, &properties.credential)?;
                let api = OAuthApi::new(client, properties.endpoint.clone(), signer);
                let cache = TokenCache::new(api, properties.session_interval_secs);
                Ok(Self::new(
                    TokenRequestBuilder::from_properties(properties),
                    cache,
                ))
            }
        }
    }
}

impl<Fetcher> OAuthAuthenticator<Fetcher>
where
    Fetcher: TokenFetcher<TokenRequest>,
{
    pub fn new(builder: TokenRequestBuilder, cache: TokenCache<TokenRequest, Fetcher>) -> Self {
        Self {
            source: Source::ServiceAccount { builder, cache },
        }
    }

    /// Uses `access_token` for every request without contacting a token endpoint.
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            source: Source::BearerToken(Arc::new(Token::new(access_token, 0))),
        }
    }

    /// Returns a token carrying `scopes`, from the cache when possible.
    pub async fn token<S>(&self, scopes: &[S]) -> Result<Arc<Token>, Error<Fetcher::Error>>
    where
        S: AsRef<str>,
    {
        match &self.source {
            Source::ServiceAccount { builder, cache } => {
                let request = builder.build(scopes);
                cache.get(&request).await.map_err(Error::Fetch)
            }
            Source::BearerToken(token) => Ok(Arc::clone(token)),
        }
    }

    /// Sets the `Authorization` header of `request`.
    pub async fn authorize<S>(
        &self,
        mut request: reqwest::Request,
        scopes: &[S],
    ) -> Result<reqwest::Request, Error<Fetcher::Error>>
    where
        S: AsRef<str>,
    {
        let token = self.token(scopes).await?;
        let mut value = HeaderValue::from_str(&token.authorization_value())?;
        value.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, value);
        debug!(message = "Authorized request", url = %request.url());
        Ok(request)
    }

    /// Forgets the cached token for `scopes`, e.g. after the API rejected it.
    pub async fn invalidate<S>(&self, scopes: &[S])
    where
        S: AsRef<str>,
    {
        if let Source::ServiceAccount { builder, cache } = &self.source {
            cache.invalidate(&builder.build(scopes)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    use chrono::Duration;

    use super::*;
    use crate::oauth::SignatureAlgorithm;

    #[derive(Default)]
    struct RecordingFetcher {
        scopes: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl TokenFetcher<TokenRequest> for RecordingFetcher {
        type Error = std::io::Error;

        async fn fetch(&self, key: &TokenRequest) -> Result<Token, Self::Error> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.scopes.lock().unwrap().push(key.claims.scope.clone());
            if key.claims.scope == "denied" {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "denied",
                ));
            }
            Ok(Token::new(format!("token-{}", call), 3600))
        }
    }

    fn authenticator() -> OAuthAuthenticator<RecordingFetcher> {
        let builder = TokenRequestBuilder {
            issuer: "svc@example.iam".into(),
            audience: "https://oauth.example.com/token".into(),
            algorithm: SignatureAlgorithm::Rs256,
            token_duration: Duration::seconds(3600),
            subject: None,
        };
        OAuthAuthenticator::new(builder, TokenCache::new(RecordingFetcher::default(), 60))
    }

    fn request() -> reqwest::Request {
        reqwest::Client::new()
            .get("https://compute.example.com/instances")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn sets_bearer_header() {
        let authenticator = authenticator();
        let request = authenticator
            .authorize(request(), &["compute"])
            .await
            .unwrap();
        assert_eq!(
            request.headers().get(AUTHORIZATION).unwrap(),
            "Bearer token-1"
        );
    }

    #[tokio::test]
    async fn caches_per_scope_set() {
        let authenticator = authenticator();
        authenticator.token(&["compute"]).await.unwrap();
        authenticator.token(&["compute"]).await.unwrap();
        authenticator.token(&["storage"]).await.unwrap();

        let Source::ServiceAccount { cache, .. } = &authenticator.source else {
            unreachable!()
        };
        let fetcher = cache.fetcher();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(*fetcher.scopes.lock().unwrap(), vec!["compute", "storage"]);
    }

    #[tokio::test]
    async fn invalidate_refetches() {
        let authenticator = authenticator();
        let first = authenticator.token(&["compute"]).await.unwrap();
        authenticator.invalidate(&["compute"]).await;
        let second = authenticator.token(&["compute"]).await.unwrap();
        assert_eq!(first.access_token, "token-1");
        assert_eq!(second.access_token, "token-2");
    }

    #[tokio::test]
    async fn surfaces_fetch_error() {
        let authenticator = authenticator();
        let err = authenticator.token(&["denied"]).await.unwrap_err();
        match err {
            Error::Fetch(err) => assert_eq!(err.kind(), std::io::ErrorKind::PermissionDenied),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn bearer_credentials_skip_token_endpoint() {
        let authenticator = OAuthAuthenticator::<RecordingFetcher>::bearer("static-token");
        let request = authenticator.authorize(request(), &["any"]).await.unwrap();
        assert_eq!(
            request.headers().get(AUTHORIZATION).unwrap(),
            "Bearer static-token"
        );
    }

    #[test]
    fn from_properties_fails_fast_on_bad_key() {
        let properties = Properties::from_lookup(|key| match key {
            "OAUTH_IDENTITY" => Some("svc@example.iam".into()),
            "OAUTH_CREDENTIAL" => Some("not a key".into()),
            "OAUTH_ENDPOINT" => Some("https://oauth.example.com/token".into()),
            _ => None,
        })
        .unwrap();
        let result = OAuthAuthenticator::from_properties(reqwest::Client::new(), &properties);
        assert!(matches!(result, Err(SignerError::InvalidKey { .. })));
    }
}
