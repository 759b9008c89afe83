//! OAuth2 token acquisition and caching.

pub mod algorithm;
pub mod api;
pub mod authenticator;
pub mod client_credentials;
pub mod domain;
pub mod request;
pub mod signer;
pub mod token_cache;
mod utils;

pub use self::{
    algorithm::{SignatureAlgorithm, UnsupportedAlgorithm},
    api::OAuthApi,
    authenticator::OAuthAuthenticator,
    domain::{ClaimSet, Credentials, Header, Token, TokenRequest},
    request::TokenRequestBuilder,
    signer::JwsSigner,
    token_cache::{session_ttl, TokenCache},
    utils::ServerError,
};

/// Grant type for exchanging a signed JWT assertion for an access token.
pub const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Performs the network round-trip that turns a key into a fresh [`Token`].
#[async_trait::async_trait]
pub trait TokenFetcher<Key>: Send + Sync
where
    Key: Send + Sync,
{
    type Error: Send + Sync;

    async fn fetch(&self, key: &Key) -> Result<Token, Self::Error>;
}
