use std::{
    collections::BTreeMap,
    fmt,
    hash::{Hash, Hasher},
};

use serde::{Deserialize, Serialize};

use super::SignatureAlgorithm;

/// An access token as returned by a token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The credential presented in the `Authorization` header.
    pub access_token: String,
    /// Usually `Bearer`.
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Server-declared lifetime in seconds.
    #[serde(default)]
    pub expires_in: u64,
}

fn default_token_type() -> String {
    "Bearer".to_owned()
}

impl Token {
    pub fn new(access_token: impl Into<String>, expires_in: u64) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: default_token_type(),
            expires_in,
        }
    }

    /// Value for the `Authorization` header.
    pub fn authorization_value(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

/// An identity and the secret that proves it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credentials {
    pub identity: String,
    pub credential: String,
}

impl Credentials {
    pub fn new(identity: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            credential: credential.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("credential", &"<redacted>")
            .finish()
    }
}

/// The JOSE header of a token request assertion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Header {
    #[serde(rename = "alg")]
    pub algorithm: SignatureAlgorithm,
    #[serde(rename = "typ")]
    pub token_type: String,
}

impl Header {
    pub fn new(algorithm: SignatureAlgorithm) -> Self {
        Self {
            algorithm,
            token_type: "JWT".to_owned(),
        }
    }
}

/// The claims of a token request assertion.
///
/// Equality and hashing ignore `iat` and `exp`: two claim sets built at
/// different instants for the same issuer, scopes and audience identify the
/// same token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimSet {
    #[serde(rename = "iss")]
    pub issuer: String,
    pub scope: String,
    #[serde(rename = "aud")]
    pub audience: String,
    #[serde(rename = "iat")]
    pub issued_at: i64,
    #[serde(rename = "exp")]
    pub expiration: i64,
    /// Additional string claims such as `sub`.
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl PartialEq for ClaimSet {
    fn eq(&self, other: &Self) -> bool {
        self.issuer == other.issuer
            && self.scope == other.scope
            && self.audience == other.audience
            && self.extra == other.extra
    }
}

impl Eq for ClaimSet {}

impl Hash for ClaimSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.issuer.hash(state);
        self.scope.hash(state);
        self.audience.hash(state);
        self.extra.hash(state);
    }
}

/// Everything needed to produce a signed assertion for the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenRequest {
    pub header: Header,
    pub claims: ClaimSet,
}
