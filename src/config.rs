//! Environment-driven configuration.

use std::str::FromStr;

use crate::oauth::{SignatureAlgorithm, UnsupportedAlgorithm};

pub const DEFAULT_SESSION_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_TOKEN_DURATION_SECS: u32 = 3600;
/// Upper bound for an assertion lifetime.
pub const MAX_TOKEN_DURATION_SECS: u32 = 86_400;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("env var {0} is not set")]
    Missing(&'static str),
    #[error("env var {key} is not a valid number: {value:?}")]
    InvalidNumber { key: &'static str, value: String },
    #[error("env var {key}: {source}")]
    Algorithm {
        key: &'static str,
        #[source]
        source: UnsupportedAlgorithm,
    },
    #[error("env var {key}: unknown credential type {value:?}")]
    CredentialType { key: &'static str, value: String },
}

/// How the configured credential is turned into an access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialType {
    /// The credential is a private key or secret that signs JWT assertions.
    #[default]
    ServiceAccount,
    /// The credential already is a bearer token.
    BearerToken,
}

impl FromStr for CredentialType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "serviceAccountCredentials" => Ok(Self::ServiceAccount),
            "bearerTokenCredentials" => Ok(Self::BearerToken),
            other => Err(other.to_owned()),
        }
    }
}

#[derive(Clone)]
pub struct Properties {
    pub identity: String,
    pub credential: String,
    pub credential_type: CredentialType,
    pub endpoint: String,
    pub audience: String,
    pub signature_algorithm: SignatureAlgorithm,
    pub session_interval_secs: u64,
    pub token_duration_secs: u32,
    pub subject: Option<String>,
    pub scopes: Vec<String>,
}

impl std::fmt::Debug for Properties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Properties")
            .field("identity", &self.identity)
            .field("credential_type", &self.credential_type)
            .field("endpoint", &self.endpoint)
            .field("audience", &self.audience)
            .field("signature_algorithm", &self.signature_algorithm)
            .field("session_interval_secs", &self.session_interval_secs)
            .field("token_duration_secs", &self.token_duration_secs)
            .field("subject", &self.subject)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

impl Properties {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| lookup(key).ok_or(ConfigError::Missing(key));

        let identity = required("OAUTH_IDENTITY")?;
        let credential = required("OAUTH_CREDENTIAL")?;
        let endpoint = required("OAUTH_ENDPOINT")?;
        let audience = lookup("OAUTH_AUDIENCE").unwrap_or_else(|| endpoint.clone());

        let signature_algorithm = match lookup("OAUTH_SIGNATURE_ALGORITHM") {
            Some(value) => value
                .parse::<SignatureAlgorithm>()
                .map_err(|source| ConfigError::Algorithm {
                    key: "OAUTH_SIGNATURE_ALGORITHM",
                    source,
                })?,
            None => SignatureAlgorithm::Rs256,
        };

        let credential_type = match lookup("OAUTH_CREDENTIAL_TYPE") {
            Some(value) => value
                .parse::<CredentialType>()
                .map_err(|value| ConfigError::CredentialType {
                    key: "OAUTH_CREDENTIAL_TYPE",
                    value,
                })?,
            None => CredentialType::default(),
        };

        let session_interval_secs = number(&lookup, "OAUTH_SESSION_INTERVAL")?
            .unwrap_or(DEFAULT_SESSION_INTERVAL_SECS);
        let token_duration_secs = token_duration(&lookup)?;

        let scopes = lookup("OAUTH_SCOPES")
            .map(|value| value.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default();

        Ok(Self {
            identity,
            credential,
            credential_type,
            endpoint,
            audience,
            signature_algorithm,
            session_interval_secs,
            token_duration_secs,
            subject: lookup("OAUTH_SUBJECT"),
            scopes,
        })
    }
}

fn token_duration<F>(lookup: &F) -> Result<u32, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    const KEY: &str = "OAUTH_TOKEN_DURATION";

    match number::<F, u32>(lookup, KEY)? {
        None => Ok(DEFAULT_TOKEN_DURATION_SECS),
        Some(secs) if secs > 0 && secs <= MAX_TOKEN_DURATION_SECS => Ok(secs),
        Some(secs) => Err(ConfigError::InvalidNumber {
            key: KEY,
            value: secs.to_string(),
        }),
    }
}

fn number<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidNumber { key, value })
        })
        .transpose()
}
