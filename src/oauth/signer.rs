//! Compact JWS encoding of token request assertions.

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{errors::Error as JwtError, EncodingKey};

use super::{algorithm::KeyFamily, SignatureAlgorithm, TokenRequest};

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("invalid {algorithm} signing key: {source}")]
    InvalidKey {
        algorithm: SignatureAlgorithm,
        #[source]
        source: JwtError,
    },
    #[error("request asks for {requested} but the signer uses {configured}")]
    AlgorithmMismatch {
        requested: SignatureAlgorithm,
        configured: SignatureAlgorithm,
    },
    #[error("failed encoding JWT: {0}")]
    Jwt(#[from] JwtError),
    #[error("failed encoding JWT segment: {0}")]
    Json(#[from] serde_json::Error),
}

/// Signs token requests with one fixed algorithm and key.
pub struct JwsSigner {
    algorithm: SignatureAlgorithm,
    key: Option<EncodingKey>,
}

impl fmt::Debug for JwsSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwsSigner")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Converts escaped newlines back into real ones.
///
/// Keys copied out of JSON key files keep their `\n` escapes, which is not
/// valid PEM.
fn normalize_pem(key: &str) -> String {
    key.replace("\\n", "\n")
}

impl JwsSigner {
    /// Parses `credential` as key material for `algorithm`.
    ///
    /// Fails when the credential is not a usable key for the algorithm's key
    /// family. The credential is ignored for [`SignatureAlgorithm::None`].
    pub fn new(algorithm: SignatureAlgorithm, credential: &str) -> Result<Self, SignerError> {
        let key = match algorithm.key_family() {
            KeyFamily::Rsa => EncodingKey::from_rsa_pem(normalize_pem(credential).as_bytes()),
            KeyFamily::Ec => EncodingKey::from_ec_pem(normalize_pem(credential).as_bytes()),
            KeyFamily::Hmac => Ok(EncodingKey::from_secret(credential.as_bytes())),
            KeyFamily::Unsigned => {
                return Ok(Self {
                    algorithm,
                    key: None,
                })
            }
        };
        let key = key.map_err(|source| SignerError::InvalidKey { algorithm, source })?;
        Ok(Self {
            algorithm,
            key: Some(key),
        })
    }

    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    /// Produces `header.claims.signature`, each segment base64url without padding.
    pub fn sign(&self, request: &TokenRequest) -> Result<String, SignerError> {
        if request.header.algorithm != self.algorithm {
            return Err(SignerError::AlgorithmMismatch {
                requested: request.header.algorithm,
                configured: self.algorithm,
            });
        }

        match (self.algorithm.jwt_algorithm(), &self.key) {
            (Some(algorithm), Some(key)) => {
                let mut header = jsonwebtoken::Header::new(algorithm);
                header.typ = Some(request.header.token_type.clone());
                Ok(jsonwebtoken::encode(&header, &request.claims, key)?)
            }
            _ => {
                let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&request.header)?);
                let claims = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&request.claims)?);
                Ok(format!("{}.{}.", header, claims))
            }
        }
    }
}
