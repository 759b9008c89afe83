use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use super::{ClaimSet, Header, SignatureAlgorithm, TokenRequest};
use crate::config::Properties;

/// Builds token requests for an identity from the scopes a call needs.
#[derive(Debug, Clone)]
pub struct TokenRequestBuilder {
    pub issuer: String,
    pub audience: String,
    pub algorithm: SignatureAlgorithm,
    pub token_duration: Duration,
    pub subject: Option<String>,
}

impl TokenRequestBuilder {
    pub fn from_properties(properties: &Properties) -> Self {
        Self {
            issuer: properties.identity.clone(),
            audience: properties.audience.clone(),
            algorithm: properties.signature_algorithm,
            token_duration: Duration::seconds(i64::from(properties.token_duration_secs)),
            subject: properties.subject.clone(),
        }
    }

    pub fn build<S: AsRef<str>>(&self, scopes: &[S]) -> TokenRequest {
        self.build_at(scopes, Utc::now())
    }

    pub fn build_at<S: AsRef<str>>(&self, scopes: &[S], now: DateTime<Utc>) -> TokenRequest {
        let scope = scopes
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(" ");

        let mut extra = BTreeMap::new();
        if let Some(subject) = &self.subject {
            extra.insert("sub".to_owned(), subject.clone());
        }

        TokenRequest {
            header: Header::new(self.algorithm),
            claims: ClaimSet {
                issuer: self.issuer.clone(),
                scope,
                audience: self.audience.clone(),
                issued_at: now.timestamp(),
                expiration: (now + self.token_duration).timestamp(),
                extra,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn builder() -> TokenRequestBuilder {
        TokenRequestBuilder {
            issuer: "svc@example.iam".into(),
            audience: "https://oauth.example.com/token".into(),
            algorithm: SignatureAlgorithm::Rs256,
            token_duration: Duration::seconds(3600),
            subject: None,
        }
    }

    #[test]
    fn stamps_emission_and_expiration() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let request = builder().build_at(&["compute", "storage.read"], now);

        assert_eq!(request.header, Header::new(SignatureAlgorithm::Rs256));
        assert_eq!(request.claims.scope, "compute storage.read");
        assert_eq!(request.claims.issued_at, 1_700_000_000);
        assert_eq!(request.claims.expiration, 1_700_003_600);
        assert!(request.claims.extra.is_empty());
    }

    #[test]
    fn uses_configured_token_duration() {
        let properties = Properties::from_lookup(|key| match key {
            "OAUTH_IDENTITY" => Some("svc@example.iam".into()),
            "OAUTH_CREDENTIAL" => Some("secret".into()),
            "OAUTH_ENDPOINT" => Some("https://oauth.example.com/token".into()),
            "OAUTH_TOKEN_DURATION" => Some("86400".into()),
            _ => None,
        })
        .unwrap();
        let request = TokenRequestBuilder::from_properties(&properties)
            .build_at(&["compute"], Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        assert_eq!(request.claims.expiration - request.claims.issued_at, 86_400);
    }

    #[test]
    fn adds_subject_claim() {
        let builder = TokenRequestBuilder {
            subject: Some("user@example.com".into()),
            ..builder()
        };
        let request = builder.build(&["compute"]);
        assert_eq!(
            request.claims.extra.get("sub").map(String::as_str),
            Some("user@example.com")
        );
    }

    #[test]
    fn same_scopes_build_equal_requests_over_time() {
        let builder = builder();
        let earlier = builder.build_at(&["compute"], Utc.timestamp_opt(1_000, 0).unwrap());
        let later = builder.build_at(&["compute"], Utc.timestamp_opt(5_000, 0).unwrap());
        assert_eq!(earlier, later);
        assert_ne!(earlier, builder.build_at(&["storage"], Utc.timestamp_opt(1_000, 0).unwrap()));
    }
}
