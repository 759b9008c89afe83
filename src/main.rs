use std::sync::Arc;

use tracing::info;

use cloud_oauth::{config::Properties, oauth::OAuthAuthenticator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let properties = Properties::from_env()?;
    info!(
        message = "Loaded configuration",
        endpoint = %properties.endpoint,
        identity = %properties.identity,
        algorithm = %properties.signature_algorithm,
        credential_type = ?properties.credential_type,
    );

    let reqwest_client = reqwest::Client::builder()
        .connection_verbose(true)
        .build()?;

    let authenticator = OAuthAuthenticator::from_properties(reqwest_client, &properties)?;

    let first = authenticator.token(&properties.scopes).await?;
    info!(
        message = "Got token",
        token_type = %first.token_type,
        token_expires_in = first.expires_in,
    );

    let second = authenticator.token(&properties.scopes).await?;
    info!(
        message = "Looked up token again",
        served_from_cache = Arc::ptr_eq(&first, &second),
    );

    Ok(())
}
