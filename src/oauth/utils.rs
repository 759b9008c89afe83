use serde::Deserialize;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
#[error("{status_code} status code: {message}")]
pub struct ServerError {
    pub status_code: u16,
    pub message: String,
}

/// Error body defined by RFC 6749 section 5.2.
#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    error_description: Option<String>,
}

fn describe(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error,
            error_description: Some(description),
        }) => format!("{}: {}", error, description),
        Ok(ErrorBody { error, .. }) => error,
        Err(_) => body.trim().to_owned(),
    }
}

pub async fn check_status(res: reqwest::Response) -> Result<reqwest::Response, ServerError> {
    let status = res.status();
    if !status.is_success() {
        let body = match res.text().await {
            Ok(body) => body,
            Err(err) => {
                debug!(message = "Failed to read error response body", status = %status, error = %err);
                String::new()
            }
        };
        return Err(ServerError {
            status_code: status.as_u16(),
            message: describe(&body),
        });
    }
    Ok(res)
}
