use reqwest::StatusCode;
use skydrive_protocol::ErrorBody;

/// Errors from the SkyDrive API client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Name collision (409). `file_id` identifies the existing entity
    /// when the server reported one.
    #[error("name conflict: {message}")]
    Conflict {
        file_id: Option<i64>,
        message: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid API token")]
    InvalidToken,
}

impl Error {
    /// Builds an error from a non-success response.
    pub(crate) fn from_response(status: StatusCode, body: &str) -> Self {
        let parsed = serde_json::from_str::<ErrorBody>(body).ok();
        let message = parsed
            .as_ref()
            .and_then(|b| b.message())
            .map(str::to_string)
            .or_else(|| {
                let trimmed = body.trim();
                (!trimmed.is_empty() && trimmed.len() <= 512).then(|| trimmed.to_string())
            })
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });

        if status == StatusCode::CONFLICT {
            return Self::Conflict {
                file_id: parsed.as_ref().and_then(ErrorBody::conflicting_file_id),
                message,
            };
        }

        Self::Api {
            status: status.as_u16(),
            message,
        }
    }

    /// Whether repeating the same call later may succeed.
    ///
    /// Transport failures, 5xx, 408 and 429 are transient. Other client
    /// errors (bad name, quota exceeded, auth) are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Api { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::Conflict { .. } | Self::Json(_) | Self::InvalidToken => false,
        }
    }

    /// Message suitable for showing to a user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { message, .. } | Self::Conflict { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
