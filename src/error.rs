use rmcp::model::ErrorData;
use serde::Serialize;

/// Machine-readable failure category carried alongside the display message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Startup,
    InputShape,
    UnknownOperation,
    RemoteCall,
}

#[derive(Debug, thiserror::Error)]
pub enum MilestoneError {
    #[error(
        "GitHub token is required. Set GITHUB_TOKEN or GITHUB_PERSONAL_ACCESS_TOKEN environment variable."
    )]
    MissingToken,

    #[error("Failed to create GitHub client: {0}")]
    Client(String),

    #[error("Missing required arguments")]
    MissingArguments,

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Invalid parameter '{field}': {reason}")]
    InvalidParam { field: &'static str, reason: String },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Failed to {verb} milestone: {message}")]
    Remote {
        verb: &'static str,
        status: Option<u16>,
        message: String,
    },
}

impl MilestoneError {
    /// Wrap an octocrab failure for the operation named by `verb`.
    ///
    /// `status` is the response status when one came back; it is used when
    /// the body was not a GitHub error document (proxy pages, empty 5xx).
    pub fn remote(
        verb: &'static str,
        status: Option<http::StatusCode>,
        err: octocrab::Error,
    ) -> Self {
        let (status, message) = match (&err, status) {
            (octocrab::Error::GitHub { source, .. }, _) => {
                (Some(source.status_code), source.message.clone())
            }
            (_, Some(status)) if !status.is_success() => (
                Some(status),
                status
                    .canonical_reason()
                    .map(|reason| format!("{} {}", status.as_u16(), reason))
                    .unwrap_or_else(|| status.as_u16().to_string()),
            ),
            (other, status) => (status, other.to_string()),
        };
        let message = if message.trim().is_empty() {
            "Unknown error".to_string()
        } else {
            message
        };
        MilestoneError::Remote {
            verb,
            status: status.map(|s| s.as_u16()),
            message,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            MilestoneError::MissingToken | MilestoneError::Client(_) => ErrorCategory::Startup,
            MilestoneError::MissingArguments
            | MilestoneError::InvalidArguments(_)
            | MilestoneError::InvalidParam { .. } => ErrorCategory::InputShape,
            MilestoneError::UnknownTool(_) => ErrorCategory::UnknownOperation,
            MilestoneError::Remote { .. } => ErrorCategory::RemoteCall,
        }
    }

    /// HTTP status reported by GitHub, when the failure came back as a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            MilestoneError::Remote { status, .. } => *status,
            _ => None,
        }
    }

    pub fn to_mcp_error(&self) -> ErrorData {
        let data = Some(serde_json::json!({
            "category": self.category(),
            "status": self.status(),
        }));
        // An absent argument bundle is rejected before any tool runs, so it
        // is reported bare; everything after that point carries the prefix.
        let message = match self {
            MilestoneError::MissingArguments => self.to_string(),
            _ => format!("Tool execution failed: {}", self),
        };
        match self.category() {
            ErrorCategory::InputShape | ErrorCategory::UnknownOperation => {
                ErrorData::invalid_params(message, data)
            }
            ErrorCategory::Startup | ErrorCategory::RemoteCall => {
                ErrorData::internal_error(message, data)
            }
        }
    }
}
