use std::fmt;

use aptly_transport::TransportError;

/// The API operation an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    BuildClient,
    ServerVersion,
    UploadFiles,
    AddToRepo,
    UpdatePublish,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::BuildClient => write!(f, "build HTTP client"),
            Operation::ServerVersion => write!(f, "get server version"),
            Operation::UploadFiles => write!(f, "upload files"),
            Operation::AddToRepo => write!(f, "add uploaded files to repo"),
            Operation::UpdatePublish => write!(f, "update published repo"),
        }
    }
}

/// Errors from the Aptly client. All of them abort the operation.
#[derive(Debug, thiserror::Error)]
pub enum AptlyError {
    #[error("invalid Aptly server URL `{url}`: {message}")]
    Endpoint { url: String, message: String },

    /// No response was obtained.
    #[error("{operation} failed: {source}")]
    Transport {
        operation: Operation,
        #[source]
        source: TransportError,
    },

    /// The server answered with something other than 200.
    #[error(
        "{operation} failed: HTTP {status} {status_text}{}",
        detail_suffix(.detail)
    )]
    Api {
        operation: Operation,
        status: u16,
        status_text: String,
        /// `error` field of Aptly's JSON error body, when present
        detail: Option<String>,
    },

    /// The response was accepted but lacks something the operation needs.
    #[error("{operation} failed: {message}")]
    Protocol { operation: Operation, message: String },

    #[error("{operation} rejected: {message}")]
    InvalidInput { operation: Operation, message: String },
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(detail) => format!(" ({detail})"),
        None => String::new(),
    }
}

impl AptlyError {
    /// HTTP status, for [`AptlyError::Api`].
    pub fn status(&self) -> Option<u16> {
        match self {
            AptlyError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn operation(&self) -> Option<Operation> {
        match self {
            AptlyError::Endpoint { .. } => None,
            AptlyError::Transport { operation, .. }
            | AptlyError::Api { operation, .. }
            | AptlyError::Protocol { operation, .. }
            | AptlyError::InvalidInput { operation, .. } => Some(*operation),
        }
    }
}
