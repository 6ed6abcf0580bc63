use service_core::error::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Account not found: {0}")]
    NotFound(i64),

    #[error("Account {0} is not active")]
    Inactive(i64),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Session store error: {0}")]
    Session(String),

    #[error("Cannot change current account outside a web session")]
    NotInWebScope,

    #[error("No current account for this caller")]
    NoCurrentAccount,

    /// Sustained failure to reach the admin server. Callers must stop
    /// serving protected functionality.
    #[error("Remote account not authenticated: {0}")]
    RemoteNotAuthenticated(String),

    #[error("Remote account server error: {0}")]
    Remote(String),

    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),

    #[error("Preference store error: {0}")]
    Preferences(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for AccountError {
    fn from(err: reqwest::Error) -> Self {
        AccountError::Remote(err.to_string())
    }
}

impl From<tower_sessions::session::Error> for AccountError {
    fn from(err: tower_sessions::session::Error) -> Self {
        AccountError::Session(err.to_string())
    }
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::NotFound(id) => {
                AppError::NotFound(anyhow::anyhow!("Account not found: {}", id))
            }
            AccountError::Inactive(id) => {
                AppError::Forbidden(anyhow::anyhow!("Account {} is not active", id))
            }
            AccountError::NotInWebScope => AppError::BadRequest(anyhow::anyhow!(
                "Cannot change current account outside a web session"
            )),
            AccountError::NoCurrentAccount => {
                AppError::BadRequest(anyhow::anyhow!("No current account for this caller"))
            }
            AccountError::RemoteNotAuthenticated(msg) => {
                AppError::Unauthorized(anyhow::anyhow!(msg))
            }
            AccountError::Remote(msg) => AppError::BadGateway(msg),
            AccountError::Session(msg) => AppError::SessionError(msg),
            AccountError::Unsupported(op) => {
                AppError::BadRequest(anyhow::anyhow!("Operation not supported: {}", op))
            }
            other => AppError::InternalError(anyhow::Error::new(other)),
        }
    }
}
