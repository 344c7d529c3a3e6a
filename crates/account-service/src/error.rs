use account_store::StoreError;
use rpc_gateway::{HandlerError, RpcError, RpcErrorCode};
use session_store::SessionError;
use thiserror::Error;

/// Errors raised by the account API handlers. Everything except `Internal`
/// maps to a specific wire error code; `Internal` is logged server-side and
/// surfaced generically.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Identity not found")]
    IdentityNotFound,
    #[error("Credentials not valid")]
    InvalidCredentials,
    #[error("{0}")]
    InvalidEmail(String),
    #[error("{0}")]
    InvalidPassword(String),
    #[error("User with the provided email already exists.")]
    UsernameTaken,
    #[error("{0}")]
    NotAllowedForVisitors(String),
    #[error("{0}")]
    InvalidParamsFormat(String),
    #[error("{0}")]
    EmptyParamValue(String),
    #[error("{0}")]
    ItemNotFound(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl ApiError {
    #[must_use]
    pub fn code(&self) -> Option<RpcErrorCode> {
        match self {
            Self::IdentityNotFound => Some(RpcErrorCode::IdentityNotFound),
            Self::InvalidCredentials => Some(RpcErrorCode::InvalidCredentials),
            Self::InvalidEmail(_) => Some(RpcErrorCode::InvalidEmail),
            Self::InvalidPassword(_) => Some(RpcErrorCode::InvalidPassword),
            Self::UsernameTaken => Some(RpcErrorCode::UsernameTaken),
            Self::NotAllowedForVisitors(_) => Some(RpcErrorCode::NotAllowedForVisitors),
            Self::InvalidParamsFormat(_) => Some(RpcErrorCode::InvalidParamsFormat),
            Self::EmptyParamValue(_) => Some(RpcErrorCode::EmptyParamValue),
            Self::ItemNotFound(_) => Some(RpcErrorCode::ItemNotFound),
            Self::Internal(_) => None,
        }
    }
}

impl From<ApiError> for HandlerError {
    fn from(error: ApiError) -> Self {
        match error.code() {
            Some(code) => Self::Rpc(RpcError::new(code, error.to_string())),
            None => Self::Internal(error.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::DuplicateEmail(_) => Self::UsernameTaken,
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(error: SessionError) -> Self {
        Self::Internal(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_map_to_their_wire_codes() {
        assert_eq!(
            ApiError::IdentityNotFound.code(),
            Some(RpcErrorCode::IdentityNotFound)
        );
        assert_eq!(ApiError::UsernameTaken.code(), Some(RpcErrorCode::UsernameTaken));
        assert_eq!(ApiError::Internal("x".to_string()).code(), None);
    }

    #[test]
    fn internal_errors_become_handler_internal() {
        let handler_error: HandlerError = ApiError::Internal("db down".to_string()).into();
        assert!(matches!(handler_error, HandlerError::Internal(_)));
        let handler_error: HandlerError = ApiError::IdentityNotFound.into();
        assert!(matches!(handler_error, HandlerError::Rpc(_)));
    }
}
