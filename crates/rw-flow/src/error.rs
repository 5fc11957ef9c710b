use rw_api_client::{ApiError, ErrorCode, ErrorKind};
use serde::Serialize;
use tracing::warn;

const UNEXPECTED_MESSAGE: &str = "Something went wrong. Please try again.";

/// Failure recorded on a flow's state.
///
/// Flow methods never return errors; every failure lands here and stays
/// until the next edit, retry or transition clears it.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FlowError {
    /// Input rejected locally or by the backend; rendered next to `field`.
    #[error("{field}: {message}")]
    Validation { field: String, message: String },
    #[error("{message}")]
    Service { code: ErrorCode, message: String },
    #[error("{reason}")]
    VerificationFailed { reason: String },
    #[error("{message}")]
    Unexpected { message: String },
}

impl FlowError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Validation { message, .. }
            | Self::Service { message, .. }
            | Self::Unexpected { message } => message,
            Self::VerificationFailed { reason } => reason,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Maps a backend failure; validation errors are attributed to `field`.
    pub(crate) fn from_api(field: &str, err: ApiError) -> Self {
        match err.kind() {
            ErrorKind::Validation => Self::validation(field, err.message),
            ErrorKind::Service | ErrorKind::Network => Self::Service {
                code: err.code,
                message: err.message,
            },
            ErrorKind::Cancelled | ErrorKind::Unexpected => {
                warn!(code = %err.code, error = %err.message, "unexpected failure in flow");
                Self::Unexpected {
                    message: UNEXPECTED_MESSAGE.to_owned(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_amount_errors_become_field_errors() {
        let err = FlowError::from_api(
            "amount",
            ApiError::new(ErrorCode::MaxAmountError, "Maximum deposit amount is 10000 EUR"),
        );
        assert_eq!(err.field(), Some("amount"));
        assert_eq!(err.message(), "Maximum deposit amount is 10000 EUR");
    }

    #[test]
    fn unexpected_errors_get_a_generic_message() {
        let err = FlowError::from_api("amount", ApiError::unexpected("index out of bounds"));
        assert_eq!(err.message(), UNEXPECTED_MESSAGE);
        assert!(!err.is_validation());
    }

    #[test]
    fn serializes_with_kind_tag() -> anyhow::Result<()> {
        let err = FlowError::Service {
            code: ErrorCode::BankServiceError,
            message: "Bank service unavailable".to_owned(),
        };
        let value = serde_json::to_value(&err)?;
        assert_eq!(value["kind"], "service");
        assert_eq!(value["code"], "BANK_SERVICE_ERROR");
        Ok(())
    }
}
