use thiserror::Error;
use tracing::{error, warn};

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed: {message}")]
    Validation { message: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("conflict: {message}")]
    Conflict { message: String },

    #[error("forbidden: {message}")]
    Forbidden { message: String },

    #[error("storage error: {message}")]
    Storage { message: String, retryable: bool },
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "ecocampus::validation", %message, "validation error");
        CoreError::Validation { message }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        let id = id.to_string();
        warn!(target: "ecocampus::db", entity, %id, "resource not found");
        CoreError::NotFound { entity, id }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "ecocampus::conflict", %message, "conflict error");
        CoreError::Conflict { message }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "ecocampus::auth", %message, "forbidden");
        CoreError::Forbidden { message }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "ecocampus::db", %message, "storage error");
        CoreError::Storage {
            message,
            retryable: false,
        }
    }

    /// Timeouts and transport failures: the caller may retry.
    pub fn storage_retryable(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "ecocampus::db", %message, "retryable storage error");
        CoreError::Storage {
            message,
            retryable: true,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Storage { retryable: true, .. })
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::RowNotFound => CoreError::not_found("row", "query"),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                CoreError::conflict(format!(
                    "unique constraint {} violated",
                    db_err.constraint().unwrap_or("unknown")
                ))
            }
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                CoreError::storage_retryable(error.to_string())
            }
            _ => CoreError::storage(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeout_is_retryable() {
        let err = CoreError::from(sqlx::Error::PoolTimedOut);
        assert!(err.is_retryable());
    }

    #[test]
    fn missing_row_maps_to_not_found() {
        let err = CoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[derive(Debug, Error)]
    #[error("duplicate key value violates unique constraint")]
    struct UniqueViolation;

    impl sqlx::error::DatabaseError for UniqueViolation {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn constraint(&self) -> Option<&str> {
            Some("tasks_waste_log_id_key")
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn unique_violation_maps_to_conflict() {
        let err = CoreError::from(sqlx::Error::Database(Box::new(UniqueViolation)));
        match err {
            CoreError::Conflict { message } => {
                assert!(message.contains("tasks_waste_log_id_key"));
            }
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[test]
    fn validation_is_not_retryable() {
        assert!(!CoreError::validation("missing staff_id").is_retryable());
    }
}
