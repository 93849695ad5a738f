use crate::database::DatabaseError;
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error;

/// Reasons a race is outside the window in which wagers may be created or placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum WindowViolation {
    /// The race start is now or in the past
    RaceStarted,
    /// Zero or one whole day left before the start
    RaceImminent { days_remaining: i64 },
    /// Some lead time left, but less than the configured minimum
    InsufficientLeadTime { days_remaining: i64, min_days: i64 },
}

impl WindowViolation {
    /// Machine-readable code surfaced in error payloads
    pub fn code(&self) -> &'static str {
        match self {
            WindowViolation::RaceStarted => "race_started",
            WindowViolation::RaceImminent { .. } => "race_imminent",
            WindowViolation::InsufficientLeadTime { .. } => "insufficient_lead_time",
        }
    }

    pub fn days_remaining(&self) -> Option<i64> {
        match self {
            WindowViolation::RaceStarted => None,
            WindowViolation::RaceImminent { days_remaining }
            | WindowViolation::InsufficientLeadTime { days_remaining, .. } => Some(*days_remaining),
        }
    }
}

impl std::fmt::Display for WindowViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowViolation::RaceStarted => {
                write!(f, "the race has already started or is over")
            }
            WindowViolation::RaceImminent { days_remaining } => write!(
                f,
                "the race starts in {} day(s); wagers can no longer be opened",
                days_remaining
            ),
            WindowViolation::InsufficientLeadTime {
                days_remaining,
                min_days,
            } => write!(
                f,
                "the race starts in {} day(s); wagers need at least {} days of lead time",
                days_remaining, min_days
            ),
        }
    }
}

/// Application-level error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database errors
    #[error("SQL error: {0}")]
    Sqlx(#[from] SqlxError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Missing or rejected credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed to act on the resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Business logic errors
    #[error("Business logic error: {0}")]
    BusinessLogic(String),

    /// Stake larger than the spendable balance
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    /// Race timing rules
    #[error("Wager window violation: {0}")]
    WagerWindow(WindowViolation),

    /// Generic error with message
    #[error("{0}")]
    Message(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Get HTTP status code for the error
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::NotFound(_) => 404,
            AppError::Unauthorized(_) => 401,
            AppError::Forbidden(_) => 403,
            AppError::Validation(_) => 400,
            AppError::BusinessLogic(_) | AppError::WagerWindow(_) => 400,
            AppError::InsufficientBalance(_) => 400,
            AppError::Config(_) => 500,
            AppError::Database(_) | AppError::Sqlx(_) => 500,
            _ => 500,
        }
    }

    /// Machine-readable error code for response bodies
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::Validation(_) => "validation",
            AppError::BusinessLogic(_) => "business_rule",
            AppError::InsufficientBalance(_) => "insufficient_balance",
            AppError::WagerWindow(violation) => violation.code(),
            _ => "internal",
        }
    }

    /// Message that is safe to hand back to a caller
    pub fn public_message(&self) -> String {
        match self {
            AppError::NotFound(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::Validation(msg)
            | AppError::BusinessLogic(msg)
            | AppError::InsufficientBalance(msg) => msg.clone(),
            AppError::WagerWindow(violation) => violation.to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

/// Repository-specific error types
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database query error
    #[error("Query error: {0}")]
    Query(SqlxError),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Duplicate record
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Debit larger than the locked balance
    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance {
        available: rust_decimal::Decimal,
        required: rust_decimal::Decimal,
    },
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => AppError::NotFound(msg),
            RepositoryError::Query(e) => AppError::Sqlx(e),
            RepositoryError::Duplicate(msg) => AppError::BusinessLogic(format!("Duplicate: {}", msg)),
            RepositoryError::ConstraintViolation(msg) => AppError::Validation(msg),
            RepositoryError::InsufficientBalance { available, required } => {
                AppError::InsufficientBalance(format!(
                    "Insufficient balance: available {}, required {}",
                    available, required
                ))
            }
        }
    }
}

impl From<SqlxError> for RepositoryError {
    fn from(err: SqlxError) -> Self {
        match &err {
            SqlxError::RowNotFound => RepositoryError::NotFound("Record not found".to_string()),
            SqlxError::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                if code.as_deref() == Some("23505") {
                    // Unique violation
                    RepositoryError::Duplicate(db_err.message().to_string())
                } else if code.as_deref() == Some("23503") {
                    // Foreign key violation
                    RepositoryError::ConstraintViolation(db_err.message().to_string())
                } else if code.as_deref() == Some("23514") {
                    // Check constraint violation
                    RepositoryError::ConstraintViolation(db_err.message().to_string())
                } else {
                    RepositoryError::Query(err)
                }
            }
            _ => RepositoryError::Query(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::NotFound("x".into()).status_code(), 404);
        assert_eq!(AppError::Unauthorized("x".into()).status_code(), 401);
        assert_eq!(AppError::Forbidden("x".into()).status_code(), 403);
        assert_eq!(AppError::Validation("x".into()).status_code(), 400);
        assert_eq!(AppError::BusinessLogic("x".into()).status_code(), 400);
        assert_eq!(
            AppError::WagerWindow(WindowViolation::RaceStarted).status_code(),
            400
        );
        assert_eq!(AppError::Message("boom".into()).status_code(), 500);
    }

    #[test]
    fn test_internal_errors_do_not_leak_details() {
        let err = AppError::Message("connection string postgres://secret".into());
        assert_eq!(err.public_message(), "Internal server error");
        assert_eq!(err.code(), "internal");
    }

    #[test]
    fn test_window_violation_codes_are_distinct() {
        let imminent = AppError::WagerWindow(WindowViolation::RaceImminent { days_remaining: 1 });
        let too_soon = AppError::WagerWindow(WindowViolation::InsufficientLeadTime {
            days_remaining: 2,
            min_days: 3,
        });
        assert_eq!(imminent.code(), "race_imminent");
        assert_eq!(too_soon.code(), "insufficient_lead_time");
        assert_ne!(imminent.public_message(), too_soon.public_message());
    }

    #[test]
    fn test_repository_error_mapping() {
        let app: AppError = RepositoryError::Duplicate("email".into()).into();
        assert!(matches!(app, AppError::BusinessLogic(_)));

        let app: AppError = RepositoryError::NotFound("stake".into()).into();
        assert!(matches!(app, AppError::NotFound(_)));

        let app: AppError = RepositoryError::InsufficientBalance {
            available: rust_decimal::Decimal::new(3, 0),
            required: rust_decimal::Decimal::new(4, 0),
        }
        .into();
        assert_eq!(app.status_code(), 400);
        assert_eq!(app.code(), "insufficient_balance");
    }
}
