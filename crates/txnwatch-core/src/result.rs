//! Convenience result type alias for txnwatch.

use crate::error::AppError;

/// A specialized `Result` type for txnwatch operations.
pub type AppResult<T> = Result<T, AppError>;
