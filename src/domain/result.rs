//! Result type alias for Tidemark

use super::errors::TidemarkError;

/// Result type alias for Tidemark operations
///
/// # Examples
///
/// ```
/// use tidemark::domain::result::Result;
/// use tidemark::domain::errors::TidemarkError;
///
/// fn read_watermark(available: bool) -> Result<Option<i64>> {
///     if available {
///         Ok(Some(7))
///     } else {
///         Err(TidemarkError::StoreUnavailable("connection refused".to_string()))
///     }
/// }
///
/// assert!(read_watermark(true).is_ok());
/// assert!(read_watermark(false).is_err());
/// ```
pub type Result<T> = std::result::Result<T, TidemarkError>;
