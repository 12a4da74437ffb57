//! Result type alias
//!
//! Convenience alias that uses [`TekError`] as the error type.

use super::errors::TekError;

/// Result type alias for exporter operations
///
/// # Examples
///
/// ```
/// use tek_exporter::domain::result::Result;
/// use tek_exporter::domain::errors::TekError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(TekError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, TekError>;
