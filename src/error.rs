//! Error handling module for rb-site
//!
//! Provides centralized error handling with proper error types using thiserror.
//! All errors in the application should use these types for consistency.

use thiserror::Error;

/// Main error type for rb-site
#[derive(Error, Debug)]
pub enum SiteError {
    /// IO errors (file operations, terminal, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Pre-flight errors (install directory not writable, bad target path)
    #[error("{0}")]
    Preflight(String),

    /// A required dependency group has no available provider at all
    #[error("Missing required dependencies: {0}")]
    Dependency(String),

    /// Validation errors (user input, command-line values, unset fields)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration template errors (missing template, unknown placeholder)
    #[error("Template error: {0}")]
    Template(String),

    /// Failures running the site's own management interface
    #[error("Manager command failed: {0}")]
    Manage(String),

    /// A provisioning step failed, aborting the remaining pipeline
    #[error("Installation step failed: {0}")]
    Step(String),

    /// Terminal/UI errors
    #[error("Terminal error: {0}")]
    Terminal(String),

    /// Interactive prompt errors (masked input)
    #[error("Prompt error: {0}")]
    Prompt(#[from] dialoguer::Error),

    /// JSON serialization errors (site settings file)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// General errors (catch-all for edge cases)
    #[error("{0}")]
    General(String),
}

/// Result type alias for rb-site operations
pub type Result<T> = std::result::Result<T, SiteError>;

// Convenient error constructors
impl SiteError {
    /// Create a pre-flight error
    pub fn preflight(msg: impl Into<String>) -> Self {
        Self::Preflight(msg.into())
    }

    /// Create a missing-dependency error
    pub fn dependency(msg: impl Into<String>) -> Self {
        Self::Dependency(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a template error
    pub fn template(msg: impl Into<String>) -> Self {
        Self::Template(msg.into())
    }

    /// Create a manager command error
    pub fn manage(msg: impl Into<String>) -> Self {
        Self::Manage(msg.into())
    }

    /// Create a step failure error
    pub fn step(msg: impl Into<String>) -> Self {
        Self::Step(msg.into())
    }

    /// Create a terminal error
    pub fn terminal(msg: impl Into<String>) -> Self {
        Self::Terminal(msg.into())
    }

    /// Create a general error
    pub fn general(msg: impl Into<String>) -> Self {
        Self::General(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SiteError::validation("an administrator password is required");
        assert_eq!(
            err.to_string(),
            "Validation error: an administrator password is required"
        );

        let err = SiteError::step("Creating database");
        assert_eq!(err.to_string(), "Installation step failed: Creating database");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SiteError = io_err.into();
        assert!(matches!(err, SiteError::Io(_)));
    }

    #[test]
    fn test_error_constructors() {
        let err = SiteError::preflight("unable to create directory");
        assert!(matches!(err, SiteError::Preflight(_)));

        let err = SiteError::manage("syncdb exited with code 2");
        assert!(matches!(err, SiteError::Manage(_)));
    }
}
