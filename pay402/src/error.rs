//! Error types for the x402 payment protocol.

use std::fmt;

/// Base error type for x402 payment operations.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// No registered scheme found for a scheme/network combination.
    #[error("{0}")]
    SchemeNotFound(#[from] SchemeNotFoundError),

    /// No payment requirements match registered schemes.
    #[error("{0}")]
    NoMatchingRequirements(#[from] NoMatchingRequirementsError),

    /// Payment was aborted by a before hook.
    #[error("{0}")]
    Aborted(#[from] PaymentAbortedError),

    /// Scheme execution failed.
    #[error("{0}")]
    Scheme(crate::scheme::SchemeError),
}

impl From<crate::scheme::SchemeError> for PaymentError {
    fn from(err: crate::scheme::SchemeError) -> Self {
        Self::Scheme(err)
    }
}

/// No registered scheme found for a scheme/network combination.
#[derive(Debug, Clone)]
pub struct SchemeNotFoundError {
    /// The requested scheme.
    pub scheme: String,
    /// The requested network.
    pub network: String,
}

impl SchemeNotFoundError {
    /// Creates a new scheme-not-found error.
    #[must_use]
    pub fn new(scheme: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            network: network.into(),
        }
    }
}

impl fmt::Display for SchemeNotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "No scheme '{}' registered for network '{}'",
            self.scheme, self.network
        )
    }
}

impl std::error::Error for SchemeNotFoundError {}

/// No payment requirements match registered schemes.
#[derive(Debug, Clone)]
pub struct NoMatchingRequirementsError {
    /// Reason for the error.
    pub reason: String,
}

impl NoMatchingRequirementsError {
    /// Creates a new no-matching-requirements error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for NoMatchingRequirementsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason)
    }
}

impl std::error::Error for NoMatchingRequirementsError {}

/// Payment was aborted by a before hook.
#[derive(Debug, Clone)]
pub struct PaymentAbortedError {
    /// The reason for aborting.
    pub reason: String,
}

impl PaymentAbortedError {
    /// Creates a new payment-aborted error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for PaymentAbortedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payment aborted: {}", self.reason)
    }
}

impl std::error::Error for PaymentAbortedError {}
