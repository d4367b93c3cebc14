//! Error taxonomy for the order-management core.
//!
//! Every failure in this crate falls into one of three buckets: a remote call
//! against the hosted backend failed, a request was rejected before any remote
//! call was attempted, or a referenced entity could not be located. Nothing
//! here is fatal to the process; callers surface the message to the user and
//! keep the prior state.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PosError {
    /// Network or backend-side failure while talking to the hosted store.
    #[error("{0}")]
    Remote(String),

    /// Rejected before any remote call was made. Local and remote state are
    /// guaranteed untouched.
    #[error("{0}")]
    Validation(String),

    /// A referenced order/customer/store could not be located.
    #[error("{0} not found")]
    NotFound(String),

    /// Missing or malformed terminal configuration (Supabase URL / anon key).
    #[error("{0}")]
    Config(String),
}

impl PosError {
    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, PosError>;
