//! Error types for simulator setup and configuration.
//!
//! Only setup-time failures are representable here. Operational outcomes
//! (channel loss, missing ACKs, energy exhaustion) are protocol events, not
//! errors, and internal-consistency violations abort via panic instead of
//! propagating.

use thiserror::Error;

/// Errors that can occur while configuring or starting a simulation.
#[derive(Error, Debug)]
pub enum UoarError {
    /// Acoustic spreading factor outside the supported set
    #[error("spreading factor must be 1.0, 1.5 or 2.0, got {0}")]
    InvalidSpreadingFactor(f64),

    /// Shipping activity factor outside [0, 1]
    #[error("shipping activity must be within [0, 1], got {0}")]
    InvalidShippingActivity(f64),

    /// Negative wind speed
    #[error("wind speed must be non-negative, got {0}")]
    InvalidWindSpeed(f64),

    /// Node registered with the reserved broadcast address
    #[error("address {0} is reserved for broadcast and cannot name a node")]
    ReservedAddress(u32),

    /// Invalid simulation configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl UoarError {
    /// Check if this error points at the channel parameterization.
    pub fn is_channel_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidSpreadingFactor(_)
                | Self::InvalidShippingActivity(_)
                | Self::InvalidWindSpeed(_)
        )
    }
}

/// Result type for simulator setup operations
pub type Result<T> = std::result::Result<T, UoarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = UoarError::InvalidSpreadingFactor(3.0);
        assert!(err.to_string().contains("spreading factor"));

        let err = UoarError::Config("missing app start time".to_string());
        assert!(err.to_string().contains("missing app start time"));
    }

    #[test]
    fn test_channel_error_classification() {
        assert!(UoarError::InvalidWindSpeed(-1.0).is_channel_error());
        assert!(UoarError::InvalidShippingActivity(1.5).is_channel_error());
        assert!(!UoarError::ReservedAddress(0).is_channel_error());
        assert!(!UoarError::Config("x".to_string()).is_channel_error());
    }
}
