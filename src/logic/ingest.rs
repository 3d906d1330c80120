//! Reading Ingest - Validation Gate
//!
//! Rejects malformed samples before they can reach the detector or the
//! training window. A rejected reading is reported synchronously to the
//! submitter and leaves no trace in history.

use super::channels::{Channel, ChannelValues};
use super::error::{PipelineError, PipelineResult};

/// Efficiency is a percentage of rated output.
const EFFICIENCY_MAX: f64 = 100.0;

/// Validate one incoming sample.
pub fn validate_channels(channels: &ChannelValues) -> PipelineResult<()> {
    let vector = channels.to_vector();

    for channel in Channel::ALL {
        let value = vector[channel.index()];
        if !value.is_finite() {
            return Err(PipelineError::Validation(format!(
                "{} is not a finite number",
                channel.name()
            )));
        }
    }

    // Temperature may legitimately go below zero; the rest cannot.
    for channel in [
        Channel::Vibration,
        Channel::Pressure,
        Channel::PowerConsumption,
        Channel::Efficiency,
    ] {
        let value = vector[channel.index()];
        if value < 0.0 {
            return Err(PipelineError::Validation(format!(
                "{} must be non-negative, got {}",
                channel.name(),
                value
            )));
        }
    }

    if channels.efficiency > EFFICIENCY_MAX {
        return Err(PipelineError::Validation(format!(
            "efficiency must be at most {EFFICIENCY_MAX}, got {}",
            channels.efficiency
        )));
    }

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ChannelValues {
        ChannelValues {
            temperature: 72.0,
            vibration: 3.1,
            pressure: 118.0,
            power_consumption: 84.0,
            efficiency: 92.0,
        }
    }

    #[test]
    fn test_valid_sample_passes() {
        assert!(validate_channels(&sample()).is_ok());
    }

    #[test]
    fn test_negative_temperature_allowed() {
        let mut s = sample();
        s.temperature = -12.5;
        assert!(validate_channels(&s).is_ok());
    }

    #[test]
    fn test_nan_rejected() {
        let mut s = sample();
        s.vibration = f64::NAN;
        let err = validate_channels(&s).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[test]
    fn test_infinite_rejected() {
        let mut s = sample();
        s.pressure = f64::INFINITY;
        assert!(validate_channels(&s).is_err());
    }

    #[test]
    fn test_negative_power_rejected() {
        let mut s = sample();
        s.power_consumption = -1.0;
        assert!(validate_channels(&s).is_err());
    }

    #[test]
    fn test_efficiency_over_100_rejected() {
        let mut s = sample();
        s.efficiency = 104.0;
        assert!(validate_channels(&s).is_err());
    }
}
