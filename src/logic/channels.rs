//! Sensor Channel Layout - Centralized Channel Definition
//!
//! Every reading carries the same fixed set of numeric channels, in the
//! order defined here. Model windows, scaler statistics and deviation
//! reports all index by this layout, so the order must never change
//! without retraining everything.

use serde::{Deserialize, Serialize};

/// Channel names in exact order they appear in a channel vector.
/// This is the SINGLE SOURCE OF TRUTH for channel layout.
pub const CHANNEL_LAYOUT: &[&str] = &[
    "temperature",       // 0: degrees Celsius
    "vibration",         // 1: mm/s RMS
    "pressure",          // 2: PSI
    "power_consumption", // 3: kW
    "efficiency",        // 4: percent of rated output
];

/// Total number of channels.
/// IMPORTANT: Must match CHANNEL_LAYOUT.len()!
pub const CHANNEL_COUNT: usize = 5;

/// Fixed-size channel vector, ordered per CHANNEL_LAYOUT.
pub type ChannelVector = [f64; CHANNEL_COUNT];

/// Sensor channel identifiers, ordered per CHANNEL_LAYOUT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Temperature,
    Vibration,
    Pressure,
    PowerConsumption,
    Efficiency,
}

impl Channel {
    pub const ALL: [Channel; CHANNEL_COUNT] = [
        Channel::Temperature,
        Channel::Vibration,
        Channel::Pressure,
        Channel::PowerConsumption,
        Channel::Efficiency,
    ];

    pub fn index(self) -> usize {
        match self {
            Channel::Temperature => 0,
            Channel::Vibration => 1,
            Channel::Pressure => 2,
            Channel::PowerConsumption => 3,
            Channel::Efficiency => 4,
        }
    }

    pub fn name(self) -> &'static str {
        CHANNEL_LAYOUT[self.index()]
    }

    pub fn from_index(index: usize) -> Option<Channel> {
        Channel::ALL.get(index).copied()
    }
}

/// One multi-channel sensor sample, named-field form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelValues {
    pub temperature: f64,
    pub vibration: f64,
    pub pressure: f64,
    pub power_consumption: f64,
    pub efficiency: f64,
}

impl ChannelValues {
    pub fn to_vector(self) -> ChannelVector {
        [
            self.temperature,
            self.vibration,
            self.pressure,
            self.power_consumption,
            self.efficiency,
        ]
    }

    pub fn from_vector(v: ChannelVector) -> Self {
        Self {
            temperature: v[0],
            vibration: v[1],
            pressure: v[2],
            power_consumption: v[3],
            efficiency: v[4],
        }
    }

    pub fn get(self, channel: Channel) -> f64 {
        self.to_vector()[channel.index()]
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_count() {
        assert_eq!(CHANNEL_COUNT, 5);
        assert_eq!(CHANNEL_LAYOUT.len(), CHANNEL_COUNT);
        assert_eq!(Channel::ALL.len(), CHANNEL_COUNT);
    }

    #[test]
    fn test_index_name_round_trip() {
        for (i, channel) in Channel::ALL.iter().enumerate() {
            assert_eq!(channel.index(), i);
            assert_eq!(channel.name(), CHANNEL_LAYOUT[i]);
            assert_eq!(Channel::from_index(i), Some(*channel));
        }
        assert_eq!(Channel::from_index(CHANNEL_COUNT), None);
    }

    #[test]
    fn test_vector_round_trip() {
        let values = ChannelValues {
            temperature: 71.5,
            vibration: 3.2,
            pressure: 120.0,
            power_consumption: 85.0,
            efficiency: 93.0,
        };
        let v = values.to_vector();
        assert_eq!(ChannelValues::from_vector(v), values);
        assert_eq!(values.get(Channel::Pressure), 120.0);
    }
}
