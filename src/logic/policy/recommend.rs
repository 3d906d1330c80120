//! Maintenance Recommendation Text
//!
//! Deterministic: identical channel values and deviations always produce
//! identical text. Channels are visited in order of deviation magnitude
//! so the hardest-deviating channel leads the recommendation, and each
//! channel contributes its message only when the reading breaches that
//! channel's fixed operating limit.

use crate::logic::channels::{Channel, ChannelValues, ChannelVector};
use crate::logic::types::Severity;

/// Fixed operating limits per channel.
const TEMPERATURE_LIMIT: f64 = 80.0;
const VIBRATION_LIMIT: f64 = 7.0;
const PRESSURE_LIMIT: f64 = 140.0;
const EFFICIENCY_FLOOR: f64 = 80.0;

/// Message for a channel whose reading breaches its operating limit.
fn limit_message(channel: Channel, values: &ChannelValues) -> Option<&'static str> {
    match channel {
        Channel::Temperature if values.temperature > TEMPERATURE_LIMIT => {
            Some("Temperature exceeds normal range. Check cooling system.")
        }
        Channel::Vibration if values.vibration > VIBRATION_LIMIT => {
            Some("High vibration detected. Inspect bearings and alignment.")
        }
        Channel::Pressure if values.pressure > PRESSURE_LIMIT => {
            Some("Pressure levels elevated. Check seals and valves.")
        }
        Channel::Efficiency if values.efficiency < EFFICIENCY_FLOOR => {
            Some("Efficiency below optimal. Schedule maintenance.")
        }
        _ => None,
    }
}

/// Build the recommendation for an anomalous reading.
pub fn generate(
    values: &ChannelValues,
    deviations: &ChannelVector,
    severity: Option<Severity>,
) -> String {
    // Channels ordered by deviation magnitude, largest first. Ties break
    // on layout order, which keeps the output stable.
    let mut order: Vec<Channel> = Channel::ALL.to_vec();
    order.sort_by(|a, b| {
        deviations[b.index()]
            .abs()
            .partial_cmp(&deviations[a.index()].abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let messages: Vec<&'static str> = order
        .into_iter()
        .filter_map(|channel| limit_message(channel, values))
        .collect();

    if !messages.is_empty() {
        return messages.join(" ");
    }

    // Nothing breached a hard limit; the anomaly is in the combination
    // of channels rather than any single one.
    match severity {
        Some(Severity::Critical) => {
            "Multiple parameters show concerning trends. Immediate inspection recommended."
                .to_string()
        }
        _ => "Minor deviation detected. Monitor closely.".to_string(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
