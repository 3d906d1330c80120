//! Synthetic Sensor Feed
//!
//! Demo reading producer: feeds the pipeline the same way a real sensor
//! gateway would, one reading per equipment per cycle, with jitter
//! around each unit's nominal operating point and occasional injected
//! anomalies on the two failure-prone units.

use std::sync::Arc;

use rand::Rng;
use tokio::time::{sleep, Duration};

use crate::logic::channels::ChannelValues;
use crate::logic::pipeline::Pipeline;

/// Nominal operating point for one simulated unit.
struct BaseProfile {
    equipment_id: i64,
    temperature: f64,
    vibration: f64,
    pressure: f64,
    power: f64,
    efficiency: f64,
    /// Receives injected anomalies every `ANOMALY_EVERY` cycles.
    failure_prone: bool,
}

const PROFILES: &[BaseProfile] = &[
    BaseProfile { equipment_id: 1, temperature: 75.0, vibration: 3.5, pressure: 120.0, power: 85.0, efficiency: 92.0, failure_prone: true },
    BaseProfile { equipment_id: 2, temperature: 68.0, vibration: 2.8, pressure: 95.0, power: 78.0, efficiency: 94.0, failure_prone: false },
    BaseProfile { equipment_id: 3, temperature: 65.0, vibration: 2.0, pressure: 110.0, power: 88.0, efficiency: 96.0, failure_prone: false },
    BaseProfile { equipment_id: 4, temperature: 58.0, vibration: 1.5, pressure: 0.0, power: 45.0, efficiency: 95.0, failure_prone: false },
    BaseProfile { equipment_id: 5, temperature: 72.0, vibration: 3.2, pressure: 125.0, power: 92.0, efficiency: 91.0, failure_prone: true },
    BaseProfile { equipment_id: 6, temperature: 62.0, vibration: 2.3, pressure: 0.0, power: 55.0, efficiency: 97.0, failure_prone: false },
];

/// Cycles between injected anomalies on failure-prone units.
const ANOMALY_EVERY: u64 = 20;

pub struct Simulator {
    pipeline: Arc<Pipeline>,
    cycle: Duration,
}

impl Simulator {
    pub fn new(pipeline: Arc<Pipeline>, cycle_secs: u64) -> Self {
        Self {
            pipeline,
            cycle: Duration::from_secs(cycle_secs),
        }
    }

    /// Run forever, one fleet sweep per cycle.
    pub async fn run(self) {
        log::info!(
            "Simulator started: {} units, cycle {:?}",
            PROFILES.len(),
            self.cycle
        );
        let mut iteration: u64 = 0;
        loop {
            self.run_cycle(iteration);
            iteration += 1;
            sleep(self.cycle).await;
        }
    }

    /// Submit one reading per simulated unit.
    pub fn run_cycle(&self, iteration: u64) {
        let mut rng = rand::thread_rng();

        for profile in PROFILES {
            let inject = profile.failure_prone && iteration > 0 && iteration % ANOMALY_EVERY == 0;
            let channels = generate_reading(profile, inject, &mut rng);

            match self.pipeline.submit_reading(profile.equipment_id, channels) {
                Ok(outcome) => {
                    if outcome.classification.is_anomalous() {
                        log::debug!(
                            "Simulated reading for equipment {} scored anomalous ({:.1})",
                            profile.equipment_id,
                            outcome.confidence
                        );
                    }
                }
                Err(e) => {
                    log::error!(
                        "Simulated reading for equipment {} rejected: {}",
                        profile.equipment_id,
                        e
                    );
                }
            }
        }
    }
}

fn generate_reading<R: Rng>(profile: &BaseProfile, inject: bool, rng: &mut R) -> ChannelValues {
    let mut temperature = profile.temperature + rng.gen_range(-3.0..3.0);
    let mut vibration = profile.vibration + rng.gen_range(-0.5..0.5);
    let mut pressure = if profile.pressure > 0.0 {
        profile.pressure + rng.gen_range(-5.0..5.0)
    } else {
        0.0
    };
    let power = profile.power + rng.gen_range(-3.0..3.0);
    let mut efficiency = profile.efficiency + rng.gen_range(-2.0..2.0);

    if inject {
        temperature += rng.gen_range(10.0..20.0);
        vibration += rng.gen_range(3.0..6.0);
        if pressure > 0.0 {
            pressure += rng.gen_range(15.0..25.0);
        }
        efficiency -= rng.gen_range(10.0..20.0);
    }

    ChannelValues {
        temperature,
        vibration: vibration.max(0.0),
        pressure: pressure.max(0.0),
        power_consumption: power.max(0.0),
        efficiency: efficiency.clamp(0.0, 100.0),
    }
}

// ============================================================================
// TESTS
// ============================================================================
