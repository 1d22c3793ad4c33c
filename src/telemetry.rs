//! Simulated instrument telemetry for the status panel.
//!
//! Each tick replaces temperature, voltage and current with
//! `baseline + uniform(-1, 1) * half_range`. Values never drift; every
//! sample is drawn fresh around the baseline.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::info;

use crate::config::TelemetryConfig;
use crate::scheduler::PeriodicTask;

pub const TEMPERATURE_HALF_RANGE: f32 = 1.0;
pub const VOLTAGE_HALF_RANGE: f32 = 0.05;
pub const CURRENT_HALF_RANGE: f32 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryStatus {
    pub connected: bool,
    /// Degrees Celsius
    pub temperature: f32,
    /// Volts
    pub voltage: f32,
    /// Amperes
    pub current: f32,
    pub uptime: Duration,
}

impl TelemetryStatus {
    pub fn uptime_text(&self) -> String {
        format_uptime(self.uptime)
    }
}

/// "2h 34m" style, minutes only below one hour
pub fn format_uptime(uptime: Duration) -> String {
    let minutes = uptime.as_secs() / 60;
    let (hours, minutes) = (minutes / 60, minutes % 60);
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

pub struct TelemetrySimulator<R> {
    baseline: TelemetryConfig,
    started: Instant,
    rng: R,
}

impl<R: Rng> TelemetrySimulator<R> {
    pub fn new(baseline: TelemetryConfig, rng: R) -> Self {
        Self {
            baseline,
            started: Instant::now(),
            rng,
        }
    }

    /// Status before the first tick: exact baselines.
    pub fn initial(&self) -> TelemetryStatus {
        TelemetryStatus {
            connected: true,
            temperature: self.baseline.temperature,
            voltage: self.baseline.voltage,
            current: self.baseline.current,
            uptime: self.started.elapsed(),
        }
    }

    pub fn sample(&mut self) -> TelemetryStatus {
        TelemetryStatus {
            connected: true,
            temperature: self.jitter(self.baseline.temperature, TEMPERATURE_HALF_RANGE),
            voltage: self.jitter(self.baseline.voltage, VOLTAGE_HALF_RANGE),
            current: self.jitter(self.baseline.current, CURRENT_HALF_RANGE),
            uptime: self.started.elapsed(),
        }
    }

    fn jitter(&mut self, baseline: f32, half_range: f32) -> f32 {
        baseline + self.rng.gen_range(-1.0f32..=1.0) * half_range
    }
}

/// Publish simulated telemetry every `config.period_ms`. The returned task
/// owns the timer; drop it when the session ends.
pub fn start_simulator(config: &TelemetryConfig) -> (watch::Receiver<Arc<TelemetryStatus>>, PeriodicTask) {
    let mut simulator = TelemetrySimulator::new(config.clone(), StdRng::from_entropy());
    let (tx, rx) = watch::channel(Arc::new(simulator.initial()));

    info!("Telemetry simulator running every {} ms", config.period_ms);
    let task = PeriodicTask::spawn(
        "telemetry",
        Duration::from_millis(config.period_ms),
        move || tx.send(Arc::new(simulator.sample())).is_ok(),
    );
    (rx, task)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline() -> TelemetryConfig {
        TelemetryConfig::default()
    }

    #[test]
    fn samples_stay_within_half_range() {
        let base = baseline();
        let mut sim = TelemetrySimulator::new(base.clone(), StdRng::seed_from_u64(5));
        for _ in 0..500 {
            let s = sim.sample();
            assert!((s.temperature - base.temperature).abs() <= TEMPERATURE_HALF_RANGE + 1e-4);
            assert!((s.voltage - base.voltage).abs() <= VOLTAGE_HALF_RANGE + 1e-4);
            assert!((s.current - base.current).abs() <= CURRENT_HALF_RANGE + 1e-4);
            assert!(s.connected);
        }
    }

    #[test]
    fn uptime_formatting() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "0m");
        assert_eq!(format_uptime(Duration::from_secs(59 * 60)), "59m");
        assert_eq!(format_uptime(Duration::from_secs(2 * 3600 + 34 * 60 + 12)), "2h 34m");
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_on_its_period_and_stops_on_drop() {
        let config = baseline();
        let (mut rx, task) = start_simulator(&config);
        assert_eq!(rx.borrow().temperature, config.temperature);

        tokio::time::timeout(Duration::from_millis(config.period_ms + 10), rx.changed())
            .await
            .expect("sample within one period")
            .expect("publisher alive");
        assert!(rx.borrow_and_update().uptime >= Duration::from_millis(config.period_ms));

        task.cancel();
        let waited = tokio::time::timeout(Duration::from_millis(config.period_ms * 3), rx.changed()).await;
        // Either nothing arrives or the sender is gone; no new samples.
        assert!(!matches!(waited, Ok(Ok(()))));
    }
}
