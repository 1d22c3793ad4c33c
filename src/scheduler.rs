//! Cancellable periodic work and the animation cadence built on it.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use crate::lighting::{LightingConfig, Pattern};

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// A background loop that calls `on_tick` once per period until the
/// callback returns `false` or the task is dropped.
#[derive(Debug)]
pub struct PeriodicTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Must be called from within a tokio runtime. The first tick fires one
    /// full period after spawning.
    pub fn spawn<F>(name: &'static str, period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let period = period.max(MIN_PERIOD);
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !on_tick() {
                    break;
                }
            }
        });
        debug!("{} task started ({:?} period)", name, period);
        Self { name, handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.handle.abort();
        debug!("{} task stopped", self.name);
    }
}

/// Only time-varying patterns need frames while the light is on.
pub fn should_animate(config: &LightingConfig) -> bool {
    config.enabled() && config.pattern().is_animated()
}

/// Sent once per frame while an animation loop runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTick {
    /// Which loop produced the tick; bumps each time a loop is started.
    pub generation: u64,
}

/// Keeps at most one frame loop alive, matching the current lighting config.
pub struct AnimationScheduler {
    frame_period: Duration,
    ticks: mpsc::Sender<FrameTick>,
    key: Option<(bool, Pattern)>,
    task: Option<PeriodicTask>,
    generation: u64,
}

impl AnimationScheduler {
    pub fn new(fps: u32) -> (Self, mpsc::Receiver<FrameTick>) {
        let (ticks, rx) = mpsc::channel(1);
        let scheduler = Self {
            frame_period: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
            ticks,
            key: None,
            task: None,
            generation: 0,
        };
        (scheduler, rx)
    }

    pub fn frame_period(&self) -> Duration {
        self.frame_period
    }

    /// Bring the loop in line with `config`. A change of power state or
    /// pattern always cancels the running loop before another may start.
    /// Returns whether a loop is running afterwards.
    pub fn sync(&mut self, config: &LightingConfig) -> bool {
        let key = (config.enabled(), config.pattern());
        if self.key != Some(key) {
            self.stop();
            self.key = Some(key);
        }

        if should_animate(config) {
            self.start();
        } else {
            self.stop();
        }
        self.is_running()
    }

    /// No-op while a loop is already running.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        self.generation += 1;
        let generation = self.generation;
        let ticks = self.ticks.clone();
        // A full channel means the consumer has a frame pending already.
        self.task = Some(PeriodicTask::spawn("animation", self.frame_period, move || {
            !matches!(
                ticks.try_send(FrameTick { generation }),
                Err(mpsc::error::TrySendError::Closed(_))
            )
        }));
        debug!("Animation loop #{} scheduled", generation);
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn config(enabled: bool, pattern: Pattern) -> LightingConfig {
        let mut config = LightingConfig::default();
        config.set_enabled(enabled);
        config.set_pattern(pattern);
        config
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_task_ticks_until_dropped() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let task = PeriodicTask::spawn("test", Duration::from_millis(100), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        task.cancel();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_task_stops_when_callback_declines() {
        let task = PeriodicTask::spawn("once", Duration::from_millis(10), || false);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(task.is_finished());
    }

    #[test]
    fn guard_requires_power_and_animated_pattern() {
        assert!(should_animate(&config(true, Pattern::Pulse)));
        assert!(should_animate(&config(true, Pattern::Strobe)));
        assert!(!should_animate(&config(true, Pattern::Solid)));
        assert!(!should_animate(&config(true, Pattern::Rainbow)));
        assert!(!should_animate(&config(false, Pattern::Pulse)));
        assert!(!should_animate(&config(false, Pattern::Strobe)));
    }

    #[tokio::test(start_paused = true)]
    async fn static_patterns_schedule_nothing() {
        let (mut scheduler, mut rx) = AnimationScheduler::new(60);
        assert!(!scheduler.sync(&config(true, Pattern::Solid)));
        assert!(!scheduler.sync(&config(true, Pattern::Rainbow)));
        assert_eq!(scheduler.generation(), 0);

        let waited = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert!(waited.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn pulse_produces_frames() {
        let (mut scheduler, mut rx) = AnimationScheduler::new(50);
        assert!(scheduler.sync(&config(true, Pattern::Pulse)));

        let tick = tokio::time::timeout(scheduler.frame_period() * 2, rx.recv())
            .await
            .expect("tick within two frames");
        assert_eq!(tick, Some(FrameTick { generation: 1 }));
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_sync_does_not_duplicate_loops() {
        let (mut scheduler, _rx) = AnimationScheduler::new(60);
        let pulse = config(true, Pattern::Pulse);
        scheduler.sync(&pulse);
        scheduler.sync(&pulse);
        scheduler.start();
        assert_eq!(scheduler.generation(), 1);
        assert!(scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn pattern_change_replaces_the_loop() {
        let (mut scheduler, mut rx) = AnimationScheduler::new(60);
        scheduler.sync(&config(true, Pattern::Pulse));
        assert!(scheduler.sync(&config(true, Pattern::Strobe)));
        assert_eq!(scheduler.generation(), 2);

        let tick = rx.recv().await;
        assert_eq!(tick, Some(FrameTick { generation: 2 }));
    }

    #[tokio::test(start_paused = true)]
    async fn power_off_cancels_the_loop() {
        let (mut scheduler, mut rx) = AnimationScheduler::new(60);
        scheduler.sync(&config(true, Pattern::Strobe));
        assert!(rx.recv().await.is_some());

        assert!(!scheduler.sync(&config(false, Pattern::Strobe)));
        while rx.try_recv().is_ok() {}

        let waited = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert!(waited.is_err());
    }
}
