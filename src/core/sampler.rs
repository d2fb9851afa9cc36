/// Background sampler that refreshes a shared snapshot only while someone
/// is looking at it
///
/// Every inbound view request pushes the freshness deadline to
/// `now + 2 * interval`. On each tick the loop samples the source only if the
/// deadline is still ahead; otherwise the tick is skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::select;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::metrics::MetricsSource;
use super::snapshot::SharedSnapshot;
use crate::error::SourceError;

/// How many intervals a single access keeps the sampler active
const FRESHNESS_INTERVALS: u32 = 2;

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub name: String,
    pub interval: Duration,
    pub shutdown_timeout: Duration,
    /// chrono strftime format for the snapshot timestamp
    pub time_format: String,
}

/// Deadline until which the sampler keeps refreshing
#[derive(Debug, Default)]
struct Freshness {
    deadline: Mutex<Option<Instant>>,
}

impl Freshness {
    fn extend(&self, until: Instant) {
        *self.deadline.lock() = Some(until);
    }

    fn is_fresh(&self, now: Instant) -> bool {
        matches!(*self.deadline.lock(), Some(deadline) if now < deadline)
    }

    fn deadline(&self) -> Option<Instant> {
        *self.deadline.lock()
    }
}

struct SamplerTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct Sampler {
    config: SamplerConfig,
    snapshot: SharedSnapshot,
    source: Arc<dyn MetricsSource>,
    freshness: Arc<Freshness>,
    running: Arc<AtomicBool>,
    parent: CancellationToken,
    task: Mutex<Option<SamplerTask>>,
}

impl Sampler {
    pub fn new(
        config: SamplerConfig,
        snapshot: SharedSnapshot,
        source: Arc<dyn MetricsSource>,
        parent: &CancellationToken,
    ) -> Self {
        debug!(
            sampler = %config.name,
            interval_ms = config.interval.as_millis() as u64,
            shutdown_timeout_ms = config.shutdown_timeout.as_millis() as u64,
            "new sampler"
        );

        Self {
            config,
            snapshot,
            source,
            freshness: Arc::new(Freshness::default()),
            running: Arc::new(AtomicBool::new(false)),
            parent: parent.clone(),
            task: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the sampling loop; a no-op if one is already active
    pub fn start(&self) {
        let mut task = self.task.lock();

        if let Some(existing) = task.as_ref() {
            if !existing.handle.is_finished() {
                warn!(sampler = %self.config.name, "already polling");
                return;
            }
        }

        debug!(sampler = %self.config.name, "start...");

        let cancel = self.parent.child_token();
        let worker = Worker {
            name: self.config.name.clone(),
            interval: self.config.interval,
            time_format: self.config.time_format.clone(),
            snapshot: self.snapshot.clone(),
            source: Arc::clone(&self.source),
            freshness: Arc::clone(&self.freshness),
            running: Arc::clone(&self.running),
        };

        self.running.store(true, Ordering::SeqCst);
        let handle = tokio::spawn(worker.run(cancel.clone()));
        *task = Some(SamplerTask { cancel, handle });
    }

    /// Cancel the loop and wait for it to exit, at most the shutdown timeout
    pub async fn stop(&self) {
        let task = self.task.lock().take();

        let Some(SamplerTask { cancel, handle }) = task else {
            warn!(sampler = %self.config.name, "nothing to stop");
            return;
        };

        debug!(sampler = %self.config.name, "stop...");
        cancel.cancel();

        match timeout(self.config.shutdown_timeout, handle).await {
            Ok(Ok(())) => debug!(sampler = %self.config.name, "stopped"),
            Ok(Err(e)) => warn!(sampler = %self.config.name, error = %e, "sampling loop ended abnormally"),
            Err(_) => warn!(
                sampler = %self.config.name,
                timeout_ms = self.config.shutdown_timeout.as_millis() as u64,
                "sampling loop did not exit within shutdown timeout"
            ),
        }
    }

    /// Record that a viewer just asked for data
    pub fn notify_accessed(&self) {
        let until = Instant::now() + self.config.interval * FRESHNESS_INTERVALS;
        self.freshness.extend(until);
        debug!(sampler = %self.config.name, "freshness deadline extended");
    }

    pub fn freshness_deadline(&self) -> Option<Instant> {
        self.freshness.deadline()
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.cancel.cancel();
        }
    }
}

/// State moved into the spawned loop
struct Worker {
    name: String,
    interval: Duration,
    time_format: String,
    snapshot: SharedSnapshot,
    source: Arc<dyn MetricsSource>,
    freshness: Arc<Freshness>,
    running: Arc<AtomicBool>,
}

impl Worker {
    async fn run(self, cancel: CancellationToken) {
        info!(sampler = %self.name, "polling...");

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // First tick completes immediately: prime the snapshot so the first
        // poll has a timestamp to show
        select! {
            _ = cancel.cancelled() => {}
            _ = ticker.tick() => self.refresh().await,
        }

        while !cancel.is_cancelled() {
            select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if self.freshness.is_fresh(Instant::now()) {
                        self.refresh().await;
                    } else {
                        debug!(sampler = %self.name, "not watched, skipping tick");
                    }
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!(sampler = %self.name, "stop polling");
    }

    async fn refresh(&self) {
        let values = match self.sample() {
            Ok(values) => values,
            Err(e) => {
                warn!(sampler = %self.name, error = %e, "sampling failed, keeping previous snapshot");
                return;
            }
        };

        let time = chrono::Local::now().format(&self.time_format).to_string();
        let sequence = self.snapshot.store(values, time).await;
        debug!(sampler = %self.name, sequence, "fetched new metrics");
    }

    fn sample(&self) -> Result<Vec<f64>, SourceError> {
        let values = self.source.sample()?;
        let expected = self.source.series().len();
        if values.len() != expected {
            return Err(SourceError::LengthMismatch {
                expected,
                actual: values.len(),
            });
        }
        Ok(values)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    /// Source returning `[n, n]` where `n` counts the samples taken
    pub(crate) struct CountingSource {
        series: Vec<String>,
        calls: AtomicU64,
    }

    impl CountingSource {
        pub(crate) fn new() -> Self {
            Self {
                series: vec!["a".to_string(), "b".to_string()],
                calls: AtomicU64::new(0),
            }
        }

        pub(crate) fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl MetricsSource for CountingSource {
        fn series(&self) -> &[String] {
            &self.series
        }

        fn sample(&self) -> Result<Vec<f64>, SourceError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(vec![n as f64, n as f64])
        }
    }

    struct BrokenSource {
        series: Vec<String>,
    }

    impl MetricsSource for BrokenSource {
        fn series(&self) -> &[String] {
            &self.series
        }

        fn sample(&self) -> Result<Vec<f64>, SourceError> {
            Ok(vec![1.0])
        }
    }

    fn config(interval_ms: u64) -> SamplerConfig {
        SamplerConfig {
            name: "test".to_string(),
            interval: Duration::from_millis(interval_ms),
            shutdown_timeout: Duration::from_secs(1),
            time_format: "%H:%M:%S".to_string(),
        }
    }

    fn sampler(interval_ms: u64) -> (Sampler, Arc<CountingSource>, SharedSnapshot) {
        let source = Arc::new(CountingSource::new());
        let snapshot = SharedSnapshot::new(2);
        let sampler = Sampler::new(
            config(interval_ms),
            snapshot.clone(),
            source.clone(),
            &CancellationToken::new(),
        );
        (sampler, source, snapshot)
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_primes_snapshot() {
        let (sampler, source, snapshot) = sampler(100);
        sampler.start();
        advance(1).await;

        assert!(sampler.is_running());
        assert_eq!(source.calls(), 1);
        let current = snapshot.load().await;
        assert_eq!(current.sequence, 1);
        assert!(!current.time.is_empty());

        sampler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unwatched_ticks_are_skipped() {
        let (sampler, source, snapshot) = sampler(100);
        sampler.start();
        advance(1_000).await;

        assert_eq!(source.calls(), 1, "only the priming sample");
        assert_eq!(snapshot.load().await.sequence, 1);

        sampler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_access_keeps_sampling_for_two_intervals() {
        let (sampler, source, _snapshot) = sampler(100);
        sampler.start();
        advance(50).await;
        assert_eq!(source.calls(), 1);

        // Deadline at t=250: ticks at 100 and 200 sample, 300 does not
        sampler.notify_accessed();
        advance(500).await;
        assert_eq!(source.calls(), 3);

        sampler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_access_after_idle_sees_stale_snapshot() {
        let (sampler, _source, snapshot) = sampler(100);
        sampler.start();
        advance(1_050).await;

        let before = snapshot.load().await;
        sampler.notify_accessed();
        // The request reads before any tick has run
        assert_eq!(snapshot.load().await, before);

        advance(100).await;
        assert_eq!(snapshot.load().await.sequence, before.sequence + 1);

        sampler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_start_runs_one_loop() {
        let (sampler, source, _snapshot) = sampler(100);
        sampler.start();
        sampler.start();
        advance(1).await;
        assert_eq!(source.calls(), 1);

        sampler.notify_accessed();
        advance(150).await;
        // One priming sample plus one fresh tick; a second loop would double both
        assert_eq!(source.calls(), 2);

        sampler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_stop_is_noop() {
        let (sampler, _source, _snapshot) = sampler(100);
        sampler.start();
        advance(1).await;

        sampler.stop().await;
        assert!(!sampler.is_running());
        sampler.stop().await;
        assert!(!sampler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_without_start_is_noop() {
        let (sampler, source, _snapshot) = sampler(100);
        sampler.stop().await;
        assert!(!sampler.is_running());
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_stop_returns_before_timeout() {
        let source = Arc::new(CountingSource::new());
        let mut cfg = config(50);
        cfg.shutdown_timeout = Duration::from_secs(30);
        let sampler = Sampler::new(cfg, SharedSnapshot::new(2), source, &CancellationToken::new());

        sampler.start();
        let started = std::time::Instant::now();
        sampler.stop().await;
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop() {
        let (sampler, source, _snapshot) = sampler(100);
        sampler.start();
        advance(1).await;
        sampler.stop().await;

        sampler.start();
        advance(1).await;
        assert!(sampler.is_running());
        assert_eq!(source.calls(), 2);
        sampler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_cancellation_ends_loop() {
        let parent = CancellationToken::new();
        let sampler = Sampler::new(
            config(100),
            SharedSnapshot::new(2),
            Arc::new(CountingSource::new()),
            &parent,
        );
        sampler.start();
        advance(1).await;
        assert!(sampler.is_running());

        parent.cancel();
        advance(1).await;
        assert!(!sampler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_length_mismatch_keeps_previous_snapshot() {
        let snapshot = SharedSnapshot::new(2);
        let source = Arc::new(BrokenSource {
            series: vec!["a".to_string(), "b".to_string()],
        });
        let sampler = Sampler::new(config(100), snapshot.clone(), source, &CancellationToken::new());

        sampler.start();
        sampler.notify_accessed();
        advance(250).await;

        assert!(sampler.is_running());
        assert!(!snapshot.load().await.is_sampled());
        sampler.stop().await;
    }

    #[test]
    fn test_freshness_window() {
        let freshness = Freshness::default();
        let now = Instant::now();
        assert!(!freshness.is_fresh(now));

        freshness.extend(now + Duration::from_millis(200));
        assert!(freshness.is_fresh(now + Duration::from_millis(199)));
        assert!(!freshness.is_fresh(now + Duration::from_millis(200)));
    }
}
