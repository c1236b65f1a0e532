//! Screen Sampler - Repeating Capture Loop
//!
//! Captures at the configured interval (with a hard floor), skips frames on
//! failure or timeout, and doubles the next delay once after a failure.
//! The inter-frame delay only starts after the consumer finished with the
//! previous frame, so a slow classifier naturally slows capture down
//! instead of piling frames up.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{Frame, ScreenSource};
use crate::constants;
use crate::logic::config::SettingsHandle;

pub struct ScreenSampler {
    source: Arc<dyn ScreenSource>,
    running: Arc<AtomicBool>,
    released: Arc<AtomicBool>,
}

impl ScreenSampler {
    pub fn new(source: Arc<dyn ScreenSource>) -> Self {
        Self {
            source,
            running: Arc::new(AtomicBool::new(false)),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the loop and release the capture source. Safe to call more than
    /// once and safe to call before `run` ever started.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.release_once();
    }

    fn release_once(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.source.release();
            log::info!("[Capture] Source released");
        }
    }

    /// Run the capture loop until `stop` is called. Every capture failure is
    /// caught and logged here; nothing escapes this function.
    pub async fn run<F, Fut>(&self, settings: SettingsHandle, mut on_frame: F)
    where
        F: FnMut(Frame) -> Fut,
        Fut: Future<Output = ()>,
    {
        if self.running.swap(true, Ordering::SeqCst) {
            log::warn!("[Capture] run() called while already running, ignored");
            return;
        }

        log::info!("[Capture] Sampling loop started");
        let mut backoff = false;

        while self.running.load(Ordering::SeqCst) {
            let interval = Duration::from_millis(settings.snapshot().effective_capture_interval_ms());

            match self.capture_one().await {
                Some(frame) => {
                    backoff = false;
                    on_frame(frame).await;
                }
                None => {
                    // Frame skipped; stretch the next delay once.
                    backoff = true;
                }
            }

            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(next_delay(interval, backoff)).await;
        }

        self.release_once();
        log::info!("[Capture] Sampling loop finished");
    }

    /// One screenshot attempt under the fixed timeout budget. Returns None
    /// on any failure - the frame is simply skipped.
    async fn capture_one(&self) -> Option<Frame> {
        let source = self.source.clone();
        let attempt = tokio::task::spawn_blocking(move || source.capture());

        match tokio::time::timeout(Duration::from_millis(constants::CAPTURE_TIMEOUT_MS), attempt)
            .await
        {
            Ok(Ok(Ok(frame))) => Some(frame),
            Ok(Ok(Err(e))) => {
                log::warn!("[Capture] Screenshot failed: {}", e);
                None
            }
            Ok(Err(join_err)) => {
                log::warn!("[Capture] Screenshot task died: {}", join_err);
                None
            }
            Err(_) => {
                log::warn!(
                    "[Capture] Screenshot timed out after {}ms",
                    constants::CAPTURE_TIMEOUT_MS
                );
                None
            }
        }
    }
}

/// Delay before the next capture: the configured interval, doubled once
/// while the last attempt failed.
fn next_delay(interval: Duration, backoff: bool) -> Duration {
    if backoff {
        interval * 2
    } else {
        interval
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingSource {
        captures: AtomicUsize,
        releases: AtomicUsize,
        fail_every: Option<usize>,
    }

    impl CountingSource {
        fn new(fail_every: Option<usize>) -> Self {
            Self {
                captures: AtomicUsize::new(0),
                releases: AtomicUsize::new(0),
                fail_every,
            }
        }
    }

    impl ScreenSource for CountingSource {
        fn capture(&self) -> Result<Frame, super::super::CaptureError> {
            let n = self.captures.fetch_add(1, Ordering::SeqCst);
            if let Some(every) = self.fail_every {
                if n % every == 0 {
                    return Err(super::super::CaptureError::Failed("scripted".into()));
                }
            }
            Ok(Frame::new(vec![0; 16], 2, 2))
        }

        fn release(&self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_next_delay_doubles_once() {
        let interval = Duration::from_millis(500);
        assert_eq!(next_delay(interval, false), interval);
        assert_eq!(next_delay(interval, true), interval * 2);
    }

    #[test]
    fn test_stop_is_idempotent_and_releases_once() {
        let source = Arc::new(CountingSource::new(None));
        let sampler = ScreenSampler::new(source.clone());

        sampler.stop();
        sampler.stop();
        sampler.stop();

        assert_eq!(source.releases.load(Ordering::SeqCst), 1);
        assert!(!sampler.is_running());
    }

    #[tokio::test]
    async fn test_frames_are_delivered_then_loop_stops() {
        let source = Arc::new(CountingSource::new(None));
        let sampler = Arc::new(ScreenSampler::new(source.clone()));
        let delivered = Arc::new(AtomicUsize::new(0));

        let settings = SettingsHandle::new(crate::logic::config::AppSettings {
            capture_interval_ms: 500,
            ..Default::default()
        });
        let run_sampler = sampler.clone();
        let run_delivered = delivered.clone();
        let stop_sampler = sampler.clone();

        let handle = tokio::spawn(async move {
            run_sampler
                .run(settings, move |_frame| {
                    let delivered = run_delivered.clone();
                    let stop = stop_sampler.clone();
                    async move {
                        if delivered.fetch_add(1, Ordering::SeqCst) + 1 >= 2 {
                            stop.stop();
                        }
                    }
                })
                .await;
        });

        handle.await.unwrap();
        assert!(delivered.load(Ordering::SeqCst) >= 2);
        assert_eq!(source.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_capture_skips_frame() {
        // Every first capture fails, so the consumer only ever sees frames
        // from successful attempts.
        let source = Arc::new(CountingSource::new(Some(2)));
        let sampler = Arc::new(ScreenSampler::new(source.clone()));
        let delivered = Arc::new(AtomicUsize::new(0));

        let settings = SettingsHandle::new(crate::logic::config::AppSettings {
            capture_interval_ms: 500,
            ..Default::default()
        });
        let run_sampler = sampler.clone();
        let run_delivered = delivered.clone();
        let stop_sampler = sampler.clone();

        tokio::spawn(async move {
            run_sampler
                .run(settings, move |_frame| {
                    let delivered = run_delivered.clone();
                    let stop = stop_sampler.clone();
                    async move {
                        delivered.fetch_add(1, Ordering::SeqCst);
                        stop.stop();
                    }
                })
                .await;
        })
        .await
        .unwrap();

        let attempts = source.captures.load(Ordering::SeqCst);
        assert!(attempts > delivered.load(Ordering::SeqCst));
    }
}
