//! Progress-callback trait for upload and model-call events.
//!
//! Inject an [`Arc<dyn ProgressCallback>`] into
//! [`crate::controller::PageController::with_progress`] to drive a progress
//! bar, a log line, or anything else the host UI has.
//!
//! Upload progress is real: it tracks bytes read against the declared length.
//! Model-call progress is **not**: providers report nothing until the answer
//! arrives, so [`SyntheticProgress`] advances a decorative percentage on a
//! timer and only the final 100 % carries meaning.
//!
//! # Example
//!
//! ```rust
//! use paper_review_assistant::progress::{ProgressCallback, Task};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ProgressCallback for Printer {
//!     fn on_task_progress(&self, task: Task, percent: u8) {
//!         eprintln!("{task}: {percent}%");
//!     }
//! }
//!
//! let cb: Arc<dyn ProgressCallback> = Arc::new(Printer);
//! cb.on_task_progress(Task::Review, 10);
//! ```

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

/// A long-running model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Review,
    Polish,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Task::Review => "review",
            Task::Polish => "polish",
        })
    }
}

/// Receives progress events from the page controller.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Task progress is delivered from a background tokio
/// task, hence `Send + Sync`.
pub trait ProgressCallback: Send + Sync {
    /// Bytes read so far as a percentage of the declared upload size.
    /// Always ends with a call at 100, on success and on failure alike.
    fn on_upload_progress(&self, percent: u8) {
        let _ = percent;
    }

    /// Text extraction succeeded.
    ///
    /// # Arguments
    /// * `chars` — byte length of the extracted text
    fn on_extraction_complete(&self, chars: usize) {
        let _ = chars;
    }

    /// Decorative progress of a model call: 0, then +10 per second up to
    /// 90, then 100 when the call returns.
    fn on_task_progress(&self, task: Task, percent: u8) {
        let _ = (task, percent);
    }

    /// A model call finished.
    fn on_task_complete(&self, task: Task, success: bool) {
        let _ = (task, success);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ProgressCallback for NoopProgressCallback {}

/// Convenience alias for the shared callback handle.
pub type ProgressHandle = Arc<dyn ProgressCallback>;

/// Timer-driven progress for a call that reports none of its own.
///
/// Starts at 0 and advances by [`Self::STEP`] every [`Self::TICK`] until it
/// reaches [`Self::CAP`], where it waits. [`SyntheticProgress::finish`] pins
/// it to 100. Dropping the ticker without finishing stops it silently.
/// Requires a tokio runtime.
pub struct SyntheticProgress {
    task: Task,
    callback: ProgressHandle,
    percent: Arc<Mutex<u8>>,
    ticker: JoinHandle<()>,
}

impl SyntheticProgress {
    pub const STEP: u8 = 10;
    pub const CAP: u8 = 90;
    pub const TICK: Duration = Duration::from_secs(1);

    pub fn start(task: Task, callback: ProgressHandle) -> Self {
        callback.on_task_progress(task, 0);
        let percent = Arc::new(Mutex::new(0u8));

        let shared = Arc::clone(&percent);
        let cb = Arc::clone(&callback);
        let ticker = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + Self::TICK, Self::TICK);
            loop {
                interval.tick().await;
                // The lock orders ticks against `finish`: no tick lands after 100.
                let Ok(mut current) = shared.lock() else {
                    return;
                };
                if *current >= Self::CAP {
                    return;
                }
                *current = (*current + Self::STEP).min(Self::CAP);
                cb.on_task_progress(task, *current);
            }
        });

        Self {
            task,
            callback,
            percent,
            ticker,
        }
    }

    /// Current percentage.
    pub fn percent(&self) -> u8 {
        self.percent.lock().map(|p| *p).unwrap_or(100)
    }

    /// Stop ticking, report 100 and the outcome.
    pub fn finish(self, success: bool) {
        self.ticker.abort();
        if let Ok(mut current) = self.percent.lock() {
            *current = 100;
        }
        self.callback.on_task_progress(self.task, 100);
        self.callback.on_task_complete(self.task, success);
    }
}

impl Drop for SyntheticProgress {
    fn drop(&mut self) {
        self.ticker.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Recorder {
        uploads: Mutex<Vec<u8>>,
        ticks: Mutex<Vec<(Task, u8)>>,
        completions: Mutex<Vec<(Task, bool)>>,
        extracted: AtomicUsize,
    }

    impl ProgressCallback for Recorder {
        fn on_upload_progress(&self, percent: u8) {
            self.uploads.lock().unwrap().push(percent);
        }

        fn on_extraction_complete(&self, chars: usize) {
            self.extracted.store(chars, Ordering::SeqCst);
        }

        fn on_task_progress(&self, task: Task, percent: u8) {
            self.ticks.lock().unwrap().push((task, percent));
        }

        fn on_task_complete(&self, task: Task, success: bool) {
            self.completions.lock().unwrap().push((task, success));
        }
    }

    fn percents(r: &Recorder) -> Vec<u8> {
        r.ticks.lock().unwrap().iter().map(|(_, p)| *p).collect()
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_upload_progress(50);
        cb.on_extraction_complete(1234);
        cb.on_task_progress(Task::Review, 10);
        cb.on_task_complete(Task::Polish, false);
    }

    #[test]
    fn recorder_receives_events() {
        let r = Recorder::default();
        r.on_upload_progress(40);
        r.on_upload_progress(100);
        r.on_extraction_complete(512);
        assert_eq!(*r.uploads.lock().unwrap(), vec![40, 100]);
        assert_eq!(r.extracted.load(Ordering::SeqCst), 512);
    }

    #[tokio::test(start_paused = true)]
    async fn synthetic_progress_advances_ten_per_second() {
        let r = Arc::new(Recorder::default());
        let ticker = SyntheticProgress::start(Task::Review, r.clone());

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(percents(&r), vec![0, 10, 20, 30]);
        assert_eq!(ticker.percent(), 30);

        ticker.finish(true);
        assert_eq!(percents(&r), vec![0, 10, 20, 30, 100]);
        assert_eq!(*r.completions.lock().unwrap(), vec![(Task::Review, true)]);
    }

    #[tokio::test(start_paused = true)]
    async fn synthetic_progress_caps_at_ninety() {
        let r = Arc::new(Recorder::default());
        let ticker = SyntheticProgress::start(Task::Polish, r.clone());

        tokio::time::sleep(Duration::from_secs(30)).await;
        let seen = percents(&r);
        assert_eq!(seen.last(), Some(&90));
        assert_eq!(seen.len(), 10, "0 plus nine steps, got {seen:?}");
        assert!(seen.windows(2).all(|w| w[0] < w[1]));

        ticker.finish(false);
        assert_eq!(percents(&r).last(), Some(&100));
        assert_eq!(*r.completions.lock().unwrap(), vec![(Task::Polish, false)]);
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_ticks_after_finish() {
        let r = Arc::new(Recorder::default());
        let ticker = SyntheticProgress::start(Task::Review, r.clone());
        ticker.finish(true);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(percents(&r), vec![0, 100]);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn ProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_upload_progress(100);
        cb.on_task_complete(Task::Review, true);
        assert_eq!(Task::Review.to_string(), "review");
    }
}
