//! Background pose estimation.
//!
//! [`OdometryTask::spawn`] moves an [`OdometryEstimator`] and an
//! [`EncoderSource`] onto a tokio task that samples at a fixed period and
//! publishes each new pose as a whole [`PoseSnapshot`] through a `watch`
//! channel. Readers never observe a half-written pose.
//!
//! The returned [`OdometryHandle`] owns the task: [`OdometryHandle::stop`]
//! ends it and hands back the final pose, and dropping the handle ends it as
//! well. Once stopped, the last published snapshot stays frozen.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use sprocket_hal::sim::{SimConfig, SimDrivetrain};
//! use sprocket_odometry::estimator::{OdometryConfig, OdometryEstimator};
//! use sprocket_odometry::task::OdometryTask;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let sim = SimDrivetrain::new(SimConfig::default());
//! let handle = OdometryTask::spawn(
//!     OdometryEstimator::new(OdometryConfig::default()),
//!     sim,
//!     Duration::from_millis(10),
//! );
//! let reader = handle.reader();
//! tokio::time::sleep(Duration::from_millis(30)).await;
//! let final_pose = handle.stop().await.expect("odometry task must stop cleanly");
//! assert_eq!(reader.pose(), final_pose);
//! # }
//! ```

use std::time::Duration;

use sprocket_hal::EncoderSource;
use sprocket_types::{MotionError, Pose};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::estimator::OdometryEstimator;

/// Default sampling period.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(10);

// ────────────────────────────────────────────────────────────────────────────
// Snapshot / reader
// ────────────────────────────────────────────────────────────────────────────

/// One published pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSnapshot {
    pub pose: Pose,
    /// Incremented on every publish; `0` is the initial pose.
    pub seq: u64,
    pub stamped_at: Instant,
}

/// Cheap, cloneable view of the latest published pose.
#[derive(Debug, Clone)]
pub struct PoseReader {
    rx: watch::Receiver<PoseSnapshot>,
}

impl PoseReader {
    pub fn latest(&self) -> PoseSnapshot {
        *self.rx.borrow()
    }

    pub fn pose(&self) -> Pose {
        self.rx.borrow().pose
    }

    /// Time since the latest snapshot was published.
    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.rx.borrow().stamped_at)
    }

    pub fn is_stale(&self, max_age: Duration) -> bool {
        self.age() > max_age
    }

    /// Wait for the next publish.
    ///
    /// # Errors
    ///
    /// Returns [`MotionError::TaskStopped`] once the odometry task has ended.
    pub async fn changed(&mut self) -> Result<PoseSnapshot, MotionError> {
        self.rx
            .changed()
            .await
            .map_err(|_| MotionError::TaskStopped("odometry task ended".to_string()))?;
        Ok(*self.rx.borrow_and_update())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Task
// ────────────────────────────────────────────────────────────────────────────

/// The sampling loop that runs on its own tokio task.
pub struct OdometryTask<S> {
    estimator: OdometryEstimator,
    source: S,
    publisher: watch::Sender<PoseSnapshot>,
    seq: u64,
}

impl<S: EncoderSource + 'static> OdometryTask<S> {
    /// Start sampling `source` every `period` (at least 1 ms).
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn(estimator: OdometryEstimator, source: S, period: Duration) -> OdometryHandle {
        let initial = PoseSnapshot {
            pose: estimator.pose(),
            seq: 0,
            stamped_at: Instant::now(),
        };
        let (publisher, rx) = watch::channel(initial);
        let (stop_tx, stop_rx) = oneshot::channel();
        let period = period.max(Duration::from_millis(1));

        info!(source = source.id(), period_ms = period.as_millis() as u64, "odometry task starting");
        let task = Self {
            estimator,
            source,
            publisher,
            seq: 0,
        };
        let join = tokio::spawn(task.run(period, stop_rx));

        OdometryHandle {
            reader: PoseReader { rx },
            stop_tx: Some(stop_tx),
            join: Some(join),
        }
    }

    async fn run(mut self, period: Duration, mut stop: oneshot::Receiver<()>) -> OdometryEstimator {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                // Fires on an explicit stop and when the handle is dropped.
                _ = &mut stop => break,
                _ = ticker.tick() => self.tick(),
            }
        }

        info!(pose = ?self.estimator.pose(), ticks = self.seq, "odometry task stopped");
        self.estimator
    }

    fn tick(&mut self) {
        let sample = match self.source.sample() {
            Ok(sample) => sample,
            Err(e) => {
                warn!(source = self.source.id(), error = %e, "encoder read failed; skipping tick");
                return;
            }
        };
        match self.estimator.update(sample) {
            Ok(pose) => {
                self.seq += 1;
                self.publisher.send_replace(PoseSnapshot {
                    pose,
                    seq: self.seq,
                    stamped_at: Instant::now(),
                });
                debug!(seq = self.seq, x = pose.x, y = pose.y, heading = pose.heading, "pose published");
            }
            Err(e) => warn!(error = %e, "rejected encoder sample"),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handle
// ────────────────────────────────────────────────────────────────────────────

/// Owner of a running [`OdometryTask`].
#[derive(Debug)]
pub struct OdometryHandle {
    reader: PoseReader,
    stop_tx: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<OdometryEstimator>>,
}

impl OdometryHandle {
    /// A new reader of the published pose.
    pub fn reader(&self) -> PoseReader {
        self.reader.clone()
    }

    pub fn pose(&self) -> Pose {
        self.reader.pose()
    }

    /// Stop sampling and return the final pose.
    ///
    /// # Errors
    ///
    /// Returns [`MotionError::TaskStopped`] if the task panicked or was
    /// aborted.
    pub async fn stop(mut self) -> Result<Pose, MotionError> {
        self.stop_and_join().await.map(|estimator| estimator.pose())
    }

    /// Stop sampling and take the estimator back, e.g. to restart it later.
    ///
    /// # Errors
    ///
    /// Returns [`MotionError::TaskStopped`] if the task panicked or was
    /// aborted.
    pub async fn into_estimator(mut self) -> Result<OdometryEstimator, MotionError> {
        self.stop_and_join().await
    }

    async fn stop_and_join(&mut self) -> Result<OdometryEstimator, MotionError> {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        let join = self
            .join
            .take()
            .ok_or_else(|| MotionError::TaskStopped("odometry task already joined".to_string()))?;
        join.await
            .map_err(|e| MotionError::TaskStopped(format!("odometry task failed: {e}")))
    }
}
