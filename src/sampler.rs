use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc::UnboundedSender, oneshot, watch},
    task::JoinHandle,
};
use tracing::{debug, info};

use crate::{analyzer::MotionAnalyzer, camera::CaptureStream, session::SessionEvent};

/// Sequential motion sampling loop
///
/// Each iteration issues one analysis, hands the result to the session as a
/// [`SessionEvent::Sample`] and waits for the session to say whether tracking
/// is still on. Only then, after one frame interval, is the next analysis
/// issued, so two analyses never overlap and results arrive in order.
#[derive(Debug)]
pub struct Sampler {
    frame_interval: Duration,
    run: u64,
    active: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl Sampler {
    /// Sampler pausing `frame_interval` between iterations
    #[must_use]
    pub const fn new(frame_interval: Duration) -> Self {
        Self {
            frame_interval,
            run: 0,
            active: None,
            task: None,
        }
    }

    /// Whether a run is engaged
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Whether a sample tagged `run` belongs to the engaged run
    #[must_use]
    pub const fn accepts(&self, run: u64) -> bool {
        self.active.is_some() && self.run == run
    }

    /// Start sampling `stream` for `exercise`
    ///
    /// A loop stopped earlier may still have an analysis in flight; the new run
    /// waits for it to wind down before issuing its first request. Returns the
    /// new run number, or `None` if already running.
    pub fn start(
        &mut self,
        stream: Arc<dyn CaptureStream>,
        analyzer: Arc<dyn MotionAnalyzer>,
        exercise: String,
        events: &UnboundedSender<SessionEvent>,
    ) -> Option<u64> {
        if self.is_running() {
            debug!("Sampling already running, ignoring start");
            return None;
        }

        self.run += 1;
        let run = self.run;
        let (active_tx, active_rx) = watch::channel(true);
        self.active = Some(active_tx);

        let previous = self.task.take();
        let frame_interval = self.frame_interval;
        let events = events.clone();

        info!("Sampling run {run} started for {exercise}");

        self.task = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }

            while *active_rx.borrow() {
                let outcome = analyzer.analyze(stream.as_ref(), &exercise).await;

                let (ack, resumed) = oneshot::channel();
                if events
                    .send(SessionEvent::Sample { run, outcome, ack })
                    .is_err()
                {
                    break;
                }
                if !matches!(resumed.await, Ok(true)) {
                    break;
                }

                tokio::time::sleep(frame_interval).await;
            }

            debug!("Sampling run {run} finished");
        }));

        Some(run)
    }

    /// Disengage the loop
    ///
    /// No further analysis is issued. One already in flight completes, and its
    /// result reaches the session tagged with a run it no longer accepts.
    /// Idempotent; returns whether a run was engaged.
    pub fn stop(&mut self) -> bool {
        match self.active.take() {
            Some(active) => {
                let _ = active.send(false);
                info!("Sampling run {} stopped", self.run);
                true
            }
            None => false,
        }
    }

    /// Stop and cancel any in-flight analysis outright
    pub fn shutdown(&mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
