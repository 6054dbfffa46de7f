use std::time::Duration;
use tokio::{
    sync::mpsc::UnboundedSender,
    task::JoinHandle,
    time::{interval_at, Instant},
};
use tracing::{debug, info};

use crate::session::SessionEvent;

/// What the countdown reports after each elapsed period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownSignal {
    /// One second elapsed, `remaining` seconds left
    Tick {
        /// Seconds left after this tick
        remaining: u32,
    },
    /// The countdown reached zero; sent exactly once per run
    Completed,
}

/// One-second countdown for duration-based exercises
///
/// Stopped or Running. While running, a background task sends one
/// [`SessionEvent::Countdown`] per elapsed period, tagged with the run number
/// so the receiver can reject ticks from a run it already stopped.
#[derive(Debug)]
pub struct Countdown {
    period: Duration,
    run: u64,
    task: Option<JoinHandle<()>>,
}

impl Countdown {
    /// Countdown emitting one tick per `period`
    #[must_use]
    pub const fn new(period: Duration) -> Self {
        Self {
            period,
            run: 0,
            task: None,
        }
    }

    /// Whether a run is active
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Whether a signal tagged `run` belongs to the active run
    #[must_use]
    pub const fn accepts(&self, run: u64) -> bool {
        self.task.is_some() && self.run == run
    }

    /// Start counting down from `remaining` seconds
    ///
    /// No-op when already running or when `remaining` is zero (the exercise
    /// has no duration target). Returns whether a new run started.
    pub fn start(&mut self, remaining: u32, events: &UnboundedSender<SessionEvent>) -> bool {
        if self.is_running() {
            debug!("Countdown already running, ignoring start");
            return false;
        }
        if remaining == 0 {
            debug!("No duration target, countdown not started");
            return false;
        }

        self.run += 1;
        let run = self.run;
        let period = self.period;
        let events = events.clone();

        info!("Countdown run {run} started at {remaining}s");

        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            let mut remaining = remaining;

            loop {
                ticker.tick().await;
                remaining -= 1;

                let signal = if remaining == 0 {
                    CountdownSignal::Completed
                } else {
                    CountdownSignal::Tick { remaining }
                };

                if events.send(SessionEvent::Countdown { run, signal }).is_err() {
                    break;
                }
                if remaining == 0 {
                    break;
                }
            }
        }));

        true
    }

    /// Cancel the active run; pending ticks are never delivered
    ///
    /// Idempotent. Returns whether a run was stopped.
    pub fn stop(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                task.abort();
                info!("Countdown run {} stopped", self.run);
                true
            }
            None => false,
        }
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn signal(event: Option<SessionEvent>) -> Option<(u64, CountdownSignal)> {
        match event {
            Some(SessionEvent::Countdown { run, signal }) => Some((run, signal)),
            _ => None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_counts_down_once_per_second() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut countdown = Countdown::new(Duration::from_secs(1));
        let started = Instant::now();

        assert!(countdown.start(3, &tx));
        assert_eq!(
            signal(rx.recv().await),
            Some((1, CountdownSignal::Tick { remaining: 2 }))
        );
        assert_eq!(started.elapsed(), Duration::from_secs(1));
        assert_eq!(
            signal(rx.recv().await),
            Some((1, CountdownSignal::Tick { remaining: 1 }))
        );
        assert_eq!(signal(rx.recv().await), Some((1, CountdownSignal::Completed)));
        assert_eq!(started.elapsed(), Duration::from_secs(3));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_guarded() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut countdown = Countdown::new(Duration::from_secs(1));

        assert!(!countdown.start(0, &tx));
        assert!(!countdown.is_running());

        assert!(countdown.start(10, &tx));
        assert!(!countdown.start(10, &tx));
        assert!(countdown.accepts(1));
        assert!(!countdown.accepts(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_ticks() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut countdown = Countdown::new(Duration::from_secs(1));

        countdown.start(30, &tx);
        assert!(signal(rx.recv().await).is_some());

        assert!(countdown.stop());
        assert!(!countdown.stop());
        assert!(!countdown.accepts(1));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());

        assert!(countdown.start(29, &tx));
        assert_eq!(
            signal(rx.recv().await),
            Some((2, CountdownSignal::Tick { remaining: 28 }))
        );
    }
}
