use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{
        mpsc::{self, UnboundedReceiver, UnboundedSender},
        oneshot,
    },
    task::JoinHandle,
    time::Instant,
};
use tracing::{debug, info, warn};

use crate::{
    analyzer::{MotionAnalyzer, PoseSample},
    camera::CameraManager,
    catalog::{Catalog, ExerciseDescriptor},
    countdown::{Countdown, CountdownSignal},
    error::{AnalyzerError, CoachError, Result},
    sampler::Sampler,
    throttle::Throttler,
    tips::{generate_or_fallback, PromptKind, TextGenerator},
    types::{
        format_clock, CameraStatus, Feedback, FeedbackKind, SessionConfig, SessionSnapshot,
        SessionState,
    },
};

/// Message from a background task to the controller
///
/// Every variant carries the identity of the task that produced it. The
/// controller checks that identity against its current state before acting,
/// so results from cancelled work are dropped on arrival.
#[derive(Debug)]
pub enum SessionEvent {
    /// Countdown progress
    Countdown {
        /// Countdown run that produced the signal
        run: u64,
        /// Tick or completion
        signal: CountdownSignal,
    },
    /// One finished motion analysis
    Sample {
        /// Sampling run that issued the analysis
        run: u64,
        /// Analysis result
        outcome: std::result::Result<PoseSample, AnalyzerError>,
        /// Answered with whether sampling should continue
        ack: oneshot::Sender<bool>,
    },
    /// A resolved tip request
    Tip {
        /// Exercise epoch the tip was requested in
        epoch: u64,
        /// Tip text, or its fallback
        text: String,
    },
}

/// Observable change produced by processing one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// Countdown advanced
    Ticked {
        /// Seconds left
        remaining: u32,
    },
    /// A repetition was honored
    RepCounted {
        /// Reps completed on the current exercise
        reps: u32,
    },
    /// New form feedback is on display
    FeedbackShown(Feedback),
    /// The current exercise changed
    ExerciseChanged {
        /// Previous index
        from: usize,
        /// New index
        to: usize,
        /// Whether the previous exercise reached its target
        completed: bool,
    },
    /// An external tip replaced the feedback
    TipResolved(Feedback),
}

/// Workout session controller
///
/// Owns [`SessionState`] and is the only place it changes. Background work
/// (countdown, motion sampling, tip requests) reports back as [`SessionEvent`]s
/// which are applied one at a time by [`SessionController::process_next_event`].
pub struct SessionController {
    catalog: Catalog,
    config: SessionConfig,
    state: SessionState,
    throttler: Throttler,
    countdown: Countdown,
    sampler: Sampler,
    camera: CameraManager,
    analyzer: Arc<dyn MotionAnalyzer>,
    generator: Arc<dyn TextGenerator>,
    epoch: u64,
    tip_task: Option<JoinHandle<()>>,
    events_tx: UnboundedSender<SessionEvent>,
    events_rx: UnboundedReceiver<SessionEvent>,
}

impl SessionController {
    /// Create a session positioned on the first exercise of `catalog`
    #[must_use]
    pub fn new(
        catalog: Catalog,
        config: SessionConfig,
        camera: CameraManager,
        analyzer: Arc<dyn MotionAnalyzer>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let state = SessionState::at(0, catalog.at(0));

        info!(
            "Session created with {} exercises, starting on {}",
            catalog.len(),
            catalog.at(0)
        );

        Self {
            throttler: Throttler::new(&config),
            countdown: Countdown::new(Duration::from_millis(config.tick_interval_ms)),
            sampler: Sampler::new(Duration::from_millis(config.frame_interval_ms)),
            catalog,
            config,
            state,
            camera,
            analyzer,
            generator,
            epoch: 0,
            tip_task: None,
            events_tx,
            events_rx,
        }
    }

    /// Create a session with the default catalog and configuration
    #[must_use]
    pub fn with_defaults(
        camera: CameraManager,
        analyzer: Arc<dyn MotionAnalyzer>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self::new(
            Catalog::default(),
            SessionConfig::default(),
            camera,
            analyzer,
            generator,
        )
    }

    /// Current session state
    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// Exercise catalog
    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Exercise currently in progress
    #[must_use]
    pub fn current_exercise(&self) -> &ExerciseDescriptor {
        self.catalog.at(self.state.current_exercise_index)
    }

    /// Camera status
    #[must_use]
    pub fn camera_status(&self) -> CameraStatus {
        self.camera.status()
    }

    /// Read-only view for rendering
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            exercise_index: self.state.current_exercise_index,
            exercise: self.current_exercise().clone(),
            running: self.state.running,
            tracking: self.state.tracking,
            reps_completed: self.state.reps_completed,
            remaining_seconds: self.state.remaining_seconds,
            clock: format_clock(self.state.remaining_seconds),
            last_feedback: self.state.last_feedback.clone(),
            tip_pending: self.state.tip_pending,
            camera: self.camera.status(),
        }
    }

    /// Flip the running flag
    ///
    /// Starting runs the countdown for a duration-based exercise; stopping
    /// cancels it. On a rep-based exercise only the flag changes. Returns the
    /// new value.
    pub fn toggle_running(&mut self) -> bool {
        self.state.running = !self.state.running;

        if self.state.running {
            info!("Session running");
            self.countdown
                .start(self.state.remaining_seconds, &self.events_tx);
        } else {
            info!("Session paused");
            self.countdown.stop();
        }

        self.state.running
    }

    /// Jump to the exercise at `index`
    ///
    /// # Errors
    ///
    /// Returns [`CoachError::ExerciseOutOfRange`] if `index` is outside the
    /// catalog. The session is left untouched in that case.
    pub fn select_exercise(&mut self, index: usize) -> Result<SessionUpdate> {
        if index >= self.catalog.len() {
            return Err(CoachError::ExerciseOutOfRange {
                index,
                len: self.catalog.len(),
            });
        }

        Ok(self.switch_to(index, false))
    }

    /// Move to the next exercise, wrapping after the last one
    pub fn advance_to_next_exercise(&mut self) -> SessionUpdate {
        self.advance(false)
    }

    /// Turn motion tracking on or off
    ///
    /// Turning it on requires an active camera and a rep-based exercise, and
    /// shows the tracking-started message before the first sample. Turning it
    /// off always succeeds. Returns the feedback update for the started
    /// message, or `None` when tracking was turned off.
    ///
    /// # Errors
    ///
    /// Returns [`CoachError::NotRepBased`] on a duration-based exercise and
    /// [`CoachError::CameraNotActive`] when no stream is held.
    pub fn toggle_tracking(&mut self) -> Result<Option<SessionUpdate>> {
        if self.state.tracking {
            self.stop_tracking();
            return Ok(None);
        }

        let exercise = self.current_exercise().clone();
        if !exercise.is_rep_based() {
            return Err(CoachError::NotRepBased {
                name: exercise.name,
            });
        }

        let stream = self
            .camera
            .stream()
            .ok_or_else(|| CoachError::CameraNotActive {
                status: self.camera.status().to_string(),
            })?;

        let started = Feedback::new(
            FeedbackKind::Info,
            self.config.tracking_started_message.as_str(),
        );
        self.state.tracking = true;
        self.state.last_feedback = Some(started.clone());
        self.sampler.start(
            stream,
            Arc::clone(&self.analyzer),
            exercise.name,
            &self.events_tx,
        );

        Ok(Some(SessionUpdate::FeedbackShown(started)))
    }

    /// Ask the text generator for a form tip on the current exercise
    ///
    /// Clears the feedback and marks a tip as pending until it resolves. A
    /// failed request resolves to a fixed fallback. Returns `false` without
    /// doing anything if a tip is already pending.
    pub fn request_external_tip(&mut self) -> bool {
        if self.state.tip_pending {
            debug!("Tip request already pending");
            return false;
        }

        self.state.tip_pending = true;
        self.state.last_feedback = None;

        let prompt = PromptKind::FormTip {
            exercise: self.current_exercise().name.clone(),
        };
        let generator = Arc::clone(&self.generator);
        let events = self.events_tx.clone();
        let epoch = self.epoch;

        info!("Requesting form tip for {}", self.current_exercise().name);

        self.tip_task = Some(tokio::spawn(async move {
            let text = generate_or_fallback(generator.as_ref(), &prompt).await;
            let _ = events.send(SessionEvent::Tip { epoch, text });
        }));

        true
    }

    /// Acquire the camera, or retry after a failure
    ///
    /// # Errors
    ///
    /// Returns [`CoachError::Camera`] with the classified failure.
    pub async fn enable_camera(&mut self) -> Result<()> {
        self.camera.acquire().await?;
        Ok(())
    }

    /// Stop tracking and release the camera
    pub fn disable_camera(&mut self) -> bool {
        self.stop_tracking();
        self.camera.release()
    }

    /// Whether the countdown, the sampling loop or a tip request is live
    ///
    /// Results still in flight from stopped work are not counted; they are
    /// discarded on arrival anyway.
    #[must_use]
    pub fn has_pending_work(&self) -> bool {
        self.countdown.is_running()
            || self.sampler.is_running()
            || self.tip_task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Wait for the next background event and apply it
    ///
    /// An event already queued is applied straight away. Otherwise this waits
    /// only while [`has_pending_work`](Self::has_pending_work) holds.
    ///
    /// # Errors
    ///
    /// Returns [`CoachError::Idle`] when nothing is queued and no background
    /// work could produce an event.
    pub async fn process_next_event(&mut self) -> Result<Vec<SessionUpdate>> {
        // Sampled before polling the queue: a finished task has already sent.
        let pending = self.has_pending_work();

        let event = match self.events_rx.try_recv() {
            Ok(event) => event,
            Err(_) if !pending => return Err(CoachError::Idle),
            Err(_) => self.events_rx.recv().await.ok_or(CoachError::Idle)?,
        };
        Ok(self.handle_event(event))
    }

    /// Apply every event already queued without waiting
    pub fn process_pending_events(&mut self) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            updates.extend(self.handle_event(event));
        }
        updates
    }

    /// Stop all background work, release the camera and zero the counters
    ///
    /// Idempotent.
    pub fn shutdown(&mut self) {
        self.teardown();
        self.state.running = false;
        self.state.reps_completed = 0;
        self.state.remaining_seconds = 0;
        self.state.tip_pending = false;
        self.state.last_feedback = None;
        self.state.cooldowns.reset();
    }

    /// Apply one event to the session
    pub fn handle_event(&mut self, event: SessionEvent) -> Vec<SessionUpdate> {
        match event {
            SessionEvent::Countdown { run, signal } => self.on_countdown(run, signal),
            SessionEvent::Sample { run, outcome, ack } => {
                let updates = self.on_sample(run, outcome);
                let _ = ack.send(self.state.tracking && self.sampler.accepts(run));
                updates
            }
            SessionEvent::Tip { epoch, text } => self.on_tip(epoch, text),
        }
    }

    fn on_countdown(&mut self, run: u64, signal: CountdownSignal) -> Vec<SessionUpdate> {
        if !self.countdown.accepts(run) {
            debug!("Discarding countdown signal from stale run {run}");
            return Vec::new();
        }

        match signal {
            CountdownSignal::Tick { remaining } => {
                self.state.remaining_seconds = remaining;
                vec![SessionUpdate::Ticked { remaining }]
            }
            CountdownSignal::Completed => {
                self.state.remaining_seconds = 0;
                info!("{} complete", self.current_exercise().name);
                vec![SessionUpdate::Ticked { remaining: 0 }, self.advance(true)]
            }
        }
    }

    fn on_sample(
        &mut self,
        run: u64,
        outcome: std::result::Result<PoseSample, AnalyzerError>,
    ) -> Vec<SessionUpdate> {
        if !(self.state.tracking && self.sampler.accepts(run)) {
            debug!("Discarding sample from stale run {run}");
            return Vec::new();
        }

        let sample = match outcome {
            Ok(sample) => sample,
            Err(e) => {
                warn!("Dropped sample: {}", e);
                return Vec::new();
            }
        };

        let decision =
            self.throttler
                .evaluate(&mut self.state.cooldowns, &sample, Instant::now());
        let mut updates = Vec::new();

        if decision.count_rep {
            self.state.reps_completed += 1;
            let reps = self.state.reps_completed;
            updates.push(SessionUpdate::RepCounted { reps });

            let target = self.current_exercise().target_reps;
            debug!("Rep {reps}/{target}");
            if reps >= target {
                info!("{} complete", self.current_exercise().name);
                updates.push(self.advance(true));
                return updates;
            }
        }

        if let Some(feedback) = decision.feedback {
            self.state.last_feedback = Some(feedback.clone());
            updates.push(SessionUpdate::FeedbackShown(feedback));
        }

        updates
    }

    fn on_tip(&mut self, epoch: u64, text: String) -> Vec<SessionUpdate> {
        if epoch != self.epoch {
            debug!("Discarding tip requested for a previous exercise");
            return Vec::new();
        }

        self.tip_task = None;
        self.state.tip_pending = false;
        let feedback = Feedback::new(FeedbackKind::ExternalTip, text);
        self.state.last_feedback = Some(feedback.clone());
        vec![SessionUpdate::TipResolved(feedback)]
    }

    fn advance(&mut self, completed: bool) -> SessionUpdate {
        let next = self.catalog.next_index(self.state.current_exercise_index);
        self.switch_to(next, completed)
    }

    fn switch_to(&mut self, index: usize, completed: bool) -> SessionUpdate {
        let from = self.state.current_exercise_index;

        self.countdown.stop();
        self.stop_tracking();

        self.epoch += 1;
        self.state.tip_pending = false;
        self.state.reset_for(index, self.catalog.at(index));

        info!(
            "Exercise {} -> {}: {}",
            from,
            index,
            self.catalog.at(index)
        );

        if self.state.running {
            self.countdown
                .start(self.state.remaining_seconds, &self.events_tx);
        }

        SessionUpdate::ExerciseChanged {
            from,
            to: index,
            completed,
        }
    }

    fn stop_tracking(&mut self) {
        self.state.tracking = false;
        self.sampler.stop();
    }

    fn teardown(&mut self) {
        self.countdown.stop();
        self.sampler.shutdown();
        self.state.tracking = false;
        if let Some(task) = self.tip_task.take() {
            task.abort();
        }
        if self.camera.release() {
            info!("Camera released on session teardown");
        }
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state)
            .field("camera", &self.camera)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        camera::SimulatedCamera,
        tips::{OfflineGenerator, UnavailableGenerator},
    };
    use async_trait::async_trait;

    struct Idle;

    #[async_trait]
    impl MotionAnalyzer for Idle {
        async fn analyze(
            &self,
            _stream: &dyn crate::camera::CaptureStream,
            _exercise: &str,
        ) -> std::result::Result<PoseSample, AnalyzerError> {
            tokio::time::sleep(Duration::from_millis(150)).await;
            Ok(PoseSample::quiet())
        }
    }

    fn session() -> (SessionController, Arc<SimulatedCamera>) {
        let device = Arc::new(SimulatedCamera::working());
        let controller = SessionController::with_defaults(
            CameraManager::new(device.clone()),
            Arc::new(Idle),
            Arc::new(OfflineGenerator),
        );
        (controller, device)
    }

    #[tokio::test]
    async fn test_initial_state() {
        let (controller, _) = session();
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.exercise_index, 0);
        assert_eq!(snapshot.exercise.name, "Push-ups");
        assert!(!snapshot.running);
        assert!(!snapshot.tracking);
        assert_eq!(snapshot.reps_completed, 0);
        assert_eq!(snapshot.clock, "00:00");
        assert_eq!(snapshot.camera, CameraStatus::Unacquired);
    }

    #[tokio::test]
    async fn test_select_exercise_bounds() {
        let (mut controller, _) = session();

        let err = controller.select_exercise(5).unwrap_err();
        assert!(matches!(
            err,
            CoachError::ExerciseOutOfRange { index: 5, len: 5 }
        ));
        assert_eq!(controller.state().current_exercise_index, 0);

        let update = controller.select_exercise(2).unwrap();
        assert_eq!(
            update,
            SessionUpdate::ExerciseChanged {
                from: 0,
                to: 2,
                completed: false
            }
        );
        assert_eq!(controller.state().remaining_seconds, 60);
    }

    #[tokio::test]
    async fn test_tracking_preconditions() {
        let (mut controller, _) = session();

        let err = controller.toggle_tracking().unwrap_err();
        assert!(err.is_camera_error());

        controller.enable_camera().await.unwrap();
        controller.select_exercise(2).unwrap();
        let err = controller.toggle_tracking().unwrap_err();
        assert!(matches!(err, CoachError::NotRepBased { .. }));

        controller.select_exercise(1).unwrap();
        let update = controller.toggle_tracking().unwrap();
        let feedback = controller.state().last_feedback.clone().unwrap();
        assert_eq!(feedback.kind, FeedbackKind::Info);
        assert_eq!(feedback.message, "AI Vision Active. Start your reps!");
        assert_eq!(update, Some(SessionUpdate::FeedbackShown(feedback)));
        assert!(controller.state().tracking);

        assert_eq!(controller.toggle_tracking().unwrap(), None);
        assert!(!controller.state().tracking);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_with_nothing_running_is_an_error() {
        let (mut controller, _) = session();
        assert!(!controller.has_pending_work());
        assert!(matches!(
            controller.process_next_event().await,
            Err(CoachError::Idle)
        ));

        // A clock on a rep exercise produces nothing either
        controller.toggle_running();
        assert!(matches!(
            controller.process_next_event().await,
            Err(CoachError::Idle)
        ));

        controller.select_exercise(2).unwrap();
        assert!(controller.has_pending_work());
        let updates = controller.process_next_event().await.unwrap();
        assert_eq!(updates, vec![SessionUpdate::Ticked { remaining: 59 }]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_on_rep_exercise_only_flips_flag() {
        let (mut controller, _) = session();
        assert!(controller.toggle_running());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(controller.process_pending_events().is_empty());
        assert_eq!(controller.state().remaining_seconds, 0);
        assert!(!controller.toggle_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tip_resolves_to_fallback() {
        let device = Arc::new(SimulatedCamera::working());
        let mut controller = SessionController::with_defaults(
            CameraManager::new(device),
            Arc::new(Idle),
            Arc::new(UnavailableGenerator {
                reason: "offline".to_string(),
            }),
        );

        assert!(controller.request_external_tip());
        assert!(!controller.request_external_tip());
        assert!(controller.state().tip_pending);
        assert_eq!(controller.snapshot().feedback_text(), "Analyzing form...");

        let updates = controller.process_next_event().await.unwrap();
        assert_eq!(updates.len(), 1);
        assert!(!controller.state().tip_pending);

        let feedback = controller.state().last_feedback.clone().unwrap();
        assert_eq!(feedback.kind, FeedbackKind::ExternalTip);
        assert_eq!(feedback.message, "Focus on your breathing and maintain control.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_tip_is_discarded() {
        let (mut controller, _) = session();

        controller.request_external_tip();
        controller.advance_to_next_exercise();
        assert!(!controller.state().tip_pending);

        let updates = controller.process_next_event().await.unwrap();
        assert!(updates.is_empty());
        assert!(controller.state().last_feedback.is_none());
    }

    struct SlowFor {
        exercise: &'static str,
        delay: Duration,
    }

    #[async_trait]
    impl TextGenerator for SlowFor {
        async fn generate(&self, prompt: &PromptKind) -> Result<String> {
            if let PromptKind::FormTip { exercise } = prompt {
                if exercise == self.exercise {
                    tokio::time::sleep(self.delay).await;
                }
            }
            Ok("Keep your core tight.".to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_tip_keeps_newer_request_cancellable() {
        let device = Arc::new(SimulatedCamera::working());
        let mut controller = SessionController::with_defaults(
            CameraManager::new(device),
            Arc::new(Idle),
            Arc::new(SlowFor {
                exercise: "Squats",
                delay: Duration::from_secs(5),
            }),
        );

        controller.request_external_tip();
        controller.advance_to_next_exercise();
        assert!(controller.request_external_tip());

        // The Push-ups tip lands first and is dropped
        assert!(controller.process_next_event().await.unwrap().is_empty());
        assert!(controller.state().tip_pending);
        assert!(controller.has_pending_work());

        controller.shutdown();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(controller.process_pending_events().is_empty());
        assert!(controller.state().last_feedback.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let (mut controller, device) = session();
        controller.enable_camera().await.unwrap();

        controller.shutdown();
        controller.shutdown();
        drop(controller);

        assert_eq!(device.stops(), 1);
    }
}
