use std::sync::Arc;
use tracing::{error, info, warn};
use repcoach::{
    CameraManager, Catalog, CoachError, ExerciseDescriptor, OfflineGenerator, Result,
    SessionConfig, SessionController, SessionUpdate, SimulatedAnalyzer, SimulatedCamera,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    info!("🏋️ Repcoach Guided Workout Example");

    // A short circuit so the demo finishes in well under a minute
    let catalog = Catalog::new(vec![
        ExerciseDescriptor::reps("Push-ups", 3),
        ExerciseDescriptor::timed("Plank", 5),
        ExerciseDescriptor::reps("Squats", 3),
    ])?;

    let mut session = SessionController::new(
        catalog,
        SessionConfig::default(),
        CameraManager::new(Arc::new(SimulatedCamera::working())),
        Arc::new(SimulatedAnalyzer::new(42).with_probabilities(0.5, 0.6)),
        Arc::new(OfflineGenerator),
    );

    info!("📷 Enabling camera...");
    if let Err(e) = session.enable_camera().await {
        error!("❌ Camera unavailable: {}", e);
        return Err(e);
    }
    info!("✅ Camera: {}", session.camera_status());

    session.toggle_running();
    if let Some(SessionUpdate::FeedbackShown(feedback)) = session.toggle_tracking()? {
        info!("🗣️  [{}] {}", feedback.kind, feedback.message);
    }
    session.request_external_tip();

    loop {
        let updates = match session.process_next_event().await {
            Ok(updates) => updates,
            Err(CoachError::Idle) => {
                warn!("⚠️  Nothing left running, ending workout");
                session.shutdown();
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        for update in updates {
            match update {
                SessionUpdate::Ticked { remaining } => {
                    info!("⏱️  {}", repcoach::format_clock(remaining));
                }
                SessionUpdate::RepCounted { reps } => {
                    info!(
                        "💪 Rep {}/{}",
                        reps,
                        session.current_exercise().target_reps
                    );
                }
                SessionUpdate::FeedbackShown(feedback) => {
                    info!("🗣️  [{}] {}", feedback.kind, feedback.message);
                }
                SessionUpdate::TipResolved(feedback) => {
                    info!("💡 Tip: {}", feedback.message);
                }
                SessionUpdate::ExerciseChanged { to, completed, .. } => {
                    if completed {
                        info!("✅ Exercise complete");
                    }
                    if to == 0 {
                        info!("🔁 Circuit finished");
                        session.shutdown();
                        return Ok(());
                    }

                    let next = session.current_exercise().clone();
                    info!("➡️  Next up: {}", next);
                    if next.is_rep_based() {
                        match session.toggle_tracking() {
                            Ok(Some(SessionUpdate::FeedbackShown(feedback))) => {
                                info!("🗣️  [{}] {}", feedback.kind, feedback.message);
                            }
                            Ok(_) => {}
                            Err(e) => warn!("⚠️  Could not start tracking: {}", e),
                        }
                    }
                }
            }
        }
    }
}
