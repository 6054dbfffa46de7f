use std::sync::Arc;
use tracing::{info, warn};
use repcoach::{
    CameraError, CameraManager, OfflineGenerator, SessionController, SimulatedAnalyzer,
    SimulatedCamera,
};

async fn check(label: &str, device: SimulatedCamera) {
    info!("🔍 Checking {} camera", label);

    let mut session = SessionController::with_defaults(
        CameraManager::new(Arc::new(device)),
        Arc::new(SimulatedAnalyzer::new(1)),
        Arc::new(OfflineGenerator),
    );

    match session.enable_camera().await {
        Ok(()) => info!("  ✅ {}", session.camera_status()),
        Err(e) => {
            warn!("  ❌ {}", e);
            if let repcoach::CoachError::Camera(reason) = &e {
                info!("  💬 {}", reason.user_message());
                info!("  🔁 Retryable: {}", reason.is_retryable());
                if let Some(diagnostic) = reason.diagnostic() {
                    info!("  🧾 {}", diagnostic);
                }
            }
        }
    }

    if let Err(e) = session.toggle_tracking() {
        info!("  Tracking unavailable: {}", e);
    }

    session.shutdown();
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt::init();

    info!("📷 Repcoach Camera Check Example");

    check("working", SimulatedCamera::working()).await;
    check("unsupported", SimulatedCamera::unsupported()).await;
    check(
        "denied",
        SimulatedCamera::failing(CameraError::from_platform(
            "NotAllowedError",
            "Permission denied",
        )),
    )
    .await;
    check(
        "busy",
        SimulatedCamera::failing(CameraError::from_platform(
            "NotReadableError",
            "Could not start video source",
        )),
    )
    .await;
    check(
        "odd",
        SimulatedCamera::failing(CameraError::from_platform("OverconstrainedError", "width")),
    )
    .await;
}
