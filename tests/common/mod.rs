#![allow(dead_code)]

use async_trait::async_trait;
use repcoach::{
    AnalyzerError, CameraManager, CaptureStream, Catalog, MotionAnalyzer, OfflineGenerator,
    PoseSample, SessionConfig, SessionController, SimulatedCamera,
};
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

/// Analyzer replaying a fixed script, then repeating a steady sample
pub struct ScriptedAnalyzer {
    latency: Duration,
    script: Mutex<VecDeque<Result<PoseSample, AnalyzerError>>>,
    steady: PoseSample,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl ScriptedAnalyzer {
    pub fn steady(latency: Duration, steady: PoseSample) -> Self {
        Self {
            latency,
            script: Mutex::new(VecDeque::new()),
            steady,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_script(self, script: Vec<Result<PoseSample, AnalyzerError>>) -> Self {
        *self.script.lock().unwrap() = script.into();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MotionAnalyzer for ScriptedAnalyzer {
    async fn analyze(
        &self,
        _stream: &dyn CaptureStream,
        _exercise: &str,
    ) -> Result<PoseSample, AnalyzerError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);

        tokio::time::sleep(self.latency).await;

        let next = self.script.lock().unwrap().pop_front();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        next.unwrap_or_else(|| Ok(self.steady.clone()))
    }
}

pub fn rep() -> PoseSample {
    PoseSample {
        feedback: None,
        rep_counted: true,
    }
}

pub fn said(message: &str) -> PoseSample {
    PoseSample {
        feedback: Some(message.to_string()),
        rep_counted: false,
    }
}

pub fn session_with(
    catalog: Catalog,
    analyzer: Arc<dyn MotionAnalyzer>,
) -> (SessionController, Arc<SimulatedCamera>) {
    let device = Arc::new(SimulatedCamera::working());
    let controller = SessionController::new(
        catalog,
        SessionConfig::default(),
        CameraManager::new(device.clone()),
        analyzer,
        Arc::new(OfflineGenerator),
    );
    (controller, device)
}
