use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::{
    collections::HashSet,
    fmt,
    mem,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};
use tracing::{debug, info, warn};

use crate::{
    error::CameraError,
    types::{CameraStatus, StreamConstraints},
};

/// An open capture stream
///
/// The analyzer reads frames through it; only the [`CameraManager`] stops it.
pub trait CaptureStream: Send + Sync {
    /// Human-readable stream label
    fn label(&self) -> &str;

    /// Whether a frame is available to analyze
    fn is_ready(&self) -> bool {
        true
    }

    /// Stop every track of the stream and free the device
    fn stop(&self);
}

/// Platform capture device
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Whether the platform can capture at all
    fn is_supported(&self) -> bool {
        true
    }

    /// Open a stream satisfying `constraints`
    async fn request_stream(
        &self,
        constraints: StreamConstraints,
    ) -> Result<Arc<dyn CaptureStream>, CameraError>;
}

type PendingStream = Shared<BoxFuture<'static, Result<Arc<dyn CaptureStream>, CameraError>>>;

enum Slot {
    Unacquired,
    Acquiring {
        attempt: u64,
        pending: PendingStream,
    },
    Active {
        attempt: u64,
        stream: Arc<dyn CaptureStream>,
    },
    Failed {
        attempt: u64,
        error: CameraError,
    },
}

struct Inner {
    slot: Slot,
    attempts: u64,
    abandoned: HashSet<u64>,
}

/// Owner of the single camera stream
///
/// Cloning yields another handle to the same manager. At most one acquisition
/// is in flight; concurrent callers share its outcome.
#[derive(Clone)]
pub struct CameraManager {
    device: Arc<dyn CameraDevice>,
    constraints: StreamConstraints,
    inner: Arc<Mutex<Inner>>,
}

impl CameraManager {
    /// Manager for `device` using default constraints
    #[must_use]
    pub fn new(device: Arc<dyn CameraDevice>) -> Self {
        Self::with_constraints(device, StreamConstraints::default())
    }

    /// Manager for `device` requesting streams with `constraints`
    #[must_use]
    pub fn with_constraints(device: Arc<dyn CameraDevice>, constraints: StreamConstraints) -> Self {
        Self {
            device,
            constraints,
            inner: Arc::new(Mutex::new(Inner {
                slot: Slot::Unacquired,
                attempts: 0,
                abandoned: HashSet::new(),
            })),
        }
    }

    /// Current lifecycle status
    #[must_use]
    pub fn status(&self) -> CameraStatus {
        match &self.lock().slot {
            Slot::Unacquired => CameraStatus::Unacquired,
            Slot::Acquiring { .. } => CameraStatus::Acquiring,
            Slot::Active { .. } => CameraStatus::Active,
            Slot::Failed { error, .. } => CameraStatus::Failed(error.clone()),
        }
    }

    /// The held stream, if active
    #[must_use]
    pub fn stream(&self) -> Option<Arc<dyn CaptureStream>> {
        match &self.lock().slot {
            Slot::Active { stream, .. } => Some(Arc::clone(stream)),
            _ => None,
        }
    }

    /// Open the capture device
    ///
    /// Returns the held stream when already active. While an acquisition is in
    /// flight, a second call waits on that same acquisition instead of issuing
    /// another request. A previous failure is retried.
    ///
    /// # Errors
    ///
    /// Returns the classified [`CameraError`] of the failed attempt, or
    /// [`CameraError::Unknown`] if [`release`](Self::release) was called while
    /// the attempt was in flight.
    pub async fn acquire(&self) -> Result<Arc<dyn CaptureStream>, CameraError> {
        let (attempt, pending) = {
            let mut inner = self.lock();
            match &inner.slot {
                Slot::Active { stream, .. } => return Ok(Arc::clone(stream)),
                Slot::Acquiring { attempt, pending } => {
                    debug!("Camera acquisition already in flight, joining attempt {attempt}");
                    (*attempt, pending.clone())
                }
                Slot::Unacquired | Slot::Failed { .. } => {
                    inner.attempts += 1;
                    let attempt = inner.attempts;

                    if !self.device.is_supported() {
                        warn!("Camera capture unsupported on this platform");
                        inner.slot = Slot::Failed {
                            attempt,
                            error: CameraError::Unsupported,
                        };
                        return Err(CameraError::Unsupported);
                    }

                    info!("Requesting camera stream (attempt {attempt})");
                    let device = Arc::clone(&self.device);
                    let constraints = self.constraints;
                    let pending = async move { device.request_stream(constraints).await }
                        .boxed()
                        .shared();
                    inner.slot = Slot::Acquiring {
                        attempt,
                        pending: pending.clone(),
                    };
                    (attempt, pending)
                }
            }
        };

        let outcome = pending.await;
        self.settle(attempt, outcome)
    }

    fn settle(
        &self,
        attempt: u64,
        outcome: Result<Arc<dyn CaptureStream>, CameraError>,
    ) -> Result<Arc<dyn CaptureStream>, CameraError> {
        let mut inner = self.lock();

        match &inner.slot {
            Slot::Acquiring { attempt: current, .. } if *current == attempt => {
                inner.slot = match &outcome {
                    Ok(stream) => {
                        info!("Camera stream active: {}", stream.label());
                        Slot::Active {
                            attempt,
                            stream: Arc::clone(stream),
                        }
                    }
                    Err(error) => {
                        warn!("Camera acquisition failed: {error}");
                        Slot::Failed {
                            attempt,
                            error: error.clone(),
                        }
                    }
                };
                outcome
            }
            Slot::Active { attempt: current, .. } | Slot::Failed { attempt: current, .. }
                if *current == attempt =>
            {
                outcome
            }
            _ => {
                if inner.abandoned.remove(&attempt) {
                    drop(inner);
                    if let Ok(stream) = &outcome {
                        info!("Stopping camera stream acquired after release: {}", stream.label());
                        stream.stop();
                    }
                }
                Err(CameraError::Unknown(
                    "camera released while acquisition was in flight".to_string(),
                ))
            }
        }
    }

    /// Stop and discard the held stream
    ///
    /// Idempotent: the stream is stopped at most once however often this is
    /// called. Returns whether a stream was stopped.
    pub fn release(&self) -> bool {
        let stream = {
            let mut inner = self.lock();
            match mem::replace(&mut inner.slot, Slot::Unacquired) {
                Slot::Active { stream, .. } => Some(stream),
                Slot::Acquiring { attempt, .. } => {
                    debug!("Camera released during acquisition attempt {attempt}");
                    inner.abandoned.insert(attempt);
                    None
                }
                Slot::Unacquired | Slot::Failed { .. } => None,
            }
        };

        match stream {
            Some(stream) => {
                info!("Releasing camera stream: {}", stream.label());
                stream.stop();
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for CameraManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraManager")
            .field("status", &self.status())
            .field("constraints", &self.constraints)
            .finish_non_exhaustive()
    }
}

/// Stream produced by [`SimulatedCamera`]
pub struct SimulatedStream {
    label: String,
    stops: Arc<AtomicUsize>,
}

impl CaptureStream for SimulatedStream {
    fn label(&self) -> &str {
        &self.label
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// In-process camera for demos and tests
///
/// Either hands out streams or fails every request with a fixed error, and
/// counts how many requests and stream stops it has seen.
pub struct SimulatedCamera {
    failure: Option<CameraError>,
    supported: bool,
    requests: AtomicUsize,
    stops: Arc<AtomicUsize>,
}

impl SimulatedCamera {
    /// Camera that always opens successfully
    #[must_use]
    pub fn working() -> Self {
        Self {
            failure: None,
            supported: true,
            requests: AtomicUsize::new(0),
            stops: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Camera whose requests all fail with `error`
    #[must_use]
    pub fn failing(error: CameraError) -> Self {
        Self {
            failure: Some(error),
            ..Self::working()
        }
    }

    /// Platform without capture support
    #[must_use]
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::working()
        }
    }

    /// Stream requests received
    #[must_use]
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Stream stops observed
    #[must_use]
    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CameraDevice for SimulatedCamera {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn request_stream(
        &self,
        _constraints: StreamConstraints,
    ) -> Result<Arc<dyn CaptureStream>, CameraError> {
        let n = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::task::yield_now().await;

        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        Ok(Arc::new(SimulatedStream {
            label: format!("simulated-camera-{n}"),
            stops: Arc::clone(&self.stops),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Notify;

    /// Device whose single request blocks until released by the test
    struct GatedCamera {
        gate: Notify,
        inner: SimulatedCamera,
    }

    #[async_trait]
    impl CameraDevice for GatedCamera {
        async fn request_stream(
            &self,
            constraints: StreamConstraints,
        ) -> Result<Arc<dyn CaptureStream>, CameraError> {
            self.gate.notified().await;
            self.inner.request_stream(constraints).await
        }
    }

    #[tokio::test]
    async fn test_acquire_and_release_once() {
        let camera = Arc::new(SimulatedCamera::working());
        let manager = CameraManager::new(camera.clone());

        assert_eq!(manager.status(), CameraStatus::Unacquired);
        let stream = manager.acquire().await;
        assert!(stream.is_ok());
        assert_eq!(manager.status(), CameraStatus::Active);

        assert!(manager.release());
        assert!(!manager.release());
        assert_eq!(camera.stops(), 1);
        assert_eq!(manager.status(), CameraStatus::Unacquired);
    }

    #[tokio::test]
    async fn test_failure_is_recorded_and_retryable() {
        let camera = Arc::new(SimulatedCamera::failing(CameraError::DeviceBusy));
        let manager = CameraManager::new(camera.clone());

        let result = manager.acquire().await;
        assert!(matches!(result, Err(CameraError::DeviceBusy)));
        assert_eq!(
            manager.status(),
            CameraStatus::Failed(CameraError::DeviceBusy)
        );

        let _ = manager.acquire().await;
        assert_eq!(camera.requests(), 2);
        assert!(!manager.release());
    }

    #[tokio::test]
    async fn test_unsupported_never_requests() {
        let camera = Arc::new(SimulatedCamera::unsupported());
        let manager = CameraManager::new(camera.clone());

        let result = manager.acquire().await;
        assert!(matches!(result, Err(CameraError::Unsupported)));
        assert_eq!(camera.requests(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_acquire_shares_attempt() {
        let camera = Arc::new(GatedCamera {
            gate: Notify::new(),
            inner: SimulatedCamera::working(),
        });
        let manager = CameraManager::new(camera.clone());

        let first = tokio::spawn({
            let manager = manager.clone();
            async move { manager.acquire().await.map(|s| s.label().to_string()) }
        });
        let second = tokio::spawn({
            let manager = manager.clone();
            async move { manager.acquire().await.map(|s| s.label().to_string()) }
        });

        while manager.status() != CameraStatus::Acquiring {
            tokio::task::yield_now().await;
        }
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        camera.gate.notify_one();

        let first = first.await.unwrap();
        let second = second.await.unwrap();
        assert_eq!(first, second);
        assert_eq!(camera.inner.requests(), 1);
        assert_eq!(manager.status(), CameraStatus::Active);
    }

    #[tokio::test]
    async fn test_release_during_acquisition_stops_late_stream() {
        let camera = Arc::new(GatedCamera {
            gate: Notify::new(),
            inner: SimulatedCamera::working(),
        });
        let manager = CameraManager::new(camera.clone());

        let pending = tokio::spawn({
            let manager = manager.clone();
            async move { manager.acquire().await.is_ok() }
        });
        while manager.status() != CameraStatus::Acquiring {
            tokio::task::yield_now().await;
        }

        assert!(!manager.release());
        camera.gate.notify_one();

        assert!(!pending.await.unwrap());
        assert_eq!(camera.inner.stops(), 1);
        assert_eq!(manager.status(), CameraStatus::Unacquired);
    }

    #[tokio::test]
    async fn test_every_abandoned_attempt_is_stopped() {
        let camera = Arc::new(GatedCamera {
            gate: Notify::new(),
            inner: SimulatedCamera::working(),
        });
        let manager = CameraManager::new(camera.clone());

        let mut attempts = Vec::new();
        for _ in 0..2 {
            attempts.push(tokio::spawn({
                let manager = manager.clone();
                async move { manager.acquire().await.is_ok() }
            }));
            while manager.status() != CameraStatus::Acquiring {
                tokio::task::yield_now().await;
            }
            assert!(!manager.release());
        }

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        camera.gate.notify_one();
        camera.gate.notify_one();

        for attempt in attempts {
            assert!(!attempt.await.unwrap());
        }
        assert_eq!(camera.inner.requests(), 2);
        assert_eq!(camera.inner.stops(), 2);
        assert_eq!(manager.status(), CameraStatus::Unacquired);
    }
}
