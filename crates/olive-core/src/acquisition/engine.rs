//! Acquisition state machine.
//!
//! ```text
//! Idle --configure--> Configured --start--> Running --stop--> Stopping --> Configured
//!   ^                     |                    |
//!   +-----unconfigure-----+                 extract
//! ```
//!
//! All methods take `&self`, so one task may sit in [`extract`] while another
//! calls [`stop`]. The pending extraction then returns
//! [`Extraction::Aborted`]. Native commands are issued with the internal lock
//! held, so they never interleave on the handle. The lock is never held
//! across an await.
//!
//! [`extract`]: AcquisitionEngine::extract
//! [`stop`]: AcquisitionEngine::stop

use crate::acquisition::frame::{Extraction, FrameFormat, FrameSlot};
use crate::acquisition::ring::{ExtractMode, FrameRing, RingStats};
use crate::error::{map_lifecycle_error, HalError, HalResult};
use crate::native::{CaptureMode, NativeDevice, SignalEvent};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::{watch, Notify};

/// Lifecycle of one acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AcquisitionState {
    /// No ring allocated
    #[default]
    Idle,
    /// Ring allocated, capture not armed
    Configured,
    /// Capture armed; frames can be extracted
    Running,
    /// Halt requested, waiting for the device to confirm
    Stopping,
}

impl fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AcquisitionState::Idle => "Idle",
            AcquisitionState::Configured => "Configured",
            AcquisitionState::Running => "Running",
            AcquisitionState::Stopping => "Stopping",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: AcquisitionState,
    ring: Option<FrameRing>,
    continuous: bool,
    format: Option<FrameFormat>,
    sequence: u64,
}

enum Step {
    Done(Extraction),
    Wait,
}

/// Drives one device through configure, start, extract and stop.
#[derive(Debug)]
pub struct AcquisitionEngine {
    inner: Mutex<Inner>,
    stop_tx: watch::Sender<bool>,
    /// Woken when `Stopping` settles back to `Configured`.
    settled: Notify,
}

impl Default for AcquisitionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AcquisitionEngine {
    /// An engine in [`AcquisitionState::Idle`].
    pub fn new() -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            inner: Mutex::new(Inner::default()),
            stop_tx,
            settled: Notify::new(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AcquisitionState {
        self.inner.lock().state
    }

    /// Counters of the current or most recent acquisition.
    pub fn stats(&self) -> Option<RingStats> {
        self.inner.lock().ring.as_ref().map(FrameRing::stats)
    }

    /// Ring capacity while configured.
    pub fn capacity(&self) -> Option<usize> {
        self.inner.lock().ring.as_ref().map(FrameRing::capacity)
    }

    /// Format captured at the last `start`.
    pub fn format(&self) -> Option<FrameFormat> {
        self.inner.lock().format
    }

    /// Allocate a ring of `frame_count` slots.
    ///
    /// `continuous` selects sequence capture (ring overwritten indefinitely)
    /// over snap capture (one pass, then the device stops).
    pub fn configure(
        &self,
        device: &dyn NativeDevice,
        frame_count: usize,
        continuous: bool,
    ) -> HalResult<()> {
        let mut inner = self.inner.lock();
        if inner.state != AcquisitionState::Idle {
            return Err(HalError::invalid_state("configure", inner.state));
        }
        let ring = FrameRing::attach(frame_count)?;
        device
            .allocate_frames(frame_count)
            .map_err(map_lifecycle_error)?;

        inner.ring = Some(ring);
        inner.continuous = continuous;
        inner.state = AcquisitionState::Configured;
        tracing::info!(frame_count, continuous, "acquisition configured");
        Ok(())
    }

    /// Arm capture. `format` is the layout of every frame in this run.
    pub fn start(&self, device: &dyn NativeDevice, format: FrameFormat) -> HalResult<()> {
        let mut inner = self.inner.lock();
        if inner.state != AcquisitionState::Configured {
            return Err(HalError::invalid_state("start", inner.state));
        }
        if device.is_capturing()? {
            return Err(HalError::DeviceBusy("capture already in progress".into()));
        }
        let mode = if inner.continuous {
            CaptureMode::Sequence
        } else {
            CaptureMode::Snap
        };
        device.start_capture(mode).map_err(map_lifecycle_error)?;

        if let Some(ring) = inner.ring.as_mut() {
            ring.reset();
        }
        inner.format = Some(format);
        inner.sequence = 0;
        inner.state = AcquisitionState::Running;
        self.stop_tx.send_replace(false);
        tracing::info!(?mode, %format, "acquisition started");
        Ok(())
    }

    /// Hand out one frame, waiting for the device if nothing is pending.
    ///
    /// Returns straight away while a backlog remains. There is no timeout;
    /// callers that need one wrap this future. A [`HalError::BufferOverrun`]
    /// leaves the acquisition running and the next call continues with the
    /// next frame produced.
    pub async fn extract(
        &self,
        device: &dyn NativeDevice,
        mode: ExtractMode,
    ) -> HalResult<Extraction> {
        loop {
            match self.poll_ring(device, mode)? {
                Step::Done(extraction) => return Ok(extraction),
                Step::Wait => {}
            }

            let signal = device.completion_signal();
            let mut stop_rx = self.stop_tx.subscribe();
            tokio::select! {
                ready = signal.wait(SignalEvent::FrameReady) => ready?,
                _ = stop_requested(&mut stop_rx) => {
                    tracing::debug!("extraction aborted by stop");
                    return Ok(Extraction::Aborted);
                }
            }
        }
    }

    fn poll_ring(&self, device: &dyn NativeDevice, mode: ExtractMode) -> HalResult<Step> {
        let mut inner = self.inner.lock();
        match inner.state {
            AcquisitionState::Running => {}
            AcquisitionState::Stopping => return Ok(Step::Done(Extraction::Aborted)),
            state => return Err(HalError::invalid_state("extract", state)),
        }

        // Snap capture stops by itself; sample this before the counters so no
        // final frame is missed.
        let still_capturing = inner.continuous || device.is_capturing()?;
        let status = device.transfer_status()?;

        let Inner {
            ring,
            format,
            sequence,
            ..
        } = &mut *inner;
        let (Some(ring), Some(format)) = (ring.as_mut(), *format) else {
            return Err(HalError::invalid_state("extract", "unconfigured"));
        };

        let backlog = ring.observe_production(status.current_index, status.total_frames)?;
        if let Some(pick) = ring.extract_one(mode) {
            let data = device.read_frame(pick.index)?;
            *sequence += 1;
            tracing::debug!(
                index = pick.index,
                sequence = *sequence,
                backlog,
                dropped = pick.dropped,
                "frame extracted"
            );
            return Ok(Step::Done(Extraction::Frame(FrameSlot {
                index: pick.index,
                sequence: *sequence,
                dropped: pick.dropped,
                format,
                data,
            })));
        }

        if !still_capturing {
            return Ok(Step::Done(Extraction::Complete));
        }
        Ok(Step::Wait)
    }

    /// Halt capture and return to `Configured`.
    ///
    /// Pending extractions unblock with [`Extraction::Aborted`] and frames not
    /// yet extracted are discarded. Stopping an engine that is configured but
    /// not running is a no-op. A call made while another stop is in progress
    /// returns once that stop has settled.
    pub async fn stop(&self, device: &dyn NativeDevice) -> HalResult<()> {
        // Registered before the state check so the wakeup cannot be missed.
        let settled = self.settled.notified();
        let already_stopping = {
            let mut inner = self.inner.lock();
            match inner.state {
                AcquisitionState::Running => {
                    inner.state = AcquisitionState::Stopping;
                    false
                }
                AcquisitionState::Stopping => true,
                AcquisitionState::Configured => return Ok(()),
                AcquisitionState::Idle => {
                    return Err(HalError::invalid_state("stop", AcquisitionState::Idle))
                }
            }
        };
        if already_stopping {
            settled.await;
            return Ok(());
        }
        self.stop_tx.send_replace(true);
        tracing::info!("stopping acquisition");

        let mut result = device.request_stop().map_err(HalError::from);
        if result.is_ok() {
            let signal = device.completion_signal();
            result = signal
                .wait(SignalEvent::CaptureStopped)
                .await
                .map_err(HalError::from);
        }

        let mut inner = self.inner.lock();
        if let Some(ring) = inner.ring.as_mut() {
            let discarded = ring.discard_backlog();
            if discarded > 0 {
                tracing::debug!(discarded, "undrained frames discarded");
            }
        }
        inner.state = AcquisitionState::Configured;
        drop(inner);
        self.settled.notify_waiters();
        result
    }

    /// Release the ring and return to `Idle`.
    pub fn unconfigure(&self, device: &dyn NativeDevice) -> HalResult<()> {
        let mut inner = self.inner.lock();
        if inner.state != AcquisitionState::Configured {
            return Err(HalError::invalid_state("unconfigure", inner.state));
        }
        device.release_frames().map_err(map_lifecycle_error)?;
        *inner = Inner::default();
        tracing::info!("acquisition unconfigured");
        Ok(())
    }

    /// Best-effort teardown for a session that is going away.
    pub(crate) fn abort(&self, device: &dyn NativeDevice) {
        let mut inner = self.inner.lock();
        if matches!(
            inner.state,
            AcquisitionState::Running | AcquisitionState::Stopping
        ) {
            self.stop_tx.send_replace(true);
            if let Err(err) = device.request_stop() {
                tracing::warn!(error = %err, "failed to halt capture during teardown");
            }
        }
        if inner.ring.is_some() {
            if let Err(err) = device.release_frames() {
                tracing::warn!(error = %err, "failed to release frames during teardown");
            }
        }
        *inner = Inner::default();
        drop(inner);
        self.settled.notify_waiters();
    }
}

async fn stop_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::PixelType;
    use crate::error::{NativeError, NativeErrorKind};
    use crate::native::{
        Capability, CompletionSignal, PropertyId, RawAttributes, TransferStatus,
    };
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct Signal {
        frame_ready: Notify,
        stopped: Notify,
    }

    #[async_trait]
    impl CompletionSignal for Signal {
        async fn wait(&self, event: SignalEvent) -> Result<(), NativeError> {
            match event {
                SignalEvent::FrameReady => self.frame_ready.notified().await,
                SignalEvent::CaptureStopped => self.stopped.notified().await,
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct Counters {
        capacity: usize,
        total: u64,
        capturing: bool,
        mode: Option<CaptureMode>,
        /// Leave `CaptureStopped` for the test to signal
        hold_stop: bool,
    }

    /// Minimal capture-only device.
    #[derive(Default)]
    struct Camera {
        counters: parking_lot::Mutex<Counters>,
        signal: Arc<Signal>,
    }

    impl Camera {
        fn produce(&self, n: u64) {
            let mut c = self.counters.lock();
            for _ in 0..n {
                c.total += 1;
                if c.mode == Some(CaptureMode::Snap) && c.total >= c.capacity as u64 {
                    c.capturing = false;
                    break;
                }
            }
            drop(c);
            self.signal.frame_ready.notify_one();
        }
    }

    fn unsupported() -> NativeError {
        NativeError::new(NativeErrorKind::Rejected, "no properties")
    }

    impl NativeDevice for Camera {
        fn capabilities(&self) -> &[Capability] {
            &[Capability::FrameStreaming]
        }
        fn next_property_id(&self, _after: PropertyId) -> Result<Option<PropertyId>, NativeError> {
            Ok(None)
        }
        fn display_name(&self, _id: PropertyId, _buf_len: usize) -> Result<String, NativeError> {
            Err(unsupported())
        }
        fn raw_attributes(&self, _id: PropertyId) -> Result<RawAttributes, NativeError> {
            Err(unsupported())
        }
        fn get_value(&self, _id: PropertyId) -> Result<f64, NativeError> {
            Err(unsupported())
        }
        fn get_text(&self, _id: PropertyId, _buf_len: usize) -> Result<String, NativeError> {
            Err(unsupported())
        }
        fn value_label(&self, _id: PropertyId, _value: f64, _buf_len: usize) -> Result<String, NativeError> {
            Err(unsupported())
        }
        fn set_value(&self, _id: PropertyId, _value: f64) -> Result<(), NativeError> {
            Err(unsupported())
        }
        fn allocate_frames(&self, count: usize) -> Result<(), NativeError> {
            self.counters.lock().capacity = count;
            Ok(())
        }
        fn release_frames(&self) -> Result<(), NativeError> {
            self.counters.lock().capacity = 0;
            Ok(())
        }
        fn start_capture(&self, mode: CaptureMode) -> Result<(), NativeError> {
            let mut c = self.counters.lock();
            c.capturing = true;
            c.total = 0;
            c.mode = Some(mode);
            Ok(())
        }
        fn request_stop(&self) -> Result<(), NativeError> {
            let mut c = self.counters.lock();
            c.capturing = false;
            if !c.hold_stop {
                self.signal.stopped.notify_one();
            }
            Ok(())
        }
        fn is_capturing(&self) -> Result<bool, NativeError> {
            Ok(self.counters.lock().capturing)
        }
        fn transfer_status(&self) -> Result<TransferStatus, NativeError> {
            let c = self.counters.lock();
            let current_index = match c.total {
                0 => 0,
                t => ((t - 1) % c.capacity as u64) as usize,
            };
            Ok(TransferStatus {
                current_index,
                total_frames: c.total,
            })
        }
        fn read_frame(&self, index: usize) -> Result<Bytes, NativeError> {
            Ok(Bytes::from(vec![index as u8; 4]))
        }
        fn completion_signal(&self) -> Arc<dyn CompletionSignal> {
            self.signal.clone()
        }
        fn close(&self) -> Result<(), NativeError> {
            Ok(())
        }
    }

    fn format() -> FrameFormat {
        FrameFormat::new(2, 2, PixelType::Mono8)
    }

    #[tokio::test]
    async fn test_full_cycle_returns_to_idle() {
        let camera = Camera::default();
        let engine = AcquisitionEngine::new();
        engine.configure(&camera, 4, true).unwrap();
        engine.start(&camera, format()).unwrap();
        assert_eq!(engine.state(), AcquisitionState::Running);

        for expected in 0..3usize {
            camera.produce(1);
            let frame = engine
                .extract(&camera, ExtractMode::Next)
                .await
                .unwrap()
                .into_frame()
                .unwrap();
            assert_eq!(frame.index, expected);
            assert_eq!(frame.sequence, expected as u64 + 1);
        }

        engine.stop(&camera).await.unwrap();
        assert_eq!(engine.state(), AcquisitionState::Configured);
        engine.unconfigure(&camera).unwrap();
        assert_eq!(engine.state(), AcquisitionState::Idle);
        engine.configure(&camera, 2, false).unwrap();
    }

    #[tokio::test]
    async fn test_wrong_state_calls_are_rejected() {
        let camera = Camera::default();
        let engine = AcquisitionEngine::new();
        assert!(matches!(
            engine.extract(&camera, ExtractMode::Next).await,
            Err(HalError::InvalidState { operation: "extract", .. })
        ));
        assert!(matches!(
            engine.start(&camera, format()),
            Err(HalError::InvalidState { .. })
        ));
        assert!(matches!(
            engine.configure(&camera, 0, true),
            Err(HalError::InvalidArgument(_))
        ));
        engine.configure(&camera, 3, true).unwrap();
        engine.start(&camera, format()).unwrap();
        assert!(matches!(
            engine.start(&camera, format()),
            Err(HalError::InvalidState { operation: "start", .. })
        ));
        assert!(matches!(
            engine.unconfigure(&camera),
            Err(HalError::InvalidState { operation: "unconfigure", .. })
        ));
        assert!(matches!(
            engine.configure(&camera, 3, true),
            Err(HalError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_start_while_device_busy() {
        let camera = Camera::default();
        let engine = AcquisitionEngine::new();
        engine.configure(&camera, 3, true).unwrap();
        camera.counters.lock().capturing = true;
        assert!(matches!(
            engine.start(&camera, format()),
            Err(HalError::DeviceBusy(_))
        ));
        assert_eq!(engine.state(), AcquisitionState::Configured);
    }

    #[tokio::test]
    async fn test_stop_unblocks_pending_extract() {
        let camera = Arc::new(Camera::default());
        let engine = Arc::new(AcquisitionEngine::new());
        engine.configure(camera.as_ref(), 4, true).unwrap();
        engine.start(camera.as_ref(), format()).unwrap();

        let pending = {
            let camera = camera.clone();
            let engine = engine.clone();
            tokio::spawn(async move { engine.extract(camera.as_ref(), ExtractMode::Next).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        engine.stop(camera.as_ref()).await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(result.is_aborted());
    }

    #[tokio::test]
    async fn test_snap_completes_after_one_pass() {
        let camera = Camera::default();
        let engine = AcquisitionEngine::new();
        engine.configure(&camera, 2, false).unwrap();
        engine.start(&camera, format()).unwrap();

        camera.produce(1);
        let first = engine.extract(&camera, ExtractMode::Next).await.unwrap();
        assert_eq!(first.into_frame().unwrap().index, 0);
        camera.produce(1);
        let second = engine.extract(&camera, ExtractMode::Next).await.unwrap();
        assert_eq!(second.into_frame().unwrap().index, 1);
        let done = engine.extract(&camera, ExtractMode::Next).await.unwrap();
        assert!(matches!(done, Extraction::Complete));
    }

    #[tokio::test]
    async fn test_stop_when_configured_is_noop() {
        let camera = Camera::default();
        let engine = AcquisitionEngine::new();
        assert!(engine.stop(&camera).await.is_err());
        engine.configure(&camera, 2, true).unwrap();
        engine.stop(&camera).await.unwrap();
        assert_eq!(engine.state(), AcquisitionState::Configured);
    }

    #[tokio::test]
    async fn test_concurrent_stop_waits_for_halt() {
        let camera = Arc::new(Camera::default());
        camera.counters.lock().hold_stop = true;
        let engine = Arc::new(AcquisitionEngine::new());
        engine.configure(camera.as_ref(), 4, true).unwrap();
        engine.start(camera.as_ref(), format()).unwrap();

        let spawn_stop = || {
            let camera = camera.clone();
            let engine = engine.clone();
            tokio::spawn(async move { engine.stop(camera.as_ref()).await })
        };
        let first = spawn_stop();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(engine.state(), AcquisitionState::Stopping);

        let second = spawn_stop();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!second.is_finished());
        assert_eq!(engine.state(), AcquisitionState::Stopping);

        camera.signal.stopped.notify_one();
        for handle in [first, second] {
            tokio::time::timeout(Duration::from_secs(1), handle)
                .await
                .unwrap()
                .unwrap()
                .unwrap();
        }
        assert_eq!(engine.state(), AcquisitionState::Configured);
    }
}
