//! Completion events for mock devices.

use async_trait::async_trait;
use olive_core::native::{CompletionSignal, SignalEvent};
use olive_core::NativeError;
use tokio::sync::Notify;

/// One permit-style notifier per event. A notification sent while nobody
/// waits is kept for the next waiter.
#[derive(Debug, Default)]
pub struct MockSignal {
    frame_ready: Notify,
    capture_stopped: Notify,
}

impl MockSignal {
    /// Fire `event`, waking one waiter or leaving a permit.
    pub fn notify(&self, event: SignalEvent) {
        match event {
            SignalEvent::FrameReady => self.frame_ready.notify_one(),
            SignalEvent::CaptureStopped => self.capture_stopped.notify_one(),
        }
    }
}

#[async_trait]
impl CompletionSignal for MockSignal {
    async fn wait(&self, event: SignalEvent) -> Result<(), NativeError> {
        match event {
            SignalEvent::FrameReady => self.frame_ready.notified().await,
            SignalEvent::CaptureStopped => self.capture_stopped.notified().await,
        }
        Ok(())
    }
}
