//! Backlog bookkeeping over the native frame ring.
//!
//! The driver writes frames into `capacity` slots in order, wrapping around.
//! [`FrameRing`] never touches pixel data. It tracks which slot the consumer
//! saw last and how many produced frames are still waiting, using the
//! counters the driver reports through [`observe_production`].
//!
//! ## Rules
//!
//! - Before the first extraction the backlog is 1 as soon as any frame
//!   exists: the consumer starts from the newest frame. Only a first
//!   observation of more than `capacity` frames is an overrun.
//! - Afterwards the backlog grows by the number of frames produced since the
//!   previous observation and never exceeds `capacity`.
//! - If production advanced by `capacity` or more between two observations,
//!   or the pending backlog would exceed `capacity`, frames were overwritten
//!   before they could be read. This is reported as
//!   [`HalError::BufferOverrun`] and the ring resynchronizes on the newest
//!   slot, which counts as consumed.
//!
//! [`observe_production`]: FrameRing::observe_production

use crate::error::{HalError, HalResult, NativeError, NativeErrorKind};
use serde::{Deserialize, Serialize};

/// Which frame [`FrameRing::extract_one`] hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractMode {
    /// Oldest pending frame first.
    #[default]
    Next,
    /// Newest frame; everything older is skipped.
    Latest,
}

/// Counters accumulated over one acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RingStats {
    /// Frames handed to the consumer
    pub frames_delivered: u64,
    /// Frames skipped on purpose (`Latest` mode, first observation)
    pub frames_dropped: u64,
    /// Overrun reports raised
    pub overruns: u64,
    /// Frames overwritten before they could be read
    pub frames_lost: u64,
}

/// Slot chosen by an extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingPick {
    /// Slot holding the delivered frame
    pub index: usize,
    /// Older pending frames skipped by this pick
    pub dropped: usize,
}

/// Consumer-side view of a native ring of frame slots.
#[derive(Debug, Clone)]
pub struct FrameRing {
    capacity: usize,
    last_consumed: Option<usize>,
    current_index: usize,
    observed_total: u64,
    backlog: usize,
    stats: RingStats,
}

impl FrameRing {
    /// Attach to a native ring of `capacity` slots.
    pub fn attach(capacity: usize) -> HalResult<Self> {
        if capacity == 0 {
            return Err(HalError::InvalidArgument(
                "frame ring capacity must be at least 1".into(),
            ));
        }
        Ok(Self {
            capacity,
            last_consumed: None,
            current_index: 0,
            observed_total: 0,
            backlog: 0,
            stats: RingStats::default(),
        })
    }

    /// Forget all progress, as after `attach`. Used when capture is re-armed.
    pub fn reset(&mut self) {
        self.last_consumed = None;
        self.current_index = 0;
        self.observed_total = 0;
        self.backlog = 0;
        self.stats = RingStats::default();
    }

    /// Number of slots in the ring.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frames produced but not yet handed out.
    pub fn backlog(&self) -> usize {
        self.backlog
    }

    /// Slot handed out last, `None` before the first frame was seen.
    pub fn last_consumed(&self) -> Option<usize> {
        self.last_consumed
    }

    /// Slot of the newest frame the driver reported.
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Counters since `attach` or the last `reset`.
    pub fn stats(&self) -> RingStats {
        self.stats
    }

    /// Fold in the driver's counters and return the new backlog.
    ///
    /// `current_index` is the slot of the newest frame and `total` the number
    /// of frames produced since capture was armed.
    pub fn observe_production(&mut self, current_index: usize, total: u64) -> HalResult<usize> {
        if total == 0 {
            return Ok(self.backlog);
        }
        if current_index >= self.capacity {
            return Err(protocol(format!(
                "frame index {current_index} outside ring of {}",
                self.capacity
            )));
        }
        if total < self.observed_total {
            return Err(protocol(format!(
                "frame counter went backwards from {} to {total}",
                self.observed_total
            )));
        }

        let delta = total - self.observed_total;
        self.observed_total = total;
        self.current_index = current_index;
        if delta == 0 {
            return Ok(self.backlog);
        }

        let capacity = self.capacity as u64;
        let pending = self.backlog as u64;
        let first = self.last_consumed.is_none();
        // The newest slot is still intact on a first look unless the ring
        // was lapped outright.
        let overrun = if first {
            delta > capacity
        } else {
            delta >= capacity || pending + delta > capacity
        };
        if overrun {
            self.stats.overruns += 1;
            self.stats.frames_lost += pending + delta;
            self.last_consumed = Some(current_index);
            self.backlog = 0;
            tracing::warn!(
                produced = delta,
                pending,
                capacity = self.capacity,
                latest_index = current_index,
                "frame ring overrun"
            );
            return Err(HalError::BufferOverrun {
                produced: delta,
                capacity: self.capacity,
                latest_index: current_index,
            });
        }

        if first {
            self.last_consumed = Some((current_index + self.capacity - 1) % self.capacity);
            self.backlog = 1;
            self.stats.frames_dropped += delta - 1;
        } else {
            // bounded by capacity above
            self.backlog = (pending + delta) as usize;
        }
        Ok(self.backlog)
    }

    /// Hand out one pending slot, or `None` when nothing is pending.
    pub fn extract_one(&mut self, mode: ExtractMode) -> Option<RingPick> {
        if self.backlog == 0 {
            return None;
        }
        let last = self.last_consumed?;
        let pick = match mode {
            ExtractMode::Next => RingPick {
                index: (last + 1) % self.capacity,
                dropped: 0,
            },
            ExtractMode::Latest => RingPick {
                index: (last + self.backlog) % self.capacity,
                dropped: self.backlog - 1,
            },
        };
        self.last_consumed = Some(pick.index);
        self.backlog -= pick.dropped + 1;
        self.stats.frames_delivered += 1;
        self.stats.frames_dropped += pick.dropped as u64;
        Some(pick)
    }

    /// Throw away everything pending. Returns how many frames were discarded.
    pub fn discard_backlog(&mut self) -> usize {
        let discarded = self.backlog;
        if discarded > 0 {
            self.last_consumed = Some(self.current_index);
            self.backlog = 0;
        }
        discarded
    }
}

fn protocol(message: String) -> HalError {
    NativeError::new(NativeErrorKind::Protocol, message).into()
}
