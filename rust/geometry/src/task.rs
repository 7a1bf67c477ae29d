// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cooperative cancellation and progress counters shared with a
//! background load

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Cloneable flag checked between units of work
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once [`cancel`](Self::cancel) has been called
    #[inline]
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Pipeline stage reported through [`Progress`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoadStage {
    Queued = 0,
    Parsing = 1,
    Resolving = 2,
    Extracting = 3,
    Indexing = 4,
    Done = 5,
}

impl LoadStage {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Parsing,
            2 => Self::Resolving,
            3 => Self::Extracting,
            4 => Self::Indexing,
            5 => Self::Done,
            _ => Self::Queued,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Parsing => "parsing",
            Self::Resolving => "resolving",
            Self::Extracting => "extracting",
            Self::Indexing => "indexing",
            Self::Done => "done",
        }
    }
}

/// Lock-free progress readable from the UI thread
#[derive(Debug, Clone, Default)]
pub struct Progress {
    inner: Arc<ProgressInner>,
}

#[derive(Debug, Default)]
struct ProgressInner {
    stage: AtomicU8,
    processed: AtomicUsize,
    total: AtomicUsize,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_stage(&self, stage: LoadStage) {
        self.inner.stage.store(stage as u8, Ordering::Release);
    }

    pub fn stage(&self) -> LoadStage {
        LoadStage::from_u8(self.inner.stage.load(Ordering::Acquire))
    }

    /// Start counting a stage with `total` units
    pub fn begin(&self, total: usize) {
        self.inner.processed.store(0, Ordering::Relaxed);
        self.inner.total.store(total, Ordering::Relaxed);
    }

    pub fn advance(&self, units: usize) {
        self.inner.processed.fetch_add(units, Ordering::Relaxed);
    }

    /// Processed and total units of the current stage
    pub fn counts(&self) -> (usize, usize) {
        (
            self.inner.processed.load(Ordering::Relaxed),
            self.inner.total.load(Ordering::Relaxed),
        )
    }

    /// Fraction of the current stage in `[0, 1]`
    pub fn fraction(&self) -> f32 {
        let (processed, total) = self.counts();
        if total == 0 {
            0.0
        } else {
            (processed as f32 / total as f32).min(1.0)
        }
    }
}
