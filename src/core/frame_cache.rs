//! Frame cache: one slot per frame of a fixed `1..N` sequence.
//!
//! Structure: `Arc<Vec<FrameSlot>>`, indexed by `FrameIndex::slot()`.
//! - All N slots exist from construction (paths are predictable)
//! - `preload()` queues every pending slot on the worker pool and returns at once
//! - Readers never block on decoding: a slot that is not Ready reads as `None`
//!
//! Clones share slots, so the renderer and a media element can read the same cache.

use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use image::RgbaImage;
use log::{debug, info, trace, warn};

use super::frame::{FrameAsset, FramePattern, FrameStatus, decode_frame};
use super::mapping::FrameIndex;
use super::workers::Workers;

/// Lookup statistics
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses();
        if total == 0 { 0.0 } else { self.hits() as f64 / total as f64 }
    }
}

#[derive(Debug)]
enum SlotState {
    Pending,
    Loading,
    Ready(FrameAsset),
    Failed,
}

impl SlotState {
    fn status(&self) -> FrameStatus {
        match self {
            SlotState::Pending => FrameStatus::Pending,
            SlotState::Loading => FrameStatus::Loading,
            SlotState::Ready(_) => FrameStatus::Ready,
            SlotState::Failed => FrameStatus::Failed,
        }
    }
}

#[derive(Debug)]
struct FrameSlot {
    index: FrameIndex,
    path: PathBuf,
    state: Mutex<SlotState>,
}

impl FrameSlot {
    /// Pending -> Loading. False if someone else already claimed it.
    fn try_claim(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if matches!(*state, SlotState::Pending) {
            *state = SlotState::Loading;
            true
        } else {
            false
        }
    }

    fn decode(&self) {
        let next = match decode_frame(&self.path, self.index) {
            Ok(asset) => SlotState::Ready(asset),
            Err(e) => {
                warn!("Frame {} unavailable: {}", self.index, e);
                SlotState::Failed
            }
        };
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        // A cancelled load was reset to Pending; don't resurrect it
        if matches!(*state, SlotState::Loading) {
            *state = next;
        }
    }
}

/// Per-status slot counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheCounts {
    pub pending: usize,
    pub loading: usize,
    pub ready: usize,
    pub failed: usize,
}

impl CacheCounts {
    /// Nothing left in flight
    pub fn is_settled(&self) -> bool {
        self.pending == 0 && self.loading == 0
    }
}

/// Shared cache of the N frames of one sequence.
#[derive(Debug, Clone)]
pub struct FrameCache {
    pattern: FramePattern,
    slots: Arc<Vec<FrameSlot>>,
    epoch: Arc<AtomicU64>,
    stats: Arc<CacheStats>,
}

impl FrameCache {
    pub fn new(pattern: FramePattern, frame_count: NonZeroU32) -> Self {
        let slots: Vec<FrameSlot> = (1..=frame_count.get())
            .filter_map(FrameIndex::new)
            .map(|index| FrameSlot {
                index,
                path: pattern.path(index),
                state: Mutex::new(SlotState::Pending),
            })
            .collect();

        debug!("FrameCache created: {} slots from '{}'", slots.len(), pattern.template());

        Self {
            pattern,
            slots: Arc::new(slots),
            epoch: Arc::new(AtomicU64::new(0)),
            stats: Arc::new(CacheStats::default()),
        }
    }

    pub fn pattern(&self) -> &FramePattern {
        &self.pattern
    }

    pub fn frame_count(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Epoch counter to share with the worker pool
    pub fn epoch_ref(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.epoch)
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Queue background decode of every pending frame. Never blocks.
    pub fn preload(&self, workers: &Workers) -> usize {
        let epoch = self.epoch();
        let mut queued = 0;
        for slot_idx in 0..self.slots.len() {
            if !self.slots[slot_idx].try_claim() {
                continue;
            }
            let slots = Arc::clone(&self.slots);
            workers.execute_with_epoch(epoch, move || slots[slot_idx].decode());
            queued += 1;
        }
        info!("FrameCache: queued {} frames for decode (epoch {})", queued, epoch);
        queued
    }

    /// Drop queued decodes (scene teardown). Loading slots fall back to Pending.
    pub fn cancel_pending(&self) {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let mut reset = 0;
        for slot in self.slots.iter() {
            let mut state = slot.state.lock().unwrap_or_else(|e| e.into_inner());
            if matches!(*state, SlotState::Loading) {
                *state = SlotState::Pending;
                reset += 1;
            }
        }
        debug!("FrameCache: cancelled {} in-flight decodes (epoch -> {})", reset, epoch);
    }

    /// Decoded asset, or None if out of range / not ready.
    pub fn get(&self, index: FrameIndex) -> Option<FrameAsset> {
        let slot = self.slots.get(index.slot())?;
        let state = slot.state.lock().unwrap_or_else(|e| e.into_inner());
        match &*state {
            SlotState::Ready(asset) => {
                self.stats.record_hit();
                Some(asset.clone())
            }
            _ => {
                self.stats.record_miss();
                trace!("FrameCache: frame {} not ready ({:?})", index, state.status());
                None
            }
        }
    }

    pub fn status(&self, index: FrameIndex) -> Option<FrameStatus> {
        let slot = self.slots.get(index.slot())?;
        let state = slot.state.lock().unwrap_or_else(|e| e.into_inner());
        Some(state.status())
    }

    /// Store an already decoded image (generated frames, tests).
    pub fn insert(&self, index: FrameIndex, image: RgbaImage) -> bool {
        let Some(slot) = self.slots.get(index.slot()) else {
            return false;
        };
        *slot.state.lock().unwrap_or_else(|e| e.into_inner()) =
            SlotState::Ready(FrameAsset::new(index, image));
        true
    }

    pub fn counts(&self) -> CacheCounts {
        let mut counts = CacheCounts::default();
        for slot in self.slots.iter() {
            match slot.state.lock().unwrap_or_else(|e| e.into_inner()).status() {
                FrameStatus::Pending => counts.pending += 1,
                FrameStatus::Loading => counts.loading += 1,
                FrameStatus::Ready => counts.ready += 1,
                FrameStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub fn all_ready(&self) -> bool {
        self.counts().ready == self.slots.len()
    }

    /// Block until nothing is in flight or `timeout` passes. Returns the final counts.
    ///
    /// For headless tools only; interactive code polls `counts()` instead.
    pub fn wait_settled(&self, timeout: Duration) -> CacheCounts {
        let deadline = Instant::now() + timeout;
        loop {
            let counts = self.counts();
            if counts.loading == 0 || Instant::now() >= deadline {
                return counts;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}
