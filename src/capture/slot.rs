//! Process-wide hardware slot: at most one live capture handle at a time.
//!
//! A session reserves the slot before it asks the provider for hardware and
//! keeps the `SlotGuard` for as long as it streams. Dropping the guard frees
//! the slot, so every exit path (close, drop, cancellation, panic unwind)
//! releases it.

use std::sync::{Arc, Mutex, OnceLock};

use serde::Serialize;
use uuid::Uuid;

/// Snapshot of the handle currently holding the slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveCapture {
    pub handle_id: Uuid,
    /// Filled in once the provider reports which device it granted.
    pub device_id: Option<String>,
    /// ISO 8601.
    pub acquired_at: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SlotError {
    #[error("Another capture handle is active")]
    Busy,
    #[error("Internal lock error")]
    LockPoisoned,
}

/// Exclusive capture slot.
pub struct HardwareSlot {
    holder: Mutex<Option<ActiveCapture>>,
}

static GLOBAL_SLOT: OnceLock<Arc<HardwareSlot>> = OnceLock::new();

impl HardwareSlot {
    pub fn new() -> Self {
        Self {
            holder: Mutex::new(None),
        }
    }

    /// The slot shared by every session in this process.
    pub fn global() -> Arc<HardwareSlot> {
        Arc::clone(GLOBAL_SLOT.get_or_init(|| Arc::new(HardwareSlot::new())))
    }

    /// Reserve the slot without blocking. Fails with `Busy` while another
    /// guard is alive.
    pub fn try_acquire(self: &Arc<Self>, handle_id: Uuid) -> Result<SlotGuard, SlotError> {
        let mut holder = self.holder.lock().map_err(|_| SlotError::LockPoisoned)?;
        if let Some(current) = holder.as_ref() {
            tracing::debug!(held_by = %current.handle_id, "Hardware slot busy");
            return Err(SlotError::Busy);
        }
        *holder = Some(ActiveCapture {
            handle_id,
            device_id: None,
            acquired_at: chrono::Utc::now().to_rfc3339(),
        });
        Ok(SlotGuard {
            slot: Arc::clone(self),
            handle_id,
        })
    }

    /// Number of live handles: 0 or 1.
    pub fn active_handles(&self) -> usize {
        self.holder
            .lock()
            .map(|h| usize::from(h.is_some()))
            .unwrap_or(0)
    }

    pub fn current(&self) -> Option<ActiveCapture> {
        self.holder.lock().ok()?.clone()
    }

    fn release(&self, handle_id: Uuid) {
        if let Ok(mut holder) = self.holder.lock() {
            if holder.as_ref().is_some_and(|c| c.handle_id == handle_id) {
                *holder = None;
                tracing::debug!(handle = %handle_id, "Hardware slot released");
            }
        }
    }

    fn bind_device(&self, handle_id: Uuid, device_id: &str) {
        if let Ok(mut holder) = self.holder.lock() {
            if let Some(current) = holder.as_mut().filter(|c| c.handle_id == handle_id) {
                current.device_id = Some(device_id.to_string());
            }
        }
    }
}

impl Default for HardwareSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII reservation of the hardware slot.
pub struct SlotGuard {
    slot: Arc<HardwareSlot>,
    handle_id: Uuid,
}

impl SlotGuard {
    pub fn handle_id(&self) -> Uuid {
        self.handle_id
    }

    /// Record which device the provider granted.
    pub fn bind_device(&self, device_id: &str) {
        self.slot.bind_device(self.handle_id, device_id);
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.slot.release(self.handle_id);
    }
}
