//! Bounded table of open file handles for one worker session.
//!
//! Handles are small integers in `[3, capacity)`; 0..=2 mirror stdio and are never handed
//! out. Allocation always returns the lowest free slot. A freed slot is reset to its zero
//! state before it can be reused. The table is not synchronized: one session owns it.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{GridError, GridResult};
use crate::resources::ServerHost;

pub const RESERVED_HANDLES: usize = 3;

/// Driver that owns the descriptor behind a handle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum DriverType {
    #[default]
    Unix,
    Tape,
    Object,
}

/// Contents of an allocated slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSlot {
    pub in_use: bool,
    pub host: Option<ServerHost>,
    pub file_name: Option<String>,
    pub driver: DriverType,
    pub fd: i32,
    pub mode: i32,
}

#[derive(Debug, Clone)]
pub struct HandleTable {
    slots: Vec<FileSlot>,
}

impl HandleTable {
    /// Create a table with `capacity` slots (including the reserved ones).
    pub fn new(capacity: usize) -> GridResult<Self> {
        if capacity <= RESERVED_HANDLES {
            return Err(GridError::input(format!("handle capacity {} leaves no usable slots", capacity)));
        }
        Ok(Self { slots: vec![FileSlot::default(); capacity] })
    }

    #[inline]
    pub fn capacity(&self) -> usize { self.slots.len() }

    pub fn in_use(&self) -> usize { self.slots.iter().filter(|s| s.in_use).count() }

    fn index(&self, handle: i32) -> Option<usize> {
        let idx = usize::try_from(handle).ok()?;
        (idx >= RESERVED_HANDLES && idx < self.slots.len()).then_some(idx)
    }

    /// Claim the lowest free slot.
    pub fn allocate(&mut self) -> GridResult<i32> {
        match self.slots.iter().skip(RESERVED_HANDLES).position(|s| !s.in_use) {
            Some(off) => {
                let idx = off + RESERVED_HANDLES;
                self.slots[idx].in_use = true;
                Ok(idx as i32)
            }
            None => {
                warn!(target: "gridvault::handles", "allocate: out of file handles (capacity {})", self.slots.len());
                Err(GridError::ResourceExhaustion { capacity: self.slots.len() })
            }
        }
    }

    /// Populate an allocated slot. The file name is copied into the slot.
    pub fn fill(&mut self, handle: i32, host: &ServerHost, file_name: &str, driver: DriverType, fd: i32, mode: i32) -> GridResult<()> {
        let idx = self.index(handle).ok_or_else(|| GridError::invalid_handle(handle, "out of range"))?;
        let slot = &mut self.slots[idx];
        if !slot.in_use {
            return Err(GridError::invalid_handle(handle, "not allocated"));
        }
        slot.host = Some(host.clone());
        slot.file_name = Some(file_name.to_string());
        slot.driver = driver;
        slot.fd = fd;
        slot.mode = mode;
        Ok(())
    }

    pub fn alloc_and_fill(&mut self, host: &ServerHost, file_name: &str, driver: DriverType, fd: i32, mode: i32) -> GridResult<i32> {
        let handle = self.allocate()?;
        self.fill(handle, host, file_name, driver, fd, mode)?;
        debug!(target: "gridvault::handles", "alloc_and_fill: handle={} file='{}' host={} fd={}", handle, file_name, host, fd);
        Ok(handle)
    }

    /// Release a slot and reset it. Other slots are untouched on error.
    pub fn free(&mut self, handle: i32) -> GridResult<()> {
        let Some(idx) = self.index(handle) else {
            warn!(target: "gridvault::handles", "free: handle {} out of range", handle);
            return Err(GridError::invalid_handle(handle, "out of range"));
        };
        if !self.slots[idx].in_use {
            warn!(target: "gridvault::handles", "free: handle {} not in use", handle);
            return Err(GridError::invalid_handle(handle, "not in use"));
        }
        self.slots[idx] = FileSlot::default();
        Ok(())
    }

    /// Host owning the descriptor, and whether that host is remote.
    pub fn host_of(&self, handle: i32) -> GridResult<(&ServerHost, bool)> {
        let Some(idx) = self.index(handle) else {
            warn!(target: "gridvault::handles", "host_of: bad handle value {}", handle);
            return Err(GridError::invalid_handle(handle, "out of range"));
        };
        let slot = &self.slots[idx];
        if !slot.in_use {
            warn!(target: "gridvault::handles", "host_of: handle {} not active", handle);
            return Err(GridError::invalid_handle(handle, "not active"));
        }
        let host = slot.host.as_ref().ok_or_else(|| GridError::invalid_handle(handle, "no host recorded"))?;
        Ok((host, host.is_remote()))
    }

    pub fn get(&self, handle: i32) -> Option<&FileSlot> {
        self.index(handle).map(|i| &self.slots[i]).filter(|s| s.in_use)
    }
}

#[cfg(test)]
#[path = "handles_tests.rs"]
mod handles_tests;
