// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Stream slot accounting.
//!
//! HomeKit limits how many streams a camera serves at once. Each camera owns a
//! fixed table of slots; a slot is taken when a controller negotiates a session
//! and must be released exactly once when that session stops or its transcoder
//! dies. A slot that is never released permanently lowers the camera's capacity.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{HapCamError, Result};

/// Shared, clonable slot table for one camera.
#[derive(Debug, Clone)]
pub struct StreamSlots {
    in_use: Arc<Mutex<Vec<bool>>>,
}

impl StreamSlots {
    pub fn new(capacity: usize) -> Self {
        Self { in_use: Arc::new(Mutex::new(vec![false; capacity])) }
    }

    fn table(&self) -> MutexGuard<'_, Vec<bool>> {
        // The table holds plain flags, so a poisoned lock still has consistent data.
        self.in_use.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.table().len()
    }

    /// Takes the lowest free slot.
    ///
    /// # Errors
    ///
    /// Returns `HapCamError::SlotUnavailable` when every slot is in use.
    pub fn acquire(&self) -> Result<usize> {
        let mut table = self.table();
        let capacity = table.len();
        let idx = table.iter().position(|used| !used).ok_or_else(|| {
            HapCamError::SlotUnavailable(format!("all {capacity} stream slots in use"))
        })?;
        table[idx] = true;
        tracing::debug!(stream_idx = idx, "Stream slot acquired");
        Ok(idx)
    }

    /// Marks a specific slot as taken (the controller chose the index).
    ///
    /// # Errors
    ///
    /// Returns `HapCamError::SlotUnavailable` if the index is out of range or already taken.
    pub fn claim(&self, idx: usize) -> Result<()> {
        let mut table = self.table();
        match table.get_mut(idx) {
            Some(used) if !*used => {
                *used = true;
                Ok(())
            },
            Some(_) => Err(HapCamError::SlotUnavailable(format!("stream slot {idx} already in use"))),
            None => Err(HapCamError::SlotUnavailable(format!("stream slot {idx} out of range"))),
        }
    }

    /// Frees a slot. Returns `true` only if the slot was in use.
    pub fn release(&self, idx: usize) -> bool {
        let mut table = self.table();
        match table.get_mut(idx) {
            Some(used) if *used => {
                *used = false;
                tracing::debug!(stream_idx = idx, "Stream slot released");
                true
            },
            _ => false,
        }
    }

    pub fn is_available(&self, idx: usize) -> bool {
        self.table().get(idx).is_some_and(|used| !used)
    }

    pub fn in_use(&self) -> usize {
        self.table().iter().filter(|used| **used).count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_until_exhausted() {
        let slots = StreamSlots::new(2);
        assert_eq!(slots.acquire().unwrap(), 0);
        assert_eq!(slots.acquire().unwrap(), 1);
        assert!(matches!(slots.acquire(), Err(HapCamError::SlotUnavailable(_))));
        assert_eq!(slots.in_use(), 2);
    }

    #[test]
    fn test_release_is_single_shot() {
        let slots = StreamSlots::new(1);
        let idx = slots.acquire().unwrap();
        assert!(slots.release(idx));
        assert!(!slots.release(idx));
        assert!(slots.is_available(idx));
        assert_eq!(slots.acquire().unwrap(), idx);
    }

    #[test]
    fn test_claim_specific_slot() {
        let slots = StreamSlots::new(3);
        slots.claim(2).unwrap();
        assert!(!slots.is_available(2));
        assert!(slots.claim(2).is_err());
        assert!(slots.claim(7).is_err());
        assert_eq!(slots.acquire().unwrap(), 0);
    }
}
