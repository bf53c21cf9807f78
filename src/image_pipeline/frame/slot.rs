//! Single-use completion cell shared by a frame and its producer.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Condvar, MappedMutexGuard, Mutex, MutexGuard};

use crate::image_pipeline::frame::types::{FrameFailure, FrameOutput};

/// Borrowed view of a frame's encoded bytes
pub type FrameBytes<'a> = MappedMutexGuard<'a, [u8]>;

#[derive(Default)]
struct SlotState {
    completed: bool,
    bytes: Vec<u8>,
    photometric: String,
    failure: Option<FrameFailure>,
}

/// Handoff between one producer and one consumer.
///
/// The producer calls [`FrameSlot::complete`] once. Consumers either poll
/// [`FrameSlot::is_done`] or block in [`FrameSlot::wait`] until the condvar fires.
#[derive(Default)]
pub struct FrameSlot {
    done: AtomicBool,
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the producer's result and wakes waiters.
    ///
    /// Returns false, leaving the slot untouched, if it was already completed.
    pub fn complete(&self, result: Result<FrameOutput, FrameFailure>) -> bool {
        let mut state = self.state.lock();
        if state.completed {
            return false;
        }
        match result {
            Ok(output) => {
                state.bytes = output.bytes;
                state.photometric = output.photometric;
            }
            Err(failure) => state.failure = Some(failure),
        }
        state.completed = true;
        // published after the buffer write
        self.done.store(true, Ordering::Release);
        drop(state);
        self.ready.notify_all();
        true
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Blocks until the producer completed the slot. No timeout.
    pub fn wait(&self) -> Result<(), FrameFailure> {
        let mut state = self.state.lock();
        while !state.completed {
            self.ready.wait(&mut state);
        }
        match &state.failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        }
    }

    pub fn bytes(&self) -> FrameBytes<'_> {
        MutexGuard::map(self.state.lock(), |state| state.bytes.as_mut_slice())
    }

    pub fn len(&self) -> usize {
        self.state.lock().bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn photometric(&self) -> String {
        self.state.lock().photometric.clone()
    }

    /// Frees the stored bytes. Safe to call repeatedly.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.bytes = Vec::new();
    }
}
