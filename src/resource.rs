use crate::device::{AudioContext, AudioDevice};
use std::sync::Arc;

/// Base for anything that needs the audio backend alive.
///
/// Holding an `AudioResource` keeps the shared [`AudioDevice`] open. The first resource
/// created on a context opens the device; the last one dropped closes it.
#[derive(Clone)]
pub struct AudioResource {
    device: Arc<AudioDevice>,
}

impl AudioResource {
    pub fn new(context: &AudioContext) -> Self {
        Self {
            device: context.acquire_device(),
        }
    }

    pub fn device(&self) -> &Arc<AudioDevice> {
        &self.device
    }
}

impl std::fmt::Debug for AudioResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioResource")
            .field("epoch", &self.device.epoch())
            .field("active", &self.device.is_active())
            .finish()
    }
}
