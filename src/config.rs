//! Configuration for PetalSonic audio

use crate::error::{PetalSonicError, Result};
use crate::math::Vec3;

/// Configuration descriptor for an [`AudioContext`](crate::AudioContext).
///
/// The listener fields are the values the context starts with; they are applied to the
/// backend as soon as a device comes up.
#[derive(Debug, Clone)]
pub struct AudioContextDesc {
    /// Name of the output device to open (None opens the host's default device)
    pub device_name: Option<String>,
    /// Global volume in the 0..=100 range (values above 100 amplify)
    pub volume: f32,
    /// Listener position in world space
    pub position: Vec3,
    /// Listener forward direction
    pub direction: Vec3,
    /// Listener up vector
    pub up_vector: Vec3,
}

impl Default for AudioContextDesc {
    fn default() -> Self {
        Self {
            device_name: None,
            volume: 100.0,
            position: Vec3::ZERO,
            direction: Vec3::NEG_Z,
            up_vector: Vec3::Y,
        }
    }
}

impl AudioContextDesc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    pub fn volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn direction(mut self, direction: Vec3) -> Self {
        self.direction = direction;
        self
    }

    pub fn up_vector(mut self, up_vector: Vec3) -> Self {
        self.up_vector = up_vector;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(PetalSonicError::Configuration(format!(
                "Volume must be a finite, non-negative value (got {})",
                self.volume
            )));
        }

        for (name, vector) in [
            ("position", self.position),
            ("direction", self.direction),
            ("up vector", self.up_vector),
        ] {
            if !vector.is_finite() {
                return Err(PetalSonicError::Configuration(format!(
                    "Listener {} must be finite (got {})",
                    name, vector
                )));
            }
        }

        if self.direction == Vec3::ZERO || self.up_vector == Vec3::ZERO {
            return Err(PetalSonicError::Configuration(
                "Listener direction and up vector must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}
