//! Math types for PetalSonic audio

pub use glam::{Quat, Vec3};

/// Listener orientation as sent to the backend: a "forward" direction and an "up" vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    pub direction: Vec3,
    pub up: Vec3,
}

impl Orientation {
    pub fn new(direction: Vec3, up: Vec3) -> Self {
        Self { direction, up }
    }

    /// Flattens into the 6-float `[dx, dy, dz, ux, uy, uz]` payload.
    pub fn to_array(&self) -> [f32; 6] {
        [
            self.direction.x,
            self.direction.y,
            self.direction.z,
            self.up.x,
            self.up.y,
            self.up.z,
        ]
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Self {
            direction: Vec3::NEG_Z,
            up: Vec3::Y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * (-Vec3::Z)
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    pub fn orientation(&self) -> Orientation {
        Orientation::new(self.forward(), self.up())
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}
