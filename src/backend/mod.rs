//! Native audio backend boundary
//!
//! [`AudioBackend`] is the opaque capability the [`AudioDevice`](crate::AudioDevice) wraps:
//! opening and closing output devices, creating the rendering context that carries the
//! listener, and answering capability queries. Failures are reported through `None` and
//! `false` so callers can log them and carry on.

mod cpal_backend;

pub use cpal_backend::{CpalBackend, ListenerParams};

use crate::math::Vec3;

/// Opaque handle to an open output device.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub(crate) u64);

/// Opaque handle to a rendering context created on a device.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContextHandle(pub(crate) u64);

impl DeviceHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl ContextHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Sample format enumerators and the names used to resolve the multichannel ones.
pub mod format {
    /// Signed 16-bit mono
    pub const FORMAT_MONO16: i32 = 0x1101;
    /// Signed 16-bit stereo
    pub const FORMAT_STEREO16: i32 = 0x1103;

    pub const QUAD16: &str = "AL_FORMAT_QUAD16";
    pub const CHN51_16: &str = "AL_FORMAT_51CHN16";
    pub const CHN61_16: &str = "AL_FORMAT_61CHN16";
    pub const CHN71_16: &str = "AL_FORMAT_71CHN16";

    /// Values backends report for the named multichannel formats.
    pub const QUAD16_VALUE: i32 = 0x1205;
    pub const CHN51_16_VALUE: i32 = 0x120B;
    pub const CHN61_16_VALUE: i32 = 0x120E;
    pub const CHN71_16_VALUE: i32 = 0x1211;

    /// Channel count a named multichannel format needs, if the name is known.
    pub fn channels_for_name(name: &str) -> Option<u16> {
        match name {
            QUAD16 => Some(4),
            CHN51_16 => Some(6),
            CHN61_16 => Some(7),
            CHN71_16 => Some(8),
            _ => None,
        }
    }
}

/// Tag that marks device-level (rather than API-level) extension names.
pub const DEVICE_EXTENSION_PREFIX: &str = "ALC";

/// Trait for the native audio API behind the device and listener.
///
/// Listener calls apply to the context made current with
/// [`make_context_current`](Self::make_context_current) and are ignored when there is none.
pub trait AudioBackend: Send + Sync {
    /// Opens the output device called `name`, or the default one for `None`.
    fn open_device(&self, name: Option<&str>) -> Option<DeviceHandle>;

    fn close_device(&self, device: DeviceHandle);

    fn create_context(&self, device: DeviceHandle) -> Option<ContextHandle>;

    fn destroy_context(&self, context: ContextHandle);

    /// Makes `context` current, or detaches the current one for `None`.
    fn make_context_current(&self, context: Option<ContextHandle>) -> bool;

    /// Sets the listener gain, where 1.0 is unity.
    fn set_listener_gain(&self, gain: f32);

    fn set_listener_position(&self, position: Vec3);

    /// Sets direction and up vector together as `[dx, dy, dz, ux, uy, uz]`.
    fn set_listener_orientation(&self, orientation: [f32; 6]);

    fn is_device_extension_present(&self, device: DeviceHandle, name: &str) -> bool;

    fn is_extension_present(&self, name: &str) -> bool;

    /// Resolves a named enumerator. Unknown or unsupported names may yield 0 or -1.
    fn enum_value(&self, name: &str) -> i32;
}
