//! Audio context, device lifetime and listener state

use crate::backend::{
    AudioBackend, ContextHandle, CpalBackend, DEVICE_EXTENSION_PREFIX, DeviceHandle, format,
};
use crate::config::AudioContextDesc;
use crate::error::Result;
use crate::math::{Orientation, Pose, Vec3};
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Snapshot of the listener: the virtual "ear" used for 3D spatialization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListenerState {
    /// Global volume in the 0..=100 range
    pub volume: f32,
    pub position: Vec3,
    pub direction: Vec3,
    pub up_vector: Vec3,
}

impl ListenerState {
    pub fn orientation(&self) -> Orientation {
        Orientation::new(self.direction, self.up_vector)
    }
}

impl Default for ListenerState {
    fn default() -> Self {
        Self {
            volume: 100.0,
            position: Vec3::ZERO,
            direction: Vec3::NEG_Z,
            up_vector: Vec3::Y,
        }
    }
}

impl From<&AudioContextDesc> for ListenerState {
    fn from(desc: &AudioContextDesc) -> Self {
        Self {
            volume: desc.volume,
            position: desc.position,
            direction: desc.direction,
            up_vector: desc.up_vector,
        }
    }
}

struct DeviceState {
    device: Option<DeviceHandle>,
    context: Option<ContextHandle>,
    /// Last requested values, kept whether or not a context exists
    listener: ListenerState,
}

struct ContextShared {
    backend: Arc<dyn AudioBackend>,
    device_name: Option<String>,
    state: Mutex<DeviceState>,
    /// Weak back-reference to the device shared by all live resources
    device_slot: Mutex<Weak<AudioDevice>>,
    next_epoch: AtomicU64,
}

/// Entry point to the audio backend and owner of the listener state.
///
/// An `AudioContext` is created once by the application and handed to whatever needs the
/// backend. Cloning is cheap and every clone refers to the same state.
///
/// The backend itself is opened lazily: the first [`AudioResource`](crate::AudioResource)
/// (or [`acquire_device`](Self::acquire_device) call) opens an [`AudioDevice`], later ones
/// share it, and it closes when the last holder drops it. Listener values can be set at any
/// time; without an active device they are cached and applied when one opens.
///
/// # Example
///
/// ```no_run
/// use petalsonic_audio::{AudioContext, AudioContextDesc, AudioResource};
/// use petalsonic_audio::math::Vec3;
///
/// let context = AudioContext::new(AudioContextDesc::default())?;
/// context.set_position(Vec3::new(1.0, 2.0, 3.0));
///
/// // Opens the backend and applies the cached position.
/// let resource = AudioResource::new(&context);
/// println!("backend active: {}", resource.device().is_active());
/// # Ok::<(), petalsonic_audio::PetalSonicError>(())
/// ```
#[derive(Clone)]
pub struct AudioContext {
    shared: Arc<ContextShared>,
}

impl AudioContext {
    /// Creates a context over the default `cpal` host.
    pub fn new(desc: AudioContextDesc) -> Result<Self> {
        Self::with_backend(desc, Arc::new(CpalBackend::new()))
    }

    /// Creates a context over a custom backend.
    pub fn with_backend(desc: AudioContextDesc, backend: Arc<dyn AudioBackend>) -> Result<Self> {
        desc.validate()?;

        Ok(Self {
            shared: Arc::new(ContextShared {
                backend,
                device_name: desc.device_name.clone(),
                state: Mutex::new(DeviceState {
                    device: None,
                    context: None,
                    listener: ListenerState::from(&desc),
                }),
                device_slot: Mutex::new(Weak::new()),
                next_epoch: AtomicU64::new(0),
            }),
        })
    }

    pub fn backend(&self) -> &Arc<dyn AudioBackend> {
        &self.shared.backend
    }

    /// Returns the live device, opening a new one if none is held.
    pub fn acquire_device(&self) -> Arc<AudioDevice> {
        let mut slot = self.shared.device_slot.lock();
        if let Some(device) = slot.upgrade() {
            return device;
        }

        let device = Arc::new(AudioDevice::open(Arc::clone(&self.shared)));
        *slot = Arc::downgrade(&device);
        device
    }

    /// The device currently shared by resources, if any.
    pub fn live_device(&self) -> Option<Arc<AudioDevice>> {
        self.shared.device_slot.lock().upgrade()
    }

    /// True while a backend context is current and receiving listener updates.
    pub fn is_backend_active(&self) -> bool {
        self.shared.state.lock().context.is_some()
    }

    /// Opens a throwaway device when none is open, so capability queries have a backend.
    ///
    /// The caller holds the device slot for as long as the temporary device lives, so no
    /// shared device can open underneath it.
    fn ensure_backend(&self, _slot: &MutexGuard<'_, Weak<AudioDevice>>) -> Option<AudioDevice> {
        let needs_device = self.shared.state.lock().device.is_none();
        needs_device.then(|| AudioDevice::open(Arc::clone(&self.shared)))
    }

    /// Checks whether the backend supports an extension.
    ///
    /// Names starting with `ALC` are looked up on the device, others on the API.
    pub fn is_extension_supported(&self, name: &str) -> bool {
        let slot = self.shared.device_slot.lock();
        let _temporary = self.ensure_backend(&slot);
        let backend = &self.shared.backend;

        if name.starts_with(DEVICE_EXTENSION_PREFIX) {
            match self.shared.state.lock().device {
                Some(device) => backend.is_device_extension_present(device, name),
                None => false,
            }
        } else {
            backend.is_extension_present(name)
        }
    }

    /// Sample format enumerator for 16-bit audio with `channel_count` channels.
    ///
    /// Returns 0 when the channel count has no format or the backend does not support it.
    pub fn format_from_channel_count(&self, channel_count: u32) -> i32 {
        let slot = self.shared.device_slot.lock();
        let _temporary = self.ensure_backend(&slot);
        let backend = &self.shared.backend;

        let format = match channel_count {
            1 => format::FORMAT_MONO16,
            2 => format::FORMAT_STEREO16,
            4 => backend.enum_value(format::QUAD16),
            6 => backend.enum_value(format::CHN51_16),
            7 => backend.enum_value(format::CHN61_16),
            8 => backend.enum_value(format::CHN71_16),
            _ => 0,
        };

        // Some backends report -1 instead of 0 for unsupported formats.
        if format == -1 { 0 } else { format }
    }

    /// Sets the global volume (0..=100). The backend receives it scaled to a 0..=1 gain.
    pub fn set_global_volume(&self, volume: f32) {
        let mut state = self.shared.state.lock();
        if state.context.is_some() {
            self.shared.backend.set_listener_gain(volume * 0.01);
        }
        state.listener.volume = volume;
    }

    pub fn global_volume(&self) -> f32 {
        self.shared.state.lock().listener.volume
    }

    pub fn set_position(&self, position: Vec3) {
        let mut state = self.shared.state.lock();
        if state.context.is_some() {
            self.shared.backend.set_listener_position(position);
        }
        state.listener.position = position;
    }

    pub fn position(&self) -> Vec3 {
        self.shared.state.lock().listener.position
    }

    /// Sets the forward direction; the backend receives it together with the up vector.
    pub fn set_direction(&self, direction: Vec3) {
        let mut state = self.shared.state.lock();
        if state.context.is_some() {
            let orientation = Orientation::new(direction, state.listener.up_vector);
            self.shared
                .backend
                .set_listener_orientation(orientation.to_array());
        }
        state.listener.direction = direction;
    }

    pub fn direction(&self) -> Vec3 {
        self.shared.state.lock().listener.direction
    }

    /// Sets the up vector; the backend receives it together with the direction.
    pub fn set_up_vector(&self, up_vector: Vec3) {
        let mut state = self.shared.state.lock();
        if state.context.is_some() {
            let orientation = Orientation::new(state.listener.direction, up_vector);
            self.shared
                .backend
                .set_listener_orientation(orientation.to_array());
        }
        state.listener.up_vector = up_vector;
    }

    pub fn up_vector(&self) -> Vec3 {
        self.shared.state.lock().listener.up_vector
    }

    /// Sets position, direction and up vector from a pose in one step.
    pub fn set_pose(&self, pose: Pose) {
        let orientation = pose.orientation();
        let mut state = self.shared.state.lock();
        if state.context.is_some() {
            self.shared.backend.set_listener_position(pose.position);
            self.shared
                .backend
                .set_listener_orientation(orientation.to_array());
        }
        state.listener.position = pose.position;
        state.listener.direction = orientation.direction;
        state.listener.up_vector = orientation.up;
    }

    pub fn listener(&self) -> ListenerState {
        self.shared.state.lock().listener
    }
}

/// An open connection to the audio backend.
///
/// Opening never fails outright: if the device or its context cannot be created the error is
/// logged and the device stays inert, leaving the listener in cache-only mode. Dropping the
/// device detaches its context if it is still current, destroys it and closes the device.
pub struct AudioDevice {
    shared: Arc<ContextShared>,
    device: Option<DeviceHandle>,
    context: Option<ContextHandle>,
    epoch: u64,
}

impl AudioDevice {
    fn open(shared: Arc<ContextShared>) -> Self {
        let epoch = shared.next_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let backend = Arc::clone(&shared.backend);
        let mut state = shared.state.lock();

        let device = backend.open_device(shared.device_name.as_deref());
        let context = match device {
            Some(device) => {
                let context = backend.create_context(device);
                match context {
                    Some(context) => {
                        backend.make_context_current(Some(context));

                        // Apply the listener properties set before the backend existed
                        let listener = state.listener;
                        backend.set_listener_gain(listener.volume * 0.01);
                        backend.set_listener_position(listener.position);
                        backend.set_listener_orientation(listener.orientation().to_array());
                    }
                    None => log::error!("Failed to create the audio context"),
                }
                context
            }
            None => {
                log::error!("Failed to open the audio device");
                None
            }
        };

        state.device = device;
        state.context = context;
        drop(state);

        log::debug!(
            "Audio device #{} opened (device: {:?}, context: {:?})",
            epoch,
            device,
            context
        );

        Self {
            shared,
            device,
            context,
            epoch,
        }
    }

    /// Sequence number of this device within its context, starting at 1.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// True if both the device and its context were created.
    pub fn is_active(&self) -> bool {
        self.context.is_some()
    }

    pub fn device_handle(&self) -> Option<DeviceHandle> {
        self.device
    }

    pub fn context_handle(&self) -> Option<ContextHandle> {
        self.context
    }
}

impl Drop for AudioDevice {
    fn drop(&mut self) {
        let backend = &self.shared.backend;
        let mut state = self.shared.state.lock();

        // Leave a context opened by a newer device alone
        if state.context == self.context {
            backend.make_context_current(None);
        }
        if let Some(context) = self.context {
            backend.destroy_context(context);
        }
        if let Some(device) = self.device {
            backend.close_device(device);
        }

        if self.device.is_some() && state.device == self.device {
            state.device = None;
            state.context = None;
        }

        log::debug!("Audio device #{} closed", self.epoch);
    }
}
