use crate::backend::{AudioBackend, ContextHandle, DeviceHandle, format};
use crate::math::{Orientation, Vec3};
use cpal::traits::{DeviceTrait, HostTrait};
use parking_lot::Mutex;
use std::collections::HashMap;

const ENUMERATION_EXT: &str = "ALC_ENUMERATION_EXT";
const FLOAT32_EXT: &str = "AL_EXT_FLOAT32";
const MCFORMATS_EXT: &str = "AL_EXT_MCFORMATS";

/// Listener parameters held by a context, as last set through the backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListenerParams {
    /// Linear gain (1.0 = unity)
    pub gain: f32,
    pub position: Vec3,
    pub orientation: Orientation,
}

impl Default for ListenerParams {
    fn default() -> Self {
        Self {
            gain: 1.0,
            position: Vec3::ZERO,
            orientation: Orientation::default(),
        }
    }
}

#[derive(Debug)]
struct OpenDevice {
    name: String,
    max_channels: u16,
}

#[derive(Debug)]
struct ContextRecord {
    device: DeviceHandle,
    listener: ListenerParams,
}

#[derive(Debug, Default)]
struct BackendState {
    next_id: u64,
    devices: HashMap<DeviceHandle, OpenDevice>,
    contexts: HashMap<ContextHandle, ContextRecord>,
    current: Option<ContextHandle>,
}

impl BackendState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Channel capacity of the current context's device, or of any open device.
    fn max_channels(&self) -> u16 {
        let current_device = self
            .current
            .and_then(|context| self.contexts.get(&context))
            .and_then(|record| self.devices.get(&record.device));

        match current_device {
            Some(device) => device.max_channels,
            None => self
                .devices
                .values()
                .map(|device| device.max_channels)
                .max()
                .unwrap_or(0),
        }
    }

    fn current_listener(&mut self) -> Option<&mut ListenerParams> {
        let current = self.current?;
        self.contexts
            .get_mut(&current)
            .map(|record| &mut record.listener)
    }
}

/// Backend over the default `cpal` host.
///
/// Devices are resolved through cpal; a context is a software listener record that a
/// renderer reads with [`current_listener`](Self::current_listener) when spatializing.
pub struct CpalBackend {
    state: Mutex<BackendState>,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BackendState::default()),
        }
    }

    /// Names of the output devices the default host exposes.
    pub fn output_device_names() -> Vec<String> {
        let host = cpal::default_host();
        match host.output_devices() {
            Ok(devices) => devices.filter_map(|device| device.name().ok()).collect(),
            Err(e) => {
                log::error!("Failed to enumerate output devices: {}", e);
                Vec::new()
            }
        }
    }

    /// Name of an open device.
    pub fn device_name(&self, device: DeviceHandle) -> Option<String> {
        self.state
            .lock()
            .devices
            .get(&device)
            .map(|open| open.name.clone())
    }

    /// Listener parameters of the current context.
    pub fn current_listener(&self) -> Option<ListenerParams> {
        self.state.lock().current_listener().copied()
    }

    fn register_device(&self, name: String, max_channels: u16) -> DeviceHandle {
        let mut state = self.state.lock();
        let handle = DeviceHandle(state.next_id());
        state.devices.insert(handle, OpenDevice { name, max_channels });
        handle
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn max_output_channels(device: &cpal::Device) -> u16 {
    let supported = device
        .supported_output_configs()
        .ok()
        .and_then(|configs| configs.map(|config| config.channels()).max());

    match supported {
        Some(channels) => channels,
        None => device
            .default_output_config()
            .map(|config| config.channels())
            .unwrap_or(0),
    }
}

impl AudioBackend for CpalBackend {
    fn open_device(&self, name: Option<&str>) -> Option<DeviceHandle> {
        let host = cpal::default_host();

        let device = match name {
            Some(name) => host.output_devices().ok()?.find(|device| {
                device
                    .name()
                    .map(|device_name| device_name == name)
                    .unwrap_or(false)
            }),
            None => host.default_output_device(),
        }?;

        let device_name = device
            .name()
            .unwrap_or_else(|_| "Unknown Device".to_string());
        let max_channels = max_output_channels(&device);
        log::debug!(
            "Opened output device \"{}\" on {:?} ({} channels max)",
            device_name,
            host.id(),
            max_channels
        );

        Some(self.register_device(device_name, max_channels))
    }

    fn close_device(&self, device: DeviceHandle) {
        let mut state = self.state.lock();
        state.contexts.retain(|_, record| record.device != device);
        if let Some(current) = state.current {
            if !state.contexts.contains_key(&current) {
                state.current = None;
            }
        }
        state.devices.remove(&device);
    }

    fn create_context(&self, device: DeviceHandle) -> Option<ContextHandle> {
        let mut state = self.state.lock();
        if !state.devices.contains_key(&device) {
            return None;
        }

        let handle = ContextHandle(state.next_id());
        state.contexts.insert(
            handle,
            ContextRecord {
                device,
                listener: ListenerParams::default(),
            },
        );
        Some(handle)
    }

    fn destroy_context(&self, context: ContextHandle) {
        let mut state = self.state.lock();
        state.contexts.remove(&context);
        if state.current == Some(context) {
            state.current = None;
        }
    }

    fn make_context_current(&self, context: Option<ContextHandle>) -> bool {
        let mut state = self.state.lock();
        match context {
            Some(handle) if !state.contexts.contains_key(&handle) => false,
            _ => {
                state.current = context;
                true
            }
        }
    }

    fn set_listener_gain(&self, gain: f32) {
        if let Some(listener) = self.state.lock().current_listener() {
            listener.gain = gain;
        }
    }

    fn set_listener_position(&self, position: Vec3) {
        if let Some(listener) = self.state.lock().current_listener() {
            listener.position = position;
        }
    }

    fn set_listener_orientation(&self, orientation: [f32; 6]) {
        if let Some(listener) = self.state.lock().current_listener() {
            listener.orientation = Orientation::new(
                Vec3::new(orientation[0], orientation[1], orientation[2]),
                Vec3::new(orientation[3], orientation[4], orientation[5]),
            );
        }
    }

    fn is_device_extension_present(&self, device: DeviceHandle, name: &str) -> bool {
        self.state.lock().devices.contains_key(&device) && name == ENUMERATION_EXT
    }

    fn is_extension_present(&self, name: &str) -> bool {
        match name {
            FLOAT32_EXT => true,
            MCFORMATS_EXT => self.state.lock().max_channels() > 2,
            _ => false,
        }
    }

    fn enum_value(&self, name: &str) -> i32 {
        if name == "AL_FORMAT_MONO16" {
            return format::FORMAT_MONO16;
        }
        if name == "AL_FORMAT_STEREO16" {
            return format::FORMAT_STEREO16;
        }

        let Some(required) = format::channels_for_name(name) else {
            return 0;
        };

        if self.state.lock().max_channels() < required {
            return -1;
        }

        match name {
            format::QUAD16 => format::QUAD16_VALUE,
            format::CHN51_16 => format::CHN51_16_VALUE,
            format::CHN61_16 => format::CHN61_16_VALUE,
            _ => format::CHN71_16_VALUE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_calls_need_a_current_context() {
        let backend = CpalBackend::new();
        backend.set_listener_gain(0.5);
        assert!(backend.current_listener().is_none());

        let device = backend.register_device("Test Output".to_string(), 2);
        let context = backend.create_context(device).unwrap();
        assert!(backend.make_context_current(Some(context)));

        backend.set_listener_gain(0.5);
        backend.set_listener_position(Vec3::new(1.0, 2.0, 3.0));
        backend.set_listener_orientation([1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);

        let listener = backend.current_listener().unwrap();
        assert_eq!(listener.gain, 0.5);
        assert_eq!(listener.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(listener.orientation.direction, Vec3::X);
        assert_eq!(listener.orientation.up, Vec3::Z);
    }

    #[test]
    fn test_context_lifecycle() {
        let backend = CpalBackend::new();
        assert!(backend.create_context(DeviceHandle(99)).is_none());
        assert!(!backend.make_context_current(Some(ContextHandle(99))));
        assert!(backend.make_context_current(None));

        let device = backend.register_device("Test Output".to_string(), 2);
        assert_eq!(backend.device_name(device).as_deref(), Some("Test Output"));

        let context = backend.create_context(device).unwrap();
        backend.make_context_current(Some(context));
        backend.destroy_context(context);
        assert!(backend.current_listener().is_none());

        backend.close_device(device);
        assert!(backend.device_name(device).is_none());
    }

    #[test]
    fn test_multichannel_formats_follow_device_capacity() {
        let backend = CpalBackend::new();
        assert_eq!(backend.enum_value("AL_FORMAT_MONO16"), format::FORMAT_MONO16);
        assert_eq!(backend.enum_value("AL_FORMAT_STEREO16"), format::FORMAT_STEREO16);
        assert_eq!(backend.enum_value("AL_FORMAT_BOGUS"), 0);

        let stereo = backend.register_device("Stereo".to_string(), 2);
        let context = backend.create_context(stereo).unwrap();
        backend.make_context_current(Some(context));
        assert_eq!(backend.enum_value(format::CHN51_16), -1);
        assert!(!backend.is_extension_present(MCFORMATS_EXT));

        let surround = backend.register_device("Surround".to_string(), 8);
        let context = backend.create_context(surround).unwrap();
        backend.make_context_current(Some(context));
        assert_eq!(backend.enum_value(format::QUAD16), format::QUAD16_VALUE);
        assert_eq!(backend.enum_value(format::CHN71_16), format::CHN71_16_VALUE);
        assert!(backend.is_extension_present(MCFORMATS_EXT));
    }

    #[test]
    fn test_extension_queries() {
        let backend = CpalBackend::new();
        let device = backend.register_device("Test Output".to_string(), 2);

        assert!(backend.is_device_extension_present(device, ENUMERATION_EXT));
        assert!(!backend.is_device_extension_present(device, "ALC_EXT_EFX"));
        assert!(!backend.is_device_extension_present(DeviceHandle(1234), ENUMERATION_EXT));
        assert!(backend.is_extension_present(FLOAT32_EXT));
        assert!(!backend.is_extension_present("AL_EXT_UNKNOWN"));
    }
}
