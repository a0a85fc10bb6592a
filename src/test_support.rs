//! Shared test doubles and fixtures

use crate::backend::{AudioBackend, ContextHandle, DeviceHandle, format};
use crate::error::{PetalSonicError, Result};
use crate::math::Vec3;
use crate::sound_file::{DecoderFactory, InputStream, SoundFileDecoder, SoundFileInfo};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// `n` samples counting up from zero.
pub fn ramp(n: usize) -> Vec<i16> {
    (0..n).map(|i| (i % i16::MAX as usize) as i16).collect()
}

/// 16-bit PCM WAV file containing `samples` (interleaved).
pub fn wav_bytes(channels: u16, sample_rate: u32, samples: &[i16]) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut bytes = Vec::new();
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec).unwrap();
        for &sample in samples {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }
    bytes
}

/// 16-bit PCM WAV with a `JUNK` chunk of `junk_len` bytes between `fmt ` and `data`.
pub fn wav_bytes_with_junk(
    channels: u16,
    sample_rate: u32,
    samples: &[i16],
    junk_len: u32,
) -> Vec<u8> {
    let junk_padded = junk_len + junk_len % 2;
    let data_len = samples.len() as u32 * 2;
    let block_align = channels * 2;

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(4 + 24 + 8 + junk_padded + 8 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");

    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
    bytes.extend_from_slice(&block_align.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());

    bytes.extend_from_slice(b"JUNK");
    bytes.extend_from_slice(&junk_len.to_le_bytes());
    bytes.resize(bytes.len() + junk_padded as usize, 0);

    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// A payload starting with `magic`, recognized by [`MagicFactory`].
pub fn magic_bytes(magic: &[u8]) -> Vec<u8> {
    let mut bytes = magic.to_vec();
    bytes.extend_from_slice(&[0xAB; 32]);
    bytes
}

fn starts_with_magic(stream: &mut dyn InputStream, magic: &[u8]) -> bool {
    let mut header = vec![0u8; magic.len()];
    stream.read_exact(&mut header).is_ok() && header == magic
}

/// Factory recognizing streams that start with a fixed magic string.
///
/// Its decoders synthesize `info.sample_count` samples whose values equal their offset,
/// unless [`produces`](Self::produces) says otherwise.
pub struct MagicFactory {
    name: &'static str,
    magic: &'static [u8],
    info: SoundFileInfo,
    produced: Option<u64>,
    fail_open: bool,
    pub created: Arc<AtomicUsize>,
    pub dropped: Arc<AtomicUsize>,
    /// Extension hint seen by each probe
    pub hints: Arc<Mutex<Vec<Option<String>>>>,
}

impl MagicFactory {
    pub fn new(name: &'static str, magic: &'static [u8]) -> Self {
        Self {
            name,
            magic,
            info: SoundFileInfo::default(),
            produced: None,
            fail_open: false,
            created: Arc::new(AtomicUsize::new(0)),
            dropped: Arc::new(AtomicUsize::new(0)),
            hints: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn info(mut self, sample_count: u64, channel_count: u32, sample_rate: u32) -> Self {
        self.info = SoundFileInfo {
            sample_count,
            channel_count,
            sample_rate,
        };
        self
    }

    /// Decoders yield `sample_count` samples regardless of the reported info.
    pub fn produces(mut self, sample_count: u64) -> Self {
        self.produced = Some(sample_count);
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }
}

impl DecoderFactory for MagicFactory {
    fn name(&self) -> &str {
        self.name
    }

    fn check(&self, stream: &mut dyn InputStream) -> bool {
        starts_with_magic(stream, self.magic)
    }

    fn check_with_hint(&self, stream: &mut dyn InputStream, extension: Option<&str>) -> bool {
        self.hints.lock().push(extension.map(str::to_string));
        self.check(stream)
    }

    fn create(&self) -> Box<dyn SoundFileDecoder> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Box::new(MagicDecoder {
            magic: self.magic,
            info: self.info,
            available: self.produced.unwrap_or(self.info.sample_count),
            fail_open: self.fail_open,
            position: 0,
            dropped: Arc::clone(&self.dropped),
        })
    }
}

struct MagicDecoder {
    magic: &'static [u8],
    info: SoundFileInfo,
    available: u64,
    fail_open: bool,
    position: u64,
    dropped: Arc<AtomicUsize>,
}

impl SoundFileDecoder for MagicDecoder {
    fn open(&mut self, stream: &mut dyn InputStream) -> Result<SoundFileInfo> {
        if !starts_with_magic(stream, self.magic) {
            return Err(PetalSonicError::AudioFormat(
                "stream not positioned at the magic header".to_string(),
            ));
        }
        if self.fail_open {
            return Err(PetalSonicError::AudioFormat("scripted failure".to_string()));
        }
        Ok(self.info)
    }

    fn read(&mut self, _stream: &mut dyn InputStream, samples: &mut [i16]) -> u64 {
        let remaining = self.available.saturating_sub(self.position);
        let count = remaining.min(samples.len() as u64);
        for (i, sample) in samples[..count as usize].iter_mut().enumerate() {
            *sample = (self.position + i as u64) as i16;
        }
        self.position += count;
        count
    }

    fn seek(&mut self, _stream: &mut dyn InputStream, sample_offset: u64) {
        self.position = sample_offset.min(self.available);
    }
}

impl Drop for MagicDecoder {
    fn drop(&mut self) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

/// Stream that refuses to seek back to its start.
pub struct NoRewindStream {
    inner: Cursor<Vec<u8>>,
}

impl NoRewindStream {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            inner: Cursor::new(data),
        }
    }

    pub fn inner_mut(&mut self) -> &mut Cursor<Vec<u8>> {
        &mut self.inner
    }
}

impl Read for NoRewindStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Seek for NoRewindStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match pos {
            SeekFrom::Start(0) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "stream cannot restart",
            )),
            other => self.inner.seek(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    OpenDevice(DeviceHandle),
    CloseDevice(DeviceHandle),
    CreateContext(ContextHandle),
    DestroyContext(ContextHandle),
    MakeCurrent(Option<ContextHandle>),
    Gain(f32),
    Position(Vec3),
    Orientation([f32; 6]),
}

/// Backend that records every call and can be told to fail.
#[derive(Default)]
pub struct FakeBackend {
    pub fail_device: AtomicBool,
    pub fail_context: AtomicBool,
    next_id: AtomicU64,
    calls: Mutex<Vec<BackendCall>>,
    enum_values: Mutex<HashMap<String, i32>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn open_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, BackendCall::OpenDevice(_)))
            .count()
    }

    pub fn listener_calls(&self) -> Vec<BackendCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    BackendCall::Gain(_) | BackendCall::Position(_) | BackendCall::Orientation(_)
                )
            })
            .cloned()
            .collect()
    }

    pub fn set_enum_value(&self, name: &str, value: i32) {
        self.enum_values.lock().insert(name.to_string(), value);
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().push(call);
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl AudioBackend for FakeBackend {
    fn open_device(&self, _name: Option<&str>) -> Option<DeviceHandle> {
        if self.fail_device.load(Ordering::SeqCst) {
            return None;
        }
        let handle = DeviceHandle::new(self.next_id());
        self.record(BackendCall::OpenDevice(handle));
        Some(handle)
    }

    fn close_device(&self, device: DeviceHandle) {
        self.record(BackendCall::CloseDevice(device));
    }

    fn create_context(&self, _device: DeviceHandle) -> Option<ContextHandle> {
        if self.fail_context.load(Ordering::SeqCst) {
            return None;
        }
        let handle = ContextHandle::new(self.next_id());
        self.record(BackendCall::CreateContext(handle));
        Some(handle)
    }

    fn destroy_context(&self, context: ContextHandle) {
        self.record(BackendCall::DestroyContext(context));
    }

    fn make_context_current(&self, context: Option<ContextHandle>) -> bool {
        self.record(BackendCall::MakeCurrent(context));
        true
    }

    fn set_listener_gain(&self, gain: f32) {
        self.record(BackendCall::Gain(gain));
    }

    fn set_listener_position(&self, position: Vec3) {
        self.record(BackendCall::Position(position));
    }

    fn set_listener_orientation(&self, orientation: [f32; 6]) {
        self.record(BackendCall::Orientation(orientation));
    }

    fn is_device_extension_present(&self, _device: DeviceHandle, name: &str) -> bool {
        name == "ALC_FAKE_device"
    }

    fn is_extension_present(&self, name: &str) -> bool {
        name == "AL_FAKE_api"
    }

    fn enum_value(&self, name: &str) -> i32 {
        if let Some(value) = self.enum_values.lock().get(name) {
            return *value;
        }
        match name {
            format::QUAD16 => format::QUAD16_VALUE,
            format::CHN51_16 => format::CHN51_16_VALUE,
            format::CHN61_16 => format::CHN61_16_VALUE,
            format::CHN71_16 => format::CHN71_16_VALUE,
            _ => 0,
        }
    }
}
