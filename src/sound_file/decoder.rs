use crate::error::Result;
use crate::sound_file::InputStream;

/// Properties a decoder reports when it opens a sound file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoundFileInfo {
    /// Total number of interleaved samples (frames * channels)
    pub sample_count: u64,
    /// Number of channels (1 = mono, 2 = stereo, etc.)
    pub channel_count: u32,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

/// Trait for decoding one audio format into interleaved 16-bit samples.
///
/// Decoders never own the stream they read from. The session that owns the decoder lends
/// the stream on every call, which lets the same decoder serve files, memory buffers and
/// caller-supplied streams alike.
///
/// # Example
///
/// ```ignore
/// use petalsonic_audio::sound_file::{InputStream, SoundFileDecoder, SoundFileInfo};
/// use petalsonic_audio::error::Result;
///
/// struct SilenceDecoder;
///
/// impl SoundFileDecoder for SilenceDecoder {
///     fn open(&mut self, _stream: &mut dyn InputStream) -> Result<SoundFileInfo> {
///         Ok(SoundFileInfo { sample_count: 44100, channel_count: 1, sample_rate: 44100 })
///     }
///
///     fn read(&mut self, _stream: &mut dyn InputStream, samples: &mut [i16]) -> u64 {
///         samples.fill(0);
///         samples.len() as u64
///     }
///
///     fn seek(&mut self, _stream: &mut dyn InputStream, _sample_offset: u64) {}
/// }
/// ```
pub trait SoundFileDecoder: Send {
    /// Parses the stream header and returns the file's properties.
    ///
    /// The stream is positioned at its first byte when this is called.
    ///
    /// # Errors
    ///
    /// Returns a `PetalSonicError` if the stream does not contain a file this decoder
    /// can handle.
    fn open(&mut self, stream: &mut dyn InputStream) -> Result<SoundFileInfo>;

    /// Decodes up to `samples.len()` interleaved samples into `samples`.
    ///
    /// Returns the number of samples written, which is smaller than requested only at the
    /// end of the stream or on an unrecoverable read error.
    fn read(&mut self, stream: &mut dyn InputStream, samples: &mut [i16]) -> u64;

    /// Moves the read position to `sample_offset` (in interleaved samples).
    ///
    /// Offsets past the end leave the decoder at the end of the stream.
    fn seek(&mut self, stream: &mut dyn InputStream, sample_offset: u64);
}

/// Probe and constructor for one decoder type, registered in a
/// [`DecoderRegistry`](crate::sound_file::DecoderRegistry).
pub trait DecoderFactory: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Returns true if this factory's decoder can handle the stream.
    ///
    /// The stream is positioned at its first byte; the factory may leave it anywhere.
    fn check(&self, stream: &mut dyn InputStream) -> bool;

    /// Like [`check`](Self::check), with the file extension (e.g. `"wav"`) when the data
    /// came from a path.
    fn check_with_hint(&self, stream: &mut dyn InputStream, extension: Option<&str>) -> bool {
        let _ = extension;
        self.check(stream)
    }

    /// Creates a fresh, unopened decoder.
    fn create(&self) -> Box<dyn SoundFileDecoder>;

    /// Like [`create`](Self::create), for data whose file extension is known.
    fn create_with_hint(&self, extension: Option<&str>) -> Box<dyn SoundFileDecoder> {
        let _ = extension;
        self.create()
    }
}
