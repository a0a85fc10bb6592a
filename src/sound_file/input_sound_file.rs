use crate::error::{PetalSonicError, Result};
use crate::sound_file::registry::extension_of;
use crate::sound_file::stream::{SessionStream, rewind_to_start};
use crate::sound_file::{DecoderRegistry, InputStream, SoundFileDecoder, SoundFileInfo};
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Decoder and stream of an open session, dropped together on close.
struct OpenSession<'a> {
    decoder: Box<dyn SoundFileDecoder>,
    stream: SessionStream<'a>,
}

/// Sample-accurate reader for sound files.
///
/// A session is opened from a file path, a memory buffer or a caller-supplied stream. The
/// registry picks a decoder for the data, and the reader keeps the metadata and the current
/// read position in interleaved samples.
///
/// Buffers and streams passed to [`open_from_memory`](Self::open_from_memory) and
/// [`open_from_stream`](Self::open_from_stream) are borrowed for `'a`, so they are
/// guaranteed to outlive the session. Files and memory cursors created internally are
/// owned and dropped on close; a borrowed stream is only released.
///
/// Every open starts by closing the current session, and a failed open leaves the reader
/// exactly as a freshly constructed one.
///
/// # Example
///
/// ```no_run
/// use petalsonic_audio::sound_file::InputSoundFile;
///
/// let mut file = InputSoundFile::new();
/// file.open_from_file("music.flac")?;
///
/// let mut samples = vec![0i16; 4096];
/// while file.read(&mut samples) > 0 {
///     // hand the samples to a playback buffer
/// }
/// # Ok::<(), petalsonic_audio::PetalSonicError>(())
/// ```
pub struct InputSoundFile<'a> {
    registry: Arc<DecoderRegistry>,
    session: Option<OpenSession<'a>>,
    sample_offset: u64,
    sample_count: u64,
    channel_count: u32,
    sample_rate: u32,
}

impl<'a> InputSoundFile<'a> {
    /// Creates a closed reader using the default decoder registry.
    pub fn new() -> Self {
        Self::with_registry(Arc::new(DecoderRegistry::default()))
    }

    /// Creates a closed reader that selects decoders from `registry`.
    pub fn with_registry(registry: Arc<DecoderRegistry>) -> Self {
        Self {
            registry,
            session: None,
            sample_offset: 0,
            sample_count: 0,
            channel_count: 0,
            sample_rate: 0,
        }
    }

    pub fn registry(&self) -> &Arc<DecoderRegistry> {
        &self.registry
    }

    /// Opens the sound file at `path`.
    ///
    /// # Errors
    ///
    /// Fails with [`PetalSonicError::Io`] if the file cannot be opened, and with
    /// [`PetalSonicError::UnsupportedFormat`] if no registered decoder supports it. Decoder
    /// errors are passed through. The reader is closed afterwards.
    pub fn open_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.close();
        let path = path.as_ref();

        let mut file = File::open(path).map_err(|e| {
            log::error!("Failed to open sound file \"{}\" ({})", path.display(), e);
            PetalSonicError::Io(e)
        })?;

        let decoder = self
            .registry
            .select(&mut file, extension_of(path))
            .ok_or_else(|| {
                log::error!(
                    "Failed to open sound file \"{}\" (format not supported)",
                    path.display()
                );
                PetalSonicError::UnsupportedFormat(path.display().to_string())
            })?;

        rewind_to_start(&mut file).map_err(|e| {
            log::error!("Failed to open sound file \"{}\" ({})", path.display(), e);
            PetalSonicError::Io(e)
        })?;

        self.start_session(decoder, SessionStream::Owned(Box::new(file)))
    }

    /// Opens a sound file held in memory. The buffer is borrowed for the session.
    ///
    /// # Errors
    ///
    /// Fails if no registered decoder supports the data or if the decoder rejects it.
    /// The reader is closed afterwards.
    pub fn open_from_memory(&mut self, data: &'a [u8]) -> Result<()> {
        self.close();

        let decoder = self
            .registry
            .create_reader_from_memory(data)
            .ok_or_else(|| PetalSonicError::UnsupportedFormat("memory buffer".to_string()))?;

        self.start_session(decoder, SessionStream::Owned(Box::new(Cursor::new(data))))
    }

    /// Opens a sound file from a caller-supplied stream.
    ///
    /// The stream is rewound to its start before the decoder reads it and stays borrowed
    /// until the reader is closed, re-opened or dropped.
    ///
    /// # Errors
    ///
    /// Fails if no registered decoder supports the data, if the stream cannot be rewound,
    /// or if the decoder rejects it. The reader is closed afterwards.
    pub fn open_from_stream(&mut self, stream: &'a mut dyn InputStream) -> Result<()> {
        self.close();

        let decoder = self
            .registry
            .create_reader_from_stream(stream)
            .ok_or_else(|| PetalSonicError::UnsupportedFormat("input stream".to_string()))?;

        if let Err(e) = rewind_to_start(stream) {
            log::error!("Failed to open sound file from stream (cannot restart stream)");
            return Err(PetalSonicError::Stream(format!(
                "cannot restart stream: {}",
                e
            )));
        }

        self.start_session(decoder, SessionStream::Borrowed(stream))
    }

    fn start_session(
        &mut self,
        mut decoder: Box<dyn SoundFileDecoder>,
        mut stream: SessionStream<'a>,
    ) -> Result<()> {
        let info = decoder.open(stream.get()).map_err(|e| {
            log::error!("Failed to open sound file ({})", e);
            e
        })?;

        self.sample_offset = 0;
        self.sample_count = info.sample_count;
        self.channel_count = info.channel_count;
        self.sample_rate = info.sample_rate;
        self.session = Some(OpenSession { decoder, stream });

        Ok(())
    }

    /// Releases the decoder and stream and resets every counter. No-op when closed.
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            log::debug!(
                "Closing sound file session ({} stream)",
                if session.stream.is_owned() {
                    "owned"
                } else {
                    "borrowed"
                }
            );
        }

        self.sample_offset = 0;
        self.sample_count = 0;
        self.channel_count = 0;
        self.sample_rate = 0;
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Total number of interleaved samples in the file.
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    pub fn channel_count(&self) -> u32 {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn info(&self) -> SoundFileInfo {
        SoundFileInfo {
            sample_count: self.sample_count,
            channel_count: self.channel_count,
            sample_rate: self.sample_rate,
        }
    }

    /// Total playing time, or zero when the channel count or sample rate is unknown.
    pub fn duration(&self) -> Duration {
        self.samples_to_duration(self.sample_count)
    }

    /// Read position as a time offset, or zero when the channel count or sample rate is
    /// unknown.
    pub fn time_offset(&self) -> Duration {
        self.samples_to_duration(self.sample_offset)
    }

    /// Read position in interleaved samples.
    pub fn sample_offset(&self) -> u64 {
        self.sample_offset
    }

    fn samples_to_duration(&self, samples: u64) -> Duration {
        if self.channel_count == 0 || self.sample_rate == 0 {
            return Duration::ZERO;
        }

        Duration::try_from_secs_f64(
            samples as f64 / self.channel_count as f64 / self.sample_rate as f64,
        )
        .unwrap_or(Duration::MAX)
    }

    /// Moves the read position to `sample_offset`, clamped to the sample count.
    ///
    /// Does nothing if no file is open.
    pub fn seek(&mut self, sample_offset: u64) {
        if let Some(session) = self.session.as_mut() {
            self.sample_offset = sample_offset.min(self.sample_count);
            session
                .decoder
                .seek(session.stream.get(), self.sample_offset);
        }
    }

    /// Moves the read position to `time_offset`, clamped to the end of the file.
    pub fn seek_time(&mut self, time_offset: Duration) {
        let sample_offset = time_offset.as_secs_f64()
            * self.sample_rate as f64
            * self.channel_count as f64;
        self.seek(sample_offset as u64);
    }

    /// Reads up to `samples.len()` interleaved samples and advances the read position by
    /// the number actually read. Reading stops at the sample count.
    ///
    /// Returns 0 without touching the position if no file is open or `samples` is empty.
    pub fn read(&mut self, samples: &mut [i16]) -> u64 {
        let Some(session) = self.session.as_mut() else {
            return 0;
        };

        let remaining = self.sample_count.saturating_sub(self.sample_offset);
        let len = (samples.len() as u64).min(remaining) as usize;
        if len == 0 {
            return 0;
        }

        let read = session
            .decoder
            .read(session.stream.get(), &mut samples[..len])
            .min(len as u64);
        self.sample_offset += read;
        read
    }
}

impl Default for InputSoundFile<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InputSoundFile<'_> {
    fn drop(&mut self) {
        self.close();
    }
}
