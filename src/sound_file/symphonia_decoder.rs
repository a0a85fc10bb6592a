use crate::error::{PetalSonicError, Result};
use crate::sound_file::{DecoderFactory, InputStream, SoundFileDecoder, SoundFileInfo};
use std::io::{Cursor, Read};
use std::sync::Arc;
use symphonia::{
    core::{
        audio::SampleBuffer,
        codecs::{Decoder, DecoderOptions},
        errors::Error,
        formats::{FormatOptions, FormatReader, SeekMode, SeekTo},
        io::MediaSourceStream,
        meta::MetadataOptions,
        probe::Hint,
        units::{Time, TimeBase},
    },
    default::{get_codecs, get_probe},
};

fn probe_format(bytes: Arc<[u8]>, extension: Option<&str>) -> Result<Box<dyn FormatReader>> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| PetalSonicError::AudioFormat(format!("Failed to probe audio format: {:?}", e)))?;

    Ok(probed.format)
}

/// Converts a duration in track time-base units to frames.
fn ts_to_frames(time_base: Option<TimeBase>, sample_rate: u32, ts: u64) -> u64 {
    match time_base {
        Some(time_base) => {
            let time = time_base.calc_time(ts);
            ((time.seconds as f64 + time.frac) * sample_rate as f64).round() as u64
        }
        None => ts,
    }
}

/// Counts the frames of `track_id` by walking every packet of a second reader.
fn count_frames(
    bytes: Arc<[u8]>,
    extension: Option<&str>,
    track_id: u32,
    time_base: Option<TimeBase>,
    sample_rate: u32,
) -> Result<u64> {
    let mut format = probe_format(bytes, extension)?;

    let mut total_ts = 0u64;
    loop {
        match format.next_packet() {
            Ok(packet) if packet.track_id() == track_id => total_ts += packet.dur(),
            Ok(_) => continue,
            Err(Error::IoError(_)) => break,
            Err(e) => {
                return Err(PetalSonicError::AudioFormat(format!(
                    "Failed to measure sound file length: {:?}",
                    e
                )));
            }
        }
    }

    Ok(ts_to_frames(time_base, sample_rate, total_ts))
}

/// Factory for [`SymphoniaDecoder`], registered by default in every
/// [`DecoderRegistry`](crate::sound_file::DecoderRegistry).
pub struct SymphoniaDecoderFactory;

impl DecoderFactory for SymphoniaDecoderFactory {
    fn name(&self) -> &str {
        "symphonia"
    }

    fn check(&self, stream: &mut dyn InputStream) -> bool {
        self.check_with_hint(stream, None)
    }

    fn check_with_hint(&self, stream: &mut dyn InputStream, extension: Option<&str>) -> bool {
        // Headers may run arbitrarily far into the file, so the probe sees all of it.
        let mut bytes = Vec::new();
        if stream.read_to_end(&mut bytes).is_err() {
            return false;
        }

        match probe_format(Arc::from(bytes), extension) {
            Ok(format) => format
                .default_track()
                .map(|track| get_codecs().get_codec(track.codec_params.codec).is_some())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    fn create(&self) -> Box<dyn SoundFileDecoder> {
        Box::new(SymphoniaDecoder::new())
    }

    fn create_with_hint(&self, extension: Option<&str>) -> Box<dyn SoundFileDecoder> {
        let mut decoder = SymphoniaDecoder::new();
        decoder.extension = extension.map(str::to_string);
        Box::new(decoder)
    }
}

/// Decoder for every format enabled in Symphonia (WAV, FLAC, Ogg Vorbis, ...).
///
/// Symphonia requires an owned media source, so `open` buffers the whole stream in memory
/// and later calls ignore the stream argument.
pub struct SymphoniaDecoder {
    /// File extension passed to the format probe
    extension: Option<String>,
    state: Option<DecoderState>,
}

struct DecoderState {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    time_base: Option<TimeBase>,
    channels: u32,
    sample_rate: u32,
    total_frames: u64,
    /// Decoded samples not yet handed out
    pending: Vec<i16>,
    pending_pos: usize,
    /// Samples to drop after a seek landed before the requested position
    skip: usize,
    ended: bool,
}

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self {
            extension: None,
            state: None,
        }
    }

    /// Decoder that hints the format probe with a file extension such as `"flac"`.
    pub fn with_extension(extension: impl Into<String>) -> Self {
        Self {
            extension: Some(extension.into()),
            state: None,
        }
    }
}

impl Default for SymphoniaDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundFileDecoder for SymphoniaDecoder {
    fn open(&mut self, stream: &mut dyn InputStream) -> Result<SoundFileInfo> {
        self.state = None;

        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes)?;

        let bytes: Arc<[u8]> = Arc::from(bytes);
        let extension = self.extension.as_deref();
        let format = probe_format(Arc::clone(&bytes), extension)?;

        let track = format
            .default_track()
            .ok_or_else(|| PetalSonicError::AudioFormat("No default audio track found".to_string()))?;

        let track_id = track.id;
        let time_base = track.codec_params.time_base;

        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| PetalSonicError::AudioFormat("Sample rate not found".to_string()))?;

        let channels = track
            .codec_params
            .channels
            .ok_or_else(|| PetalSonicError::AudioFormat("Channel count not found".to_string()))?
            .count() as u32;

        let total_frames = match track.codec_params.n_frames {
            Some(frames) => frames,
            None => {
                log::warn!("Sound file does not declare its length; counting frames");
                count_frames(bytes, extension, track_id, time_base, sample_rate)?
            }
        };

        let decoder = get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| PetalSonicError::AudioFormat(format!("Failed to create decoder: {:?}", e)))?;

        self.state = Some(DecoderState {
            format,
            decoder,
            track_id,
            time_base,
            channels,
            sample_rate,
            total_frames,
            pending: Vec::new(),
            pending_pos: 0,
            skip: 0,
            ended: false,
        });

        Ok(SoundFileInfo {
            sample_count: total_frames * channels as u64,
            channel_count: channels,
            sample_rate,
        })
    }

    fn read(&mut self, _stream: &mut dyn InputStream, samples: &mut [i16]) -> u64 {
        let Some(state) = self.state.as_mut() else {
            return 0;
        };

        let mut written = 0;
        while written < samples.len() {
            if state.pending_pos >= state.pending.len() {
                if !state.decode_next_packet() {
                    break;
                }
                continue;
            }

            let available = &state.pending[state.pending_pos..];
            let count = available.len().min(samples.len() - written);
            samples[written..written + count].copy_from_slice(&available[..count]);
            state.pending_pos += count;
            written += count;
        }

        written as u64
    }

    fn seek(&mut self, _stream: &mut dyn InputStream, sample_offset: u64) {
        let Some(state) = self.state.as_mut() else {
            return;
        };

        let channels = state.channels.max(1) as u64;
        let frame = sample_offset / channels;

        state.pending.clear();
        state.pending_pos = 0;
        state.skip = 0;
        state.ended = false;

        if state.total_frames > 0 && frame >= state.total_frames {
            state.ended = true;
            return;
        }

        let rate = state.sample_rate.max(1) as u64;
        let time = Time::new(frame / rate, (frame % rate) as f64 / rate as f64);
        let seeked = state.format.seek(
            SeekMode::Accurate,
            SeekTo::Time {
                time,
                track_id: Some(state.track_id),
            },
        );

        match seeked {
            Ok(seeked) => {
                state.decoder.reset();
                let behind = seeked.required_ts.saturating_sub(seeked.actual_ts);
                let frames_behind = ts_to_frames(state.time_base, state.sample_rate, behind);
                state.skip = (frames_behind * channels + sample_offset % channels) as usize;
            }
            Err(e) => {
                log::warn!("Failed to seek sound file to sample {}: {:?}", sample_offset, e);
            }
        }
    }
}

impl DecoderState {
    /// Decodes the next packet of our track into `pending`. Returns false at end of stream.
    fn decode_next_packet(&mut self) -> bool {
        if self.ended {
            return false;
        }

        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(Error::IoError(_)) => break, // end-of-file
                Err(e) => {
                    log::error!("Error reading packet: {:?}", e);
                    break;
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(Error::IoError(_)) => break,
                Err(Error::DecodeError(msg)) => {
                    log::warn!("Skipping corrupted audio packet: {}", msg);
                    continue;
                }
                Err(e) => {
                    log::error!("Error decoding packet: {:?}", e);
                    break;
                }
            };

            let spec = *decoded.spec();
            let mut buffer = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
            buffer.copy_interleaved_ref(decoded);

            let mut produced = buffer.samples();
            if self.skip > 0 {
                let dropped = self.skip.min(produced.len());
                produced = &produced[dropped..];
                self.skip -= dropped;
            }

            if produced.is_empty() {
                continue;
            }

            self.pending.clear();
            self.pending.extend_from_slice(produced);
            self.pending_pos = 0;
            return true;
        }

        self.ended = true;
        false
    }
}
