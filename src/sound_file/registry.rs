use crate::sound_file::stream::rewind_to_start;
use crate::sound_file::{
    DecoderFactory, InputStream, SoundFileDecoder, SymphoniaDecoderFactory,
};
use std::fs::File;
use std::io::Cursor;
use std::path::Path;

/// Ordered collection of decoder factories.
///
/// Selection is deterministic: the stream is rewound, then each factory is asked in
/// registration order and the first one whose `check` succeeds creates the decoder. When
/// several decoders could open the same data, the one registered first wins.
pub struct DecoderRegistry {
    factories: Vec<Box<dyn DecoderFactory>>,
}

impl Default for DecoderRegistry {
    /// Registry with the built-in Symphonia decoder.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(SymphoniaDecoderFactory);
        registry
    }
}

impl DecoderRegistry {
    /// Registry without any decoders.
    pub fn empty() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// Appends a factory; it is probed after every factory registered before it.
    pub fn register<F: DecoderFactory + 'static>(&mut self, factory: F) -> &mut Self {
        self.factories.push(Box::new(factory));
        self
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Names of the registered factories, in probe order.
    pub fn factory_names(&self) -> Vec<&str> {
        self.factories.iter().map(|factory| factory.name()).collect()
    }

    /// Opens the file at `path` and selects a decoder for it, hinting probes with the
    /// file extension.
    pub fn create_reader_from_filename<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Option<Box<dyn SoundFileDecoder>> {
        let path = path.as_ref();
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                log::error!(
                    "Failed to open sound file \"{}\" ({})",
                    path.display(),
                    e
                );
                return None;
            }
        };

        let decoder = self.select(&mut file, extension_of(path));
        if decoder.is_none() {
            log::error!(
                "Failed to open sound file \"{}\" (format not supported)",
                path.display()
            );
        }
        decoder
    }

    pub fn create_reader_from_memory(&self, data: &[u8]) -> Option<Box<dyn SoundFileDecoder>> {
        let mut memory = Cursor::new(data);
        let decoder = self.select(&mut memory, None);
        if decoder.is_none() {
            log::error!("Failed to open sound file from memory (format not supported)");
        }
        decoder
    }

    pub fn create_reader_from_stream(
        &self,
        stream: &mut dyn InputStream,
    ) -> Option<Box<dyn SoundFileDecoder>> {
        let decoder = self.select(stream, None);
        if decoder.is_none() {
            log::error!("Failed to open sound file from stream (format not supported)");
        }
        decoder
    }

    /// Rewinds the stream before each probe and returns the first match, without logging.
    pub(crate) fn select(
        &self,
        stream: &mut dyn InputStream,
        extension: Option<&str>,
    ) -> Option<Box<dyn SoundFileDecoder>> {
        for factory in &self.factories {
            // A failed rewind is not fatal here; the factory probes whatever it reads.
            if let Err(e) = rewind_to_start(stream) {
                log::debug!("Could not rewind stream before probing {}: {}", factory.name(), e);
            }

            if factory.check_with_hint(stream, extension) {
                log::debug!("Selected {} decoder", factory.name());
                return Some(factory.create_with_hint(extension));
            }
        }
        None
    }
}

pub(crate) fn extension_of(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}
