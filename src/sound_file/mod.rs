//! Sound file reading: decoder selection, stream ownership and sample-accurate positioning

mod decoder;
mod input_sound_file;
mod registry;
mod stream;
mod symphonia_decoder;

pub use decoder::{DecoderFactory, SoundFileDecoder, SoundFileInfo};
pub use input_sound_file::InputSoundFile;
pub use registry::DecoderRegistry;
pub use stream::InputStream;
pub use symphonia_decoder::{SymphoniaDecoder, SymphoniaDecoderFactory};
