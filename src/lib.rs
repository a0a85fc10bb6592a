pub mod backend;
pub mod config;
pub mod device;
pub mod error;
pub mod math;
pub mod resource;
pub mod sound_file;

#[cfg(test)]
mod test_support;

pub use backend::{AudioBackend, CpalBackend};
pub use config::AudioContextDesc;
pub use device::{AudioContext, AudioDevice, ListenerState};
pub use error::{PetalSonicError, Result};
pub use resource::AudioResource;
pub use sound_file::{
    DecoderFactory, DecoderRegistry, InputSoundFile, InputStream, SoundFileDecoder, SoundFileInfo,
};
