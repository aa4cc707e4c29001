#![doc = include_str!("../README.md")]

// private mods (will be partly re-exported)
mod asset;
mod config;
mod engine;
mod error;
mod graph;
mod output;
mod scheduler;
mod source;
mod volume;

#[cfg(test)]
mod testing;

// public, flat re-exports
pub use error::Error;

pub use asset::{AssetStore, FileAssetStore, MemoryAssetStore, SoundAsset};
pub use config::EngineConfig;
pub use engine::{Engine, EngineStatus, PlaybackState};
pub use graph::{AudioGraph, Chain, ChainEvent, OutputGraph, ScheduleRequest};
pub use scheduler::WhirDelayProfile;
pub use volume::{clamp_volume, master_gain, DEFAULT_MASTER_GAIN_CEILING};

#[cfg(feature = "cpal-output")]
pub use output::DefaultOutputDevice;
pub use output::OutputDevice;

pub use source::{player::RegionId, timepitch::TimePitch, Source};

// public mods
pub mod utils;

pub mod outputs {
    //! Set of available audio output devices.

    #[cfg(feature = "cpal-output")]
    pub use super::output::cpal::CpalOutput;
    #[cfg(feature = "wav-output")]
    pub use super::output::wav::WavOutput;
}
