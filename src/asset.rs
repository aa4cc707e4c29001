//! Decoded sound assets and the stores which provide them by logical name.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use crate::{
    error::Error,
    utils::decoder::{decode_buffer, decode_file, DecodedAudio},
};

// -------------------------------------------------------------------------------------------------

/// An immutable, decoded audio buffer with its native sample format.
///
/// Buffers are shared (wrapped in an Arc), so cloning an asset is cheap: it only copies the
/// buffer reference. Assets are loaded once when the engine initializes and are then scheduled
/// as often as necessary.
#[derive(Clone)]
pub struct SoundAsset {
    name: Arc<str>,
    buffer: Arc<[f32]>,
    sample_rate: u32,
    channel_count: usize,
}

impl SoundAsset {
    /// Create a new asset from an interleaved sample buffer.
    pub fn new<S: Into<Arc<str>>, B: Into<Arc<[f32]>>>(
        name: S,
        buffer: B,
        sample_rate: u32,
        channel_count: usize,
    ) -> Result<Self, Error> {
        let name = name.into();
        let buffer = buffer.into();
        if sample_rate == 0 || channel_count == 0 {
            return Err(Error::asset_load_error(
                &*name,
                format!("invalid signal spec: {sample_rate}Hz, {channel_count} channels"),
            ));
        }
        if buffer.is_empty() || buffer.len() % channel_count != 0 {
            return Err(Error::asset_load_error(
                &*name,
                "buffer is empty or not frame aligned",
            ));
        }
        Ok(Self {
            name,
            buffer,
            sample_rate,
            channel_count,
        })
    }

    fn from_decoded(name: &str, decoded: DecodedAudio) -> Result<Self, Error> {
        Self::new(
            name,
            decoded.samples,
            decoded.sample_rate,
            decoded.channel_count,
        )
    }

    /// Logical name of the asset.
    pub fn name(&self) -> &str {
        &self.name
    }
    /// Shared read-only access to the interleaved sample buffer.
    pub fn buffer(&self) -> &Arc<[f32]> {
        &self.buffer
    }
    /// Native sample rate of the buffer.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
    /// Native channel count of the buffer.
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }
    /// Number of sample frames in the buffer.
    pub fn frame_count(&self) -> usize {
        self.buffer.len() / self.channel_count
    }
    /// Playback duration at the native sample rate.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frame_count() as f64 / self.sample_rate as f64)
    }
}

impl std::fmt::Debug for SoundAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundAsset")
            .field("name", &self.name)
            .field("frames", &self.frame_count())
            .field("sample_rate", &self.sample_rate)
            .field("channel_count", &self.channel_count)
            .finish()
    }
}

// -------------------------------------------------------------------------------------------------

/// Loads decoded sound assets by logical name.
pub trait AssetStore {
    /// Load the asset with the given name. Missing or corrupt assets must be reported as
    /// [`Error::AssetLoadError`].
    fn load_asset(&self, name: &str) -> Result<SoundAsset, Error>;
}

// -------------------------------------------------------------------------------------------------

/// Asset store which decodes audio files from a directory: the asset `"hum"` is loaded from
/// `<directory>/hum.wav` with the default extension.
#[derive(Debug, Clone)]
pub struct FileAssetStore {
    directory: PathBuf,
    extension: String,
}

impl FileAssetStore {
    pub const DEFAULT_EXTENSION: &'static str = "wav";

    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self::with_extension(directory, Self::DEFAULT_EXTENSION)
    }

    pub fn with_extension<P: AsRef<Path>>(directory: P, extension: &str) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    /// File path for the given asset name.
    pub fn asset_path(&self, name: &str) -> PathBuf {
        self.directory.join(name).with_extension(&self.extension)
    }
}

impl AssetStore for FileAssetStore {
    fn load_asset(&self, name: &str) -> Result<SoundAsset, Error> {
        let path = self.asset_path(name);
        log::debug!("loading sound asset '{}' from '{}'", name, path.display());
        if !path.is_file() {
            return Err(Error::asset_load_error(
                name,
                format!("file '{}' not found", path.display()),
            ));
        }
        let decoded = decode_file(&path).map_err(|err| Error::asset_load_error(name, err))?;
        SoundAsset::from_decoded(name, decoded)
    }
}

// -------------------------------------------------------------------------------------------------

/// Asset store which hands out already decoded assets, registered by name.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssetStore {
    assets: HashMap<String, SoundAsset>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an asset under its own name, replacing existing ones.
    pub fn insert(&mut self, asset: SoundAsset) {
        self.assets.insert(asset.name().to_string(), asset);
    }

    /// Builder style [`Self::insert`].
    pub fn with_asset(mut self, asset: SoundAsset) -> Self {
        self.insert(asset);
        self
    }

    /// Decode an encoded audio file buffer and register it under the given name.
    pub fn insert_encoded(&mut self, name: &str, encoded: Vec<u8>) -> Result<(), Error> {
        let decoded = decode_buffer(encoded).map_err(|err| Error::asset_load_error(name, err))?;
        self.insert(SoundAsset::from_decoded(name, decoded)?);
        Ok(())
    }
}

impl AssetStore for MemoryAssetStore {
    fn load_asset(&self, name: &str) -> Result<SoundAsset, Error> {
        self.assets
            .get(name)
            .cloned()
            .ok_or_else(|| Error::asset_load_error(name, "no such asset"))
    }
}

// -------------------------------------------------------------------------------------------------
