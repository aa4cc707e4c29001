//! The audio graph: two signal chains (player node → rate/pitch shift → master mixer) feeding
//! the output device.

use crossbeam_channel::Sender;

use crate::{
    asset::{AssetStore, SoundAsset},
    config::EngineConfig,
    error::Error,
    output::OutputDevice,
    source::{
        mixed::{MasterGain, MixedSource},
        player::{PlayerHandle, PlayerSource, Region, RegionId, MAX_CHANNELS},
        timepitch::TimePitch,
        Source,
    },
    utils::buffer::is_supported_channel_mapping,
};

// -------------------------------------------------------------------------------------------------

/// Identifies one of the two signal chains in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Chain {
    /// The perpetually looping base tone.
    Hum,
    /// Intermittent, randomized one-shots.
    Whir,
}

// -------------------------------------------------------------------------------------------------

/// Notifications send from the graph's render thread to the schedulers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainEvent {
    /// The given region's data got consumed by the chain's player node: the region is about
    /// to finish and the next one may get scheduled.
    DataConsumed { chain: Chain, region: RegionId },
}

// -------------------------------------------------------------------------------------------------

/// Describes a single region to schedule on a chain's player node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleRequest {
    /// Index of the chain's asset variant. The hum chain only has a single one.
    pub variant: usize,
    /// Gain factor of this region, applied on top of the chain volume.
    pub gain: f32,
    /// Rate/pitch settings applied to the chain's shift stage when the region starts.
    /// `None` keeps the stage's current settings.
    pub time_pitch: Option<TimePitch>,
}

impl ScheduleRequest {
    /// Request for the hum chain's single asset with unity gain and unchanged shift settings.
    pub fn hum() -> Self {
        Self {
            variant: 0,
            gain: 1.0,
            time_pitch: None,
        }
    }

    /// Request for a randomized whir event.
    pub fn whir(variant: usize, gain: f32, time_pitch: TimePitch) -> Self {
        Self {
            variant,
            gain,
            time_pitch: Some(time_pitch),
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Commands the playback state machine and schedulers emit into the audio graph.
///
/// The engine talks to the graph through this trait only. [`OutputGraph`] is the graph which
/// actually renders, test builds replace it with a recording stub.
pub trait AudioGraph: Send + 'static {
    /// Number of assets available on the whir chain. Always at least one.
    fn whir_variant_count(&self) -> usize;

    /// Activate the hardware output and both player nodes. On errors nothing is left running.
    fn start(&mut self) -> Result<(), Error>;
    /// Deactivate both player nodes and the hardware output. Never fails, is idempotent.
    fn stop(&mut self);

    /// Apply the given gain to the shared master mixer.
    fn set_master_gain(&mut self, gain: f32);
    /// Apply the given linear volume to a chain's player node.
    fn set_chain_volume(&mut self, chain: Chain, volume: f32);

    /// Resume a chain's player node.
    fn play_chain(&mut self, chain: Chain);
    /// Pause a chain's player node only.
    fn pause_chain(&mut self, chain: Chain);
    /// Drop all regions which are queued or playing on a chain's player node.
    fn reset_chain(&mut self, chain: Chain);

    /// Enqueue a region on the chain's player node. It starts right after the node's queued
    /// regions ended, or immediately when nothing is queued.
    fn schedule(&mut self, chain: Chain, request: ScheduleRequest) -> Result<RegionId, Error>;
}

// -------------------------------------------------------------------------------------------------

/// A chain's nodes as seen from the control plane.
struct ChainNodes {
    player: PlayerHandle,
    assets: Vec<SoundAsset>,
}

// -------------------------------------------------------------------------------------------------

/// The [`AudioGraph`] which renders into an [`OutputDevice`].
///
/// Both chains render in the output device's format: the player nodes convert the assets'
/// sample rates as part of their rate/pitch shift and map mono assets to all output channels
/// or downmix multi channel assets into mono outputs.
pub struct OutputGraph<D: OutputDevice> {
    device: D,
    hum: ChainNodes,
    whir: ChainNodes,
    master_gain: MasterGain,
}

impl<D: OutputDevice> OutputGraph<D> {
    /// Load all assets from the store, construct the player nodes and the master mixer, and
    /// wire them into the output device.
    ///
    /// Fails with [`Error::AssetLoadError`] when an asset is missing or corrupt, or with
    /// [`Error::GraphConstructionError`] when the device's format or an asset's channel layout
    /// is not supported. Nothing gets attached to the device in case of errors.
    pub fn initialize(
        mut device: D,
        store: &impl AssetStore,
        config: &EngineConfig,
        event_sender: Sender<ChainEvent>,
    ) -> Result<Self, Error> {
        // load assets
        let hum_assets = vec![Self::load_asset(store, &config.hum_asset)?];
        let whir_assets = config
            .whir_assets
            .iter()
            .map(|name| Self::load_asset(store, name))
            .collect::<Result<Vec<_>, _>>()?;
        if whir_assets.is_empty() {
            return Err(Error::GraphConstructionError(
                "at least one whir asset is required".to_string(),
            ));
        }

        // validate formats
        let channel_count = device.channel_count();
        let sample_rate = device.sample_rate();
        if channel_count == 0 || channel_count > MAX_CHANNELS || sample_rate == 0 {
            return Err(Error::GraphConstructionError(format!(
                "unsupported output format: {channel_count} channels, {sample_rate}Hz"
            )));
        }
        for asset in hum_assets.iter().chain(whir_assets.iter()) {
            if asset.channel_count() > MAX_CHANNELS
                || !is_supported_channel_mapping(asset.channel_count(), channel_count)
            {
                return Err(Error::GraphConstructionError(format!(
                    "can't route {} channels of asset '{}' to {} output channels",
                    asset.channel_count(),
                    asset.name(),
                    channel_count
                )));
            }
        }

        // create nodes
        let hum_time_pitch = TimePitch::from_rate(config.hum_rate);
        log::debug!(
            "creating hum chain with rate {} and pitch {} cents",
            hum_time_pitch.rate,
            hum_time_pitch.pitch
        );
        let (hum_player, hum_handle) = PlayerSource::new(
            Chain::Hum,
            channel_count,
            sample_rate,
            hum_time_pitch,
            config.read_ahead,
            event_sender.clone(),
        );
        let (whir_player, whir_handle) = PlayerSource::new(
            Chain::Whir,
            channel_count,
            sample_rate,
            TimePitch::NEUTRAL,
            config.read_ahead,
            event_sender,
        );

        // wire nodes
        let master_gain = MasterGain::new(0.0);
        let inputs: Vec<Box<dyn Source>> = vec![Box::new(hum_player), Box::new(whir_player)];
        let mixer = MixedSource::new(channel_count, sample_rate, inputs, master_gain.clone());
        device.play(Box::new(mixer));
        log::info!(
            "audio graph initialized: {} whir variants, {} channels at {}Hz",
            whir_assets.len(),
            channel_count,
            sample_rate
        );

        Ok(Self {
            device,
            hum: ChainNodes {
                player: hum_handle,
                assets: hum_assets,
            },
            whir: ChainNodes {
                player: whir_handle,
                assets: whir_assets,
            },
            master_gain,
        })
    }

    /// Access to the output device.
    pub fn device(&self) -> &D {
        &self.device
    }

    fn load_asset(store: &impl AssetStore, name: &str) -> Result<SoundAsset, Error> {
        store.load_asset(name).map_err(|err| match err {
            Error::AssetLoadError { .. } => err,
            _ => Error::asset_load_error(name, err),
        })
    }

    fn chain(&self, chain: Chain) -> &ChainNodes {
        match chain {
            Chain::Hum => &self.hum,
            Chain::Whir => &self.whir,
        }
    }

}

impl<D: OutputDevice> AudioGraph for OutputGraph<D> {
    fn whir_variant_count(&self) -> usize {
        self.whir.assets.len()
    }

    fn start(&mut self) -> Result<(), Error> {
        self.device.start()?;
        self.hum.player.play();
        self.whir.player.play();
        log::info!("audio graph started");
        Ok(())
    }

    fn stop(&mut self) {
        for nodes in [&self.hum, &self.whir] {
            nodes.player.pause();
            nodes.player.reset();
        }
        if self.device.is_running() {
            self.device.stop();
            log::info!("audio graph stopped");
        }
    }

    fn set_master_gain(&mut self, gain: f32) {
        self.master_gain.set(gain);
    }

    fn set_chain_volume(&mut self, chain: Chain, volume: f32) {
        self.chain(chain).player.set_volume(volume);
    }

    fn play_chain(&mut self, chain: Chain) {
        self.chain(chain).player.play();
    }

    fn pause_chain(&mut self, chain: Chain) {
        self.chain(chain).player.pause();
    }

    fn reset_chain(&mut self, chain: Chain) {
        self.chain(chain).player.reset();
    }

    fn schedule(&mut self, chain: Chain, request: ScheduleRequest) -> Result<RegionId, Error> {
        let nodes = self.chain(chain);
        let asset = nodes.assets.get(request.variant).cloned().ok_or_else(|| {
            Error::ParameterError(format!("no {chain} asset variant #{}", request.variant))
        })?;
        nodes
            .player
            .schedule(Region::new(asset, request.gain, request.time_pitch))
    }
}

impl<D: OutputDevice> Drop for OutputGraph<D> {
    fn drop(&mut self) {
        self.device.close();
    }
}

// -------------------------------------------------------------------------------------------------
