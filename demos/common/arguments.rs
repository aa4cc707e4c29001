use std::path::PathBuf;

use arg::{parse_args, Args};

use aetheryte::{
    outputs::WavOutput, AssetStore, DefaultOutputDevice, Engine, EngineConfig, Error,
    FileAssetStore, OutputGraph,
};

// -------------------------------------------------------------------------------------------------

const DEFAULT_LOG_LEVEL: log::Level = if cfg!(debug_assertions) {
    log::Level::Debug
} else {
    log::Level::Warn
};

const DEFAULT_ASSETS_PATH: &str = "assets";

// -------------------------------------------------------------------------------------------------

/// Default program arguments for aetheryte demo applications.
#[derive(Args, Debug, Default)]
#[allow(unused)]
pub struct Arguments {
    #[arg(short = "a", long = "assets")]
    /// Directory with the "hum.wav" and "whir1.wav" to "whir5.wav" sound assets.
    /// By default \"assets\".
    pub assets_path: Option<PathBuf>,
    #[arg(short = "o", long = "output")]
    /// Write audio output into the given wav file, instead of using the default audio device.
    pub output_path: Option<PathBuf>,
    #[arg(short = "l", long = "log-level")]
    /// Set logging level to \"debug\", \"info\", \"warn\" or \"error\".
    /// By default \"debug\" in dev builds and \"warn\" in release builds.
    pub log_level: Option<log::Level>,
}

/// Parse the demo's program arguments and set up logging with the configured level.
#[allow(unused)]
pub fn parse() -> Arguments {
    let args = parse_args::<Arguments>();
    create_logger(args.log_level);
    args
}

// -------------------------------------------------------------------------------------------------

/// Install a simple logger which logs with the given or the build's default level.
#[allow(unused)]
pub fn create_logger(log_level: Option<log::Level>) {
    let level = log_level.unwrap_or(DEFAULT_LOG_LEVEL);
    simple_logger::SimpleLogger::new()
        .with_level(level.to_level_filter())
        // decoder and thread priority crates are chatty in debug
        .with_module_level("symphonia_core", log::LevelFilter::Warn)
        .with_module_level("symphonia_format", log::LevelFilter::Warn)
        .with_module_level("audio_thread_priority", log::LevelFilter::Warn)
        .init()
        .expect("a logger got installed twice");
}

// -------------------------------------------------------------------------------------------------

/// Asset store for the given argument options.
#[allow(unused)]
pub fn asset_store(args: &Arguments) -> FileAssetStore {
    FileAssetStore::new(
        args.assets_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ASSETS_PATH)),
    )
}

/// Create a new engine which plays back on the default device or writes into a wav file,
/// as configured via program arguments.
#[allow(unused)]
pub fn new_engine(
    args: &Arguments,
    store: &impl AssetStore,
    config: EngineConfig,
) -> Result<DemoEngine, Error> {
    if let Some(output_path) = &args.output_path {
        Ok(DemoEngine::Wav(Engine::initialize(
            WavOutput::open(output_path)?,
            store,
            config,
        )?))
    } else {
        Ok(DemoEngine::Device(Engine::initialize(
            DefaultOutputDevice::open()?,
            store,
            config,
        )?))
    }
}

/// An engine with one of the demo's output devices.
#[allow(unused)]
pub enum DemoEngine {
    Device(Engine<OutputGraph<DefaultOutputDevice>>),
    Wav(Engine<OutputGraph<WavOutput>>),
}

impl DemoEngine {
    /// Run the given function with the engine, whatever output it uses.
    #[allow(unused)]
    pub fn with<R>(&self, func: impl FnOnce(&dyn Control) -> R) -> R {
        match self {
            Self::Device(engine) => func(engine),
            Self::Wav(engine) => func(engine),
        }
    }
}

/// Object safe subset of the engine's control surface, used by the demos.
#[allow(unused)]
pub trait Control {
    fn toggle(&self) -> Result<(), Error>;
    fn status(&self) -> aetheryte::EngineStatus;
    fn set_main_volume(&self, volume: f32);
    fn set_play_hum(&self, enabled: bool);
    fn set_play_whirs(&self, enabled: bool);
    fn set_whir_delay_profile(&self, profile: aetheryte::WhirDelayProfile);
}

impl<G: aetheryte::AudioGraph> Control for Engine<G> {
    fn toggle(&self) -> Result<(), Error> {
        Engine::toggle(self)
    }
    fn status(&self) -> aetheryte::EngineStatus {
        Engine::status(self)
    }
    fn set_main_volume(&self, volume: f32) {
        Engine::set_main_volume(self, volume)
    }
    fn set_play_hum(&self, enabled: bool) {
        Engine::set_play_hum(self, enabled)
    }
    fn set_play_whirs(&self, enabled: bool) {
        Engine::set_play_whirs(self, enabled)
    }
    fn set_whir_delay_profile(&self, profile: aetheryte::WhirDelayProfile) {
        Engine::set_whir_delay_profile(self, profile)
    }
}
