//! Test doubles for the audio graph, the output device and the asset store.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::{
    asset::{MemoryAssetStore, SoundAsset},
    error::Error,
    graph::{AudioGraph, Chain, ScheduleRequest},
    output::OutputDevice,
    source::{player::RegionId, Source},
    utils::unique_usize_id,
};

// -------------------------------------------------------------------------------------------------

/// A command which got emitted into a [`StubGraph`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum GraphCommand {
    Start,
    Stop,
    SetMasterGain(f32),
    SetChainVolume(Chain, f32),
    PlayChain(Chain),
    PauseChain(Chain),
    ResetChain(Chain),
    Schedule(Chain, ScheduleRequest, RegionId),
}

#[derive(Debug, Default)]
struct StubGraphState {
    commands: Vec<GraphCommand>,
    fail_start: bool,
    fail_schedules: bool,
}

/// An [`AudioGraph`] which only records the commands it receives.
///
/// Clones share their state, so tests can inspect the graph after moving it into an engine.
#[derive(Debug, Clone)]
pub(crate) struct StubGraph {
    state: Arc<Mutex<StubGraphState>>,
    whir_variant_count: usize,
}

impl StubGraph {
    pub fn new(whir_variant_count: usize) -> Self {
        Self {
            state: Arc::default(),
            whir_variant_count,
        }
    }

    pub fn fail_start(&self, fail: bool) {
        self.state().fail_start = fail;
    }

    pub fn fail_schedules(&self, fail: bool) {
        self.state().fail_schedules = fail;
    }

    pub fn commands(&self) -> Vec<GraphCommand> {
        self.state().commands.clone()
    }

    pub fn clear_commands(&self) {
        self.state().commands.clear();
    }

    /// All scheduled regions of the given chain.
    pub fn scheduled(&self, chain: Chain) -> Vec<(ScheduleRequest, RegionId)> {
        self.commands()
            .into_iter()
            .filter_map(|command| match command {
                GraphCommand::Schedule(c, request, region) if c == chain => {
                    Some((request, region))
                }
                _ => None,
            })
            .collect()
    }

    /// Last applied master gain.
    pub fn master_gain(&self) -> Option<f32> {
        self.commands().into_iter().rev().find_map(|command| match command {
            GraphCommand::SetMasterGain(gain) => Some(gain),
            _ => None,
        })
    }

    /// Last applied volume of the given chain.
    pub fn chain_volume(&self, chain: Chain) -> Option<f32> {
        self.commands().into_iter().rev().find_map(|command| match command {
            GraphCommand::SetChainVolume(c, volume) if c == chain => Some(volume),
            _ => None,
        })
    }

    fn state(&self) -> MutexGuard<'_, StubGraphState> {
        self.state.lock().unwrap()
    }

    fn record(&self, command: GraphCommand) {
        self.state().commands.push(command);
    }
}

impl AudioGraph for StubGraph {
    fn whir_variant_count(&self) -> usize {
        self.whir_variant_count
    }

    fn start(&mut self) -> Result<(), Error> {
        if self.state().fail_start {
            return Err(Error::EngineStartError("no audio hardware".into()));
        }
        self.record(GraphCommand::Start);
        Ok(())
    }

    fn stop(&mut self) {
        self.record(GraphCommand::Stop);
    }

    fn set_master_gain(&mut self, gain: f32) {
        self.record(GraphCommand::SetMasterGain(gain));
    }

    fn set_chain_volume(&mut self, chain: Chain, volume: f32) {
        self.record(GraphCommand::SetChainVolume(chain, volume));
    }

    fn play_chain(&mut self, chain: Chain) {
        self.record(GraphCommand::PlayChain(chain));
    }

    fn pause_chain(&mut self, chain: Chain) {
        self.record(GraphCommand::PauseChain(chain));
    }

    fn reset_chain(&mut self, chain: Chain) {
        self.record(GraphCommand::ResetChain(chain));
    }

    fn schedule(&mut self, chain: Chain, request: ScheduleRequest) -> Result<RegionId, Error> {
        if self.state().fail_schedules {
            return Err(Error::SendError("player queue is full".to_string()));
        }
        let region = unique_usize_id();
        self.record(GraphCommand::Schedule(chain, request, region));
        Ok(region)
    }
}

// -------------------------------------------------------------------------------------------------

/// Shared state of a [`ManualOutput`].
pub(crate) struct ManualOutputState {
    pub channel_count: usize,
    pub sample_rate: u32,
    pub source: Option<Box<dyn Source>>,
    pub attached_sources: usize,
    pub running: bool,
    pub fail_start: bool,
    pub position: u64,
}

impl ManualOutputState {
    /// Pull the given number of frames from the attached source, whether the device runs or
    /// not. Missing samples are rendered as silence.
    pub fn render(&mut self, frames: usize) -> Vec<f32> {
        let mut output = vec![0.0; frames * self.channel_count];
        if let Some(source) = self.source.as_mut() {
            let written = source.write(&mut output);
            output[written..].fill(0.0);
        }
        self.position += output.len() as u64;
        output
    }
}

/// An [`OutputDevice`] which only renders when the test asks it to.
pub(crate) struct ManualOutput {
    state: Arc<Mutex<ManualOutputState>>,
}

impl ManualOutput {
    pub fn new(channel_count: usize, sample_rate: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualOutputState {
                channel_count,
                sample_rate,
                source: None,
                attached_sources: 0,
                running: false,
                fail_start: false,
                position: 0,
            })),
        }
    }

    pub fn state(&self) -> Arc<Mutex<ManualOutputState>> {
        Arc::clone(&self.state)
    }

    pub fn attached_sources(&self) -> usize {
        self.state.lock().unwrap().attached_sources
    }
}

impl OutputDevice for ManualOutput {
    fn channel_count(&self) -> usize {
        self.state.lock().unwrap().channel_count
    }

    fn sample_rate(&self) -> u32 {
        self.state.lock().unwrap().sample_rate
    }

    fn sample_position(&self) -> u64 {
        self.state.lock().unwrap().position
    }

    fn is_running(&self) -> bool {
        self.state.lock().unwrap().running
    }

    fn play(&mut self, source: Box<dyn Source>) {
        let mut state = self.state.lock().unwrap();
        state.source = Some(source);
        state.attached_sources += 1;
    }

    fn start(&mut self) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        if state.fail_start {
            return Err(Error::EngineStartError("device is busy".into()));
        }
        state.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.state.lock().unwrap().running = false;
    }

    fn close(&mut self) {
        self.stop();
    }
}

// -------------------------------------------------------------------------------------------------

/// A short, mono test asset at 1kHz with a constant, non-zero signal.
pub(crate) fn test_asset(name: &str, frames: usize) -> SoundAsset {
    SoundAsset::new(name, vec![0.5; frames], 1000, 1).unwrap()
}

/// A store with a 400 frames hum and five 100 frames whirs, all at 1kHz.
pub(crate) fn test_asset_store() -> MemoryAssetStore {
    let mut store = MemoryAssetStore::new().with_asset(test_asset("hum", 400));
    for index in 1..=5 {
        store.insert(test_asset(&format!("whir{index}"), 100));
    }
    store
}
