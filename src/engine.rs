//! The soundscape engine: playback state machine, control surface and the scheduler worker.

use std::{
    cmp::Reverse,
    collections::BinaryHeap,
    panic::AssertUnwindSafe,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread,
    time::Instant,
};

use crossbeam_channel::{bounded, Receiver, Sender};
use rand::{rngs::SmallRng, RngCore, SeedableRng};

use crate::{
    asset::AssetStore,
    config::EngineConfig,
    error::Error,
    graph::{AudioGraph, Chain, ChainEvent, OutputGraph},
    output::OutputDevice,
    scheduler::{EventScheduler, LoopScheduler, WhirDelayProfile},
    volume::{clamp_volume, master_gain},
};

// -------------------------------------------------------------------------------------------------

/// Global playback state of the engine.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
}

// -------------------------------------------------------------------------------------------------

/// Snapshot of all control surface values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineStatus {
    pub state: PlaybackState,
    pub main_volume: f32,
    pub hum_volume: f32,
    pub whir_volume: f32,
    pub play_hum: bool,
    pub play_whirs: bool,
    pub whir_delay_profile: WhirDelayProfile,
}

impl EngineStatus {
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }
}

// -------------------------------------------------------------------------------------------------

/// A whir delay timer, which fires at the given deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DelayTimer {
    pub deadline: Instant,
    pub generation: u64,
}

// -------------------------------------------------------------------------------------------------

/// Engine state without any threading: owns the graph, the schedulers and all control surface
/// values, and reacts to control commands, chain events and elapsed timers.
pub(crate) struct EngineCore<G: AudioGraph> {
    graph: G,
    state: PlaybackState,
    main_volume: f32,
    hum_volume: f32,
    whir_volume: f32,
    play_hum: bool,
    play_whirs: bool,
    whir_delay_profile: WhirDelayProfile,
    master_gain_ceiling: f32,
    hum: LoopScheduler,
    whir: EventScheduler,
    rng: Box<dyn RngCore + Send>,
}

impl<G: AudioGraph> EngineCore<G> {
    /// Create a new, stopped engine core and apply the config's initial volumes to the graph.
    pub fn new(mut graph: G, config: &EngineConfig, rng: Box<dyn RngCore + Send>) -> Self {
        let main_volume = clamp_volume(config.main_volume);
        let hum_volume = clamp_volume(config.hum_volume);
        let whir_volume = clamp_volume(config.whir_volume);
        graph.set_master_gain(master_gain(main_volume, config.master_gain_ceiling));
        graph.set_chain_volume(Chain::Hum, hum_volume);
        graph.set_chain_volume(Chain::Whir, whir_volume);
        Self {
            graph,
            state: PlaybackState::Stopped,
            main_volume,
            hum_volume,
            whir_volume,
            play_hum: config.play_hum,
            play_whirs: config.play_whirs,
            whir_delay_profile: config.whir_delay_profile,
            master_gain_ceiling: config.master_gain_ceiling,
            hum: LoopScheduler::default(),
            whir: EventScheduler::new(
                config.whir_rate_range.clone(),
                config.whir_gain_range.clone(),
            ),
            rng,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            state: self.state,
            main_volume: self.main_volume,
            hum_volume: self.hum_volume,
            whir_volume: self.whir_volume,
            play_hum: self.play_hum,
            play_whirs: self.play_whirs,
            whir_delay_profile: self.whir_delay_profile,
        }
    }

    /// Start the graph and both schedulers. Playing engines stay untouched.
    pub fn play(&mut self) -> Result<(), Error> {
        if self.state == PlaybackState::Playing {
            return Ok(());
        }
        if let Err(err) = self.graph.start() {
            log::error!("failed to start playback: {err}");
            return Err(err);
        }
        self.state = PlaybackState::Playing;
        log::info!("playback started");
        self.hum.start_monitoring(&mut self.graph, self.play_hum);
        self.whir
            .start_monitoring(&mut self.graph, &mut self.rng, self.play_whirs);
        Ok(())
    }

    /// Stop scheduling, silence both chains and stop the graph. Stopped engines stay untouched.
    pub fn pause(&mut self) {
        if self.state == PlaybackState::Stopped {
            return;
        }
        self.state = PlaybackState::Stopped;
        self.hum.stop();
        self.whir.stop();
        self.graph.pause_chain(Chain::Hum);
        self.graph.pause_chain(Chain::Whir);
        self.graph.stop();
        log::info!("playback stopped");
    }

    /// Pause when playing, else play.
    pub fn toggle(&mut self) -> Result<(), Error> {
        match self.state {
            PlaybackState::Playing => {
                self.pause();
                Ok(())
            }
            PlaybackState::Stopped => self.play(),
        }
    }

    pub fn set_main_volume(&mut self, volume: f32) {
        self.main_volume = clamp_volume(volume);
        self.graph
            .set_master_gain(master_gain(self.main_volume, self.master_gain_ceiling));
    }

    pub fn set_hum_volume(&mut self, volume: f32) {
        self.hum_volume = clamp_volume(volume);
        self.graph.set_chain_volume(Chain::Hum, self.hum_volume);
    }

    pub fn set_whir_volume(&mut self, volume: f32) {
        self.whir_volume = clamp_volume(volume);
        self.graph.set_chain_volume(Chain::Whir, self.whir_volume);
    }

    pub fn set_play_hum(&mut self, enabled: bool) {
        if self.play_hum == enabled {
            return;
        }
        self.play_hum = enabled;
        if self.state != PlaybackState::Playing {
            return;
        }
        if enabled {
            log::debug!("resuming hum");
            self.graph.reset_chain(Chain::Hum);
            self.graph.play_chain(Chain::Hum);
            self.hum.resume(&mut self.graph);
        } else {
            log::debug!("muting hum");
            self.hum.mute();
            self.graph.pause_chain(Chain::Hum);
        }
    }

    pub fn set_play_whirs(&mut self, enabled: bool) {
        if self.play_whirs == enabled {
            return;
        }
        self.play_whirs = enabled;
        if self.state != PlaybackState::Playing {
            return;
        }
        if enabled {
            log::debug!("resuming whirs");
            self.graph.reset_chain(Chain::Whir);
            self.graph.play_chain(Chain::Whir);
            self.whir.resume(&mut self.graph, &mut self.rng);
        } else {
            log::debug!("muting whirs");
            self.whir.mute();
            self.graph.pause_chain(Chain::Whir);
        }
    }

    pub fn set_whir_delay_profile(&mut self, profile: WhirDelayProfile) {
        if self.whir_delay_profile != profile {
            log::debug!("whir delay profile changed to '{profile}'");
            self.whir_delay_profile = profile;
        }
    }

    /// Handle a chain event from the render thread. Returns a timer which should call
    /// [`Self::handle_delay_elapsed`] when it fires.
    pub fn handle_event(&mut self, event: ChainEvent) -> Option<DelayTimer> {
        if self.state != PlaybackState::Playing {
            log::debug!("ignoring {event:?} while stopped");
            return None;
        }
        match event {
            ChainEvent::DataConsumed {
                chain: Chain::Hum,
                region,
            } => {
                self.hum.on_data_consumed(&mut self.graph, region);
                None
            }
            ChainEvent::DataConsumed {
                chain: Chain::Whir,
                region,
            } => self
                .whir
                .on_data_consumed(region, self.whir_delay_profile, &mut self.rng)
                .map(|delay| DelayTimer {
                    deadline: Instant::now() + delay.delay,
                    generation: delay.generation,
                }),
        }
    }

    /// Handle an elapsed whir delay timer.
    pub fn handle_delay_elapsed(&mut self, generation: u64) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.whir
            .on_delay_elapsed(&mut self.graph, &mut self.rng, generation);
    }
}

// -------------------------------------------------------------------------------------------------

enum WorkerMessage {
    Shutdown,
}

/// The ambient soundscape engine: a looping hum layered with randomized whirs.
///
/// All control surface functions can be called from any thread. Changes are applied
/// synchronously: getters return the new values right after setters returned. Chain events
/// and whir delays are handled by the engine's scheduler worker thread.
///
/// ```rust,no_run
/// use aetheryte::{
///     DefaultOutputDevice, Engine, EngineConfig, Error, FileAssetStore, WhirDelayProfile,
/// };
///
/// fn main() -> Result<(), Error> {
///     let engine = Engine::initialize(
///         DefaultOutputDevice::open()?,
///         &FileAssetStore::new("assets"),
///         EngineConfig::default(),
///     )?;
///     engine.toggle()?;
///     engine.set_whir_delay_profile(WhirDelayProfile::Infrequent);
///     std::thread::sleep(std::time::Duration::from_secs(10));
///     engine.toggle()?;
///     Ok(())
/// }
/// ```
pub struct Engine<G: AudioGraph> {
    core: Arc<Mutex<EngineCore<G>>>,
    worker_send: Sender<WorkerMessage>,
    worker_thread: Option<thread::JoinHandle<()>>,
}

impl<D: OutputDevice> Engine<OutputGraph<D>> {
    /// Load all assets from the store, wire the audio graph into the given output device and
    /// create a stopped engine.
    ///
    /// Fails with [`Error::AssetLoadError`] or [`Error::GraphConstructionError`]. Failures are
    /// terminal: create a new engine to retry.
    pub fn initialize(
        device: D,
        store: &impl AssetStore,
        config: EngineConfig,
    ) -> Result<Self, Error> {
        config.validate()?;
        let (event_send, event_recv) = bounded(config.event_queue_size);
        let graph = OutputGraph::initialize(device, store, &config, event_send)?;
        let rng = Self::seeded_rng(&config);
        Self::spawn(graph, event_recv, &config, Box::new(rng))
    }
}

impl<G: AudioGraph> Engine<G> {
    /// Create a stopped engine which controls the given graph. `events` must receive the
    /// graph's chain events.
    ///
    /// Whirs are randomized with the config's seed, or an OS seeded rng when there's none.
    pub fn with_graph(
        graph: G,
        events: Receiver<ChainEvent>,
        config: EngineConfig,
    ) -> Result<Self, Error> {
        config.validate()?;
        let rng = Self::seeded_rng(&config);
        Self::spawn(graph, events, &config, Box::new(rng))
    }

    /// Create a stopped engine which controls the given graph, using a custom random number
    /// generator for the whirs.
    pub fn with_graph_and_rng<R: RngCore + Send + 'static>(
        graph: G,
        events: Receiver<ChainEvent>,
        config: EngineConfig,
        rng: R,
    ) -> Result<Self, Error> {
        config.validate()?;
        Self::spawn(graph, events, &config, Box::new(rng))
    }

    fn seeded_rng(config: &EngineConfig) -> SmallRng {
        match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        }
    }

    /// Create the engine core for an already validated config and spawn the scheduler worker.
    fn spawn(
        graph: G,
        events: Receiver<ChainEvent>,
        config: &EngineConfig,
        rng: Box<dyn RngCore + Send>,
    ) -> Result<Self, Error> {
        let core = Arc::new(Mutex::new(EngineCore::new(graph, config, rng)));
        let (worker_send, worker_recv) = bounded(1);
        let worker_thread = thread::Builder::new()
            .name("aetheryte_scheduler".to_string())
            .spawn({
                let core = Arc::clone(&core);
                move || {
                    if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(move || {
                        Self::run_worker(core, events, worker_recv)
                    })) {
                        log::error!(
                            "Ouch. Scheduler thread panicked: {}",
                            panic_message::panic_message(&payload)
                        );
                    }
                }
            })?;
        log::info!("engine initialized");
        Ok(Self {
            core,
            worker_send,
            worker_thread: Some(worker_thread),
        })
    }

    /// True while the engine is playing.
    pub fn is_playing(&self) -> bool {
        self.core().state() == PlaybackState::Playing
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.core().state()
    }

    /// Snapshot of all control surface values.
    pub fn status(&self) -> EngineStatus {
        self.core().status()
    }

    /// Start playback. Fails with [`Error::EngineStartError`] when the audio output can't be
    /// started, leaving the engine stopped. Playing engines stay untouched.
    pub fn play(&self) -> Result<(), Error> {
        self.core().play()
    }

    /// Stop playback. Stopped engines stay untouched.
    pub fn pause(&self) {
        self.core().pause()
    }

    /// Pause when playing, else play. See [`Self::play`] for errors.
    pub fn toggle(&self) -> Result<(), Error> {
        self.core().toggle()
    }

    pub fn main_volume(&self) -> f32 {
        self.core().main_volume
    }
    /// Set the main volume in range `[0, 1]`. Out of range values are clamped.
    pub fn set_main_volume(&self, volume: f32) {
        self.core().set_main_volume(volume)
    }

    pub fn hum_volume(&self) -> f32 {
        self.core().hum_volume
    }
    /// Set the hum chain volume in range `[0, 1]`. Out of range values are clamped.
    pub fn set_hum_volume(&self, volume: f32) {
        self.core().set_hum_volume(volume)
    }

    pub fn whir_volume(&self) -> f32 {
        self.core().whir_volume
    }
    /// Set the whir chain volume in range `[0, 1]`. Out of range values are clamped.
    pub fn set_whir_volume(&self, volume: f32) {
        self.core().set_whir_volume(volume)
    }

    pub fn play_hum(&self) -> bool {
        self.core().play_hum
    }
    /// Enable or disable the hum chain, independently of the playback state.
    pub fn set_play_hum(&self, enabled: bool) {
        self.core().set_play_hum(enabled)
    }

    pub fn play_whirs(&self) -> bool {
        self.core().play_whirs
    }
    /// Enable or disable the whir chain, independently of the playback state.
    pub fn set_play_whirs(&self, enabled: bool) {
        self.core().set_play_whirs(enabled)
    }

    pub fn whir_delay_profile(&self) -> WhirDelayProfile {
        self.core().whir_delay_profile
    }
    /// Change the whir delay profile. Applies to all delays drawn after the change.
    pub fn set_whir_delay_profile(&self, profile: WhirDelayProfile) {
        self.core().set_whir_delay_profile(profile)
    }

    fn core(&self) -> MutexGuard<'_, EngineCore<G>> {
        lock(&self.core)
    }

    fn run_worker(
        core: Arc<Mutex<EngineCore<G>>>,
        events: Receiver<ChainEvent>,
        worker_recv: Receiver<WorkerMessage>,
    ) {
        let disconnected = crossbeam_channel::never();
        let mut events_connected = true;
        let mut timers = BinaryHeap::<Reverse<(Instant, u64)>>::new();
        loop {
            let event_recv = if events_connected {
                &events
            } else {
                &disconnected
            };
            let timeout = match timers.peek() {
                Some(Reverse((deadline, _))) => crossbeam_channel::at(*deadline),
                None => crossbeam_channel::never(),
            };
            crossbeam_channel::select! {
                recv(event_recv) -> event => match event {
                    Ok(event) => {
                        if let Some(timer) = lock(&core).handle_event(event) {
                            timers.push(Reverse((timer.deadline, timer.generation)));
                        }
                    }
                    Err(_) => {
                        log::debug!("chain event channel got disconnected");
                        events_connected = false;
                    }
                },
                recv(worker_recv) -> _ => {
                    break;
                },
                recv(timeout) -> _ => {
                    let now = Instant::now();
                    while let Some(Reverse((deadline, generation))) = timers.peek().copied() {
                        if deadline > now {
                            break;
                        }
                        timers.pop();
                        lock(&core).handle_delay_elapsed(generation);
                    }
                }
            }
        }
        log::debug!("scheduler thread stopped");
    }
}

impl<G: AudioGraph> Drop for Engine<G> {
    fn drop(&mut self) {
        self.core().pause();
        let _ = self.worker_send.send(WorkerMessage::Shutdown);
        if let Some(thread) = self.worker_thread.take() {
            if let Err(err) = thread.join() {
                log::error!(
                    "scheduler thread panicked: {}",
                    panic_message::panic_message(&err)
                );
            }
        }
    }
}

fn lock<G: AudioGraph>(core: &Mutex<EngineCore<G>>) -> MutexGuard<'_, EngineCore<G>> {
    core.lock().unwrap_or_else(PoisonError::into_inner)
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        graph::ScheduleRequest,
        testing::{test_asset_store, GraphCommand, ManualOutput, ManualOutputState, StubGraph},
    };
    use crossbeam_channel::unbounded;
    use std::time::Duration;

    fn new_core(graph: &StubGraph) -> EngineCore<StubGraph> {
        EngineCore::new(
            graph.clone(),
            &EngineConfig::default(),
            Box::new(SmallRng::seed_from_u64(0x1234)),
        )
    }

    fn consume(core: &mut EngineCore<StubGraph>, chain: Chain, region: usize) -> Option<DelayTimer> {
        core.handle_event(ChainEvent::DataConsumed { chain, region })
    }

    fn last_region(graph: &StubGraph, chain: Chain) -> usize {
        graph.scheduled(chain).last().unwrap().1
    }

    #[test]
    fn initial_volumes_are_applied() {
        let graph = StubGraph::new(5);
        let core = new_core(&graph);
        assert!((graph.master_gain().unwrap() - 0.088_388_35).abs() < 1e-6);
        assert_eq!(graph.chain_volume(Chain::Hum), Some(1.0));
        assert_eq!(graph.chain_volume(Chain::Whir), Some(1.0));
        assert_eq!(core.state(), PlaybackState::Stopped);
        assert!(graph.scheduled(Chain::Hum).is_empty());
    }

    #[test]
    fn play_and_pause() {
        let graph = StubGraph::new(5);
        let mut core = new_core(&graph);
        graph.clear_commands();

        core.play().unwrap();
        assert_eq!(core.state(), PlaybackState::Playing);
        assert_eq!(graph.commands()[0], GraphCommand::Start);
        assert_eq!(graph.scheduled(Chain::Hum).len(), 1);
        assert_eq!(graph.scheduled(Chain::Whir).len(), 1);

        // playing again does nothing
        core.play().unwrap();
        assert_eq!(graph.scheduled(Chain::Hum).len(), 1);

        let hum_region = last_region(&graph, Chain::Hum);
        let whir_region = last_region(&graph, Chain::Whir);
        graph.clear_commands();
        core.pause();
        assert_eq!(core.state(), PlaybackState::Stopped);
        assert_eq!(
            graph.commands(),
            vec![
                GraphCommand::PauseChain(Chain::Hum),
                GraphCommand::PauseChain(Chain::Whir),
                GraphCommand::Stop
            ]
        );

        // stale completions never schedule after a pause
        assert_eq!(consume(&mut core, Chain::Hum, hum_region), None);
        assert_eq!(consume(&mut core, Chain::Whir, whir_region), None);
        assert_eq!(graph.commands().len(), 3);

        core.pause();
        assert_eq!(graph.commands().len(), 3);
    }

    #[test]
    fn stale_completions_of_previous_sessions_are_ignored() {
        let graph = StubGraph::new(5);
        let mut core = new_core(&graph);
        core.play().unwrap();
        let old_region = last_region(&graph, Chain::Hum);
        core.pause();
        core.play().unwrap();
        assert_eq!(graph.scheduled(Chain::Hum).len(), 2);

        consume(&mut core, Chain::Hum, old_region);
        assert_eq!(graph.scheduled(Chain::Hum).len(), 2);
        consume(&mut core, Chain::Hum, last_region(&graph, Chain::Hum));
        assert_eq!(graph.scheduled(Chain::Hum).len(), 3);
    }

    #[test]
    fn hum_keeps_exactly_one_continuation() {
        let graph = StubGraph::new(5);
        let mut core = new_core(&graph);
        core.play().unwrap();
        for count in 2..10 {
            let region = last_region(&graph, Chain::Hum);
            assert_eq!(consume(&mut core, Chain::Hum, region), None);
            // duplicated notifications don't fork the loop
            consume(&mut core, Chain::Hum, region);
            assert_eq!(graph.scheduled(Chain::Hum).len(), count);
        }
        assert!(graph
            .scheduled(Chain::Hum)
            .iter()
            .all(|(request, _)| *request == ScheduleRequest::hum()));
    }

    #[test]
    fn start_failure_keeps_engine_stopped() {
        let graph = StubGraph::new(5);
        let mut core = new_core(&graph);
        graph.fail_start(true);
        assert!(matches!(core.toggle(), Err(Error::EngineStartError(_))));
        assert_eq!(core.state(), PlaybackState::Stopped);
        assert!(graph.scheduled(Chain::Hum).is_empty());
        assert!(graph.scheduled(Chain::Whir).is_empty());

        // later toggles work as usual
        graph.fail_start(false);
        core.toggle().unwrap();
        assert_eq!(core.state(), PlaybackState::Playing);
        core.toggle().unwrap();
        assert_eq!(core.state(), PlaybackState::Stopped);
    }

    #[test]
    fn whir_delays_follow_the_current_profile() {
        let graph = StubGraph::new(5);
        let mut core = new_core(&graph);
        core.play().unwrap();

        let before = Instant::now();
        let timer = consume(&mut core, Chain::Whir, last_region(&graph, Chain::Whir)).unwrap();
        assert!(timer.deadline <= Instant::now() + Duration::from_millis(2001));

        // switching the profile only affects the next draw
        core.set_whir_delay_profile(WhirDelayProfile::Infrequent);
        core.handle_delay_elapsed(timer.generation);
        assert_eq!(graph.scheduled(Chain::Whir).len(), 2);

        let timer = consume(&mut core, Chain::Whir, last_region(&graph, Chain::Whir)).unwrap();
        assert!(timer.deadline >= before + Duration::from_millis(2001));

        // an elapsed timer fires once only
        core.handle_delay_elapsed(timer.generation);
        core.handle_delay_elapsed(timer.generation);
        assert_eq!(graph.scheduled(Chain::Whir).len(), 3);
    }

    #[test]
    fn disabling_whirs_leaves_hum_untouched() {
        let graph = StubGraph::new(5);
        let mut core = new_core(&graph);
        core.play().unwrap();
        let hum_region = last_region(&graph, Chain::Hum);
        let whir_region = last_region(&graph, Chain::Whir);
        graph.clear_commands();

        core.set_play_whirs(false);
        assert_eq!(graph.commands(), vec![GraphCommand::PauseChain(Chain::Whir)]);
        assert_eq!(consume(&mut core, Chain::Whir, whir_region), None);
        assert!(graph.scheduled(Chain::Whir).is_empty());

        // hum keeps looping
        consume(&mut core, Chain::Hum, hum_region);
        assert_eq!(graph.scheduled(Chain::Hum).len(), 1);
        graph.clear_commands();

        // re-enabling drops the orphaned region, resumes the node and schedules right away
        core.set_play_whirs(true);
        let commands = graph.commands();
        assert_eq!(commands.len(), 3);
        assert_eq!(commands[0], GraphCommand::ResetChain(Chain::Whir));
        assert_eq!(commands[1], GraphCommand::PlayChain(Chain::Whir));
        assert!(matches!(
            commands[2],
            GraphCommand::Schedule(Chain::Whir, _, _)
        ));

        // enabling twice doesn't schedule twice
        core.set_play_whirs(true);
        assert_eq!(graph.commands().len(), 3);
        assert!(graph.scheduled(Chain::Hum).is_empty());
    }

    #[test]
    fn chains_enabled_while_stopped_start_with_playback() {
        let graph = StubGraph::new(5);
        let mut core = EngineCore::new(
            graph.clone(),
            &EngineConfig::default().play_hum(false).play_whirs(false),
            Box::new(SmallRng::seed_from_u64(1)),
        );
        core.play().unwrap();
        assert!(graph.scheduled(Chain::Hum).is_empty());
        assert!(graph.scheduled(Chain::Whir).is_empty());

        // monitoring started with playback, so enabling resumes right away
        core.set_play_hum(true);
        assert_eq!(graph.scheduled(Chain::Hum).len(), 1);

        core.pause();
        core.set_play_whirs(true);
        assert!(graph.scheduled(Chain::Whir).is_empty());
        core.play().unwrap();
        assert_eq!(graph.scheduled(Chain::Whir).len(), 1);
    }

    #[test]
    fn volumes_are_clamped() {
        let graph = StubGraph::new(5);
        let mut core = new_core(&graph);
        core.set_main_volume(2.0);
        assert_eq!(graph.master_gain(), Some(0.125));
        core.set_main_volume(0.0);
        assert_eq!(graph.master_gain(), Some(0.0));
        core.set_hum_volume(-1.0);
        assert_eq!(graph.chain_volume(Chain::Hum), Some(0.0));
        core.set_whir_volume(0.25);
        assert_eq!(graph.chain_volume(Chain::Whir), Some(0.25));

        let status = core.status();
        assert_eq!(status.main_volume, 0.0);
        assert_eq!(status.hum_volume, 0.0);
        assert_eq!(status.whir_volume, 0.25);
        assert!(!status.is_playing());
    }

    fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn engine_worker_handles_chain_events() {
        let graph = StubGraph::new(5);
        let (event_send, event_recv) = unbounded();
        let engine = Engine::with_graph(
            graph.clone(),
            event_recv,
            EngineConfig::default().seed(42).play_whirs(false),
        )
        .unwrap();

        engine.toggle().unwrap();
        assert!(engine.is_playing());
        for count in 2..5 {
            let region = last_region(&graph, Chain::Hum);
            event_send
                .send(ChainEvent::DataConsumed {
                    chain: Chain::Hum,
                    region,
                })
                .unwrap();
            assert!(wait_for(|| graph.scheduled(Chain::Hum).len() == count));
        }

        engine.set_main_volume(0.25);
        engine.set_whir_delay_profile(WhirDelayProfile::Infrequent);
        let status = engine.status();
        assert_eq!(status.main_volume, 0.25);
        assert_eq!(status.whir_delay_profile, WhirDelayProfile::Infrequent);
        assert!(!engine.play_whirs());

        engine.toggle().unwrap();
        assert!(!engine.is_playing());
        drop(engine);
        assert_eq!(graph.commands().last(), Some(&GraphCommand::Stop));
    }

    #[test]
    fn engine_worker_fires_whir_delays() {
        let graph = StubGraph::new(5);
        let (event_send, event_recv) = unbounded();
        let engine = Engine::with_graph(
            graph.clone(),
            event_recv,
            EngineConfig::default().seed(7).play_hum(false),
        )
        .unwrap();
        engine.play().unwrap();
        assert_eq!(graph.scheduled(Chain::Whir).len(), 1);

        // in game delays are at most ~2 seconds
        let region = last_region(&graph, Chain::Whir);
        event_send
            .send(ChainEvent::DataConsumed {
                chain: Chain::Whir,
                region,
            })
            .unwrap();
        assert!(wait_for(|| graph.scheduled(Chain::Whir).len() == 2));
    }

    #[test]
    fn initialize_with_output_device() {
        let output = ManualOutput::new(2, 1000);
        let state = output.state();
        let engine = Engine::initialize(
            output,
            &test_asset_store(),
            EngineConfig::default().seed(1).main_volume(1.0),
        )
        .unwrap();
        engine.play().unwrap();
        assert!(state.lock().unwrap().running);

        // hum and a whir get rendered
        let rendered = state.lock().unwrap().render(200);
        assert!(rendered.iter().any(|s| *s != 0.0));
        assert!(rendered.iter().all(|s| s.abs() <= 0.125 * 2.0));

        engine.pause();
        assert!(!state.lock().unwrap().running);
    }

    #[test]
    fn initialize_fails_on_missing_assets() {
        let result = Engine::initialize(
            ManualOutput::new(2, 1000),
            &test_asset_store(),
            EngineConfig::default().hum_asset("hum_missing"),
        );
        assert!(matches!(result, Err(Error::AssetLoadError { .. })));
    }

    #[test]
    fn initialize_rejects_invalid_configs_before_wiring() {
        let output = ManualOutput::new(2, 1000);
        let state = output.state();
        let result = Engine::initialize(
            output,
            &test_asset_store(),
            EngineConfig::default().hum_rate(0.0),
        );
        assert!(matches!(result, Err(Error::ParameterError(_))));
        assert_eq!(state.lock().unwrap().attached_sources, 0);
    }

    /// Render blocks of 10 frames while the worker runs. Returns the number of silent samples
    /// and whether the last block was audible.
    fn render_blocks(state: &Mutex<ManualOutputState>, blocks: usize) -> (usize, bool) {
        let mut silent = 0;
        let mut last_block_audible = false;
        for _ in 0..blocks {
            let block = state.lock().unwrap().render(10);
            silent += block.iter().filter(|s| **s == 0.0).count();
            last_block_audible = block.iter().all(|s| *s != 0.0);
            thread::sleep(Duration::from_millis(1));
        }
        (silent, last_block_audible)
    }

    #[test]
    fn hum_survives_rapid_toggling() {
        let output = ManualOutput::new(1, 1000);
        let state = output.state();
        let engine = Engine::initialize(
            output,
            &test_asset_store(),
            EngineConfig::default().seed(5).play_whirs(false),
        )
        .unwrap();

        // a stopped device doesn't render in between
        for _ in 0..40 {
            engine.toggle().unwrap();
            engine.toggle().unwrap();
        }
        engine.toggle().unwrap();
        assert!(engine.is_playing());

        let (silent, last_block_audible) = render_blocks(&state, 300);
        assert!(silent < 300, "{silent} of 3000 samples are silent");
        assert!(last_block_audible);
    }

    #[test]
    fn hum_survives_rapid_muting() {
        let output = ManualOutput::new(1, 1000);
        let state = output.state();
        let engine = Engine::initialize(
            output,
            &test_asset_store(),
            EngineConfig::default().seed(6).play_whirs(false),
        )
        .unwrap();
        engine.play().unwrap();

        for _ in 0..100 {
            engine.set_play_hum(false);
            engine.set_play_hum(true);
        }
        assert!(engine.play_hum());

        let (silent, last_block_audible) = render_blocks(&state, 300);
        assert!(silent < 300, "{silent} of 3000 samples are silent");
        assert!(last_block_audible);
    }
}
