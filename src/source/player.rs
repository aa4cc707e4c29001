use std::{
    sync::{
        atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use crossbeam_channel::{Sender, TrySendError};
use crossbeam_queue::ArrayQueue;

use super::{timepitch::TimePitch, Source};
use crate::{
    asset::SoundAsset,
    error::Error,
    graph::{Chain, ChainEvent},
    utils::{
        buffer::map_frame,
        interpolation::read_interpolated_frame,
        smoothed::SmoothedGain,
        unique_usize_id,
    },
};

// -------------------------------------------------------------------------------------------------

/// Unique identifier of a scheduled playback region.
pub type RegionId = usize;

/// Max number of channels a sound asset may have.
pub const MAX_CHANNELS: usize = 8;

// -------------------------------------------------------------------------------------------------

/// One scheduled playback of a sound asset on a player node.
pub(crate) struct Region {
    id: RegionId,
    asset: SoundAsset,
    gain: f32,
    time_pitch: Option<TimePitch>,
    reset_generation: u64,
}

impl Region {
    pub fn new(asset: SoundAsset, gain: f32, time_pitch: Option<TimePitch>) -> Self {
        debug_assert!(asset.channel_count() <= MAX_CHANNELS);
        Self {
            id: unique_usize_id(),
            asset,
            gain,
            time_pitch,
            reset_generation: 0,
        }
    }

    pub fn id(&self) -> RegionId {
        self.id
    }
}

// -------------------------------------------------------------------------------------------------

/// Player node state which the control plane writes and the render thread reads.
struct PlayerState {
    paused: AtomicBool,
    reset_generation: AtomicU64,
    volume: AtomicU32,
}

/// Control plane handle of a [`PlayerSource`].
///
/// Regions are passed via a lock-free queue. Pause state, resets and the chain volume are
/// atomics, so they can't get lost when the node doesn't render, and the render thread never
/// waits on the control plane.
#[derive(Clone)]
pub(crate) struct PlayerHandle {
    region_queue: Arc<ArrayQueue<Region>>,
    state: Arc<PlayerState>,
}

impl PlayerHandle {
    /// Append a region to the node's queue. It starts right after the last queued region ends.
    pub fn schedule(&self, mut region: Region) -> Result<RegionId, Error> {
        region.reset_generation = self.state.reset_generation.load(Ordering::Acquire);
        let id = region.id();
        self.region_queue
            .push(region)
            .map_err(|_region| Error::SendError("player node region queue is full".to_string()))?;
        Ok(id)
    }

    /// Resume rendering queued regions.
    pub fn play(&self) {
        self.state.paused.store(false, Ordering::Release);
    }

    /// Pause rendering, keeping the queued regions and the playback position.
    pub fn pause(&self) {
        self.state.paused.store(true, Ordering::Release);
    }

    /// Drop all queued regions and the playing one without notifying their consumption.
    pub fn reset(&self) {
        self.state.reset_generation.fetch_add(1, Ordering::AcqRel);
        // stopped devices don't render, so drain here instead of in the render thread
        while self.region_queue.pop().is_some() {}
    }

    pub fn set_volume(&self, volume: f32) {
        self.state.volume.store(volume.to_bits(), Ordering::Relaxed);
    }
}

// -------------------------------------------------------------------------------------------------

/// The region which is currently rendered by a player node.
struct PlayingRegion {
    region: Region,
    position: f64,
    speed: f64,
    data_consumed: bool,
}

impl PlayingRegion {
    fn frame_count(&self) -> f64 {
        self.region.asset.frame_count() as f64
    }

    /// Number of output frames left until the region's end.
    fn remaining_output_frames(&self) -> usize {
        ((self.frame_count() - self.position).max(0.0) / self.speed).ceil() as usize
    }

    fn is_finished(&self) -> bool {
        self.position >= self.frame_count()
    }
}

// -------------------------------------------------------------------------------------------------

/// A chain's player node: renders queued sound asset regions back to back, applying the
/// chain's rate/pitch shift settings, the region's gain and the chain's volume.
///
/// The node notifies the control plane with a [`ChainEvent::DataConsumed`] event as soon as
/// a region's data got read into the node's read-ahead window, which is when the next region
/// should be scheduled to continue playback without a gap. Notifications which don't fit into
/// the event channel are retried in the following render calls.
pub(crate) struct PlayerSource {
    chain: Chain,
    channel_count: usize,
    sample_rate: u32,
    region_queue: Arc<ArrayQueue<Region>>,
    state: Arc<PlayerState>,
    reset_generation: u64,
    playing: Option<PlayingRegion>,
    time_pitch: TimePitch,
    region_gain: f32,
    smoothed_gain: SmoothedGain,
    read_ahead_frames: usize,
    pending_notification: Option<RegionId>,
    event_sender: Sender<ChainEvent>,
}

impl PlayerSource {
    const REGION_QUEUE_SIZE: usize = 64;

    /// Create a new, initially paused player node which renders in the given output format.
    pub fn new(
        chain: Chain,
        channel_count: usize,
        sample_rate: u32,
        time_pitch: TimePitch,
        read_ahead: Duration,
        event_sender: Sender<ChainEvent>,
    ) -> (Self, PlayerHandle) {
        debug_assert!(channel_count > 0 && channel_count <= MAX_CHANNELS);
        let region_queue = Arc::new(ArrayQueue::new(Self::REGION_QUEUE_SIZE));
        let state = Arc::new(PlayerState {
            paused: AtomicBool::new(true),
            reset_generation: AtomicU64::new(0),
            volume: AtomicU32::new(1.0_f32.to_bits()),
        });
        let read_ahead_frames = (read_ahead.as_secs_f64() * sample_rate as f64).round() as usize;
        let source = Self {
            chain,
            channel_count,
            sample_rate,
            region_queue: Arc::clone(&region_queue),
            state: Arc::clone(&state),
            reset_generation: 0,
            playing: None,
            time_pitch,
            region_gain: 1.0,
            smoothed_gain: SmoothedGain::new(1.0, sample_rate),
            read_ahead_frames,
            pending_notification: None,
            event_sender,
        };
        let handle = PlayerHandle {
            region_queue,
            state,
        };
        (source, handle)
    }

    /// Forget the playing region when the node got reset since the last render call.
    fn apply_reset(&mut self) {
        let reset_generation = self.state.reset_generation.load(Ordering::Acquire);
        if reset_generation != self.reset_generation {
            self.reset_generation = reset_generation;
            self.playing = None;
            self.pending_notification = None;
        }
    }

    fn start_next_region(&mut self) -> bool {
        while let Some(region) = self.region_queue.pop() {
            if region.reset_generation != self.reset_generation {
                // scheduled before a reset
                continue;
            }
            if let Some(time_pitch) = region.time_pitch {
                self.time_pitch = time_pitch;
            }
            self.region_gain = region.gain;
            let speed = region.asset.sample_rate() as f64 / self.sample_rate as f64
                * self.time_pitch.speed();
            self.playing = Some(PlayingRegion {
                region,
                position: 0.0,
                speed: speed.max(f64::EPSILON),
                data_consumed: false,
            });
            return true;
        }
        false
    }

    fn notify_data_consumed(&mut self, region: RegionId) {
        let event = ChainEvent::DataConsumed {
            chain: self.chain,
            region,
        };
        match self.event_sender.try_send(event) {
            Ok(()) => self.pending_notification = None,
            Err(TrySendError::Full(_)) => {
                if self.pending_notification.is_none() {
                    log::warn!("{} data consumed event queue is full, retrying", self.chain);
                }
                self.pending_notification = Some(region);
            }
            Err(TrySendError::Disconnected(_)) => self.pending_notification = None,
        }
    }
}

impl Source for PlayerSource {
    fn write(&mut self, output: &mut [f32]) -> usize {
        self.apply_reset();
        if let Some(region) = self.pending_notification {
            self.notify_data_consumed(region);
        }
        if self.state.paused.load(Ordering::Acquire) {
            return 0;
        }

        let volume = f32::from_bits(self.state.volume.load(Ordering::Relaxed));
        let channel_count = self.channel_count;
        let mut input_frame = [0.0_f32; MAX_CHANNELS];
        let mut written = 0;
        while written + channel_count <= output.len() {
            if self.playing.is_none() && !self.start_next_region() {
                break;
            }
            self.smoothed_gain.set_target(volume * self.region_gain);
            let Some(playing) = self.playing.as_mut() else {
                break;
            };
            let input_channel_count = playing.region.asset.channel_count();
            let output_frame = &mut output[written..written + channel_count];
            let input_frame = &mut input_frame[..input_channel_count];
            read_interpolated_frame(
                playing.region.asset.buffer(),
                input_channel_count,
                playing.position,
                input_frame,
            );
            if !map_frame(input_frame, output_frame) {
                output_frame.fill(0.0);
            }
            let gain = self.smoothed_gain.next();
            for s in output_frame.iter_mut() {
                *s *= gain;
            }
            written += channel_count;

            playing.position += playing.speed;
            let notify = !playing.data_consumed
                && (playing.is_finished()
                    || playing.remaining_output_frames() <= self.read_ahead_frames);
            if notify {
                playing.data_consumed = true;
            }
            let region_id = playing.region.id();
            let finished = playing.is_finished();
            if notify {
                self.notify_data_consumed(region_id);
            }
            if finished {
                self.playing = None;
            }
        }
        written
    }

    fn channel_count(&self) -> usize {
        self.channel_count
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

// -------------------------------------------------------------------------------------------------
