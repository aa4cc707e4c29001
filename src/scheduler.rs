//! Per-chain schedulers: the hum's gapless loop and the whirs' randomized events.
//!
//! Schedulers don't own threads or timers. They react to chain events and timer expirations
//! which the engine feeds in, and emit commands into the [`AudioGraph`] they get passed.

use std::{ops::RangeInclusive, time::Duration};

use rand::Rng;

use crate::{
    graph::{AudioGraph, Chain, ScheduleRequest},
    source::{player::RegionId, timepitch::TimePitch},
};

// -------------------------------------------------------------------------------------------------

/// Delay distribution between consecutive whir events.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
pub enum WhirDelayProfile {
    /// Frequent whirs: 0 to 2 seconds between events.
    #[default]
    #[strum(to_string = "in game")]
    InGame,
    /// Rare whirs: 2 to 8 seconds between events.
    #[strum(to_string = "infrequent")]
    Infrequent,
}

impl WhirDelayProfile {
    /// Inclusive delay range in milliseconds.
    pub fn delay_range_ms(&self) -> RangeInclusive<u64> {
        match self {
            Self::InGame => 0..=2001,
            Self::Infrequent => 2001..=8001,
        }
    }

    /// Draw a delay uniformly from the profile's range.
    pub fn draw_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        Duration::from_millis(rng.random_range(self.delay_range_ms()))
    }
}

// -------------------------------------------------------------------------------------------------

/// Per-chain gate for scheduling continuations.
///
/// Every activation and every clear starts a new generation. Continuations remember the
/// generation they got issued in and only proceed while it is still the current, active one.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SchedulingFlag {
    active: bool,
    generation: u64,
}

impl SchedulingFlag {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn activate(&mut self) -> u64 {
        self.active = true;
        self.generation += 1;
        self.generation
    }

    pub fn clear(&mut self) {
        self.active = false;
        self.generation += 1;
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.active && self.generation == generation
    }
}

// -------------------------------------------------------------------------------------------------

/// A region on a chain's player node whose completion we are waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Outstanding {
    region: RegionId,
    generation: u64,
}

// -------------------------------------------------------------------------------------------------

/// Schedules the hum asset on the hum chain, again and again, right when the previous region's
/// data got consumed.
#[derive(Debug, Default)]
pub(crate) struct LoopScheduler {
    flag: SchedulingFlag,
    monitoring: bool,
    outstanding: Option<Outstanding>,
}

impl LoopScheduler {
    #[cfg(test)]
    pub fn flag(&self) -> SchedulingFlag {
        self.flag
    }

    /// True once monitoring started in the current playing session.
    #[cfg(test)]
    pub fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    /// Start looping when playback starts. Only schedules when the chain is enabled.
    pub fn start_monitoring<G: AudioGraph>(&mut self, graph: &mut G, enabled: bool) {
        self.monitoring = true;
        if enabled {
            self.flag.activate();
            self.schedule_next(graph);
        }
    }

    /// Stop looping because playback stopped.
    pub fn stop(&mut self) {
        self.flag.clear();
        self.monitoring = false;
        self.outstanding = None;
    }

    /// Stop looping because the chain got disabled.
    pub fn mute(&mut self) {
        self.flag.clear();
        self.outstanding = None;
    }

    /// Continue looping after the chain got enabled again.
    pub fn resume<G: AudioGraph>(&mut self, graph: &mut G) {
        if self.monitoring {
            self.flag.activate();
            self.schedule_next(graph);
        }
    }

    /// Handle a data consumed notification of the hum chain.
    pub fn on_data_consumed<G: AudioGraph>(&mut self, graph: &mut G, region: RegionId) {
        match self.outstanding {
            Some(outstanding) if outstanding.region == region => {
                self.outstanding = None;
                if self.flag.is_current(outstanding.generation) {
                    self.schedule_next(graph);
                } else {
                    log::debug!("ignoring stale hum continuation");
                }
            }
            _ => log::debug!("ignoring data consumed event of unknown hum region {region}"),
        }
    }

    fn schedule_next<G: AudioGraph>(&mut self, graph: &mut G) {
        if !self.flag.is_active() {
            return;
        }
        match graph.schedule(Chain::Hum, ScheduleRequest::hum()) {
            Ok(region) => {
                self.outstanding = Some(Outstanding {
                    region,
                    generation: self.flag.generation(),
                });
            }
            Err(err) => {
                // nothing is left to continue the loop: the next resume or play re-arms it
                log::warn!("failed to schedule hum: {err}");
                self.flag.clear();
                self.outstanding = None;
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// A whir delay which needs to elapse before the next whir event gets scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WhirDelay {
    pub delay: Duration,
    pub generation: u64,
}

/// Schedules randomized whir events on the whir chain: after each event's data got consumed,
/// a random delay passes, then the next event gets scheduled with a random asset variant,
/// rate and gain.
#[derive(Debug)]
pub(crate) struct EventScheduler {
    flag: SchedulingFlag,
    monitoring: bool,
    outstanding: Option<Outstanding>,
    pending_delay: Option<u64>,
    rate_range: RangeInclusive<f32>,
    gain_range: RangeInclusive<f32>,
}

impl EventScheduler {
    pub fn new(rate_range: RangeInclusive<f32>, gain_range: RangeInclusive<f32>) -> Self {
        Self {
            flag: SchedulingFlag::default(),
            monitoring: false,
            outstanding: None,
            pending_delay: None,
            rate_range,
            gain_range,
        }
    }

    #[cfg(test)]
    pub fn flag(&self) -> SchedulingFlag {
        self.flag
    }

    /// True once monitoring started in the current playing session.
    #[cfg(test)]
    pub fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    /// Start the first whir event when playback starts. Only schedules when enabled.
    pub fn start_monitoring<G: AudioGraph, R: Rng + ?Sized>(
        &mut self,
        graph: &mut G,
        rng: &mut R,
        enabled: bool,
    ) {
        self.monitoring = true;
        if enabled {
            self.flag.activate();
            self.schedule_next(graph, rng);
        }
    }

    /// Stop scheduling events because playback stopped.
    pub fn stop(&mut self) {
        self.flag.clear();
        self.monitoring = false;
        self.outstanding = None;
        self.pending_delay = None;
    }

    /// Stop scheduling events because the chain got disabled.
    pub fn mute(&mut self) {
        self.flag.clear();
        self.outstanding = None;
        self.pending_delay = None;
    }

    /// Schedule a new event right away after the chain got enabled again.
    pub fn resume<G: AudioGraph, R: Rng + ?Sized>(&mut self, graph: &mut G, rng: &mut R) {
        if self.monitoring {
            self.flag.activate();
            self.pending_delay = None;
            self.schedule_next(graph, rng);
        }
    }

    /// Handle a data consumed notification of the whir chain. Returns the delay which should
    /// elapse before [`Self::on_delay_elapsed`] gets called.
    pub fn on_data_consumed<R: Rng + ?Sized>(
        &mut self,
        region: RegionId,
        profile: WhirDelayProfile,
        rng: &mut R,
    ) -> Option<WhirDelay> {
        match self.outstanding {
            Some(outstanding) if outstanding.region == region => {
                self.outstanding = None;
                if self.flag.is_current(outstanding.generation) {
                    let delay = profile.draw_delay(rng);
                    log::debug!("next whir in {} ms", delay.as_millis());
                    self.pending_delay = Some(outstanding.generation);
                    Some(WhirDelay {
                        delay,
                        generation: outstanding.generation,
                    })
                } else {
                    log::debug!("ignoring stale whir continuation");
                    None
                }
            }
            _ => {
                log::debug!("ignoring data consumed event of unknown whir region {region}");
                None
            }
        }
    }

    /// Schedule the next event when the given delay still is the pending one.
    pub fn on_delay_elapsed<G: AudioGraph, R: Rng + ?Sized>(
        &mut self,
        graph: &mut G,
        rng: &mut R,
        generation: u64,
    ) {
        if self.pending_delay == Some(generation) && self.flag.is_current(generation) {
            self.pending_delay = None;
            self.schedule_next(graph, rng);
        } else {
            log::debug!("ignoring stale whir delay");
        }
    }

    fn schedule_next<G: AudioGraph, R: Rng + ?Sized>(&mut self, graph: &mut G, rng: &mut R) {
        if !self.flag.is_active() {
            return;
        }
        let variant_count = graph.whir_variant_count();
        if variant_count == 0 {
            log::warn!("no whir variants to schedule");
            return;
        }
        let variant = rng.random_range(0..variant_count);
        let rate = rng.random_range(self.rate_range.clone());
        let gain = rng.random_range(self.gain_range.clone());
        let time_pitch = TimePitch::from_rate(rate);
        log::debug!(
            "scheduling whir #{variant} with rate {rate:.3}, pitch {:.1} cents, gain {gain:.3}",
            time_pitch.pitch
        );
        match graph.schedule(
            Chain::Whir,
            ScheduleRequest::whir(variant, gain, time_pitch),
        ) {
            Ok(region) => {
                self.outstanding = Some(Outstanding {
                    region,
                    generation: self.flag.generation(),
                });
            }
            Err(err) => {
                log::warn!("failed to schedule whir: {err}");
                self.flag.clear();
                self.outstanding = None;
                self.pending_delay = None;
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------
