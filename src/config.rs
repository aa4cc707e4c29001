use std::{ops::RangeInclusive, time::Duration};

use crate::{error::Error, scheduler::WhirDelayProfile, volume::DEFAULT_MASTER_GAIN_CEILING};

// -------------------------------------------------------------------------------------------------

/// Engine configuration: asset names, sound design constants and the initial control surface
/// values.
///
/// The default configuration is the stock soundscape. Use the builder style setters to
/// customize it:
///
/// ```rust
/// use aetheryte::{EngineConfig, WhirDelayProfile};
///
/// let config = EngineConfig::default()
///     .main_volume(0.8)
///     .whir_delay_profile(WhirDelayProfile::Infrequent)
///     .seed(0x1234);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Logical name of the looping hum asset.
    pub hum_asset: String,
    /// Logical names of the whir assets. At least one is required.
    pub whir_assets: Vec<String>,
    /// Playback rate of the hum chain. The chain's pitch follows the rate.
    pub hum_rate: f32,
    /// Range of the per-event whir playback rates.
    pub whir_rate_range: RangeInclusive<f32>,
    /// Range of the per-event whir gains.
    pub whir_gain_range: RangeInclusive<f32>,
    /// Master gain at full main volume.
    pub master_gain_ceiling: f32,
    /// Duration before a region's end at which the next region gets scheduled.
    pub read_ahead: Duration,
    /// Seed for the whir randomization. `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Capacity of the channel which passes chain events from the render thread to the
    /// scheduler worker.
    pub event_queue_size: usize,

    /// Initial main volume in range `[0, 1]`.
    pub main_volume: f32,
    /// Initial hum chain volume in range `[0, 1]`.
    pub hum_volume: f32,
    /// Initial whir chain volume in range `[0, 1]`.
    pub whir_volume: f32,
    /// Initially enable the hum chain.
    pub play_hum: bool,
    /// Initially enable the whir chain.
    pub play_whirs: bool,
    /// Initial whir delay profile.
    pub whir_delay_profile: WhirDelayProfile,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hum_asset: Self::DEFAULT_HUM_ASSET.to_string(),
            whir_assets: Self::DEFAULT_WHIR_ASSETS
                .iter()
                .map(|name| name.to_string())
                .collect(),
            hum_rate: 0.63,
            whir_rate_range: 0.794..=1.0,
            whir_gain_range: 0.6..=1.0,
            master_gain_ceiling: DEFAULT_MASTER_GAIN_CEILING,
            read_ahead: Duration::from_millis(100),
            seed: None,
            event_queue_size: 64,
            main_volume: 0.5,
            hum_volume: 1.0,
            whir_volume: 1.0,
            play_hum: true,
            play_whirs: true,
            whir_delay_profile: WhirDelayProfile::InGame,
        }
    }
}

impl EngineConfig {
    pub const DEFAULT_HUM_ASSET: &'static str = "hum";
    pub const DEFAULT_WHIR_ASSETS: [&'static str; 5] = ["whir1", "whir2", "whir3", "whir4", "whir5"];

    /// Max supported playback rate of the hum and whirs.
    pub const MAX_RATE: f32 = 4.0;

    pub fn hum_asset<S: Into<String>>(mut self, name: S) -> Self {
        self.hum_asset = name.into();
        self
    }

    pub fn whir_assets<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.whir_assets = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn hum_rate(mut self, rate: f32) -> Self {
        self.hum_rate = rate;
        self
    }

    pub fn whir_rate_range(mut self, range: RangeInclusive<f32>) -> Self {
        self.whir_rate_range = range;
        self
    }

    pub fn whir_gain_range(mut self, range: RangeInclusive<f32>) -> Self {
        self.whir_gain_range = range;
        self
    }

    pub fn master_gain_ceiling(mut self, gain: f32) -> Self {
        self.master_gain_ceiling = gain;
        self
    }

    pub fn read_ahead(mut self, duration: Duration) -> Self {
        self.read_ahead = duration;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn event_queue_size(mut self, size: usize) -> Self {
        self.event_queue_size = size;
        self
    }

    pub fn main_volume(mut self, volume: f32) -> Self {
        self.main_volume = volume;
        self
    }

    pub fn hum_volume(mut self, volume: f32) -> Self {
        self.hum_volume = volume;
        self
    }

    pub fn whir_volume(mut self, volume: f32) -> Self {
        self.whir_volume = volume;
        self
    }

    pub fn play_hum(mut self, enabled: bool) -> Self {
        self.play_hum = enabled;
        self
    }

    pub fn play_whirs(mut self, enabled: bool) -> Self {
        self.play_whirs = enabled;
        self
    }

    pub fn whir_delay_profile(mut self, profile: WhirDelayProfile) -> Self {
        self.whir_delay_profile = profile;
        self
    }

    /// Check if the config is usable. Initial volumes are not validated here: they get clamped
    /// like all volume changes.
    pub fn validate(&self) -> Result<(), Error> {
        if self.hum_asset.is_empty() {
            return Err(Error::ParameterError("hum asset name is empty".to_string()));
        }
        if self.whir_assets.is_empty() {
            return Err(Error::ParameterError(
                "at least one whir asset is required".to_string(),
            ));
        }
        if let Some(name) = self.whir_assets.iter().find(|name| name.is_empty()) {
            return Err(Error::ParameterError(format!(
                "invalid whir asset name '{name}'"
            )));
        }
        if !(self.hum_rate > 0.0 && self.hum_rate <= Self::MAX_RATE) {
            return Err(Error::ParameterError(format!(
                "hum rate must be in range (0, {}], but is {}",
                Self::MAX_RATE,
                self.hum_rate
            )));
        }
        let (rate_start, rate_end) = self.whir_rate_range.clone().into_inner();
        if !(rate_start > 0.0 && rate_start <= rate_end && rate_end <= Self::MAX_RATE) {
            return Err(Error::ParameterError(format!(
                "invalid whir rate range {rate_start}..={rate_end}"
            )));
        }
        let (gain_start, gain_end) = self.whir_gain_range.clone().into_inner();
        if !(gain_start >= 0.0 && gain_start <= gain_end && gain_end.is_finite()) {
            return Err(Error::ParameterError(format!(
                "invalid whir gain range {gain_start}..={gain_end}"
            )));
        }
        if self.event_queue_size == 0 {
            return Err(Error::ParameterError(
                "event queue size must be > 0".to_string(),
            ));
        }
        if !(self.master_gain_ceiling > 0.0 && self.master_gain_ceiling <= 1.0) {
            return Err(Error::ParameterError(format!(
                "master gain ceiling must be in range (0, 1], but is {}",
                self.master_gain_ceiling
            )));
        }
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.hum_asset, "hum");
        assert_eq!(
            config.whir_assets,
            vec!["whir1", "whir2", "whir3", "whir4", "whir5"]
        );
        assert_eq!(config.main_volume, 0.5);
        assert_eq!(config.whir_rate_range, 0.794..=1.0);
        assert_eq!(config.whir_gain_range, 0.6..=1.0);
        assert_eq!(config.whir_delay_profile, WhirDelayProfile::InGame);
        assert!(config.play_hum && config.play_whirs);
    }

    #[test]
    fn validation() {
        let no_whirs = EngineConfig::default().whir_assets(Vec::<String>::new());
        assert!(matches!(no_whirs.validate(), Err(Error::ParameterError(_))));
        assert!(EngineConfig::default().hum_rate(0.0).validate().is_err());
        assert!(EngineConfig::default()
            .whir_rate_range(1.0..=0.5)
            .validate()
            .is_err());
        assert!(EngineConfig::default()
            .whir_gain_range(-0.5..=1.0)
            .validate()
            .is_err());
        assert!(EngineConfig::default()
            .master_gain_ceiling(2.0)
            .validate()
            .is_err());
        // single valued ranges are fine
        assert!(EngineConfig::default()
            .whir_rate_range(1.0..=1.0)
            .validate()
            .is_ok());
    }
}
