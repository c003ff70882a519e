use std::time::Duration;

use anyhow::Result;

/// Upper bound of the polling period, whatever the configuration says.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(3600);

/// Runtime settings of the synchronization core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    /// Tick period in normal mode.
    pub poll_interval: Duration,
    /// Debug mode slows polling down so logs stay readable.
    pub debug: bool,
    /// Factor applied to `poll_interval` in debug mode.
    pub debug_multiplier: u32,
    /// Volume change per press of the volume up/down buttons.
    pub volume_step: u8,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(pmoconfig::DEFAULT_POLL_INTERVAL_MS),
            debug: pmoconfig::DEFAULT_DEBUG,
            debug_multiplier: pmoconfig::DEFAULT_DEBUG_MULTIPLIER as u32,
            volume_step: pmoconfig::DEFAULT_VOLUME_STEP as u8,
        }
    }
}

impl SyncConfig {
    pub fn from_config(config: &pmoconfig::Config) -> Result<Self> {
        Ok(Self {
            poll_interval: Duration::from_millis(config.get_poll_interval_ms()?.max(1))
                .min(MAX_POLL_INTERVAL),
            debug: config.get_debug()?,
            debug_multiplier: config.get_debug_multiplier()?.clamp(1, u32::MAX as u64) as u32,
            volume_step: config.get_volume_step()?.clamp(1, 100) as u8,
        })
    }

    /// Period actually used by the polling timer, capped at
    /// [`MAX_POLL_INTERVAL`].
    pub fn effective_interval(&self) -> Duration {
        let interval = if self.debug {
            self.poll_interval.saturating_mul(self.debug_multiplier.max(1))
        } else {
            self.poll_interval
        };
        interval.min(MAX_POLL_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_intervals() {
        let mut config = SyncConfig::default();
        assert_eq!(config.effective_interval(), Duration::from_millis(500));

        config.debug = true;
        assert_eq!(config.effective_interval(), Duration::from_millis(2000));
    }

    #[test]
    fn test_from_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = pmoconfig::Config::load_config(dir.path().to_str().unwrap()).unwrap();
        config.set_poll_interval_ms(250).unwrap();
        config.set_debug(true).unwrap();
        config.set_volume_step(0).unwrap();

        let sync = SyncConfig::from_config(&config).unwrap();
        assert_eq!(sync.poll_interval, Duration::from_millis(250));
        assert!(sync.debug);
        assert_eq!(sync.volume_step, 1);
    }

    #[test]
    fn test_huge_interval_is_capped() {
        let config = SyncConfig {
            poll_interval: Duration::from_secs(u64::MAX),
            debug: true,
            debug_multiplier: u32::MAX,
            volume_step: 5,
        };
        assert_eq!(config.effective_interval(), MAX_POLL_INTERVAL);

        let dir = tempfile::tempdir().unwrap();
        let file = pmoconfig::Config::load_config(dir.path().to_str().unwrap()).unwrap();
        file.set_poll_interval_ms(u64::MAX).unwrap();
        let sync = SyncConfig::from_config(&file).unwrap();
        assert_eq!(sync.poll_interval, MAX_POLL_INTERVAL);
    }
}
