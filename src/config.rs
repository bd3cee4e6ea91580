// src/config.rs

use crate::types::Config;
use anyhow::Result;
use std::fs;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the sliding-window search meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.tracker.nwindows == 0 {
            anyhow::bail!("tracker.nwindows must be at least 1");
        }
        if self.tracker.history_len == 0 {
            anyhow::bail!("tracker.history_len must be at least 1");
        }
        if self.segmentation.morph_kernel % 2 == 0 {
            anyhow::bail!("segmentation.morph_kernel must have odd size");
        }
        if self.world.x_span <= 0.0 || self.world.y_span <= 0.0 || self.world.offset_divisor == 0.0
        {
            anyhow::bail!("world scale spans must be positive and the divisor non-zero");
        }
        if let (Some(w), Some(h)) = (
            self.perspective.birdseye_width,
            self.perspective.birdseye_height,
        ) {
            if w == 0 || h == 0 {
                anyhow::bail!("bird's-eye size must be non-zero");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "tracker:\n  nwindows: 9\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.tracker.nwindows, 9);
        assert_eq!(config.tracker.margin, 50);
        assert_eq!(config.tracker.history_len, 10);
        assert!((config.world.x_span - 0.1).abs() < 1e-12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_roi_parsed_from_yaml() {
        let yaml = "perspective:\n  roi: [[0.4, 0.6], [0.6, 0.6], [0.0, 1.0], [1.0, 1.0]]\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.perspective.roi.0[0], [0.4, 0.6]);
        assert_eq!(config.perspective.roi.0[3], [1.0, 1.0]);
    }

    #[test]
    fn test_shipped_config_parses() {
        let config: Config = serde_yaml::from_str(include_str!("../config.yaml")).unwrap();
        assert!(config.validate().is_ok());
        assert!(config.calibration.is_none());
        assert_eq!(config.overlay.lane_color, [0, 0, 255]);
    }

    #[test]
    fn test_zero_windows_rejected() {
        let mut config = Config::default();
        config.tracker.nwindows = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_even_kernel_rejected() {
        let mut config = Config::default();
        config.segmentation.morph_kernel = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_logging_filter_directive() {
        let mut config = Config::default();
        assert_eq!(config.logging.filter_directive(), "lane_finder=info");

        let yaml = "logging:\n  level: debug\n";
        config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.logging.filter_directive(), "lane_finder=debug");
    }
}
