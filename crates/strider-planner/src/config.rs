use std::path::Path;

use serde::{Deserialize, Serialize};
use strider_core::ConfigError;

use crate::foothold::{FootholdConfig, PlacementKind};
use crate::gait::GaitConfig;
use crate::support_polygon::SupportPolygonConfig;
use crate::torso::TorsoConfig;

/// Complete locomotion controller configuration, loaded once at startup.
///
/// Every section has serde defaults except `foothold.max_step_length`,
/// which must be given explicitly.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LocomotionConfig {
    /// Foot placement variant.
    #[serde(default)]
    pub placement: PlacementKind,
    #[serde(default)]
    pub gait: GaitConfig,
    #[serde(default)]
    pub foothold: FootholdConfig,
    #[serde(default)]
    pub support_polygon: SupportPolygonConfig,
    #[serde(default)]
    pub torso: TorsoConfig,
}

impl LocomotionConfig {
    /// Read, parse and validate a TOML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML configuration string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with the given maximum step length.
    pub fn with_max_step_length(max_step_length: f64) -> Self {
        let mut config = Self::default();
        config.foothold.max_step_length = Some(max_step_length);
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gait.validate()?;
        self.foothold.validate()?;
        self.support_polygon.validate()?;
        self.torso.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gait::VelocityLaw;
    use approx::assert_relative_eq;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = LocomotionConfig::from_toml_str("[foothold]\nmax_step_length = 0.15\n").unwrap();
        assert_eq!(config.placement, PlacementKind::StaticGait);
        assert_eq!(config.foothold.max_step_length, Some(0.15));
        assert_relative_eq!(config.support_polygon.delta_forward, 0.05);
        assert_relative_eq!(config.torso.slope_gain, 0.75);
        assert_eq!(config.gait, GaitConfig::default());
    }

    #[test]
    fn missing_max_step_length_fails() {
        let err = LocomotionConfig::from_toml_str("placement = \"static_gait\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
        assert!(err.to_string().contains("max_step_length"));
    }

    #[test]
    fn full_config_parses() {
        let toml = r#"
placement = "dynamic_gait"

[gait]
fore_lag = 0.5
hind_lag = 0.5
cycle_duration = { value = 1.8, law = "log", min_velocity = 0.0, max_velocity = 0.4, max_value = 1.0 }
fore_duty_factor = { value = 0.85 }
pair_lag = { value = 0.75 }

[foothold]
max_step_length = 0.2
swing_height = 0.06
swing_profile = [[0.0, 0.0], [0.2, 0.0], [1.0, 1.0]]
validation_timeout = 0.3

[foothold.dynamic]
cp_gain = 0.4

[support_polygon]
delta_forward = 0.06
delta_backward = 0.03

[torso]
fore_height_offset = 0.44
hind_height_profile = [[0.0, 0.0], [0.5, 0.01]]
"#;
        let config = LocomotionConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.placement, PlacementKind::DynamicGait);
        assert_eq!(config.gait.cycle_duration.law, VelocityLaw::Log);
        assert_relative_eq!(config.gait.fore_duty_factor.value, 0.85);
        assert_relative_eq!(config.foothold.swing_profile.evaluate(0.1), 0.0);
        assert_relative_eq!(config.foothold.dynamic.cp_gain, 0.4);
        assert_relative_eq!(config.support_polygon.delta_backward, 0.03);
        assert_relative_eq!(config.torso.hind_height_profile.evaluate(0.5), 0.01);
    }

    #[test]
    fn invalid_value_rejected() {
        let err = LocomotionConfig::from_toml_str(
            "[foothold]\nmax_step_length = 0.15\n[torso]\nslope_damping = 0.0\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = LocomotionConfig::from_toml_str("[foothold\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn from_file_missing_path_is_io_error() {
        let err = LocomotionConfig::from_file("/nonexistent/strider.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn shipped_static_walk_config_matches_defaults() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/static_walk.toml");
        let config = LocomotionConfig::from_file(path).unwrap();
        let mut expected = LocomotionConfig::with_max_step_length(0.15);
        expected.torso.fore_height_profile = config.torso.fore_height_profile.clone();
        expected.torso.hind_height_profile = config.torso.hind_height_profile.clone();
        assert_eq!(config, expected);
        assert_relative_eq!(config.gait.cycle_duration.at(0.3), 1.2);
    }

    #[test]
    fn with_max_step_length_validates() {
        assert!(LocomotionConfig::with_max_step_length(0.15).validate().is_ok());
        assert!(LocomotionConfig::default().validate().is_err());
    }
}
