//! Configuration for rig sessions
//!
//! Every field has a default, so a config file only needs the keys it
//! changes:
//!
//! ```toml
//! require_selection = false
//!
//! [markers]
//! pos_pivot1_color = 13
//!
//! [gizmo]
//! scale = 0.5
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading a config file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Cosmetic state applied to newly created anchor markers
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkerConfig {
    /// Override color index of the first candidate marker
    pub pos_pivot1_color: i64,
    /// Override color index of the second candidate marker
    pub pos_pivot2_color: i64,
    /// Whether the origin marker is hidden
    pub hide_origin: bool,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            pos_pivot1_color: 17,
            pos_pivot2_color: 16,
            hide_origin: true,
        }
    }
}

/// Gizmo generation settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GizmoConfig {
    /// Build a gizmo as part of object preparation
    pub enabled: bool,
    /// Uniform local scale of the gizmo group
    pub scale: f64,
}

impl Default for GizmoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scale: 0.25,
        }
    }
}

/// Configuration for a rig session
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RigConfig {
    pub markers: MarkerConfig,
    pub gizmo: GizmoConfig,
    /// Refuse to retarget objects that are not selected
    pub require_selection: bool,
    /// Unlock pivot attributes before neutralizing
    pub unlock_before_prepare: bool,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            markers: MarkerConfig::default(),
            gizmo: GizmoConfig::default(),
            require_selection: true,
            unlock_before_prepare: true,
        }
    }
}

impl RigConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Set the marker cosmetics
    pub fn with_markers(mut self, markers: MarkerConfig) -> Self {
        self.markers = markers;
        self
    }

    /// Set the gizmo settings
    pub fn with_gizmo(mut self, gizmo: GizmoConfig) -> Self {
        self.gizmo = gizmo;
        self
    }

    /// Enable or disable the selection check on retarget
    pub fn with_require_selection(mut self, require: bool) -> Self {
        self.require_selection = require;
        self
    }

    /// Enable or disable unlocking during preparation
    pub fn with_unlock_before_prepare(mut self, unlock: bool) -> Self {
        self.unlock_before_prepare = unlock;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RigConfig::default();
        assert_eq!(config.markers.pos_pivot1_color, 17);
        assert_eq!(config.markers.pos_pivot2_color, 16);
        assert!(config.markers.hide_origin);
        assert!(config.gizmo.enabled);
        assert_eq!(config.gizmo.scale, 0.25);
        assert!(config.require_selection);
        assert!(config.unlock_before_prepare);
    }

    #[test]
    fn test_builder_pattern() {
        let config = RigConfig::new()
            .with_require_selection(false)
            .with_gizmo(GizmoConfig {
                enabled: false,
                ..Default::default()
            });

        assert!(!config.require_selection);
        assert!(!config.gizmo.enabled);
        assert_eq!(config.gizmo.scale, 0.25);
    }

    #[test]
    fn test_partial_toml() {
        let config = RigConfig::from_str(
            r#"
            require_selection = false

            [markers]
            pos_pivot1_color = 13
            "#,
        )
        .unwrap();

        assert!(!config.require_selection);
        assert_eq!(config.markers.pos_pivot1_color, 13);
        assert_eq!(config.markers.pos_pivot2_color, 16);
        assert!(config.unlock_before_prepare);
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(RigConfig::from_str("").unwrap(), RigConfig::default());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = RigConfig::from_str("colour = 3");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
