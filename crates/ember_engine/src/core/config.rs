//! # Unified configuration system
//!
//! All engine configuration in one place: registry capacities, loader
//! settings, shader registrations, and render view layouts. Files load
//! from TOML or RON, selected by extension; `validate()` catches fatal
//! configuration errors before any system is constructed.

use crate::render::view::RenderViewConfig;
use crate::resources::shader::ShaderConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("failed to read config file: {0}")]
    Io(String),

    /// The config file could not be parsed
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// The file extension names no supported format
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// A required field is missing or out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Slot capacities for the resource registries
///
/// Capacities are fixed at initialization; exhausting one at runtime is a
/// fatal error, so these should be sized generously for the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSystemConfig {
    /// Texture registry slots
    #[serde(default = "default_max_texture_count")]
    pub max_texture_count: usize,
    /// Material registry slots
    #[serde(default = "default_max_material_count")]
    pub max_material_count: usize,
    /// Geometry registry slots
    #[serde(default = "default_max_geometry_count")]
    pub max_geometry_count: usize,
    /// Shader registry slots
    #[serde(default = "default_max_shader_count")]
    pub max_shader_count: usize,
    /// Camera registry slots
    #[serde(default = "default_max_camera_count")]
    pub max_camera_count: usize,
}

fn default_max_texture_count() -> usize {
    1024
}
fn default_max_material_count() -> usize {
    256
}
fn default_max_geometry_count() -> usize {
    1024
}
fn default_max_shader_count() -> usize {
    64
}
fn default_max_camera_count() -> usize {
    16
}

impl Default for ResourceSystemConfig {
    fn default() -> Self {
        Self {
            max_texture_count: default_max_texture_count(),
            max_material_count: default_max_material_count(),
            max_geometry_count: default_max_geometry_count(),
            max_shader_count: default_max_shader_count(),
            max_camera_count: default_max_camera_count(),
        }
    }
}

/// Asset loader settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Base directory resource names resolve under
    #[serde(default = "default_asset_base_path")]
    pub asset_base_path: String,
    /// Worker threads for the async load pipeline
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
}

fn default_asset_base_path() -> String {
    "assets".to_string()
}
fn default_worker_count() -> usize {
    2
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            asset_base_path: default_asset_base_path(),
            worker_count: default_worker_count(),
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Application name, used in window titles and diagnostics
    #[serde(default)]
    pub application_name: String,
    /// Registry capacities
    #[serde(default)]
    pub resources: ResourceSystemConfig,
    /// Loader settings
    #[serde(default)]
    pub loader: LoaderConfig,
    /// Shaders registered at startup
    #[serde(default)]
    pub shaders: Vec<ShaderConfig>,
    /// Render views created at startup
    #[serde(default)]
    pub views: Vec<RenderViewConfig>,
}

impl EngineConfig {
    /// Parse from a TOML string
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Parse from a RON string
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        ron::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from a file, selecting the format by extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&text),
            Some("ron") => Self::from_ron_str(&text),
            other => Err(ConfigError::UnsupportedFormat(format!(
                "{}",
                other.unwrap_or("<none>")
            ))),
        }
    }

    /// Check for fatal configuration errors
    ///
    /// Registry capacities must be non-zero, view names unique, and every
    /// view must configure at least one pass.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let capacities = [
            ("max_texture_count", self.resources.max_texture_count),
            ("max_material_count", self.resources.max_material_count),
            ("max_geometry_count", self.resources.max_geometry_count),
            ("max_shader_count", self.resources.max_shader_count),
            ("max_camera_count", self.resources.max_camera_count),
        ];
        for (field, value) in capacities {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{field} must be at least 1")));
            }
        }
        if self.loader.worker_count == 0 {
            return Err(ConfigError::Invalid(
                "loader.worker_count must be at least 1".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for view in &self.views {
            if view.passes.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "view '{}' must configure at least one pass",
                    view.name
                )));
            }
            if !seen.insert(view.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate view name '{}'",
                    view.name
                )));
            }
            if view.shader_name.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "view '{}' must name a shader",
                    view.name
                )));
            }
        }
        Ok(())
    }
}
