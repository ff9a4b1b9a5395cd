use thiserror::Error;

/// Top-level error type for the strider crates.
#[derive(Debug, Error)]
pub enum StriderError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Terrain query error: {0}")]
    Terrain(#[from] TerrainError),
}

/// Configuration errors. All of them abort controller construction.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    /// Shorthand for [`ConfigError::InvalidValue`].
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Terrain collaborator failures.
///
/// Copy + plain coordinates for cheap propagation out of the control tick.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TerrainError {
    #[error("Terrain height unavailable at ({x:.3}, {y:.3})")]
    HeightUnavailable { x: f64, y: f64 },

    #[error("Terrain normal unavailable at ({x:.3}, {y:.3})")]
    NormalUnavailable { x: f64, y: f64 },
}
