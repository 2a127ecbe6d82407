//! Shared error types for timeout settings resolution

use crate::types::ConfigLayer;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettingsError {
    /// A timeout marker has the wrong arity or an unknown field name
    #[error("{message}")]
    ConfigShape { message: String },

    /// A deadline, method or flag value could not be parsed from a layer
    #[error("Invalid {field} {value} from {layer}")]
    ConfigValue {
        field: &'static str,
        value: String,
        layer: ConfigLayer,
    },
}

impl SettingsError {
    pub fn shape(message: impl Into<String>) -> Self {
        SettingsError::ConfigShape {
            message: message.into(),
        }
    }

    pub fn value(field: &'static str, value: impl ToString, layer: ConfigLayer) -> Self {
        SettingsError::ConfigValue {
            field,
            value: value.to_string(),
            layer,
        }
    }

    /// Name of the error kind as shown in failure reports
    pub fn kind(&self) -> &'static str {
        match self {
            SettingsError::ConfigShape { .. } => "ConfigShapeError",
            SettingsError::ConfigValue { .. } => "ConfigValueError",
        }
    }
}

pub type SharedResult<T> = Result<T, SettingsError>;
