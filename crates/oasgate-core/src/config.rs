//! # Validator Configuration
//!
//! Options recognised by the validators, deserialized from YAML or JSON
//! with the camelCase keys the middleware has always used:
//!
//! ```yaml
//! validateRequests:
//!   allowUnknownQueryParameters: false
//! validateResponses: true          # or { removeAdditional: true }, or false
//! coerceTypes: true
//! validateFormats: fast            # fast | full | false
//! unknownFormats: [x-uuid-v7]      # true | "ignore" | [names]
//! ignorePaths: ^/internal/
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coerce::Normalization;
use crate::compiler::EngineOptions;

/// Errors loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read config '{path}': {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid YAML/JSON or has the wrong shape.
    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// `ignorePaths` is not a valid regular expression.
    #[error("invalid ignorePaths pattern: {0}")]
    IgnorePaths(#[from] regex::Error),
}

/// Request validation options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestOptions {
    /// Accept query keys the operation does not declare.
    pub allow_unknown_query_parameters: bool,
}

/// Response validation options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResponseOptions {
    /// Drop response properties rejected by `additionalProperties: false`
    /// instead of reporting them.
    pub remove_additional: bool,
}

/// Format assertion mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FormatValidation {
    /// Assert formats (the default).
    #[default]
    Fast,
    /// Assert formats; same checks as `Fast` with this engine.
    Full,
    /// Treat `format` as an annotation.
    Off,
}

impl FormatValidation {
    /// Whether formats are asserted.
    pub fn is_enabled(self) -> bool {
        !matches!(self, Self::Off)
    }
}

impl<'de> Deserialize<'de> for FormatValidation {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Flag(bool),
            Mode(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Flag(true) => Ok(Self::Fast),
            Repr::Flag(false) => Ok(Self::Off),
            Repr::Mode(mode) => match mode.as_str() {
                "fast" => Ok(Self::Fast),
                "full" => Ok(Self::Full),
                other => Err(serde::de::Error::custom(format!(
                    "validateFormats must be 'fast', 'full' or false, got '{other}'"
                ))),
            },
        }
    }
}

impl Serialize for FormatValidation {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Fast => serializer.serialize_str("fast"),
            Self::Full => serializer.serialize_str("full"),
            Self::Off => serializer.serialize_bool(false),
        }
    }
}

/// Policy for `format` values the engine does not know.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UnknownFormats {
    /// Schemas using an unknown format fail to compile (`true`).
    #[default]
    Reject,
    /// Unknown formats are ignored (`"ignore"`).
    Ignore,
    /// The listed formats are accepted; any other unknown format fails.
    Allow(Vec<String>),
}

impl<'de> Deserialize<'de> for UnknownFormats {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Flag(bool),
            Mode(String),
            Names(Vec<String>),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Flag(true) => Ok(Self::Reject),
            Repr::Flag(false) => Err(serde::de::Error::custom(
                "unknownFormats must be true, 'ignore' or a list of format names; false is not supported",
            )),
            Repr::Mode(mode) if mode == "ignore" => Ok(Self::Ignore),
            Repr::Mode(other) => Err(serde::de::Error::custom(format!(
                "unknownFormats must be true, 'ignore' or a list of format names, got '{other}'"
            ))),
            Repr::Names(names) => Ok(Self::Allow(names)),
        }
    }
}

impl Serialize for UnknownFormats {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Reject => serializer.serialize_bool(true),
            Self::Ignore => serializer.serialize_str("ignore"),
            Self::Allow(names) => names.serialize(serializer),
        }
    }
}

/// `true`, `false`, or an options object.
#[derive(Deserialize)]
#[serde(untagged)]
enum Toggle<T> {
    Flag(bool),
    Options(T),
}

fn toggle<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(match Toggle::<T>::deserialize(deserializer)? {
        Toggle::Flag(true) => Some(T::default()),
        Toggle::Flag(false) => None,
        Toggle::Options(options) => Some(options),
    })
}

/// Top-level validator options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidatorOptions {
    /// Request validation; `None` disables it.
    #[serde(deserialize_with = "toggle")]
    pub validate_requests: Option<RequestOptions>,
    /// Response validation; `None` (the default) disables it.
    #[serde(deserialize_with = "toggle")]
    pub validate_responses: Option<ResponseOptions>,
    /// Coerce request parameters to their declared types.
    pub coerce_types: bool,
    /// Format assertion mode.
    pub validate_formats: FormatValidation,
    /// Unknown format policy.
    pub unknown_formats: UnknownFormats,
    /// Request paths matching this regex bypass validation entirely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_paths: Option<String>,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            validate_requests: Some(RequestOptions::default()),
            validate_responses: None,
            coerce_types: true,
            validate_formats: FormatValidation::Fast,
            unknown_formats: UnknownFormats::Reject,
            ignore_paths: None,
        }
    }
}

impl ValidatorOptions {
    /// Parse options from YAML (JSON is a subset) and check them.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let options: Self = serde_yaml::from_str(text)?;
        options.ignore_paths_regex()?;
        Ok(options)
    }

    /// Load options from a YAML or JSON file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// The compiled `ignorePaths` pattern.
    pub fn ignore_paths_regex(&self) -> Result<Option<regex::Regex>, ConfigError> {
        self.ignore_paths
            .as_deref()
            .map(regex::Regex::new)
            .transpose()
            .map_err(ConfigError::from)
    }

    /// Engine options for request validators: coercion as configured,
    /// defaults filled in.
    pub fn request_engine(&self) -> EngineOptions {
        EngineOptions {
            normalization: Normalization {
                coerce_types: self.coerce_types,
                use_defaults: true,
                remove_additional: false,
            },
            validate_formats: self.validate_formats,
            unknown_formats: self.unknown_formats.clone(),
        }
    }

    /// Engine options for response validators: no coercion, optional
    /// removal of additional properties.
    pub fn response_engine(&self) -> EngineOptions {
        let remove_additional = self
            .validate_responses
            .as_ref()
            .is_some_and(|r| r.remove_additional);
        EngineOptions {
            normalization: Normalization {
                coerce_types: false,
                use_defaults: false,
                remove_additional,
            },
            validate_formats: self.validate_formats,
            unknown_formats: self.unknown_formats.clone(),
        }
    }
}
