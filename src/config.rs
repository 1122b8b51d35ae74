//! Parser configuration

use crate::error::{ParseError, Result};
use serde::{Deserialize, Serialize};

/// Default number of message trees kept by a [`crate::ParseCache`]
pub const DEFAULT_CACHE_CAPACITY: usize = 25;

/// What to produce when a payload cannot be decoded with any charset
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BinaryFallback {
    /// Keep the bytes (lossily converted), tagged as `8bit`
    #[default]
    Raw,
    /// Replace the payload with a short placeholder
    Suppress,
}

/// Options for [`crate::AddressHeaderParser`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AddressConfig {
    /// Only run the strict pass
    pub strict: bool,

    /// Fail with [`ParseError::AddressNotFound`] instead of dropping groups
    pub raise: bool,

    /// Charsets tried, in order, when header bytes are not valid UTF-8
    pub charset_order: Vec<String>,
}

impl Default for AddressConfig {
    fn default() -> Self {
        Self {
            strict: false,
            raise: false,
            charset_order: vec!["utf-8".into(), "iso-8859-1".into()],
        }
    }
}

/// Top-level configuration for building message trees
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ParserConfig {
    /// Charsets tried after the declared one when decoding text parts
    pub charset_priority: Vec<String>,

    /// Behaviour when no charset decodes a text payload
    pub binary_fallback: BinaryFallback,

    /// Address header parsing options
    pub address: AddressConfig,

    /// Capacity of the parse cache
    pub cache_capacity: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            charset_priority: vec!["utf-8".into(), "iso-8859-1".into()],
            binary_fallback: BinaryFallback::Raw,
            address: AddressConfig::default(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl ParserConfig {
    /// Load configuration from a JSON document; missing keys take defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ParseError::Config(e.to_string()))
    }
}
