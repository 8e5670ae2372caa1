//! Adapter configuration
//!
//! Plain `serde` structs; every field has a default so a partial (or empty) config
//! section deserializes. Loading and layering (files, environment) is left to the
//! host application.

use serde::{Deserialize, Serialize};

use crate::model::UNKNOWN_ENTITY_TYPE;
use crate::normalize::Normalizer;
use crate::version::ODataVersion;

/// Response normalizer tuning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizerOptions {
    /// Entity type reported when neither an annotation nor a URI/context yields one.
    pub unknown_type: String,

    /// Properties consulted, in order, for an id when the payload carries no key
    /// annotation or URI (e.g. V4 minimal metadata). Empty disables the fallback.
    pub key_fallback_properties: Vec<String>,

    /// Log a warning when the response version header disagrees with the normalizer.
    pub warn_on_version_mismatch: bool,
}

impl Default for NormalizerOptions {
    fn default() -> Self {
        Self {
            unknown_type: UNKNOWN_ENTITY_TYPE.to_owned(),
            key_fallback_properties: Vec::new(),
            warn_on_version_mismatch: true,
        }
    }
}

/// Top-level configuration section for the adapter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdapterConfig {
    pub version: ODataVersion,
    pub normalizer: NormalizerOptions,
}

impl AdapterConfig {
    /// Build the response normalizer for the configured version.
    #[must_use]
    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.version, self.normalizer.clone())
    }
}
