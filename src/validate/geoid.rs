//! GEOID format validation.
//!
//! Each layer carries an anchored regex (see the registry) plus a
//! state-FIPS prefix rule. Invalid entries are reported individually so a
//! single malformed id never hides the rest.

use regex_lite::Regex;

use crate::error::AtlasError;
use crate::types::{GeoidFormat, Layer};

/// One GEOID finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeoidFinding {
    /// Id does not match the layer pattern.
    BadFormat {
        /// The offending id.
        id: String,
        /// The pattern it failed.
        pattern: String,
    },
    /// Id does not start with the expected state FIPS.
    WrongStatePrefix {
        /// The offending id.
        id: String,
        /// Expected two-digit prefix.
        expected: String,
    },
}

/// Validates GEOIDs against a layer's format descriptor.
pub struct GeoidValidator {
    layer: Layer,
    pattern: Regex,
    format: GeoidFormat,
}

impl GeoidValidator {
    /// Compile a validator for a layer from its format descriptor.
    pub fn new(layer: Layer, format: GeoidFormat) -> Result<Self, AtlasError> {
        let pattern = Regex::new(&format.pattern)
            .map_err(|e| AtlasError::Configuration(format!("bad GEOID pattern: {e}")))?;
        Ok(Self {
            layer,
            pattern,
            format,
        })
    }

    /// The layer this validator covers.
    pub fn layer(&self) -> Layer {
        self.layer
    }

    /// Validate a batch of ids for one state; every finding is reported.
    pub fn validate(&self, ids: &[String], state_fips: &str) -> Vec<GeoidFinding> {
        let mut findings = Vec::new();
        for id in ids {
            if !self.pattern.is_match(id) {
                findings.push(GeoidFinding::BadFormat {
                    id: id.clone(),
                    pattern: self.format.pattern.clone(),
                });
                continue;
            }
            if self.format.state_prefixed && !id.starts_with(state_fips) {
                findings.push(GeoidFinding::WrongStatePrefix {
                    id: id.clone(),
                    expected: state_fips.to_string(),
                });
            }
        }
        findings
    }
}
