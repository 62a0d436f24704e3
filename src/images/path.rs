//! Image path descriptors
//!
//! A descriptor names where image references live inside a record:
//!
//! - `cover_image` - a single field
//! - `hero.backgroundImage` - nested field access
//! - `gallery[]` - every element of a sequence of strings
//! - `points[].image` - a field on every element of a sequence of objects
//! - `sections[].gallery[]` - sequences nested inside sequences

use std::fmt;
use std::str::FromStr;

use crate::types::CuratorError;

/// One step of a descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// `name` - descend into a field
    Field(String),
    /// `name[]` - descend into every element of a sequence field
    Each(String),
}

impl Segment {
    pub fn name(&self) -> &str {
        match self {
            Segment::Field(name) | Segment::Each(name) => name,
        }
    }
}

/// A parsed descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Result<Self, CuratorError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CuratorError::Config("empty image path".to_string()));
        }

        let mut segments = Vec::new();
        for part in trimmed.split('.') {
            let segment = match part.strip_suffix("[]") {
                Some(name) => Segment::Each(name.to_string()),
                None => Segment::Field(part.to_string()),
            };

            let name = segment.name();
            if name.is_empty() {
                return Err(CuratorError::Config(format!(
                    "image path '{}' has an empty segment",
                    raw
                )));
            }
            if name.contains('[') || name.contains(']') {
                return Err(CuratorError::Config(format!(
                    "image path '{}' has a malformed segment '{}'",
                    raw, part
                )));
            }
            segments.push(segment);
        }

        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for FieldPath {
    type Err = CuratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
