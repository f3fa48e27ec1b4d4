//! Path pattern matching.
//!
//! # Responsibilities
//! - Compile `/`-delimited route patterns into literal and parameter segments
//! - Match a request path segment by segment, binding parameters
//!
//! # Design Decisions
//! - Leading/trailing slashes and empty segments are ignored on both sides
//! - Segment counts must be equal; there is no wildcard or catch-all
//! - Literal segments compare byte-for-byte (case-sensitive, no decoding)
//! - Parameter values are bound as raw strings, never coerced

use std::collections::HashMap;

/// Marker that turns a pattern segment into a named capture.
pub const PARAM_MARKER: char = ':';

/// Parameters captured from a matched path.
pub type Params = HashMap<String, String>;

/// One compiled pattern segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Must equal the path segment exactly.
    Literal(String),
    /// Matches any path segment and binds it under this name.
    Param(String),
}

/// A compiled route pattern such as `/performers/:id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compile a pattern.
    pub fn parse(pattern: &str) -> Self {
        let segments = split_segments(pattern)
            .map(|segment| match segment.strip_prefix(PARAM_MARKER) {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(segment.to_string()),
            })
            .collect();
        Self { segments }
    }

    /// Compiled segments in order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Match `path` against this pattern, returning bound parameters.
    pub fn matches(&self, path: &str) -> Option<Params> {
        let parts: Vec<&str> = split_segments(path).collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = Params::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                }
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
            }
        }
        Some(params)
    }
}

/// Non-empty segments of a slash-delimited path.
fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.trim_matches('/').split('/').filter(|s| !s.is_empty())
}

/// Match a raw pattern against a path.
pub fn match_path(pattern: &str, path: &str) -> Option<Params> {
    PathPattern::parse(pattern).matches(path)
}
