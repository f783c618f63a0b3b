//! Route pattern compilation and matching
//!
//! A pattern such as `/users/{id}/posts` is split on `/` once, at registration
//! time, into literal and named segments. Matching a candidate path is then a
//! pairwise walk over segments with no allocation beyond the captured params.
//!
//! The pattern `*` on its own is a fixed special case that matches every path.
//! It is not a general wildcard syntax: `*` inside a longer pattern is an
//! ordinary literal segment.

use crate::error::{Error, Result};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Captured path parameters, keyed by parameter name
pub type Params = HashMap<String, String>;

/// Pattern that matches any path
pub const CATCH_ALL: &str = "*";

/// Reason a route pattern was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("parameter name is empty")]
    EmptyParamName,

    #[error("duplicate parameter name '{0}'")]
    DuplicateParam(String),

    #[error("empty path segment at position {0}")]
    EmptySegment(usize),
}

/// One segment of a compiled pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Must equal the path segment exactly (case-sensitive)
    Literal(String),
    /// Captures the path segment verbatim under this name
    Param(String),
}

#[derive(Debug, Clone)]
enum MatcherKind {
    CatchAll,
    Segments(Vec<Segment>),
}

/// A compiled route pattern
#[derive(Debug, Clone)]
pub struct Matcher {
    pattern: String,
    kind: MatcherKind,
}

impl Matcher {
    /// Compile a pattern, failing fast on malformed input
    ///
    /// Rejected patterns:
    /// - a `{}` segment whose name is empty or whitespace
    /// - two `{name}` segments sharing a name
    /// - an empty segment that is neither first nor last (`/a//b`)
    pub fn compile(pattern: &str) -> Result<Self> {
        if pattern == CATCH_ALL {
            return Ok(Self {
                pattern: pattern.to_string(),
                kind: MatcherKind::CatchAll,
            });
        }

        let raw: Vec<&str> = pattern.split('/').collect();
        let last = raw.len() - 1;
        let mut seen = HashSet::new();
        let mut segments = Vec::with_capacity(raw.len());

        for (index, part) in raw.iter().enumerate() {
            if part.is_empty() && index != 0 && index != last {
                return Err(Error::invalid_pattern(
                    pattern,
                    PatternError::EmptySegment(index),
                ));
            }

            match param_name(part) {
                Some(name) => {
                    if name.is_empty() {
                        return Err(Error::invalid_pattern(pattern, PatternError::EmptyParamName));
                    }
                    if !seen.insert(name) {
                        return Err(Error::invalid_pattern(
                            pattern,
                            PatternError::DuplicateParam(name.to_string()),
                        ));
                    }
                    segments.push(Segment::Param(name.to_string()));
                }
                None => segments.push(Segment::Literal((*part).to_string())),
            }
        }

        Ok(Self {
            pattern: pattern.to_string(),
            kind: MatcherKind::Segments(segments),
        })
    }

    /// Match a path (query string already stripped)
    ///
    /// Returns the captured params on success. Paths with a different number of
    /// segments never match.
    pub fn matches(&self, path: &str) -> Option<Params> {
        let segments = match &self.kind {
            MatcherKind::CatchAll => return Some(Params::new()),
            MatcherKind::Segments(segments) => segments,
        };

        if path.split('/').count() != segments.len() {
            return None;
        }

        let mut params = Params::new();
        for (segment, part) in segments.iter().zip(path.split('/')) {
            match segment {
                Segment::Literal(literal) => {
                    if literal != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                }
            }
        }

        Some(params)
    }

    /// The source pattern this matcher was compiled from
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether this is the `*` catch-all
    pub fn is_catch_all(&self) -> bool {
        matches!(self.kind, MatcherKind::CatchAll)
    }

    /// Compiled segments (empty for the catch-all)
    pub fn segments(&self) -> &[Segment] {
        match &self.kind {
            MatcherKind::CatchAll => &[],
            MatcherKind::Segments(segments) => segments,
        }
    }

    /// Names of the parameters this pattern captures, in order
    pub fn param_names(&self) -> Vec<&str> {
        self.segments()
            .iter()
            .filter_map(|segment| match segment {
                Segment::Param(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }
}

/// Trimmed name of a `{name}` segment, or `None` for a literal
fn param_name(segment: &str) -> Option<&str> {
    segment
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .map(str::trim)
}
