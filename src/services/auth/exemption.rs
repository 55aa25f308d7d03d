//! Routes and paths that never require a token.
//!
//! Requests to the authorization service itself must pass without a token: a client cannot
//! obtain a token without reaching it.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("path pattern must start with '/': {0}")]
    NotAbsolute(String),
    #[error("'**' is only allowed as the last segment: {0}")]
    RestNotLast(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    // `*`: exactly one segment
    Any,
    // `**`: zero or more trailing segments
    Rest,
}

/// Ant-style path glob (`/auth/**`, `/files/*/meta`).
///
/// Empty segments are ignored on both sides, so `/auth/**` matches `/auth`, `/auth/` and
/// `/auth/token/check`, but never `/authorize`. Paths with dot segments (`.`, `..` or their
/// percent-encoded forms) never match: the upstream resolves them to a different target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn is_dot_segment(segment: &str) -> bool {
    let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
    decoded == "." || decoded == ".."
}

impl PathPattern {
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        if !raw.starts_with('/') {
            return Err(PatternError::NotAbsolute(raw.to_string()));
        }

        let segments: Vec<Segment> = split_segments(raw)
            .map(|s| match s {
                "**" => Segment::Rest,
                "*" => Segment::Any,
                literal => Segment::Literal(literal.to_string()),
            })
            .collect();

        let rest_not_last = segments
            .iter()
            .rev()
            .skip(1)
            .any(|s| *s == Segment::Rest);
        if rest_not_last {
            return Err(PatternError::RestNotLast(raw.to_string()));
        }

        Ok(Self { segments })
    }

    pub fn matches(&self, path: &str) -> bool {
        if split_segments(path).any(is_dot_segment) {
            return false;
        }
        let mut path_segments = split_segments(path);

        for segment in &self.segments {
            match segment {
                Segment::Rest => return true,
                Segment::Any => {
                    if path_segments.next().is_none() {
                        return false;
                    }
                }
                Segment::Literal(literal) => {
                    if path_segments.next() != Some(literal.as_str()) {
                        return false;
                    }
                }
            }
        }

        path_segments.next().is_none()
    }
}

/// Decides whether a request skips the token checks.
#[derive(Debug, Clone)]
pub struct ExemptionPolicy {
    auth_route_id: String,
    patterns: Vec<PathPattern>,
}

impl ExemptionPolicy {
    pub fn new(auth_route_id: impl Into<String>, patterns: Vec<PathPattern>) -> Self {
        Self {
            auth_route_id: auth_route_id.into(),
            patterns,
        }
    }

    /// Build from configured glob strings.
    pub fn from_globs<S: AsRef<str>>(
        auth_route_id: impl Into<String>,
        globs: &[S],
    ) -> Result<Self, PatternError> {
        let patterns = globs
            .iter()
            .map(|g| PathPattern::parse(g.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(auth_route_id, patterns))
    }

    pub fn is_exempt(&self, route_id: &str, path: &str) -> bool {
        route_id == self.auth_route_id || self.patterns.iter().any(|p| p.matches(path))
    }
}
