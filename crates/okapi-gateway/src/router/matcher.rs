//! Compiled path matcher for one routing entry.
//!
//! Matching is a linear walk over the pattern segments, O(D) in path depth.
//! Routing tables are small, so the table scans every entry.

use okapi_kernel::module::PatternSegment;
use okapi_kernel::RoutingEntry;

/// Ordering key for competing matches: literal beats placeholder beats
/// wildcard depth by depth, longer wins, and an exact (wildcard-free)
/// pattern beats an equal prefix ending in `*`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Specificity {
    ranks: Vec<u8>,
    exact: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatcher {
    pattern: String,
    segments: Vec<PatternSegment>,
}

impl PathMatcher {
    /// Compile the path of `entry`.
    pub fn compile(entry: &RoutingEntry) -> Result<Self, String> {
        Ok(Self {
            pattern: entry.pattern_text().to_string(),
            segments: entry.segments()?,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Match a concrete request path (no query string).
    pub fn matches(&self, path: &str) -> bool {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        let parts: Vec<&str> = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split('/').collect()
        };

        let mut pos = 0;
        for segment in &self.segments {
            match segment {
                PatternSegment::Wildcard => return true,
                PatternSegment::Placeholder(_) => match parts.get(pos) {
                    Some(part) if !part.is_empty() => {}
                    _ => return false,
                },
                PatternSegment::Literal(lit) => match parts.get(pos) {
                    Some(part) if part == lit => {}
                    _ => return false,
                },
            }
            pos += 1;
        }
        pos == parts.len()
    }

    pub fn specificity(&self) -> Specificity {
        let mut ranks = Vec::with_capacity(self.segments.len());
        let mut exact = true;
        for segment in &self.segments {
            match segment {
                PatternSegment::Literal(_) => ranks.push(2),
                PatternSegment::Placeholder(_) => ranks.push(1),
                PatternSegment::Wildcard => exact = false,
            }
        }
        Specificity { ranks, exact }
    }
}
