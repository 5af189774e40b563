//! Pluggable path-matching strategies.
//!
//! The [`Router`](crate::Router) hands every distinct pattern to a
//! [`PathMatcher`] once, in registration order, and asks it which patterns a
//! request path satisfies. Methods are the router's business, not the
//! matcher's.
//!
//! | Strategy | Captures | Tie-break |
//! |---|---|---|
//! | [`ExactMatcher`] | none, `{id}` is literal text | n/a |
//! | [`SegmentMatcher`] | `{name}`, trailing `{*rest}` | registration order |
//! | [`TrieMatcher`] | `{name}`, trailing `{*rest}` | static over dynamic (radix tree) |

use std::collections::HashMap;

use matchit::Router as MatchitRouter;

use crate::error::{Error, Result};

/// A pattern that matched, with its bound path variables.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatternMatch {
    /// Registration index of the pattern.
    pub index: usize,
    pub params: HashMap<String, String>,
}

/// Matches normalized request paths against registered patterns.
pub trait PathMatcher: Send + Sync {
    /// Registers `pattern` under `index`. Called once per distinct pattern,
    /// with increasing indexes.
    fn insert(&mut self, index: usize, pattern: &str) -> Result<()>;

    /// Every pattern `path` satisfies, in the strategy's priority order.
    fn matches(&self, path: &str) -> Vec<PatternMatch>;
}

/// Built-in strategies.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum MatchStrategy {
    Exact,
    #[default]
    Segments,
    Trie,
}

impl MatchStrategy {
    pub fn build(self) -> Box<dyn PathMatcher> {
        match self {
            Self::Exact    => Box::new(ExactMatcher::default()),
            Self::Segments => Box::new(SegmentMatcher::default()),
            Self::Trie     => Box::new(TrieMatcher::default()),
        }
    }
}

// ── Exact ─────────────────────────────────────────────────────────────────────

/// Literal string comparison.
#[derive(Debug, Default)]
pub struct ExactMatcher {
    patterns: HashMap<String, usize>,
}

impl PathMatcher for ExactMatcher {
    fn insert(&mut self, index: usize, pattern: &str) -> Result<()> {
        self.patterns.entry(pattern.to_owned()).or_insert(index);
        Ok(())
    }

    fn matches(&self, path: &str) -> Vec<PatternMatch> {
        self.patterns
            .get(path)
            .map(|&index| PatternMatch { index, params: HashMap::new() })
            .into_iter()
            .collect()
    }
}

// ── Segments ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
enum Segment {
    Static(String),
    Param(String),
    CatchAll(String),
}

/// Segment-by-segment comparison, tried in registration order.
#[derive(Debug, Default)]
pub struct SegmentMatcher {
    patterns: Vec<(usize, Vec<Segment>)>,
}

impl SegmentMatcher {
    fn compile(pattern: &str) -> Vec<Segment> {
        split(pattern)
            .map(|s| {
                if let Some(name) = s.strip_prefix("{*").and_then(|s| s.strip_suffix('}')) {
                    Segment::CatchAll(name.to_owned())
                } else if let Some(name) = s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                    Segment::Param(name.to_owned())
                } else {
                    Segment::Static(s.to_owned())
                }
            })
            .collect()
    }

    fn bind(segments: &[Segment], path: &str) -> Option<HashMap<String, String>> {
        let parts: Vec<&str> = split(path).collect();
        let mut params = HashMap::new();

        for (i, segment) in segments.iter().enumerate() {
            match segment {
                Segment::CatchAll(name) => {
                    let rest = parts.get(i..).filter(|r| !r.is_empty())?;
                    params.insert(name.clone(), rest.join("/"));
                    return Some(params);
                }
                Segment::Static(s) => {
                    if parts.get(i) != Some(&s.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), (*parts.get(i)?).to_owned());
                }
            }
        }
        (parts.len() == segments.len()).then_some(params)
    }
}

impl PathMatcher for SegmentMatcher {
    fn insert(&mut self, index: usize, pattern: &str) -> Result<()> {
        self.patterns.push((index, Self::compile(pattern)));
        Ok(())
    }

    fn matches(&self, path: &str) -> Vec<PatternMatch> {
        self.patterns
            .iter()
            .filter_map(|(index, segments)| {
                Self::bind(segments, path).map(|params| PatternMatch { index: *index, params })
            })
            .collect()
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

// ── Trie ──────────────────────────────────────────────────────────────────────

/// Radix tree backed by `matchit`: O(path-length) lookup, at most one match.
///
/// Conflicting patterns (e.g. `/w/{id}` and `/w/{name}`) are rejected at
/// insert time, since the tree cannot tell them apart.
#[derive(Default)]
pub struct TrieMatcher {
    tree: MatchitRouter<usize>,
}

impl PathMatcher for TrieMatcher {
    fn insert(&mut self, index: usize, pattern: &str) -> Result<()> {
        self.tree.insert(pattern, index).map_err(|e| Error::InvalidRoute {
            path: pattern.to_owned(),
            reason: e.to_string(),
        })
    }

    fn matches(&self, path: &str) -> Vec<PatternMatch> {
        match self.tree.at(path) {
            Ok(matched) => vec![PatternMatch {
                index: *matched.value,
                params: matched.params.iter()
                    .map(|(k, v)| (k.to_owned(), v.to_owned()))
                    .collect(),
            }],
            Err(_) => Vec::new(),
        }
    }
}

impl std::fmt::Debug for TrieMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrieMatcher").finish_non_exhaustive()
    }
}
