//! Regex engine over byte strings.
//!
//! Dialect: literals, `.`, `^`/`$` (buffer ends), bracket classes with
//! ranges and `^`/`!` negation, `\d \w \s` and their complements, greedy and
//! lazy `* + ? {n} {n,} {n,m}`, capturing groups and `|`. Matching is
//! leftmost-first.
//!
//! `CompiledPattern` is the checked API. The free functions in this module
//! go through the process-wide cache and trap on syntax errors.

mod cache;
mod class;
mod compile;
mod exec;
mod parse;

use ks_core::trap::trap;
use thiserror::Error;

use crate::errors::messages;
use compile::Program;
use exec::Searcher;

pub use cache::{cached, clear_cache, cache_len, try_cached};

/// Deepest group nesting the parser accepts.
pub const MAX_NESTING: usize = 256;
/// Largest bound in a counted repetition.
pub const MAX_REPEAT: u32 = 1000;
/// Largest compiled program, in instructions.
pub const MAX_PROGRAM_LEN: usize = 65_536;
/// Largest dense visited table an operation allocates.
pub const MAX_VISITED_BYTES: usize = 256 << 20;
/// States a sparse visited set may hold before the search gives up.
pub const MAX_SPARSE_STATES: usize = 4 << 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum PatternErrorKind {
    #[error("unclosed group")]
    UnclosedGroup,
    #[error("unmatched ')'")]
    UnmatchedParen,
    #[error("unclosed character class")]
    UnclosedClass,
    #[error("invalid class range")]
    InvalidRange,
    #[error("trailing backslash")]
    TrailingBackslash,
    #[error("nothing to repeat")]
    NothingToRepeat,
    #[error("repetition count above {MAX_REPEAT}")]
    RepeatTooLarge,
    #[error("repetition bounds out of order")]
    InvalidBounds,
    #[error("groups nested deeper than {MAX_NESTING}")]
    TooDeep,
    #[error("compiled pattern too large")]
    TooLarge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("regex syntax error at byte {offset}: {kind}")]
pub struct PatternError {
    pub offset: usize,
    pub kind: PatternErrorKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Match {
    pub start: usize,
    pub end: usize,
}

impl Match {
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    #[inline]
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }

    pub fn as_bytes<'t>(&self, text: &'t [u8]) -> &'t [u8] {
        &text[self.range()]
    }
}

/// Capture positions of one match, indexed by group (0 is the whole match).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Captures {
    slots: Vec<Option<usize>>,
}

impl Captures {
    /// `None` for a group that did not take part in the match.
    pub fn get(&self, group: usize) -> Option<Match> {
        match (self.slots.get(2 * group)?, self.slots.get(2 * group + 1)?) {
            (Some(start), Some(end)) => Some(Match {
                start: *start,
                end: *end,
            }),
            _ => None,
        }
    }

    /// Number of groups, group 0 included.
    pub fn len(&self) -> usize {
        self.slots.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<Match>> + '_ {
        (0..self.len()).map(|g| self.get(g))
    }
}

#[derive(Debug)]
pub struct CompiledPattern {
    source: Box<[u8]>,
    program: Program,
    groups: usize,
}

impl CompiledPattern {
    pub fn new(pattern: &[u8]) -> Result<Self, PatternError> {
        let ast = parse::parse(pattern)?;
        let program = compile::compile(&ast)?;
        Ok(Self {
            source: pattern.into(),
            program,
            groups: ast.groups,
        })
    }

    /// The pattern source.
    pub fn as_bytes(&self) -> &[u8] {
        &self.source
    }

    /// Capturing groups, not counting group 0.
    pub fn group_count(&self) -> usize {
        self.groups
    }

    fn search(&self, text: &[u8], start: usize) -> Option<Vec<Option<usize>>> {
        let mut slots = vec![None; self.program.slots];
        Searcher::new(&self.program, text)
            .search(start, &mut slots)
            .then_some(slots)
    }

    pub fn is_match(&self, text: &[u8]) -> bool {
        self.find(text, 0).is_some()
    }

    /// Leftmost match starting at or after `start`.
    pub fn find(&self, text: &[u8], start: usize) -> Option<Match> {
        group_zero(&self.search(text, start)?)
    }

    pub fn find_pos(&self, text: &[u8], start: usize) -> Option<usize> {
        self.find(text, start).map(|m| m.start)
    }

    /// Successive non-overlapping matches. After an empty match the search
    /// resumes one byte further, and an empty match touching the end of the
    /// previous match is dropped.
    pub fn find_all(&self, text: &[u8]) -> Vec<Match> {
        let mut searcher = Searcher::new(&self.program, text);
        let mut slots = vec![None; self.program.slots];
        let mut out = Vec::new();
        let mut pos = 0;
        let mut last_end = None;
        while pos <= text.len() {
            if !searcher.search(pos, &mut slots) {
                break;
            }
            let Some(m) = group_zero(&slots) else {
                break;
            };
            if m.is_empty() {
                pos = m.end + 1;
                if last_end == Some(m.start) {
                    continue;
                }
            } else {
                pos = m.end;
            }
            last_end = Some(m.end);
            out.push(m);
        }
        out
    }

    pub fn captures(&self, text: &[u8], start: usize) -> Option<Captures> {
        self.search(text, start).map(|slots| Captures { slots })
    }

    /// Replaces every match with `replacement` taken literally.
    pub fn replace(&self, text: &[u8], replacement: &[u8]) -> Vec<u8> {
        self.replace_matches(text, replacement, &self.find_all(text))
    }

    pub fn replace_first(&self, text: &[u8], replacement: &[u8]) -> Vec<u8> {
        let first: Vec<Match> = self.find(text, 0).into_iter().collect();
        self.replace_matches(text, replacement, &first)
    }

    fn replace_matches(&self, text: &[u8], replacement: &[u8], matches: &[Match]) -> Vec<u8> {
        let mut out = Vec::with_capacity(text.len() + replacement.len() * matches.len());
        let mut last = 0;
        for m in matches {
            out.extend_from_slice(&text[last..m.start]);
            out.extend_from_slice(replacement);
            last = m.end;
        }
        out.extend_from_slice(&text[last..]);
        out
    }

    /// Fields between matches. A trailing empty field is kept.
    pub fn split<'t>(&self, text: &'t [u8]) -> Vec<&'t [u8]> {
        self.split_n(text, 0)
    }

    /// At most `limit` fields (0 = unlimited); the last field holds the
    /// unsplit remainder.
    pub fn split_n<'t>(&self, text: &'t [u8], limit: usize) -> Vec<&'t [u8]> {
        let mut out = Vec::new();
        let mut last = 0;
        for m in self.find_all(text) {
            if limit != 0 && out.len() + 1 >= limit {
                break;
            }
            out.push(&text[last..m.start]);
            last = m.end;
        }
        out.push(&text[last..]);
        out
    }
}

fn group_zero(slots: &[Option<usize>]) -> Option<Match> {
    Some(Match {
        start: slots[0]?,
        end: slots[1]?,
    })
}

/// Backslash-escapes every metacharacter so the result matches `text`
/// literally.
pub fn escape(text: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for &b in text {
        if b"\\.*+?^$[]()|{}".contains(&b) {
            out.push(b'\\');
        }
        out.push(b);
    }
    out
}

// ==================== Cached entry points ====================

fn checked_text(text: &[u8]) -> &[u8] {
    if text.len() > i32::MAX as usize {
        trap(messages::TEXT_TOO_LONG);
    }
    text
}

pub fn is_match(text: &[u8], pattern: &[u8]) -> bool {
    cached(pattern).is_match(checked_text(text))
}

pub fn find(text: &[u8], pattern: &[u8], start: usize) -> Option<Match> {
    cached(pattern).find(checked_text(text), start)
}

pub fn find_pos(text: &[u8], pattern: &[u8], start: usize) -> Option<usize> {
    cached(pattern).find_pos(checked_text(text), start)
}

pub fn find_all(text: &[u8], pattern: &[u8]) -> Vec<Match> {
    cached(pattern).find_all(checked_text(text))
}

pub fn captures(text: &[u8], pattern: &[u8], start: usize) -> Option<Captures> {
    cached(pattern).captures(checked_text(text), start)
}

pub fn replace(text: &[u8], pattern: &[u8], replacement: &[u8]) -> Vec<u8> {
    cached(pattern).replace(checked_text(text), replacement)
}

pub fn replace_first(text: &[u8], pattern: &[u8], replacement: &[u8]) -> Vec<u8> {
    cached(pattern).replace_first(checked_text(text), replacement)
}

pub fn split<'t>(text: &'t [u8], pattern: &[u8]) -> Vec<&'t [u8]> {
    cached(pattern).split(checked_text(text))
}

pub fn split_n<'t>(text: &'t [u8], pattern: &[u8], limit: usize) -> Vec<&'t [u8]> {
    cached(pattern).split_n(checked_text(text), limit)
}
