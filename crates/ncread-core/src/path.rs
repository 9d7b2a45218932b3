//! # Data Paths
//!
//! Parsing, rendering and matching of the path subset used on the read path.
//!
//! Two kinds of paths share one grammar:
//! - **Path filters** select a subset of the data tree. They may use `*` as a
//!   node name and predicates on any child leaf.
//! - **Instance paths** address exactly one data node. Keyed list entries carry
//!   all key predicates, leaf-list entries carry `[.='value']` and keyless list
//!   entries carry a position `[N]`.
//!
//! ## Grammar
//!
//! ```text
//! path      = 1*( "/" segment )
//! segment   = [ module ":" ] ( name / "*" ) *predicate
//! predicate = "[" ( [ module ":" ] name / "." ) "=" quoted "]" / "[" 1*DIGIT "]"
//! ```
//!
//! The first segment must be module-qualified; later segments inherit the
//! module of their parent unless they name one.

use crate::primitives::MAX_PATH_DEPTH;
use crate::types::PathError;
use std::fmt;

/// Name used by a wildcard segment.
pub const WILDCARD: &str = "*";

// =============================================================================
// PREDICATES & SEGMENTS
// =============================================================================

/// A constraint attached to a path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Predicate {
    /// `[name='value']` — a child leaf equals a value.
    Equals { name: String, value: String },
    /// `[.='value']` — the leaf-list entry itself equals a value.
    Value(String),
    /// `[N]` — the N-th (1-based) entry of a keyless list.
    Position(usize),
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals { name, value } => write!(f, "[{}={}]", name, quote(value)),
            Self::Value(value) => write!(f, "[.={}]", quote(value)),
            Self::Position(pos) => write!(f, "[{}]", pos),
        }
    }
}

fn quote(value: &str) -> String {
    if value.contains('\'') {
        format!("\"{}\"", value)
    } else {
        format!("'{}'", value)
    }
}

/// One step of a path: a module-qualified node name plus predicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    /// Resolved module of the node (inherited when not written).
    pub module: String,
    /// Node name, or `*`.
    pub name: String,
    /// Predicates in written order.
    pub predicates: Vec<Predicate>,
}

impl Segment {
    /// Create a segment without predicates.
    #[must_use]
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
            predicates: Vec::new(),
        }
    }

    /// Builder: add an equality predicate.
    #[must_use]
    pub fn with_key(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.predicates.push(Predicate::Equals {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Builder: add a leaf-list value predicate.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.predicates.push(Predicate::Value(value.into()));
        self
    }

    /// Builder: add a position predicate.
    #[must_use]
    pub fn with_position(mut self, position: usize) -> Self {
        self.predicates.push(Predicate::Position(position));
        self
    }

    /// Whether the node name is a wildcard.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.name == WILDCARD
    }

    /// Value of the equality predicate on `name`, if any.
    #[must_use]
    pub fn key(&self, name: &str) -> Option<&str> {
        self.predicates.iter().find_map(|p| match p {
            Predicate::Equals { name: n, value } if n == name => Some(value.as_str()),
            _ => None,
        })
    }

    /// Value of the `[.='v']` predicate, if any.
    #[must_use]
    pub fn value_predicate(&self) -> Option<&str> {
        self.predicates.iter().find_map(|p| match p {
            Predicate::Value(v) => Some(v.as_str()),
            _ => None,
        })
    }

    /// Position of a keyless list entry, if any.
    #[must_use]
    pub fn position(&self) -> Option<usize> {
        self.predicates.iter().find_map(|p| match p {
            Predicate::Position(pos) => Some(*pos),
            _ => None,
        })
    }

    /// Whether this (filter) segment selects `instance`.
    ///
    /// Predicates that the instance segment does not carry itself (non-key
    /// leaves) are resolved through `lookup`, which receives the child leaf
    /// name and returns its value under the instance node.
    pub fn selects<F>(&self, instance: &Segment, mut lookup: F) -> bool
    where
        F: FnMut(&str) -> Option<String>,
    {
        if self.module != instance.module {
            return false;
        }
        if !self.is_wildcard() && self.name != instance.name {
            return false;
        }
        self.predicates.iter().all(|pred| match pred {
            Predicate::Equals { name, value } => match instance.key(name) {
                Some(v) => v == value,
                None => lookup(name).is_some_and(|v| &v == value),
            },
            Predicate::Value(value) => match instance.value_predicate() {
                Some(v) => v == value,
                None => lookup(".").is_some_and(|v| &v == value),
            },
            Predicate::Position(pos) => instance.position() == Some(*pos),
        })
    }

    fn write_to(&self, f: &mut fmt::Formatter<'_>, parent_module: Option<&str>) -> fmt::Result {
        f.write_str("/")?;
        if parent_module != Some(self.module.as_str()) {
            write!(f, "{}:", self.module)?;
        }
        f.write_str(&self.name)?;
        for pred in &self.predicates {
            write!(f, "{}", pred)?;
        }
        Ok(())
    }
}

// =============================================================================
// PATH FILTER
// =============================================================================

/// A normalized, module-qualified path selecting part of the data tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathFilter {
    segments: Vec<Segment>,
}

impl PathFilter {
    /// Parse and normalize a path filter.
    pub fn parse(input: &str) -> Result<Self, PathError> {
        Ok(Self {
            segments: parse_segments(input)?,
        })
    }

    /// Build a filter from already-resolved segments.
    ///
    /// Returns `None` for an empty segment list.
    #[must_use]
    pub fn from_segments(segments: Vec<Segment>) -> Option<Self> {
        if segments.is_empty() {
            None
        } else {
            Some(Self { segments })
        }
    }

    /// The implicit "everything in this module" filter: `/<module>:*`.
    #[must_use]
    pub fn module_wildcard(module: &str) -> Self {
        Self {
            segments: vec![Segment::new(module, WILDCARD)],
        }
    }

    /// Module of the top-level segment.
    #[must_use]
    pub fn module(&self) -> &str {
        // Invariant: segments is never empty.
        self.segments.first().map_or("", |s| s.module.as_str())
    }

    /// The segments of this filter.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The query sent to the store: this node and everything beneath it.
    #[must_use]
    pub fn subtree_query(&self) -> String {
        format!("{}//.", self)
    }

    /// Whether the instance path lies at or beneath a node this filter selects.
    ///
    /// `lookup(depth, name)` resolves a child leaf `name` of the instance node
    /// at `depth` for predicates the instance path does not carry.
    pub fn covers<F>(&self, instance: &[Segment], mut lookup: F) -> bool
    where
        F: FnMut(usize, &str) -> Option<String>,
    {
        if instance.len() < self.segments.len() {
            return false;
        }
        self.segments
            .iter()
            .zip(instance)
            .enumerate()
            .all(|(depth, (filter, seg))| filter.selects(seg, |name| lookup(depth, name)))
    }
}

impl fmt::Display for PathFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_segments(f, &self.segments)
    }
}

/// Render segments in normalized form.
#[must_use]
pub fn render_segments(segments: &[Segment]) -> String {
    struct Rendered<'a>(&'a [Segment]);
    impl fmt::Display for Rendered<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write_segments(f, self.0)
        }
    }
    Rendered(segments).to_string()
}

fn write_segments(f: &mut fmt::Formatter<'_>, segments: &[Segment]) -> fmt::Result {
    let mut parent: Option<&str> = None;
    for seg in segments {
        seg.write_to(f, parent)?;
        parent = Some(seg.module.as_str());
    }
    Ok(())
}

// =============================================================================
// PARSER
// =============================================================================

/// Parse an absolute path into resolved segments.
pub fn parse_segments(input: &str) -> Result<Vec<Segment>, PathError> {
    Parser::new(input).parse()
}

struct Parser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn err(&self, message: &str) -> PathError {
        PathError::new(self.input, self.pos, message)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), PathError> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.err(&format!("expected '{}'", byte as char)))
        }
    }

    fn parse(mut self) -> Result<Vec<Segment>, PathError> {
        self.skip_ws();
        if self.peek() != Some(b'/') {
            return Err(self.err("path must be absolute"));
        }

        let mut segments: Vec<Segment> = Vec::new();
        while self.peek() == Some(b'/') {
            self.pos += 1;
            if self.peek() == Some(b'/') {
                return Err(self.err("descendant axis is not supported"));
            }
            if segments.len() == MAX_PATH_DEPTH {
                return Err(self.err("path too deep"));
            }
            let parent = segments.last().map(|s| s.module.clone());
            let segment = self.segment(parent)?;
            segments.push(segment);
        }

        self.skip_ws();
        if self.pos != self.bytes.len() {
            return Err(self.err("unexpected trailing characters"));
        }
        Ok(segments)
    }

    fn identifier(&mut self) -> Result<&'a str, PathError> {
        let input = self.input;
        let start = self.pos;
        if self.peek() == Some(b'*') {
            self.pos += 1;
            return Ok(&input[start..self.pos]);
        }
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'))
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.err("expected identifier"));
        }
        let ident = &input[start..self.pos];
        if ident.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '.') {
            return Err(PathError::new(input, start, "invalid identifier"));
        }
        Ok(ident)
    }

    fn segment(&mut self, parent_module: Option<String>) -> Result<Segment, PathError> {
        let first = self.identifier()?;
        let (module, name) = if self.peek() == Some(b':') {
            self.pos += 1;
            if first == WILDCARD {
                return Err(self.err("module prefix cannot be a wildcard"));
            }
            (first.to_string(), self.identifier()?.to_string())
        } else {
            match parent_module {
                Some(module) => (module, first.to_string()),
                None => return Err(self.err("top-level segment must be module-qualified")),
            }
        };

        let mut segment = Segment::new(module, name);
        while self.peek() == Some(b'[') {
            self.pos += 1;
            self.skip_ws();
            let predicate = self.predicate()?;
            self.skip_ws();
            self.expect(b']')?;
            segment.predicates.push(predicate);
        }
        Ok(segment)
    }

    fn predicate(&mut self) -> Result<Predicate, PathError> {
        if self.peek().is_some_and(|b| b.is_ascii_digit()) {
            let start = self.pos;
            while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                self.pos += 1;
            }
            let pos: usize = self.input[start..self.pos]
                .parse()
                .map_err(|_| self.err("invalid position"))?;
            if pos == 0 {
                return Err(self.err("positions start at 1"));
            }
            return Ok(Predicate::Position(pos));
        }

        let is_self = self.peek() == Some(b'.');
        let name = if is_self {
            self.pos += 1;
            None
        } else {
            let first = self.identifier()?;
            if first == WILDCARD {
                return Err(self.err("wildcard not allowed in predicate"));
            }
            if self.peek() == Some(b':') {
                self.pos += 1;
                Some(self.identifier()?.to_string())
            } else {
                Some(first.to_string())
            }
        };

        self.skip_ws();
        self.expect(b'=')?;
        self.skip_ws();
        let value = self.quoted()?;

        Ok(match name {
            Some(name) => Predicate::Equals { name, value },
            None => Predicate::Value(value),
        })
    }

    fn quoted(&mut self) -> Result<String, PathError> {
        let quote = match self.peek() {
            Some(q @ (b'\'' | b'"')) => q,
            _ => return Err(self.err("expected quoted value")),
        };
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(|b| b != quote) {
            self.pos += 1;
        }
        if self.peek().is_none() {
            return Err(self.err("unterminated string"));
        }
        let value = self.input[start..self.pos].to_string();
        self.pos += 1;
        Ok(value)
    }
}

// =============================================================================
// TESTS
// =============================================================================
