//! Event selectors.
//!
//! A selector names a scope of events over stream names, categories and
//! event types. The textual form is the primary external interface for
//! configuring stores and reads:
//!
//! ```text
//! selector   := "*" | [stream] [categories] [events]
//! stream     := ("$" | "~") path        ; "$" absolute, "~" relative
//! categories := ("." literal)+
//! events     := "[" literal ("," literal)* "]"
//! ```
//!
//! Parsing and [`fmt::Display`] are exact inverses for every valid selector.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::events::EventTypes;

/// Wildcard selecting every event.
pub const ALL: char = '*';
/// Prefix marking an absolute stream name.
pub const ABSOLUTE_PREFIX: char = '$';
/// Prefix marking a stream name relative to a caller-supplied prefix.
pub const RELATIVE_PREFIX: char = '~';
/// Prefix of each category literal.
pub const CATEGORY_PREFIX: char = '.';
/// Opens the event type list.
pub const EVENTS_OPEN: char = '[';
/// Closes the event type list.
pub const EVENTS_CLOSE: char = ']';
/// Separates event type literals.
pub const EVENTS_SEPARATOR: char = ',';
/// Trailing wildcard of a stream literal.
pub const WILDCARD: char = '*';

/// Characters a stream name literal must not contain.
const STREAM_RESERVED: &[char] = &[
    ABSOLUTE_PREFIX,
    RELATIVE_PREFIX,
    CATEGORY_PREFIX,
    EVENTS_OPEN,
    EVENTS_CLOSE,
    EVENTS_SEPARATOR,
];

/// Characters a category literal must not contain.
const CATEGORY_RESERVED: &[char] = &[
    ABSOLUTE_PREFIX,
    RELATIVE_PREFIX,
    CATEGORY_PREFIX,
    EVENTS_OPEN,
    EVENTS_CLOSE,
    EVENTS_SEPARATOR,
    WILDCARD,
];

/// Characters an event type literal must not contain.
///
/// Dots are allowed: type names are commonly namespaced (`orders.Created`)
/// and the bracket delimits the list unambiguously.
const EVENT_RESERVED: &[char] = &[
    ABSOLUTE_PREFIX,
    RELATIVE_PREFIX,
    EVENTS_OPEN,
    EVENTS_CLOSE,
    EVENTS_SEPARATOR,
    WILDCARD,
];

/// Selector validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("Selector selects nothing")]
    Empty,

    #[error("Invalid selector syntax in {selector:?}: {reason}")]
    InvalidSyntax { selector: String, reason: String },

    #[error("Invalid {kind} literal {literal:?}")]
    InvalidLiteral { kind: LiteralKind, literal: String },

    #[error("Wildcard selector cannot be combined with other components")]
    ExclusiveAll,

    #[error("Relative selector requires a stream name")]
    RelativeWithoutStream,
}

/// Which component a rejected literal belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Stream,
    Category,
    Event,
    Prefix,
}

impl fmt::Display for LiteralKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            LiteralKind::Stream => "stream",
            LiteralKind::Category => "category",
            LiteralKind::Event => "event",
            LiteralKind::Prefix => "prefix",
        };
        f.write_str(kind)
    }
}

/// Result type for selector operations.
pub type Result<T> = std::result::Result<T, SelectorError>;

/// A validated scope over streams, categories and event types.
///
/// Immutable once built; the `with_*` setters consume the selector,
/// re-validate and hand back the updated value. A selector always constrains
/// something, so there is no empty value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Selector {
    all: bool,
    stream_name: String,
    relative: bool,
    categories: Vec<String>,
    events: Vec<String>,
}

impl Selector {
    /// The universal wildcard selector (`*`).
    pub fn all() -> Self {
        Self {
            all: true,
            ..Self::blank()
        }
    }

    /// Selector over an absolute stream name.
    pub fn of_stream(stream_name: impl Into<String>) -> Result<Self> {
        Self::blank().with_stream_name(stream_name)
    }

    /// Selector over any of `categories`.
    pub fn of_categories<I, S>(categories: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::blank().with_categories(categories)
    }

    /// Selector over any of `events`.
    pub fn of_events<I, S>(events: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::blank().with_events(events)
    }

    /// Starting point of parsing and constructors; never handed out as is.
    fn blank() -> Self {
        Self {
            all: false,
            stream_name: String::new(),
            relative: false,
            categories: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Parse a selector from its textual form.
    pub fn parse(input: &str) -> Result<Self> {
        Parser::new(input).parse()
    }

    pub fn is_all(&self) -> bool {
        self.all
    }

    /// Stream name literal without prefix marker; empty when unconstrained.
    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    pub fn is_relative(&self) -> bool {
        self.relative
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }

    pub fn with_all(mut self, all: bool) -> Result<Self> {
        self.all = all;
        self.validate()?;
        Ok(self)
    }

    pub fn with_stream_name(mut self, stream_name: impl Into<String>) -> Result<Self> {
        self.stream_name = stream_name.into();
        self.validate()?;
        Ok(self)
    }

    pub fn with_relative(mut self, relative: bool) -> Result<Self> {
        self.relative = relative;
        self.validate()?;
        Ok(self)
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self.validate()?;
        Ok(self)
    }

    pub fn with_events<I, S>(mut self, events: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.events = events.into_iter().map(Into::into).collect();
        self.validate()?;
        Ok(self)
    }

    /// Resolve a relative selector against `prefix`.
    ///
    /// Produces a non-relative selector with stream name `prefix/stream`.
    /// Absolute selectors are returned unchanged.
    pub fn to_absolute(&self, prefix: &str) -> Result<Self> {
        if !self.relative {
            return Ok(self.clone());
        }
        validate_literal(prefix, STREAM_RESERVED, LiteralKind::Prefix)?;

        let prefix = prefix.trim_end_matches('/');
        let stream_name = if prefix.is_empty() {
            self.stream_name.clone()
        } else {
            format!("{}/{}", prefix, self.stream_name)
        };

        let absolute = Self {
            all: false,
            stream_name,
            relative: false,
            categories: self.categories.clone(),
            events: self.events.clone(),
        };
        absolute.validate()?;
        Ok(absolute)
    }

    /// Whether every event admitted by `other` is also admitted by `self`.
    ///
    /// Empty dimensions on `self` are unconstrained. A constrained dimension
    /// fails when `other` leaves it empty, since `other` is then broader.
    pub fn fulfills(&self, other: &Selector, types: &EventTypes) -> bool {
        if self.all {
            return true;
        }
        self.fulfills_stream(other)
            && self.fulfills_categories(other)
            && self.fulfills_events(other, types)
    }

    fn fulfills_stream(&self, other: &Selector) -> bool {
        if self.stream_name.is_empty() {
            return true;
        }
        if other.stream_name.is_empty() {
            return false;
        }
        if !has_wildcard(&self.stream_name) {
            // A literal stream cannot contain a broader (wildcarded) one.
            return self.stream_name == other.stream_name;
        }
        comparable_part(&other.stream_name).starts_with(comparable_part(&self.stream_name))
    }

    fn fulfills_categories(&self, other: &Selector) -> bool {
        if self.categories.is_empty() {
            return true;
        }
        if other.categories.is_empty() {
            return false;
        }
        self.categories
            .iter()
            .any(|category| other.categories.contains(category))
    }

    fn fulfills_events(&self, other: &Selector, types: &EventTypes) -> bool {
        if self.events.is_empty() {
            return true;
        }
        if other.events.is_empty() {
            return false;
        }
        other.events.iter().all(|candidate| {
            self.events
                .iter()
                .any(|supervisor| types.is_a(candidate, supervisor))
        })
    }

    fn validate(&self) -> Result<()> {
        if self.all {
            if !self.stream_name.is_empty()
                || self.relative
                || !self.categories.is_empty()
                || !self.events.is_empty()
            {
                return Err(SelectorError::ExclusiveAll);
            }
            return Ok(());
        }

        if self.stream_name.is_empty() {
            if self.relative {
                return Err(SelectorError::RelativeWithoutStream);
            }
            if self.categories.is_empty() && self.events.is_empty() {
                return Err(SelectorError::Empty);
            }
        } else {
            validate_literal(&self.stream_name, STREAM_RESERVED, LiteralKind::Stream)?;
        }
        for category in &self.categories {
            validate_literal(category, CATEGORY_RESERVED, LiteralKind::Category)?;
        }
        for event in &self.events {
            validate_literal(event, EVENT_RESERVED, LiteralKind::Event)?;
        }
        Ok(())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.all {
            return write!(f, "{}", ALL);
        }
        if !self.stream_name.is_empty() {
            let prefix = if self.relative {
                RELATIVE_PREFIX
            } else {
                ABSOLUTE_PREFIX
            };
            write!(f, "{}{}", prefix, self.stream_name)?;
        }
        for category in &self.categories {
            write!(f, "{}{}", CATEGORY_PREFIX, category)?;
        }
        if !self.events.is_empty() {
            write!(
                f,
                "{}{}{}",
                EVENTS_OPEN,
                self.events.join(&EVENTS_SEPARATOR.to_string()),
                EVENTS_CLOSE
            )?;
        }
        Ok(())
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Selector {
    type Error = SelectorError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Selector> for String {
    fn from(selector: Selector) -> Self {
        selector.to_string()
    }
}

/// Whether a literal ends in the trailing wildcard.
pub fn has_wildcard(literal: &str) -> bool {
    literal.ends_with(WILDCARD)
}

/// The literal with its trailing wildcard removed.
///
/// Literals without a wildcard are returned as-is. Shared by selector
/// matching and storage predicate construction.
pub fn comparable_part(literal: &str) -> &str {
    literal.strip_suffix(WILDCARD).unwrap_or(literal)
}

/// Check a single category literal, as packed into storage.
pub fn validate_category(category: &str) -> Result<()> {
    validate_literal(category, CATEGORY_RESERVED, LiteralKind::Category)
}

/// Check a concrete stream name an event is appended to.
///
/// Unlike selector stream literals, a stored stream name cannot carry the
/// trailing wildcard.
pub fn validate_stream_name(stream_name: &str) -> Result<()> {
    validate_literal(stream_name, STREAM_RESERVED, LiteralKind::Stream)?;
    if has_wildcard(stream_name) {
        return Err(SelectorError::InvalidLiteral {
            kind: LiteralKind::Stream,
            literal: stream_name.to_string(),
        });
    }
    Ok(())
}

fn validate_literal(literal: &str, reserved: &[char], kind: LiteralKind) -> Result<()> {
    if literal.is_empty() || literal.contains(reserved) {
        return Err(SelectorError::InvalidLiteral {
            kind,
            literal: literal.to_string(),
        });
    }
    Ok(())
}

/// Single-pass parser over the selector grammar.
struct Parser<'a> {
    input: &'a str,
    rest: &'a str,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, rest: input }
    }

    fn parse(mut self) -> Result<Selector> {
        if self.input.is_empty() {
            return Err(SelectorError::Empty);
        }
        if self.input.starts_with(ALL) {
            if self.input.len() > ALL.len_utf8() {
                return Err(SelectorError::ExclusiveAll);
            }
            return Ok(Selector::all());
        }

        let mut selector = Selector::blank();

        if let Some(first) = self.rest.chars().next() {
            if first == ABSOLUTE_PREFIX || first == RELATIVE_PREFIX {
                self.rest = &self.rest[first.len_utf8()..];
                selector.relative = first == RELATIVE_PREFIX;
                selector.stream_name = self.take_until(&[CATEGORY_PREFIX, EVENTS_OPEN]).to_string();
                if selector.stream_name.is_empty() {
                    return Err(self.syntax("stream prefix without stream name"));
                }
            }
        }

        while let Some(rest) = self.rest.strip_prefix(CATEGORY_PREFIX) {
            self.rest = rest;
            let category = self.take_until(&[CATEGORY_PREFIX, EVENTS_OPEN]);
            if category.is_empty() {
                return Err(self.syntax("empty category"));
            }
            selector.categories.push(category.to_string());
        }

        if let Some(rest) = self.rest.strip_prefix(EVENTS_OPEN) {
            let Some(inner) = rest.strip_suffix(EVENTS_CLOSE) else {
                return Err(self.syntax("unterminated event list"));
            };
            for event in inner.split(EVENTS_SEPARATOR) {
                if event.is_empty() {
                    return Err(self.syntax("empty event type"));
                }
                selector.events.push(event.to_string());
            }
            self.rest = "";
        }

        if !self.rest.is_empty() {
            return Err(self.syntax("unexpected input, stream names need a '$' or '~' prefix"));
        }

        selector.validate()?;
        Ok(selector)
    }

    fn take_until(&mut self, stops: &[char]) -> &'a str {
        let end = self.rest.find(stops).unwrap_or(self.rest.len());
        let (taken, rest) = self.rest.split_at(end);
        self.rest = rest;
        taken
    }

    fn syntax(&self, reason: &str) -> SelectorError {
        SelectorError::InvalidSyntax {
            selector: self.input.to_string(),
            reason: reason.to_string(),
        }
    }
}
