//! Route pattern compilation.
//!
//! A route pattern is split on `/` and every segment is compiled into a
//! [`CompiledPattern`]. The compiled form records the segment's
//! [`PatternKind`], which doubles as its match precedence, the names of
//! any captures it declares and, for regex captures, the anchored
//! expression used to match a request segment.
//!
//! # Segment syntax
//!
//! | Segment | Kind | Notes |
//! |---------|------|-------|
//! | `users` | [`PatternKind::Static`] | compared verbatim |
//! | `:id` | [`PatternKind::OpenCapture`] | one or more characters |
//! | `:id([0-9]+)` | [`PatternKind::RegexCapture`] | explicit expression |
//! | `:id:int` | [`PatternKind::RegexCapture`] | `([0-9]+)` |
//! | `:name:string` | [`PatternKind::RegexCapture`] | `([\w]+)` |
//! | `v:major.:minor` | [`PatternKind::RegexCapture`] | literals mixed with captures |
//! | `*.*` | [`PatternKind::PathExtension`] | binds `:path` and `:ext` |
//! | `*` | [`PatternKind::MatchAll`] | binds `*` and `*<level>` |
//!
//! A leading `?` marks the segment optional; it is stripped before the
//! segment is classified.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::PatternError;
use crate::params::Params;

/// The open-ended expression substituted for a bare capture.
const OPEN_CAPTURE: &str = "(.+)";

/// Kind of a compiled segment.
///
/// The declaration order is the match precedence: siblings in the route
/// tree are kept sorted by kind so that the most specific pattern is tried
/// first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PatternKind {
    /// Literal segment (e.g. `users`).
    Static,
    /// One or more captures compiled into an anchored regular expression.
    RegexCapture,
    /// The `*.*` path-extension pattern.
    PathExtension,
    /// A single bare capture such as `:id`.
    OpenCapture,
    /// The `*` catch-all.
    MatchAll,
}

/// A route pattern segment compiled into its matching form.
#[derive(Clone)]
pub struct CompiledPattern {
    kind: PatternKind,
    /// The segment without its optional marker.
    literal: String,
    /// The segment with capture expressions stripped, used as a dedup key.
    raw_text: String,
    /// Capture names in declaration order, each including its leading `:`.
    capture_names: Vec<String>,
    matcher: Option<Regex>,
    optional: bool,
}

impl CompiledPattern {
    /// Compiles a single pattern segment.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] if an explicit capture group is unbalanced,
    /// the assembled expression does not compile, or its group count
    /// differs from the number of declared capture names.
    ///
    /// # Example
    ///
    /// ```rust
    /// use waymark_router::{CompiledPattern, PatternKind};
    ///
    /// let pattern = CompiledPattern::compile(":id([0-9]+)").unwrap();
    /// assert_eq!(pattern.kind(), PatternKind::RegexCapture);
    /// assert_eq!(pattern.capture_names(), [":id"]);
    /// assert_eq!(pattern.raw_text(), ":id");
    /// ```
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        let optional = pattern.starts_with('?');
        let literal = pattern.trim_start_matches('?');

        let mut compiled = Self {
            kind: PatternKind::Static,
            literal: literal.to_string(),
            raw_text: literal.to_string(),
            capture_names: Vec::new(),
            matcher: None,
            optional,
        };

        if literal == "*" {
            compiled.kind = PatternKind::MatchAll;
        } else if literal == "*.*" {
            compiled.kind = PatternKind::PathExtension;
        } else if literal.contains(':') {
            let expanded = expand_captures(literal)?;
            compiled.raw_text = expanded.raw_text;
            compiled.capture_names = expanded.names;

            if expanded.expression == OPEN_CAPTURE && compiled.capture_names.len() == 1 {
                compiled.kind = PatternKind::OpenCapture;
            } else if compiled.capture_names.is_empty() {
                // a lone ':' with no identifier after it is plain text
            } else {
                compiled.kind = PatternKind::RegexCapture;
                compiled.matcher = Some(compile_anchored(literal, &expanded.expression, compiled.capture_names.len())?);
            }
        }

        Ok(compiled)
    }

    /// The pattern of the tree root: an empty static segment.
    #[must_use]
    pub fn root() -> Self {
        Self {
            kind: PatternKind::Static,
            literal: String::new(),
            raw_text: String::new(),
            capture_names: Vec::new(),
            matcher: None,
            optional: false,
        }
    }

    /// Returns the kind of this segment.
    #[must_use]
    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    /// Returns the segment as registered, without the optional marker.
    #[must_use]
    pub fn literal(&self) -> &str {
        &self.literal
    }

    /// Returns the segment with capture expressions stripped.
    ///
    /// Two segments with the same raw text are treated as the same node
    /// or leaf when routes are registered.
    #[must_use]
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// Returns the capture names, each including its leading `:`.
    #[must_use]
    pub fn capture_names(&self) -> &[String] {
        &self.capture_names
    }

    /// Returns the compiled expression for regex captures.
    #[must_use]
    pub fn matcher(&self) -> Option<&Regex> {
        self.matcher.as_ref()
    }

    /// Returns true if the segment was registered with a `?` prefix.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Matches a decoded segment against the expression and binds every
    /// capture name to its group.
    ///
    /// Returns false, leaving `params` untouched, when the segment does not
    /// match or the pattern has no expression.
    pub(crate) fn bind_captures(&self, segment: &str, params: &mut Params) -> bool {
        let Some(captures) = self.matcher.as_ref().and_then(|re| re.captures(segment)) else {
            return false;
        };

        for (index, name) in self.capture_names.iter().enumerate() {
            let value = captures.get(index + 1).map_or("", |m| m.as_str());
            params.set(name.as_str(), value);
        }
        true
    }
}

impl PartialEq for CompiledPattern {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.literal == other.literal
            && self.raw_text == other.raw_text
            && self.capture_names == other.capture_names
            && self.optional == other.optional
            && self.matcher.as_ref().map(Regex::as_str) == other.matcher.as_ref().map(Regex::as_str)
    }
}

impl Eq for CompiledPattern {}

impl fmt::Debug for CompiledPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPattern")
            .field("kind", &self.kind)
            .field("literal", &self.literal)
            .field("raw_text", &self.raw_text)
            .field("capture_names", &self.capture_names)
            .field("matcher", &self.matcher.as_ref().map(Regex::as_str))
            .field("optional", &self.optional)
            .finish()
    }
}

/// Result of replacing every `:name` token of a segment.
struct Expanded {
    expression: String,
    raw_text: String,
    names: Vec<String>,
}

fn wildcard_token() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r":[A-Za-z0-9_]+").expect("token expression is valid"))
}

/// Scans a segment left to right and substitutes each capture token with
/// its expression. Literal text between tokens is escaped.
fn expand_captures(segment: &str) -> Result<Expanded, PatternError> {
    let mut expression = String::with_capacity(segment.len() + 8);
    let mut raw_text = String::with_capacity(segment.len());
    let mut names = Vec::with_capacity(2);
    let mut rest = segment;

    while let Some(token) = wildcard_token().find(rest) {
        let before = &rest[..token.start()];
        expression.push_str(&regex::escape(before));
        raw_text.push_str(before);
        raw_text.push_str(token.as_str());
        names.push(token.as_str().to_string());

        let after = &rest[token.end()..];
        rest = if after.is_empty() {
            expression.push_str(OPEN_CAPTURE);
            after
        } else if after.starts_with('(') {
            let end = group_end(after).ok_or_else(|| PatternError::UnbalancedGroup {
                pattern: segment.to_string(),
            })?;
            expression.push_str(&after[..end]);
            &after[end..]
        } else if let Some(tail) = after.strip_prefix(":int") {
            expression.push_str("([0-9]+)");
            tail
        } else if let Some(tail) = after.strip_prefix(":string") {
            expression.push_str(r"([\w]+)");
            tail
        } else {
            expression.push_str(OPEN_CAPTURE);
            after
        };
    }

    expression.push_str(&regex::escape(rest));
    raw_text.push_str(rest);

    Ok(Expanded {
        expression,
        raw_text,
        names,
    })
}

/// Returns the byte offset just past the group that opens at `s[0]`.
fn group_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn compile_anchored(pattern: &str, expression: &str, names: usize) -> Result<Regex, PatternError> {
    let re = Regex::new(&format!("^{expression}$")).map_err(|e| PatternError::InvalidRegex {
        pattern: pattern.to_string(),
        source: Box::new(e),
    })?;

    let groups = re.captures_len() - 1;
    if groups != names {
        return Err(PatternError::CaptureCountMismatch {
            pattern: pattern.to_string(),
            names,
            groups,
        });
    }
    Ok(re)
}
