//! Segment tree construction and matching.
//!
//! Every node of the tree corresponds to one compiled path segment. A node
//! owns two ordered lists: child nodes for segments that continue the path
//! and leaves for segments that terminate it. Both lists are kept sorted by
//! [`PatternKind`] so that iteration order is match precedence.
//!
//! ```text
//!                 (root)
//!                   │
//!        ┌──────────┴──────────┐
//!     "user"                "files"
//!   leaves: [":id"]       leaves: ["*.*", "*"]
//! ```

use std::sync::Arc;

use crate::error::PatternError;
use crate::params::Params;
use crate::pattern::{CompiledPattern, PatternKind};

/// A terminal segment bound to a registered value.
#[derive(Debug)]
pub struct Leaf<T> {
    pattern: CompiledPattern,
    value: T,
}

impl<T> Leaf<T> {
    /// Returns the compiled final segment.
    #[must_use]
    pub fn pattern(&self) -> &CompiledPattern {
        &self.pattern
    }

    /// Returns the value registered for this route.
    #[must_use]
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Returns true if the final segment was registered with `?`.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.pattern.is_optional()
    }
}

/// A node in the route tree.
#[derive(Debug)]
pub struct Node<T> {
    pattern: CompiledPattern,
    children: Vec<Node<T>>,
    leaves: Vec<Arc<Leaf<T>>>,
}

/// Outcome of inserting below a node.
///
/// `lift` carries the value of an optional leaf that the caller must also
/// register as a leaf named after the child it descended into.
struct Inserted<T> {
    leaf: Arc<Leaf<T>>,
    lift: Option<T>,
}

impl<T: Clone> Node<T> {
    /// Creates an empty tree root.
    #[must_use]
    pub fn root() -> Self {
        Self::new(CompiledPattern::root())
    }

    fn new(pattern: CompiledPattern) -> Self {
        Self {
            pattern,
            children: Vec::new(),
            leaves: Vec::new(),
        }
    }

    /// Returns the compiled segment of this node.
    #[must_use]
    pub fn pattern(&self) -> &CompiledPattern {
        &self.pattern
    }

    /// Returns the child nodes in precedence order.
    #[must_use]
    pub fn children(&self) -> &[Node<T>] {
        &self.children
    }

    /// Returns the leaves in precedence order.
    #[must_use]
    pub fn leaves(&self) -> &[Arc<Leaf<T>>] {
        &self.leaves
    }

    /// Registers `pattern` below this root and returns its leaf.
    ///
    /// Every segment is compiled before the tree is touched, so a failed
    /// registration leaves the tree unchanged. Registering a pattern whose
    /// final segment already exists returns the existing leaf.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] if any segment fails to compile.
    pub fn insert(&mut self, pattern: &str, value: T) -> Result<Arc<Leaf<T>>, PatternError> {
        let segments = split_segments(pattern)
            .into_iter()
            .map(CompiledPattern::compile)
            .collect::<Result<Vec<_>, _>>()?;

        let inserted = self.insert_segments(&segments, value, true)?;
        Ok(inserted.leaf)
    }

    fn insert_segments(
        &mut self,
        segments: &[CompiledPattern],
        value: T,
        is_root: bool,
    ) -> Result<Inserted<T>, PatternError> {
        let (segment, rest) = match segments {
            [] => return self.add_leaf(CompiledPattern::root(), value, is_root),
            [last] => return self.add_leaf(last.clone(), value, is_root),
            [segment, rest @ ..] => (segment, rest),
        };

        let index = match self.children.iter().position(|c| same_slot(&c.pattern, segment)) {
            Some(index) => {
                warn_if_shadowed(&self.children[index].pattern, segment);
                index
            }
            None => {
                let at = self
                    .children
                    .partition_point(|c| c.pattern.kind() <= segment.kind());
                self.children.insert(at, Self::new(segment.clone()));
                at
            }
        };

        let mut inserted = self.children[index].insert_segments(rest, value, false)?;
        if let Some(value) = inserted.lift.take() {
            let lifted = CompiledPattern::compile(self.children[index].pattern.literal())?;
            self.add_leaf(lifted, value, false)?;
        }
        Ok(inserted)
    }

    fn add_leaf(
        &mut self,
        pattern: CompiledPattern,
        value: T,
        is_root: bool,
    ) -> Result<Inserted<T>, PatternError> {
        if let Some(existing) = self.leaves.iter().find(|l| same_slot(&l.pattern, &pattern)) {
            warn_if_shadowed(&existing.pattern, &pattern);
            return Ok(Inserted {
                leaf: Arc::clone(existing),
                lift: None,
            });
        }

        let mut lift = None;
        if pattern.is_optional() {
            if is_root {
                self.add_leaf(CompiledPattern::root(), value.clone(), true)?;
            } else {
                lift = Some(value.clone());
            }
        }

        let leaf = Arc::new(Leaf { pattern, value });
        let at = self
            .leaves
            .partition_point(|l| l.pattern.kind() <= leaf.pattern.kind());
        self.leaves.insert(at, Arc::clone(&leaf));

        Ok(Inserted { leaf, lift })
    }
}

impl<T> Node<T> {
    /// Matches a request path against the tree.
    ///
    /// The path is expected in its escaped form; each segment is
    /// percent-decoded on its own so an encoded `/` never introduces a
    /// segment boundary.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<(Arc<Leaf<T>>, Params)> {
        let path = path.strip_prefix('/').unwrap_or(path);
        let path = path.strip_prefix('/').unwrap_or(path);

        let mut params = Params::new();
        let leaf = self.match_next_segment(0, path, &mut params)?;
        Some((Arc::clone(leaf), params))
    }

    fn match_next_segment(&self, level: usize, url: &str, params: &mut Params) -> Option<&Arc<Leaf<T>>> {
        match url.split_once('/') {
            None => self.match_leaf(level, url, params),
            Some((segment, rest)) => self.match_subtree(level, segment, rest, params),
        }
    }

    fn match_leaf(&self, level: usize, url: &str, params: &mut Params) -> Option<&Arc<Leaf<T>>> {
        let decoded = urlencoding::decode(url).ok()?;
        let decoded = decoded.as_ref();

        for leaf in &self.leaves {
            let pattern = &leaf.pattern;
            match pattern.kind() {
                PatternKind::Static => {
                    if pattern.literal() == decoded {
                        return Some(leaf);
                    }
                }
                PatternKind::RegexCapture => {
                    if pattern.bind_captures(decoded, params) {
                        return Some(leaf);
                    }
                }
                PatternKind::PathExtension => {
                    bind_path_extension(decoded, params);
                    return Some(leaf);
                }
                PatternKind::OpenCapture => {
                    if let Some(name) = pattern.capture_names().first() {
                        params.set(name.as_str(), decoded);
                        return Some(leaf);
                    }
                }
                PatternKind::MatchAll => {
                    params.set("*", decoded);
                    params.set(format!("*{level}"), decoded);
                    return Some(leaf);
                }
            }
        }
        None
    }

    fn match_subtree(
        &self,
        level: usize,
        segment: &str,
        rest: &str,
        params: &mut Params,
    ) -> Option<&Arc<Leaf<T>>> {
        let decoded = urlencoding::decode(segment).ok()?;
        let decoded = decoded.as_ref();

        for child in &self.children {
            let pattern = &child.pattern;
            match pattern.kind() {
                PatternKind::Static => {
                    if pattern.literal() == decoded {
                        if let Some(leaf) = child.match_next_segment(level, rest, params) {
                            return Some(leaf);
                        }
                    }
                }
                PatternKind::RegexCapture => {
                    let saved = params.clone();
                    if pattern.bind_captures(decoded, params) {
                        if let Some(leaf) = child.match_next_segment(level, rest, params) {
                            return Some(leaf);
                        }
                        *params = saved;
                    }
                }
                PatternKind::OpenCapture => {
                    if let Some(leaf) = child.match_next_segment(level + 1, rest, params) {
                        if let Some(name) = pattern.capture_names().first() {
                            params.set(name.as_str(), decoded);
                        }
                        params.set(format!("*{level}"), decoded);
                        if !params.contains("*") {
                            params.set("*", decoded);
                        }
                        return Some(leaf);
                    }
                }
                PatternKind::MatchAll => {
                    if let Some(leaf) = child.match_next_segment(level + 1, rest, params) {
                        params.set(format!("*{level}"), decoded);
                        if !params.contains("*") {
                            params.set("*", decoded);
                        }
                        return Some(leaf);
                    }
                }
                // `*.*` only has meaning as the final segment
                PatternKind::PathExtension => {}
            }
        }

        self.match_trailing_catch_all(level, segment, rest, params)
    }

    /// Lets a trailing `*.*` or `*` leaf absorb the unmatched remainder of
    /// the path, slashes included.
    fn match_trailing_catch_all(
        &self,
        level: usize,
        segment: &str,
        rest: &str,
        params: &mut Params,
    ) -> Option<&Arc<Leaf<T>>> {
        let leaf = self.leaves.last()?;
        let kind = leaf.pattern.kind();
        if kind != PatternKind::PathExtension && kind != PatternKind::MatchAll {
            return None;
        }

        let joined = format!("{segment}/{rest}");
        let decoded = urlencoding::decode(&joined).ok()?;

        if kind == PatternKind::PathExtension {
            bind_path_extension(&decoded, params);
        } else {
            params.set("*", decoded.as_ref());
            params.set(format!("*{level}"), decoded.as_ref());
        }
        Some(leaf)
    }
}

/// Two segments occupy the same slot when they have the same kind and the
/// same text once capture expressions are stripped.
fn same_slot(a: &CompiledPattern, b: &CompiledPattern) -> bool {
    a.kind() == b.kind() && a.raw_text() == b.raw_text()
}

/// Logs when a segment lands in an occupied slot under a different
/// expression; the existing segment keeps matching and the new one is
/// never consulted.
fn warn_if_shadowed(existing: &CompiledPattern, incoming: &CompiledPattern) {
    if existing.literal() != incoming.literal() {
        tracing::warn!(
            existing = existing.literal(),
            ignored = incoming.literal(),
            "segment shares a slot with an existing route; keeping the existing expression"
        );
    }
}

fn bind_path_extension(value: &str, params: &mut Params) {
    match value.rsplit_once('.') {
        Some((path, ext)) => {
            params.set(":path", path);
            params.set(":ext", ext);
        }
        None => params.set(":path", value),
    }
}

/// Splits a pattern into segments.
///
/// One trailing `/` is dropped and one leading `/` is stripped before each
/// segment, so `/a/b/` yields `["a", "b"]` and `/` yields `[""]`.
fn split_segments(pattern: &str) -> Vec<&str> {
    let mut rest = pattern.strip_suffix('/').unwrap_or(pattern);
    let mut segments = Vec::new();
    loop {
        rest = rest.strip_prefix('/').unwrap_or(rest);
        match rest.split_once('/') {
            Some((segment, tail)) => {
                segments.push(segment);
                rest = tail;
            }
            None => {
                segments.push(rest);
                return segments;
            }
        }
    }
}
