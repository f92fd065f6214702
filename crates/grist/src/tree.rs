//! Immutable paths into a JSON-like tree.
//!
//! Both the walker and the resolver descend through maps and lists while
//! keeping track of where they are. A [`TreePath`] is a persistent stack:
//! [`TreePath::key`] and [`TreePath::index`] return a new path and leave the
//! receiver untouched, so sibling branches can never observe each other's
//! segments.

use std::fmt;
use std::rc::Rc;

/// One step in a tree path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A key in a map.
    Key(String),
    /// A position in a list.
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => write!(f, "{}", key),
            Segment::Index(index) => write!(f, "{}", index),
        }
    }
}

#[derive(Debug)]
struct Link {
    segment: Segment,
    parent: Option<Rc<Link>>,
}

/// A path from the root of a tree to one of its nodes.
#[derive(Debug, Clone, Default)]
pub struct TreePath {
    head: Option<Rc<Link>>,
    depth: usize,
}

impl TreePath {
    /// The path of the root node.
    pub fn root() -> Self {
        Self::default()
    }

    /// Returns the path of a map child.
    pub fn key(&self, key: impl Into<String>) -> Self {
        self.push(Segment::Key(key.into()))
    }

    /// Returns the path of a list element.
    pub fn index(&self, index: usize) -> Self {
        self.push(Segment::Index(index))
    }

    fn push(&self, segment: Segment) -> Self {
        Self {
            head: Some(Rc::new(Link {
                segment,
                parent: self.head.clone(),
            })),
            depth: self.depth + 1,
        }
    }

    /// Number of segments in the path.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_root(&self) -> bool {
        self.head.is_none()
    }

    /// The last segment, if any.
    pub fn last(&self) -> Option<&Segment> {
        self.head.as_ref().map(|link| &link.segment)
    }

    /// Segments from the root down.
    pub fn segments(&self) -> Vec<Segment> {
        let mut segments = Vec::with_capacity(self.depth);
        let mut cursor = self.head.as_ref();
        while let Some(link) = cursor {
            segments.push(link.segment.clone());
            cursor = link.parent.as_ref();
        }
        segments.reverse();
        segments
    }

    /// The path joined with dots, e.g. `dashboards.foo` or `panels.0.ref`.
    pub fn dotted(&self) -> String {
        self.segments()
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Checks the path against a dotted pattern.
    ///
    /// The path is compared in its dotted form: a key containing dots spans
    /// as many pattern parts as it has pieces, so `{"a.b": ..}` and
    /// `{"a": {"b": ..}}` both match `a.b`. A `*` pattern part matches any
    /// single piece.
    pub fn matches(&self, pattern: &str) -> bool {
        let pieces: Vec<String> = self
            .segments()
            .iter()
            .flat_map(|segment| match segment {
                Segment::Key(key) => key.split('.').map(str::to_string).collect::<Vec<_>>(),
                Segment::Index(index) => vec![index.to_string()],
            })
            .collect();
        if pattern.is_empty() {
            return pieces.is_empty();
        }
        let parts: Vec<&str> = pattern.split('.').collect();
        if parts.len() != pieces.len() {
            return false;
        }
        parts
            .iter()
            .zip(pieces.iter())
            .all(|(part, piece)| *part == "*" || *part == piece.as_str())
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".{}", self.dotted())
    }
}

impl PartialEq for TreePath {
    fn eq(&self, other: &Self) -> bool {
        self.depth == other.depth && self.segments() == other.segments()
    }
}

impl Eq for TreePath {}
