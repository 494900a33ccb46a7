//! Remote database paths.

use crate::error::{RemoteError, RemoteResult};
use std::fmt;

/// Characters that may not appear in a path segment.
const FORBIDDEN: [char; 6] = ['.', '#', '$', '[', ']', '/'];

/// A location in the remote database.
///
/// Paths are slash-separated lists of non-empty segments. The empty path
/// addresses the root.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RemotePath {
    segments: Vec<String>,
}

impl RemotePath {
    /// The root path.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses a slash-separated path. Leading and trailing slashes are ignored.
    pub fn parse(path: &str) -> RemoteResult<Self> {
        let mut parsed = Self::root();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            parsed = parsed.child(segment)?;
        }
        Ok(parsed)
    }

    /// Returns the path of a direct child.
    pub fn child(&self, segment: &str) -> RemoteResult<Self> {
        if segment.is_empty() {
            return Err(RemoteError::InvalidPath {
                path: format!("{self}/"),
                reason: "empty segment",
            });
        }
        if segment.contains(FORBIDDEN) || segment.chars().any(char::is_control) {
            return Err(RemoteError::InvalidPath {
                path: format!("{self}/{segment}"),
                reason: "forbidden character in segment",
            });
        }
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self { segments })
    }

    /// Returns the parent path, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Returns the last segment, or `None` for the root.
    pub fn key(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Returns the segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns true for the root path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns true if `self` is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &RemotePath) -> bool {
        self.segments.len() < other.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl fmt::Debug for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RemotePath({self})")
    }
}
