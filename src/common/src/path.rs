use crate::RepoError;
use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use std::fmt;

/// One step of a path: a name plus the 1-based same-name-sibling index.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Segment {
    name: String,
    index: usize,
}

impl Segment {
    /// Creates a segment with the default SNS index of 1.
    pub fn new(name: &str) -> Self {
        Self::with_index(name, 1)
    }

    /// Creates a segment with an explicit SNS index.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the segment.
    /// * `index` - 1-based same-name-sibling index.
    pub fn with_index(name: &str, index: usize) -> Self {
        assert!(index > 0, "same-name-sibling indexes start at 1");
        Segment {
            name: name.to_string(),
            index,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// True when the segment carries an SNS index other than 1.
    pub fn has_index(&self) -> bool {
        self.index > 1
    }

    fn parse(text: &str) -> Result<Self, RepoError> {
        let invalid = || RepoError::InvalidPath(format!("Malformed path segment '{}'", text));
        match text.find('[') {
            None => {
                if text.contains(']') {
                    return Err(invalid());
                }
                Ok(Segment::new(text))
            }
            Some(open) => {
                if !text.ends_with(']') || open == 0 {
                    return Err(invalid());
                }
                let index: usize = text[open + 1..text.len() - 1]
                    .trim()
                    .parse()
                    .map_err(|_| invalid())?;
                if index == 0 {
                    return Err(invalid());
                }
                Ok(Segment::with_index(&text[..open], index))
            }
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.has_index() {
            write!(f, "{}[{}]", self.name, self.index)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

/// An absolute or relative path in a hierarchical workspace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    absolute: bool,
    segments: Vec<Segment>,
}

impl Path {
    /// The absolute root path, written `/`.
    pub fn root() -> Self {
        Path {
            absolute: true,
            segments: Vec::new(),
        }
    }

    /// Builds an absolute path from already-parsed segments.
    pub fn absolute(segments: Vec<Segment>) -> Self {
        Path {
            absolute: true,
            segments,
        }
    }

    /// Builds a relative path from already-parsed segments.
    pub fn relative(segments: Vec<Segment>) -> Self {
        Path {
            absolute: false,
            segments,
        }
    }

    /// Parses the textual form of a path.
    ///
    /// Accepts `/`, `/a/b[2]/c` and relative forms such as `e/f`. `.` segments are dropped and
    /// `..` removes the preceding segment.
    ///
    /// # Arguments
    ///
    /// * `text` - Path string to parse.
    pub fn parse(text: &str) -> Result<Self, RepoError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(RepoError::InvalidPath(String::from("Empty path")));
        }
        let absolute = text.starts_with('/');
        let body = text.trim_start_matches('/');
        let body = body.strip_suffix('/').unwrap_or(body);
        if absolute && text.len() > 1 && text[1..].starts_with('/') {
            return Err(RepoError::InvalidPath(format!("Malformed path '{}'", text)));
        }
        let mut segments: Vec<Segment> = Vec::new();
        if !body.is_empty() {
            for piece in body.split('/') {
                match piece {
                    "" => {
                        return Err(RepoError::InvalidPath(format!(
                            "Empty segment in path '{}'",
                            text
                        )))
                    }
                    "." => {}
                    ".." => {
                        if segments.pop().is_none() {
                            return Err(RepoError::InvalidPath(format!(
                                "Path '{}' goes above its starting point",
                                text
                            )));
                        }
                    }
                    _ => segments.push(Segment::parse(piece)?),
                }
            }
        }
        Ok(Path { absolute, segments })
    }

    pub fn is_root(&self) -> bool {
        self.absolute && self.segments.is_empty()
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// Number of segments; the root has none.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn last_segment(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// Returns the parent path, or `None` for the root and for empty relative paths.
    pub fn parent(&self) -> Option<Path> {
        if self.segments.is_empty() {
            return None;
        }
        Some(self.subpath(self.segments.len() - 1))
    }

    /// Returns the path made of the first `len` segments.
    pub fn subpath(&self, len: usize) -> Path {
        Path {
            absolute: self.absolute,
            segments: self.segments[..len].to_vec(),
        }
    }

    /// Returns the path of the child with the given name and SNS index 1.
    pub fn child(&self, name: &str) -> Path {
        self.child_segment(Segment::new(name))
    }

    pub fn child_segment(&self, segment: Segment) -> Path {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Path {
            absolute: self.absolute,
            segments,
        }
    }

    /// Resolves a relative path against this one.
    ///
    /// # Arguments
    ///
    /// * `relative` - Path to append; an absolute path replaces this one.
    pub fn append(&self, relative: &Path) -> Path {
        if relative.absolute {
            return relative.clone();
        }
        let mut segments = self.segments.clone();
        segments.extend(relative.segments.iter().cloned());
        Path {
            absolute: self.absolute,
            segments,
        }
    }

    /// True if this path equals `other` or is one of its descendants.
    pub fn is_at_or_below(&self, other: &Path) -> bool {
        self.absolute == other.absolute
            && self.segments.len() >= other.segments.len()
            && self.segments[..other.segments.len()] == other.segments[..]
    }

    /// True if this path equals `other` or is one of its ancestors.
    pub fn is_at_or_above(&self, other: &Path) -> bool {
        other.is_at_or_below(self)
    }

    pub fn is_ancestor_of(&self, other: &Path) -> bool {
        self.segments.len() < other.segments.len() && self.is_at_or_above(other)
    }

    pub fn is_descendant_of(&self, other: &Path) -> bool {
        other.is_ancestor_of(self)
    }

    /// Returns this path expressed relative to `ancestor`, or `None` if it is not at or below it.
    ///
    /// A path relative to itself is the empty relative path.
    pub fn relative_to(&self, ancestor: &Path) -> Option<Path> {
        if !self.is_at_or_below(ancestor) {
            return None;
        }
        Some(Path::relative(
            self.segments[ancestor.segments.len()..].to_vec(),
        ))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_root() {
            return write!(f, "/");
        }
        if self.absolute {
            write!(f, "/")?;
        }
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Path {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

impl Serialize for Path {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        Path::parse(&text).map_err(de::Error::custom)
    }
}
