//! Catalog paths
//!
//! Provides [`CatalogPath`], the ordered list of segments that names an entity
//! inside a catalog namespace (`source.folder.table`).

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::error::PathError;

/// Path of a catalog entity
///
/// Always holds at least one segment and no segment is empty. The display form
/// joins segments with `.`; a segment that contains `.` or `"` is wrapped in
/// double quotes with inner quotes doubled, so the display form parses back to
/// the same path.
///
/// # Examples
/// - `["samples", "nyc taxi", "trips"]` → `samples.nyc taxi.trips`
/// - `["lake", "v1.2", "events"]` → `lake."v1.2".events`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct CatalogPath(Vec<String>);

impl CatalogPath {
    /// Create path from segments
    ///
    /// # Errors
    /// Returns error if there are no segments or a segment is empty
    pub fn new<I, S>(segments: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(PathError::Empty);
        }
        if segments.iter().any(String::is_empty) {
            return Err(PathError::EmptySegment);
        }
        Ok(Self(segments))
    }

    /// Create path from a single segment
    ///
    /// # Errors
    /// Returns error if the segment is empty
    pub fn single(segment: impl Into<String>) -> Result<Self, PathError> {
        Self::new([segment.into()])
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Get number of segments (never zero)
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for clippy's `len_without_is_empty`
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Entity name (last segment)
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0[self.0.len() - 1]
    }

    /// Top-level container (first segment): a source, space or home
    #[inline]
    #[must_use]
    pub fn root(&self) -> &str {
        &self.0[0]
    }

    /// Parent path, `None` for a top-level entity
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.len() == 1 {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Append a segment, returning new path
    ///
    /// # Errors
    /// Returns error if the segment is empty
    pub fn child(&self, segment: impl Into<String>) -> Result<Self, PathError> {
        let segment = segment.into();
        if segment.is_empty() {
            return Err(PathError::EmptySegment);
        }
        let mut new = self.clone();
        new.0.push(segment);
        Ok(new)
    }

    /// Check if `prefix` is this path or one of its ancestors
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        prefix.0.len() <= self.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }

    /// Iterator over segments from root to leaf
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

fn needs_quotes(segment: &str) -> bool {
    segment.contains(['.', '"'])
}

impl Display for CatalogPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            if needs_quotes(segment) {
                write!(f, "\"{}\"", segment.replace('"', "\"\""))?;
            } else {
                f.write_str(segment)?;
            }
        }
        Ok(())
    }
}

impl FromStr for CatalogPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(PathError::Empty);
        }

        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = s.chars().peekable();

        loop {
            if current.is_empty() && chars.peek() == Some(&'"') {
                chars.next();
                loop {
                    match chars.next() {
                        None => return Err(PathError::UnterminatedQuote(s.to_string())),
                        Some('"') if chars.peek() == Some(&'"') => {
                            chars.next();
                            current.push('"');
                        }
                        Some('"') => break,
                        Some(c) => current.push(c),
                    }
                }
                // A closing quote must end the segment
                if !matches!(chars.peek(), None | Some('.')) {
                    return Err(PathError::InvalidSegment(s.to_string()));
                }
            }

            match chars.next() {
                None => {
                    if current.is_empty() {
                        return Err(PathError::EmptySegment);
                    }
                    segments.push(current);
                    break;
                }
                Some('.') => {
                    if current.is_empty() {
                        return Err(PathError::EmptySegment);
                    }
                    segments.push(std::mem::take(&mut current));
                }
                Some(c) => current.push(c),
            }
        }

        Ok(Self(segments))
    }
}

impl TryFrom<Vec<String>> for CatalogPath {
    type Error = PathError;

    fn try_from(segments: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(segments)
    }
}

impl From<CatalogPath> for Vec<String> {
    fn from(path: CatalogPath) -> Self {
        path.0
    }
}
