use std::{fmt::Display, str::FromStr};

use serde_json::{Map, Value};
use snafu::{Snafu, ensure};

/// The error type for field path parsing operations.
#[derive(Debug, PartialEq, Snafu)]
pub enum PathError {
    /// Indicates that the input is empty. A path must contain at least one
    /// segment.
    #[snafu(display("path input cannot be empty"))]
    EmptyInput,

    /// Indicates that a segment between two dots is empty, e.g. `spec..name`.
    #[snafu(display("path segment at position {position} is empty"))]
    EmptySegment { position: usize },
}

/// A dot-separated path addressing one node in a schema or data tree, e.g.
/// `spec.nodes.resources`.
///
/// Segments that consist of digits index into array elements when the
/// addressed node is an array. A [`FieldPath`] parsed via [`FromStr`] is
/// always validated: it is non-empty and contains no empty segments.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        ensure!(!input.is_empty(), EmptyInputSnafu);

        let mut segments = Vec::new();
        for (position, segment) in input.split('.').enumerate() {
            ensure!(!segment.is_empty(), EmptySegmentSnafu { position });
            segments.push(segment.to_owned());
        }

        Ok(Self { segments })
    }
}

impl TryFrom<&str> for FieldPath {
    type Error = PathError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str(value)
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl FieldPath {
    /// The path addressing the tree root itself.
    pub fn root() -> Self {
        Self::default()
    }

    /// Builds a path from pre-validated segments. Callers must not pass empty
    /// segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns a new path with `segment` appended.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Resolves the path inside a data tree, returning the addressed value if
    /// every segment exists.
    pub fn get_at<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        let mut current = root;

        for segment in &self.segments {
            current = match current {
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                other => other.get(segment.as_str())?,
            };
        }

        Some(current)
    }

    /// Writes `new_value` at the addressed position, creating intermediate
    /// objects and array slots along the way.
    ///
    /// Intermediate nodes that exist with an incompatible shape are replaced
    /// by an object. Array slots past the current length are padded with
    /// nulls.
    pub fn set_at(&self, target: &mut Value, new_value: Value) {
        let mut current = target;

        for segment in &self.segments {
            let index = segment.parse::<usize>().ok();

            // Arrays are only indexed into with numeric segments. Everything
            // else steps through an object, converting the node if necessary.
            let step_through_array = matches!(current, Value::Array(_)) && index.is_some();
            if !step_through_array && !current.is_object() {
                *current = Value::Object(Map::new());
            }

            current = match current {
                Value::Array(items) => {
                    let index = index.unwrap_or_default();
                    while items.len() <= index {
                        items.push(Value::Null);
                    }
                    &mut items[index]
                }
                other => &mut other[segment.as_str()],
            };
        }

        *current = new_value;
    }
}
