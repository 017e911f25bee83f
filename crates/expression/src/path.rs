//! Dotted-path lookup over JSON value trees.
//!
//! Paths use `.`-separated keys with bracketed integer indices for
//! arrays: `a.b[2].c`. An empty path (or `"."`) selects the whole value.
//! Lookup is a pure function over `serde_json::Value`.

use serde_json::Value;

use crate::error::ExpressionError;

/// One parsed path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Object key.
    Key(String),
    /// Array index.
    Index(usize),
}

/// Parse a dotted path into segments.
///
/// `""` and `"."` parse to an empty segment list (whole-value selector).
pub fn parse_path(path: &str) -> Result<Vec<PathSegment>, ExpressionError> {
    if path.is_empty() || path == "." {
        return Ok(Vec::new());
    }

    let mut segments = Vec::new();
    for chunk in path.split('.') {
        if chunk.is_empty() {
            return Err(ExpressionError::InvalidSegment {
                path: path.to_string(),
                segment: String::new(),
            });
        }

        // Split `key[0][1]` into the key part and trailing indices.
        let (key, mut rest) = match chunk.find('[') {
            Some(pos) => chunk.split_at(pos),
            None => (chunk, ""),
        };
        if !key.is_empty() {
            segments.push(PathSegment::Key(key.to_string()));
        }

        while !rest.is_empty() {
            let close = rest.find(']').ok_or_else(|| ExpressionError::InvalidSegment {
                path: path.to_string(),
                segment: chunk.to_string(),
            })?;
            let index: usize =
                rest[1..close]
                    .parse()
                    .map_err(|_| ExpressionError::InvalidSegment {
                        path: path.to_string(),
                        segment: chunk.to_string(),
                    })?;
            segments.push(PathSegment::Index(index));
            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return Err(ExpressionError::InvalidSegment {
                    path: path.to_string(),
                    segment: chunk.to_string(),
                });
            }
        }
    }
    Ok(segments)
}

/// Resolve `path` against `root`, returning the selected subtree.
pub fn lookup<'a>(root: &'a Value, path: &str) -> Result<&'a Value, ExpressionError> {
    let segments = parse_path(path)?;
    let mut current = root;
    for segment in &segments {
        current = descend(current, segment, path)?;
    }
    Ok(current)
}

fn descend<'a>(
    value: &'a Value,
    segment: &PathSegment,
    path: &str,
) -> Result<&'a Value, ExpressionError> {
    match (value, segment) {
        (Value::Object(map), PathSegment::Key(key)) => {
            map.get(key).ok_or_else(|| ExpressionError::MissingKey {
                path: path.to_string(),
                segment: key.clone(),
            })
        }
        (Value::Array(items), PathSegment::Index(index)) => {
            items
                .get(*index)
                .ok_or_else(|| ExpressionError::IndexOutOfBounds {
                    path: path.to_string(),
                    index: *index,
                    len: items.len(),
                })
        }
        (other, segment) => Err(ExpressionError::NotTraversable {
            path: path.to_string(),
            segment: match segment {
                PathSegment::Key(k) => k.clone(),
                PathSegment::Index(i) => i.to_string(),
            },
            kind: json_kind(other),
        }),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
