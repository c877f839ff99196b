//! Path addressing into the canonical JSON tree.
//!
//! Proxies never cache slot values; they hold a [`Path`] from the document
//! root and resolve it against the live tree on every operation.

use serde_json::Value as JsonValue;
use std::fmt;

/// One step of a [`Path`]: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// A location in the canonical tree, relative to the document root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path(Vec<PathSegment>);

impl Path {
    /// The document root.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Key(key.into()));
        Self(segments)
    }

    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }

    /// Resolves the path against `root`.
    pub fn resolve<'a>(&self, root: &'a JsonValue) -> Option<&'a JsonValue> {
        self.0.iter().try_fold(root, |node, segment| match segment {
            PathSegment::Key(key) => node.as_object()?.get(key),
            PathSegment::Index(index) => node.as_array()?.get(*index),
        })
    }

    /// Resolves the path against `root` for mutation.
    pub fn resolve_mut<'a>(&self, root: &'a mut JsonValue) -> Option<&'a mut JsonValue> {
        self.0.iter().try_fold(root, |node, segment| match segment {
            PathSegment::Key(key) => node.as_object_mut()?.get_mut(key),
            PathSegment::Index(index) => node.as_array_mut()?.get_mut(*index),
        })
    }

    /// Replaces the slot at this path, creating the final key if its parent
    /// object exists. Returns `false` if the parent does not resolve or an
    /// index is out of bounds.
    pub fn set(&self, root: &mut JsonValue, value: JsonValue) -> bool {
        let Some((last, parent)) = self.0.split_last() else {
            *root = value;
            return true;
        };

        let Some(node) = Path(parent.to_vec()).resolve_mut(root) else {
            return false;
        };

        match (last, node) {
            (PathSegment::Key(key), JsonValue::Object(object)) => {
                object.insert(key.clone(), value);
                true
            }
            (PathSegment::Index(index), JsonValue::Array(items)) if *index < items.len() => {
                items[*index] = value;
                true
            }
            _ => false,
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "$");
        }

        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            match segment {
                PathSegment::Key(key) => write!(f, "{key}")?,
                PathSegment::Index(index) => write!(f, "{index}")?,
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_nested_keys_and_indexes() {
        let tree = json!({"owners": [{"name": "Ann"}, {"name": "Bo"}]});
        let path = Path::root().key("owners").index(1).key("name");

        assert_eq!(path.resolve(&tree), Some(&json!("Bo")));
        assert_eq!(path.to_string(), "owners.1.name");
        assert_eq!(Path::root().key("missing").resolve(&tree), None);
    }

    #[test]
    fn set_writes_through_to_the_slot() {
        let mut tree = json!({"meta": {"tags": ["a"]}});

        assert!(Path::root().key("meta").key("color").set(&mut tree, json!("red")));
        assert!(Path::root().key("meta").key("tags").index(0).set(&mut tree, json!("b")));
        assert!(!Path::root().key("meta").key("tags").index(5).set(&mut tree, json!("c")));
        assert!(!Path::root().key("nope").key("x").set(&mut tree, json!(1)));

        assert_eq!(tree, json!({"meta": {"tags": ["b"], "color": "red"}}));
    }
}
