//! Sets of co-requested paths.

use std::collections::HashSet;

use serde::{Serialize, Serializer};

/// Set of resource paths that keeps insertion order for iteration.
///
/// Equality is set equality: two sets with the same members compare equal
/// regardless of the order they were built in. Iteration follows insertion
/// order so that push plans are deterministic.
#[derive(Debug, Clone, Default)]
pub struct RelatedPaths {
    order: Vec<String>,
    members: HashSet<String>,
}

impl RelatedPaths {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path. Returns `false` if it was already present.
    pub fn insert(&mut self, path: impl Into<String>) -> bool {
        let path = path.into();
        if self.members.contains(&path) {
            return false;
        }
        self.members.insert(path.clone());
        self.order.push(path);
        true
    }

    /// Whether `path` is a member.
    pub fn contains(&self, path: &str) -> bool {
        self.members.contains(path)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Members in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

impl PartialEq for RelatedPaths {
    fn eq(&self, other: &Self) -> bool {
        self.members == other.members
    }
}

impl Eq for RelatedPaths {}

impl<S: Into<String>> FromIterator<S> for RelatedPaths {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for path in iter {
            set.insert(path);
        }
        set
    }
}

impl<'a> IntoIterator for &'a RelatedPaths {
    type Item = &'a str;
    type IntoIter = std::iter::Map<std::slice::Iter<'a, String>, fn(&'a String) -> &'a str>;

    fn into_iter(self) -> Self::IntoIter {
        self.order
            .iter()
            .map(String::as_str as fn(&'a String) -> &'a str)
    }
}

impl Serialize for RelatedPaths {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_deduplicates() {
        let mut paths = RelatedPaths::new();
        assert!(paths.insert("/a.js"));
        assert!(paths.insert("/b.js"));
        assert!(!paths.insert("/a.js"));
        assert_eq!(paths.len(), 2);
    }

    #[test]
    fn test_iteration_follows_insertion_order() {
        let paths: RelatedPaths = ["/z.css", "/a.css", "/m.css"].into_iter().collect();
        let collected: Vec<&str> = paths.iter().collect();
        assert_eq!(collected, vec!["/z.css", "/a.css", "/m.css"]);
    }

    #[test]
    fn test_equality_ignores_order() {
        let a: RelatedPaths = ["/bar", "/bah"].into_iter().collect();
        let b: RelatedPaths = ["/bah", "/bar"].into_iter().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_subset_is_not_equal() {
        let a: RelatedPaths = ["/bar", "/bah"].into_iter().collect();
        let b: RelatedPaths = ["/bar"].into_iter().collect();
        assert_ne!(a, b);
        assert_ne!(b, a);
        assert_eq!(RelatedPaths::new(), RelatedPaths::new());
    }

    #[test]
    fn test_serializes_as_ordered_list() {
        let paths: RelatedPaths = ["/b", "/a"].into_iter().collect();
        assert_eq!(serde_json::to_string(&paths).unwrap(), r#"["/b","/a"]"#);
    }
}
