//! Presence tracking for partial (PATCH-style) validation.
//!
//! A [`PresenceMap`] records which dot-delimited paths a raw JSON payload
//! actually contained. Every ancestor of a path is recorded as well, so
//! `{"user":{"name":"Alice"}}` yields both `user` and `user.name`.
//!
//! The tag strategy validates only the map's leaf paths; the schema
//! strategy prunes the instance down to the recorded paths before handing it
//! to the schema engine.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum nesting depth walked by [`compute_presence`] and
/// [`PresenceMap::prune`].
///
/// Anything deeper is silently left out (presence) or left untouched
/// (pruning); neither operation fails because of depth.
pub const MAX_DEPTH: usize = 100;

/// Set of dot-delimited paths present in a payload.
///
/// # Examples
///
/// ```rust
/// use vigil_validator::compute_presence;
///
/// let presence = compute_presence(br#"{"user":{"name":"Alice","age":30}}"#).unwrap();
/// assert!(presence.has("user"));
/// assert!(presence.has("user.name"));
/// assert_eq!(presence.leaf_paths(), vec!["user.age", "user.name"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct PresenceMap {
    paths: HashSet<String>,
}

impl PresenceMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a path.
    pub fn insert(&mut self, path: impl Into<String>) {
        self.paths.insert(path.into());
    }

    /// Returns `true` if exactly `path` was recorded.
    #[must_use]
    pub fn has(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    /// Returns `true` if `prefix` was recorded or is a dot-prefix of a
    /// recorded path. The empty prefix matches any non-empty map.
    #[must_use]
    pub fn has_prefix(&self, prefix: &str) -> bool {
        if prefix.is_empty() {
            return !self.paths.is_empty();
        }
        if self.paths.contains(prefix) {
            return true;
        }
        self.paths.iter().any(|path| is_descendant(path, prefix))
    }

    /// Paths that are not a dot-prefix of any other recorded path, sorted.
    ///
    /// Sorting segment-wise puts every descendant directly after its
    /// ancestor, so a path is a leaf iff its successor does not extend it.
    #[must_use]
    pub fn leaf_paths(&self) -> Vec<String> {
        let mut sorted: Vec<&str> = self.paths.iter().map(String::as_str).collect();
        sorted.sort_unstable_by(|a, b| segment_order(a, b));

        let mut leaves: Vec<String> = sorted
            .iter()
            .enumerate()
            .filter(|(i, path)| {
                sorted
                    .get(i + 1)
                    .is_none_or(|next| !is_descendant(next, path))
            })
            .map(|(_, path)| (*path).to_owned())
            .collect();
        leaves.sort_unstable();
        leaves
    }

    /// Number of recorded paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Iterates over recorded paths in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    /// Drops everything from `value` that the map does not mark as present.
    ///
    /// Object keys whose path fails [`has_prefix`](Self::has_prefix) are
    /// removed. Array elements are replaced with `null` instead, keeping the
    /// array length so length-dependent schema keywords still apply.
    #[must_use]
    pub fn prune(&self, value: Value) -> Value {
        self.prune_at(value, "", 0)
    }

    fn prune_at(&self, value: Value, prefix: &str, depth: usize) -> Value {
        if depth > MAX_DEPTH {
            return value;
        }
        match value {
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .filter_map(|(key, child)| {
                        let path = join_path(prefix, &key);
                        self.has_prefix(&path)
                            .then(|| (key, self.prune_at(child, &path, depth + 1)))
                    })
                    .collect(),
            ),
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(index, child)| {
                        let path = join_path(prefix, &index.to_string());
                        if self.has_prefix(&path) {
                            self.prune_at(child, &path, depth + 1)
                        } else {
                            Value::Null
                        }
                    })
                    .collect(),
            ),
            scalar => scalar,
        }
    }
}

impl From<Vec<String>> for PresenceMap {
    fn from(paths: Vec<String>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
        }
    }
}

impl From<PresenceMap> for Vec<String> {
    fn from(map: PresenceMap) -> Self {
        let mut paths: Vec<String> = map.paths.into_iter().collect();
        paths.sort_unstable();
        paths
    }
}

impl<S: Into<String>> FromIterator<S> for PresenceMap {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            paths: iter.into_iter().map(Into::into).collect(),
        }
    }
}

// ============================================================================
// COMPUTE PRESENCE
// ============================================================================

/// Builds a [`PresenceMap`] from raw JSON bytes.
///
/// Emits one entry per object key and array index at every depth up to
/// [`MAX_DEPTH`]; deeper keys are omitted without error.
///
/// # Errors
///
/// Returns the parser error if `raw` is not valid JSON.
pub fn compute_presence(raw: &[u8]) -> Result<PresenceMap, serde_json::Error> {
    let value: Value = serde_json::from_slice(raw)?;
    let mut presence = PresenceMap::new();
    collect(&value, "", 0, &mut presence);
    Ok(presence)
}

fn collect(value: &Value, prefix: &str, depth: usize, presence: &mut PresenceMap) {
    if depth >= MAX_DEPTH {
        return;
    }
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = join_path(prefix, key);
                collect(child, &path, depth + 1, presence);
                presence.insert(path);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                let path = join_path(prefix, &index.to_string());
                collect(child, &path, depth + 1, presence);
                presence.insert(path);
            }
        }
        _ => {}
    }
}

// ============================================================================
// PATH HELPERS
// ============================================================================

/// Joins a dot path and a segment.
pub(crate) fn join_path(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_owned()
    } else {
        let mut path = String::with_capacity(prefix.len() + 1 + segment.len());
        path.push_str(prefix);
        path.push('.');
        path.push_str(segment);
        path
    }
}

/// `path` lies strictly below `ancestor`.
fn is_descendant(path: &str, ancestor: &str) -> bool {
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'.'
}

fn segment_order(a: &str, b: &str) -> Ordering {
    a.split('.').cmp(b.split('.'))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn records_every_key_and_index() {
        let presence =
            compute_presence(br#"{"user":{"name":"Alice"},"items":[{"price":1},{}]}"#).unwrap();
        let expected = [
            "user",
            "user.name",
            "items",
            "items.0",
            "items.0.price",
            "items.1",
        ];
        for path in expected {
            assert!(presence.has(path), "missing {path}");
        }
        assert_eq!(presence.len(), 6);
    }

    #[test]
    fn scalar_payload_has_no_paths() {
        assert!(compute_presence(b"42").unwrap().is_empty());
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(compute_presence(b"{not json").is_err());
    }

    #[test]
    fn has_prefix_matches_exact_and_dot_children_only() {
        let presence: PresenceMap = ["user.name"].into_iter().collect();
        assert!(presence.has_prefix("user.name"));
        assert!(presence.has_prefix("user"));
        assert!(!presence.has_prefix("use"));
        assert!(!presence.has_prefix("user.name.first"));
    }

    #[test]
    fn leaf_paths_skip_ancestors() {
        let presence = compute_presence(br#"{"user":{"name":"Alice","age":30}}"#).unwrap();
        assert_eq!(presence.leaf_paths(), vec!["user.age", "user.name"]);
    }

    #[test]
    fn leaf_paths_handle_keys_sorting_before_dot() {
        let presence: PresenceMap = ["a", "a-b", "a.b"].into_iter().collect();
        assert_eq!(presence.leaf_paths(), vec!["a-b", "a.b"]);
    }

    #[test]
    fn empty_object_value_is_a_leaf() {
        let presence = compute_presence(br#"{"address":{}}"#).unwrap();
        assert_eq!(presence.leaf_paths(), vec!["address"]);
    }

    #[test]
    fn depth_beyond_limit_is_omitted_without_panic() {
        let mut raw = String::new();
        for _ in 0..120 {
            raw.push_str(r#"{"a":"#);
        }
        raw.push('1');
        for _ in 0..120 {
            raw.push('}');
        }

        let presence = compute_presence(raw.as_bytes()).unwrap();
        let deepest = presence.iter().map(|p| p.split('.').count()).max();
        assert_eq!(deepest, Some(MAX_DEPTH));
    }

    #[test]
    fn prune_drops_keys_and_nulls_array_elements() {
        let presence: PresenceMap = ["name", "items", "items.1", "items.1.price"]
            .into_iter()
            .collect();
        let pruned = presence.prune(json!({
            "name": "x",
            "email": "y",
            "items": [{"price": 1, "qty": 2}, {"price": 3, "qty": 4}]
        }));
        assert_eq!(pruned, json!({"name": "x", "items": [null, {"price": 3}]}));
    }

    #[test]
    fn serde_round_trip_is_sorted() {
        let presence: PresenceMap = ["b", "a"].into_iter().collect();
        let json = serde_json::to_value(&presence).unwrap();
        assert_eq!(json, json!(["a", "b"]));
        let back: PresenceMap = serde_json::from_value(json).unwrap();
        assert_eq!(back, presence);
    }
}
