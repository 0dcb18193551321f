//! Decomposing wire keys into paths and assigning values along them.

use std::collections::BTreeMap;

use indexmap::map::Entry;

use crate::array_format::combine;
use crate::config::Duplicates;
use crate::value::{ParsedQuery, QueryValue};

/// Key names refused unless the caller opts in.
pub const RESERVED_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

/// Split a wire key into path segments.
///
/// `a[b][c]` gives `["a", "b", "c"]`. With `allow_dots` the key is split on
/// `.` only, so `a.b.c` gives the same segments, empty dot segments are kept
/// and brackets stay part of the segment they appear in.
pub fn split(key: &str, allow_dots: bool) -> Vec<&str> {
    if allow_dots {
        key.split('.').collect()
    } else if has_brackets(key) {
        split_brackets(key)
    } else {
        vec![key]
    }
}

fn has_brackets(key: &str) -> bool {
    key.contains('[') && key.contains(']')
}

fn split_brackets(key: &str) -> Vec<&str> {
    key.split(['[', ']']).filter(|s| !s.is_empty()).collect()
}

fn is_index(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

fn parse_index(segment: &str) -> Option<usize> {
    segment.parse().ok().filter(|_| is_index(segment))
}

/// Rules applied while walking a path, plus the bookkeeping one parse needs.
#[derive(Clone, Debug)]
pub struct Assign {
    pub depth: usize,
    pub duplicates: Duplicates,
    pub allow_reserved: bool,
    /// Wire indices of the sequences built so far, keyed by the path that
    /// leads to each one. Entry `i` is the index that created element `i`,
    /// kept sorted so elements stay in index order.
    indices: BTreeMap<Vec<String>, Vec<usize>>,
}

impl Assign {
    pub fn new(depth: usize, duplicates: Duplicates, allow_reserved: bool) -> Self {
        Assign {
            depth,
            duplicates,
            allow_reserved,
            indices: BTreeMap::new(),
        }
    }

    /// Store `value` at `path` below `root`.
    ///
    /// Missing containers are created on the way down: a sequence when the
    /// following segment is a non-negative integer, a map otherwise.
    /// Existing containers are never replaced, so a path that runs into a
    /// scalar, or into a sequence with a non-numeric segment, is dropped.
    /// Paths deeper than `depth` containers are dropped as well.
    ///
    /// Sequences are compacted, but `[N]` always addresses the element that
    /// the first `[N]` created, whatever order the keys arrive in.
    pub fn assign(&mut self, root: &mut ParsedQuery, path: &[&str], value: QueryValue) {
        if path.is_empty() {
            return;
        }
        if !self.allow_reserved {
            if let Some(reserved) = path.iter().find(|s| RESERVED_KEYS.contains(*s)) {
                tracing::debug!(key = %reserved, "dropping assignment to reserved key");
                return;
            }
        }
        self.into_object(root, path, 0, value);
    }

    fn into_object(&mut self, map: &mut ParsedQuery, path: &[&str], at: usize, value: QueryValue) {
        let Some(segment) = path.get(at) else {
            return;
        };
        let Some(next) = path.get(at + 1) else {
            self.store(map.entry((*segment).to_owned()), value);
            return;
        };
        if at >= self.depth {
            tracing::trace!(depth = self.depth, "key path exceeds depth, dropping assignment");
            return;
        }
        let child = map
            .entry((*segment).to_owned())
            .or_insert_with(|| empty_container(next));
        self.descend(child, path, at + 1, value);
    }

    fn into_array(
        &mut self,
        items: &mut Vec<QueryValue>,
        path: &[&str],
        at: usize,
        value: QueryValue,
    ) {
        let Some(segment) = path.get(at) else {
            return;
        };
        let Some(index) = parse_index(segment) else {
            tracing::trace!(segment, "non-numeric segment on a sequence, dropping assignment");
            return;
        };
        let next = path.get(at + 1);
        if next.is_some() && at >= self.depth {
            tracing::trace!(depth = self.depth, "key path exceeds depth, dropping assignment");
            return;
        }
        let indices = self.indices_for(&path[..at], items.len());
        match (indices.binary_search(&index), next) {
            (Ok(slot), None) => self.replace(&mut items[slot], value),
            (Ok(slot), Some(_)) => self.descend(&mut items[slot], path, at + 1, value),
            (Err(slot), None) => {
                indices.insert(slot, index);
                items.insert(slot, value);
            }
            (Err(slot), Some(next)) => {
                indices.insert(slot, index);
                items.insert(slot, empty_container(next));
                self.descend(&mut items[slot], path, at + 1, value);
            }
        }
    }

    /// The index table of the sequence at `prefix`, brought in line with its
    /// current length. Elements that arrived through repeated keys rather
    /// than `[N]` are numbered after the largest index seen.
    fn indices_for(&mut self, prefix: &[&str], len: usize) -> &mut Vec<usize> {
        let key = prefix.iter().map(|s| (*s).to_owned()).collect();
        let indices = self.indices.entry(key).or_default();
        if indices.len() > len {
            // the sequence was replaced by a shorter one
            indices.clear();
        }
        while indices.len() < len {
            let next = indices.last().map_or(0, |last| last.saturating_add(1));
            indices.push(next);
        }
        indices
    }

    fn descend(&mut self, child: &mut QueryValue, path: &[&str], at: usize, value: QueryValue) {
        match child {
            QueryValue::Object(map) => self.into_object(map, path, at, value),
            QueryValue::Array(items) => self.into_array(items, path, at, value),
            other => {
                tracing::trace!(found = other.type_name(), "key path runs into a scalar, dropping assignment");
            }
        }
    }

    fn store(&self, entry: Entry<'_, String, QueryValue>, value: QueryValue) {
        match entry {
            Entry::Occupied(mut occupied) => self.replace(occupied.get_mut(), value),
            Entry::Vacant(vacant) => {
                vacant.insert(value);
            }
        }
    }

    fn replace(&self, existing: &mut QueryValue, value: QueryValue) {
        match self.duplicates {
            Duplicates::First => {}
            Duplicates::Last => *existing = value,
            Duplicates::Combine => {
                let previous = std::mem::take(existing);
                *existing = combine(previous, value);
            }
        }
    }
}

fn empty_container(next: &str) -> QueryValue {
    if is_index(next) {
        QueryValue::Array(Vec::new())
    } else {
        QueryValue::Object(ParsedQuery::new())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn assign_all(pairs: &[(&str, &str)], mut rules: Assign) -> serde_json::Value {
        let mut root = ParsedQuery::new();
        for (key, value) in pairs {
            rules.assign(&mut root, &split(key, false), QueryValue::from(*value));
        }
        QueryValue::Object(root).to_json()
    }

    const DEFAULT: Assign = Assign {
        depth: 5,
        duplicates: Duplicates::Combine,
        allow_reserved: false,
        indices: BTreeMap::new(),
    };

    #[test]
    fn split_keys() {
        assert_eq!(split("a[b][c]", false), ["a", "b", "c"]);
        assert_eq!(split("a.b.c", false), ["a.b.c"]);
        assert_eq!(split("a.b.c", true), ["a", "b", "c"]);
        assert_eq!(split("a.b[0]", true), ["a", "b[0]"]);
        assert_eq!(split("a[b]", true), ["a[b]"]);
        assert_eq!(split("a[", false), ["a["]);
        assert_eq!(split("", false), [""]);
        assert!(split("[]", false).is_empty());
    }

    #[test]
    fn nested_objects_and_arrays() {
        let value = assign_all(
            &[("a[b]", "1"), ("a[c][0]", "x"), ("a[c][1]", "y"), ("a[c][0]", "z")],
            DEFAULT,
        );
        assert_eq!(value, json!({"a": {"b": "1", "c": [["x", "z"], "y"]}}));
    }

    #[test]
    fn indices_keep_their_slot_in_any_order() {
        let value = assign_all(&[("a[1]", "x"), ("a[0]", "y")], DEFAULT);
        assert_eq!(value, json!({"a": ["y", "x"]}));

        let value = assign_all(&[("a[2]", "x"), ("a[1]", "y"), ("a[0]", "z")], DEFAULT);
        assert_eq!(value, json!({"a": ["z", "y", "x"]}));

        let value = assign_all(&[("a[1][b]", "x"), ("a[0][c]", "y"), ("a[1][d]", "w")], DEFAULT);
        assert_eq!(value, json!({"a": [{"c": "y"}, {"b": "x", "d": "w"}]}));

        let value = assign_all(&[("a[9]", "x"), ("a[3]", "y"), ("a[9]", "z")], DEFAULT);
        assert_eq!(value, json!({"a": ["y", ["x", "z"]]}));
    }

    #[test]
    fn nested_sequences_track_indices_separately() {
        let value = assign_all(
            &[("a[1][1]", "p"), ("a[1][0]", "q"), ("a[0][0]", "r")],
            DEFAULT,
        );
        assert_eq!(value, json!({"a": [["r"], ["q", "p"]]}));
    }

    #[test]
    fn existing_containers_are_kept() {
        let value = assign_all(&[("a", "scalar"), ("a[b]", "lost")], DEFAULT);
        assert_eq!(value, json!({"a": "scalar"}));

        let value = assign_all(&[("a[0]", "x"), ("a[b]", "lost")], DEFAULT);
        assert_eq!(value, json!({"a": ["x"]}));
    }

    #[test]
    fn depth_limit() {
        let rules = Assign { depth: 3, ..DEFAULT };
        let value = assign_all(&[("a[b][c][d][e][f]", "value")], rules);
        assert_eq!(value, json!({"a": {"b": {"c": {}}}}));
    }

    #[test]
    fn reserved_keys() {
        let value = assign_all(&[("__proto__[x]", "1"), ("a[constructor]", "2"), ("ok", "3")], DEFAULT);
        assert_eq!(value, json!({"ok": "3"}));

        let rules = Assign {
            allow_reserved: true,
            ..DEFAULT
        };
        let value = assign_all(&[("constructor", "1")], rules);
        assert_eq!(value, json!({"constructor": "1"}));
    }

    #[test]
    fn duplicate_policies() {
        let pairs = [("foo", "1"), ("foo", "2")];
        let first = Assign {
            duplicates: Duplicates::First,
            ..DEFAULT
        };
        let last = Assign {
            duplicates: Duplicates::Last,
            ..DEFAULT
        };
        assert_eq!(assign_all(&pairs, first), json!({"foo": "1"}));
        assert_eq!(assign_all(&pairs, last), json!({"foo": "2"}));
        assert_eq!(assign_all(&pairs, DEFAULT), json!({"foo": ["1", "2"]}));
    }
}
