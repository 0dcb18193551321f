//! Insertion-ordered map used for every object in a parsed query.
//!
//! Query strings are order-sensitive on the wire (`a=1&b=2` should round trip
//! as `a=1&b=2`), so objects keep the order in which keys were first seen.

pub use indexmap::map::Entry;

pub type Map<K, V> = indexmap::IndexMap<K, V>;
