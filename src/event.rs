//! Events and nested field maps.
//!
//! Every check a monitor runs produces [`Event`]s: a timestamp plus two
//! nested maps. `fields` is the document body shipped to the output;
//! `meta` carries out-of-band routing hints (ingest pipeline, raw index)
//! that the output consumes without indexing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A nested field map addressed by dotted paths.
///
/// `put("event.dataset", ...)` creates intermediate objects as needed, so the
/// stored shape is always nested, never flat dotted keys. Keys containing
/// literal dots are not representable; a dotted string always means nesting.
///
/// # Examples
///
/// ```
/// use upbeat::Fields;
///
/// let mut fields = Fields::new();
/// fields.put("event.dataset", "uptime");
/// assert_eq!(fields.get_str("event.dataset"), Some("uptime"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fields(Map<String, Value>);

impl Fields {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builds a map from an existing JSON object. Non-objects yield `None`.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Whether the map holds no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sets `path` to `value`, creating intermediate objects. An intermediate
    /// that exists but is not an object is replaced by one.
    pub fn put(&mut self, path: &str, value: impl Into<Value>) {
        let mut current = &mut self.0;
        let mut segments = path.split('.').peekable();

        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                current.insert(segment.to_string(), value.into());
                return;
            }

            let entry = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            match entry {
                Value::Object(map) => current = map,
                _ => unreachable!("entry was just made an object"),
            }
        }
    }

    /// Looks up `path`, descending through nested objects.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = &self.0;
        let mut segments = path.split('.').peekable();

        while let Some(segment) = segments.next() {
            let value = current.get(segment)?;
            if segments.peek().is_none() {
                return Some(value);
            }
            current = value.as_object()?;
        }
        None
    }

    /// Looks up `path` and returns it as a string slice, if it is one.
    #[must_use]
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Removes `path`, returning the removed value. Empty intermediate
    /// objects are left in place.
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        let mut current = &mut self.0;
        let mut segments = path.split('.').peekable();

        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                return current.remove(segment);
            }
            current = current.get_mut(segment)?.as_object_mut()?;
        }
        None
    }

    /// Deep-merges `other` into `self`. Where both sides hold objects the
    /// merge recurses; otherwise `other` wins.
    pub fn merge(&mut self, other: &Self) {
        merge_objects(&mut self.0, &other.0);
    }

    /// Recursively removes null-valued entries. Objects emptied by the
    /// removal stay in place.
    pub fn strip_nulls(&mut self) {
        strip_nulls(&mut self.0);
    }

    /// Borrows the underlying JSON object.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the map into the underlying JSON object.
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

fn merge_objects(dst: &mut Map<String, Value>, src: &Map<String, Value>) {
    for (key, value) in src {
        match (dst.get_mut(key), value) {
            (Some(Value::Object(d)), Value::Object(s)) => merge_objects(d, s),
            (_, v) => {
                dst.insert(key.clone(), v.clone());
            }
        }
    }
}

fn strip_nulls(map: &mut Map<String, Value>) {
    map.retain(|_, value| !value.is_null());
    for value in map.values_mut() {
        if let Value::Object(inner) = value {
            strip_nulls(inner);
        }
    }
}

/// A single output event produced by a monitor check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// When the observation was made. Index-name templates render against
    /// this timestamp.
    pub timestamp: DateTime<Utc>,

    /// Document body.
    pub fields: Fields,

    /// Out-of-band metadata consumed by the output (ingest pipeline name,
    /// raw index), never indexed as part of the document.
    pub meta: Fields,
}

impl Event {
    /// Creates an empty event with the given timestamp.
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            fields: Fields::new(),
            meta: Fields::new(),
        }
    }

    /// Creates an empty event stamped with the current time.
    #[must_use]
    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    /// Sets a field on the document body.
    pub fn put(&mut self, path: &str, value: impl Into<Value>) {
        self.fields.put(path, value);
    }

    /// Reads a field from the document body.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.fields.get(path)
    }

    /// Appends `tag` to the event's `tags` array. Duplicates are ignored;
    /// a non-array `tags` value is replaced.
    pub fn tag(&mut self, tag: &str) {
        let tags = match self.fields.get(TAGS_KEY) {
            Some(Value::Array(existing)) => {
                if existing.iter().any(|t| t.as_str() == Some(tag)) {
                    return;
                }
                let mut tags = existing.clone();
                tags.push(Value::String(tag.to_string()));
                tags
            }
            _ => vec![Value::String(tag.to_string())],
        };
        self.fields.put(TAGS_KEY, Value::Array(tags));
    }
}

/// Field holding the event's tag list.
pub const TAGS_KEY: &str = "tags";
