//! Schema-driven index container.

use crate::document::IndexDocument;
use crate::key::{Key, KeySpec, KeyValue};
use crate::query::Query;
use crate::{Error, Result};
use std::marker::PhantomData;

/// Declares the keys of an index and how to read them from a record.
///
/// Implementations are usually zero-sized marker types:
///
/// ```
/// use artreg_index::{Index, KeySpec, Schema};
///
/// struct Person;
///
/// impl Schema for Person {
///     type Record = (String, String);
///     const NAME: &'static str = "person";
///
///     fn keys() -> Vec<KeySpec> {
///         vec![KeySpec::identity("name"), KeySpec::semver("version")]
///     }
///
///     fn values(record: &Self::Record, key: &str, _parent: Option<&str>) -> Vec<String> {
///         match key {
///             "name" => vec![record.0.clone()],
///             "version" => vec![record.1.clone()],
///             _ => Vec::new(),
///         }
///     }
/// }
///
/// let mut index = Index::<Person>::new();
/// index.insert(&("people/ada".into(), "1.0.0".into()), "ada.json").unwrap();
/// index.done_insertion();
/// let mut query = index.query();
/// query.key("name").unwrap().name_or_short_name_is("ada").unwrap();
/// assert_eq!(query.items(), vec!["ada.json"]);
/// ```
pub trait Schema {
    /// Record type inserted into the index.
    type Record: ?Sized;

    /// Schema name, used in diagnostics.
    const NAME: &'static str;

    /// Top-level keys in declaration order; nested keys hang off their parent.
    fn keys() -> Vec<KeySpec>;

    /// Raw values of `key` for `record`. For a nested key, `parent` is the
    /// parent key's value currently being indexed.
    fn values(record: &Self::Record, key: &str, parent: Option<&str>) -> Vec<String>;
}

/// An inverted index over items of one schema.
pub struct Index<S: Schema> {
    items: Vec<String>,
    keys: Vec<Key>,
    _schema: PhantomData<fn() -> S>,
}

impl<S: Schema> Index<S> {
    /// Create an empty index with the schema's keys.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            keys: build_keys(&S::keys()),
            _schema: PhantomData,
        }
    }

    /// Drop every item and value; the key set is kept.
    pub fn reset(&mut self) {
        self.items.clear();
        self.keys = build_keys(&S::keys());
    }

    /// Index `record` under the item string `item` and return its ordinal.
    ///
    /// Every value is coerced before anything is stored, so a record with one
    /// bad value leaves the index untouched.
    pub fn insert(&mut self, record: &S::Record, item: impl Into<String>) -> Result<usize> {
        let mut pending = Vec::new();
        for idx in 0..self.keys.len() {
            if self.keys[idx].parent().is_none() {
                self.collect(record, idx, None, &mut pending)?;
            }
        }

        let ordinal = self.items.len();
        self.items.push(item.into());
        for (idx, value) in &pending {
            self.keys[*idx].add(value, ordinal);
        }
        Ok(ordinal)
    }

    fn collect(
        &self,
        record: &S::Record,
        idx: usize,
        parent: Option<&str>,
        out: &mut Vec<(usize, KeyValue)>,
    ) -> Result<()> {
        let key = &self.keys[idx];
        for raw in S::values(record, key.name(), parent) {
            out.push((idx, key.coerce(&raw)?));
            for &child in key.children() {
                self.collect(record, child, Some(&raw), out)?;
            }
        }
        Ok(())
    }

    /// Finish a batch of inserts. Must run before querying.
    pub fn done_insertion(&mut self) {
        for key in &mut self.keys {
            key.done_insertion();
        }
    }

    /// Start a query with every item selected.
    #[must_use]
    pub fn query(&self) -> Query<'_> {
        Query::new(S::NAME, &self.items, &self.keys)
    }

    /// Item strings in ordinal order
    #[must_use]
    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// Number of indexed items
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the index holds no items
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up a key by name.
    #[must_use]
    pub fn key(&self, name: &str) -> Option<&Key> {
        self.keys.iter().find(|k| k.name() == name)
    }

    /// Snapshot the index as a persistable document.
    #[must_use]
    pub fn serialize(&self) -> IndexDocument {
        IndexDocument {
            items: self.items.clone(),
            indexes: self
                .keys
                .iter()
                .map(|k| (k.name().to_string(), k.serialize()))
                .collect(),
        }
    }

    /// Replace the contents of this index with `doc`.
    ///
    /// Each key is looked up under its name and then its aliases. On error the
    /// index is left as it was.
    pub fn deserialize(&mut self, doc: IndexDocument) -> Result<()> {
        let mut keys = build_keys(&S::keys());
        for key in &mut keys {
            let persisted = key
                .persisted_names()
                .find_map(|name| doc.indexes.get(name))
                .ok_or_else(|| Error::MissingKey {
                    key: key.name().to_string(),
                })?;
            key.deserialize(persisted, doc.items.len())?;
        }

        self.items = doc.items;
        self.keys = keys;
        Ok(())
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.serialize())
            .map_err(|e| Error::serialization(e.to_string()))
    }

    /// Build an index from JSON produced by [`Index::to_json`].
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: IndexDocument =
            serde_json::from_str(json).map_err(|e| Error::serialization(e.to_string()))?;
        let mut index = Self::new();
        index.deserialize(doc)?;
        Ok(index)
    }
}

impl<S: Schema> Default for Index<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Schema> Clone for Index<S> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            keys: self.keys.clone(),
            _schema: PhantomData,
        }
    }
}

impl<S: Schema> std::fmt::Debug for Index<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("schema", &S::NAME)
            .field("items", &self.items.len())
            .field("keys", &self.keys.iter().map(Key::name).collect::<Vec<_>>())
            .finish()
    }
}

/// Flatten a key tree; children record their parent's position.
fn build_keys(specs: &[KeySpec]) -> Vec<Key> {
    fn push(spec: &KeySpec, parent: Option<usize>, keys: &mut Vec<Key>) {
        let idx = keys.len();
        keys.push(Key::new(spec, parent));
        if let Some(parent) = parent {
            keys[parent].push_child(idx);
        }
        for child in &spec.nested {
            push(child, Some(idx), keys);
        }
    }

    let mut keys = Vec::new();
    for spec in specs {
        push(spec, None, &mut keys);
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KeyKind;

    struct Package;

    struct Record {
        name: &'static str,
        version: &'static str,
        tags: Vec<&'static str>,
    }

    impl Schema for Package {
        type Record = Record;
        const NAME: &'static str = "package";

        fn keys() -> Vec<KeySpec> {
            vec![
                KeySpec::identity("name").with_aliases(&["id"]),
                KeySpec::semver("version"),
                KeySpec::string("tag").with_nested(KeySpec::string("tag_initial")),
            ]
        }

        fn values(record: &Record, key: &str, parent: Option<&str>) -> Vec<String> {
            match (key, parent) {
                ("name", _) => vec![record.name.to_string()],
                ("version", _) => vec![record.version.to_string()],
                ("tag", _) => record.tags.iter().map(ToString::to_string).collect(),
                ("tag_initial", Some(tag)) => tag.chars().take(1).map(String::from).collect(),
                _ => Vec::new(),
            }
        }
    }

    fn record(name: &'static str, version: &'static str, tags: &[&'static str]) -> Record {
        Record {
            name,
            version,
            tags: tags.to_vec(),
        }
    }

    fn sample() -> Index<Package> {
        let mut index = Index::new();
        index
            .insert(&record("tools/cmake", "3.20.0", &["build"]), "cmake-3.20")
            .unwrap();
        index
            .insert(&record("tools/cmake", "3.24.1", &["build", "gen"]), "cmake-3.24")
            .unwrap();
        index
            .insert(&record("compilers/gcc", "12.1.0", &["compiler"]), "gcc-12")
            .unwrap();
        index.done_insertion();
        index
    }

    #[test]
    fn test_key_layout() {
        let index = sample();
        assert_eq!(index.key("name").map(Key::kind), Some(KeyKind::Identity));
        assert_eq!(index.key("tag_initial").map(Key::kind), Some(KeyKind::String));
        assert!(index.key("missing").is_none());
    }

    #[test]
    fn test_insert_failure_leaves_index_untouched() {
        let mut index = sample();
        let before = index.serialize();
        let err = index
            .insert(&record("tools/bad", "not.a.version", &["x"]), "bad")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidVersion { .. }));
        assert_eq!(index.serialize(), before);
    }

    #[test]
    fn test_nested_values_follow_parent() {
        let index = sample();
        let mut query = index.query();
        query.key("tag_initial").unwrap().equals("g").unwrap();
        assert_eq!(query.items(), vec!["cmake-3.24"]);
    }

    #[test]
    fn test_query_unknown_key() {
        let index = sample();
        let mut query = index.query();
        assert!(matches!(
            query.key("license"),
            Err(Error::UnknownKey { .. })
        ));
    }

    #[test]
    fn test_reset() {
        let mut index = sample();
        index.reset();
        assert!(index.is_empty());
        assert!(index.key("name").is_some_and(Key::is_empty));
    }

    #[test]
    fn test_deserialize_accepts_alias_names() {
        let index = sample();
        let mut doc = index.serialize();
        let name = doc.indexes.remove("name").unwrap();
        doc.indexes.insert("id".to_string(), name);

        let mut restored = Index::<Package>::new();
        restored.deserialize(doc).unwrap();
        assert_eq!(restored.serialize(), index.serialize());
    }

    #[test]
    fn test_deserialize_missing_key_keeps_previous_contents() {
        let mut index = sample();
        let mut doc = index.serialize();
        doc.indexes.remove("version");

        let err = index.deserialize(doc).unwrap_err();
        assert!(matches!(err, Error::MissingKey { ref key } if key == "version"));
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_deserialize_rejects_dangling_ordinals() {
        let index = sample();
        let mut doc = index.serialize();
        doc.items.truncate(1);

        let mut restored = Index::<Package>::new();
        assert!(matches!(
            restored.deserialize(doc),
            Err(Error::OrdinalOutOfRange { .. })
        ));
    }
}
