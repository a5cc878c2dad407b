//! Typed search facets.
//!
//! A [`Key`] maps coerced facet values to the set of item ordinals carrying
//! them. The set of kinds is closed ([`KeyKind`]); every kind shares the same
//! predicate surface and persists to a [`KeyDocument`].

use crate::document::{KeyDocument, Postings};
use crate::version::{VersionRange, parse_version};
use crate::{Error, Result};
use regex::Regex;
use semver::Version;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

/// Set of item ordinals
pub type Ordinals = BTreeSet<usize>;

/// The kind of a search facet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// Free text, lexicographic order, word-searchable.
    String,
    /// Artifact identity; a string key that also resolves short-name aliases.
    Identity,
    /// Semantic version, ordered by version precedence; not word-searchable.
    Semver,
}

impl KeyKind {
    /// Human readable kind name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Identity => "identity",
            Self::Semver => "semver",
        }
    }
}

impl std::fmt::Display for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static declaration of a key within a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpec {
    /// Primary name; used when persisting.
    pub name: &'static str,
    /// Names this key may carry in previously persisted documents.
    pub aliases: &'static [&'static str],
    /// Facet kind.
    pub kind: KeyKind,
    /// Keys whose values are derived from each value of this key.
    pub nested: Vec<KeySpec>,
}

impl KeySpec {
    /// Declare a key of the given kind.
    #[must_use]
    pub fn new(name: &'static str, kind: KeyKind) -> Self {
        Self {
            name,
            aliases: &[],
            kind,
            nested: Vec::new(),
        }
    }

    /// Declare a free-text key.
    #[must_use]
    pub fn string(name: &'static str) -> Self {
        Self::new(name, KeyKind::String)
    }

    /// Declare an identity key.
    #[must_use]
    pub fn identity(name: &'static str) -> Self {
        Self::new(name, KeyKind::Identity)
    }

    /// Declare a semantic version key.
    #[must_use]
    pub fn semver(name: &'static str) -> Self {
        Self::new(name, KeyKind::Semver)
    }

    /// Accept alternative names when deserializing.
    #[must_use]
    pub fn with_aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }

    /// Attach a nested key.
    #[must_use]
    pub fn with_nested(mut self, child: KeySpec) -> Self {
        self.nested.push(child);
        self
    }
}

/// A coerced facet value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyValue {
    /// Textual value (string and identity keys)
    Text(String),
    /// Version value (semver keys)
    Version(Version),
}

impl std::fmt::Display for KeyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Version(v) => write!(f, "{v}"),
        }
    }
}

/// Ordered multimap from value to ordinals.
#[derive(Debug, Clone)]
struct ValueMap<K: Ord> {
    entries: BTreeMap<K, Ordinals>,
}

impl<K: Ord> Default for ValueMap<K> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone> ValueMap<K> {
    fn add(&mut self, key: K, ordinal: usize) {
        self.entries.entry(key).or_default().insert(ordinal);
    }

    fn get(&self, key: &K) -> Ordinals {
        self.entries.get(key).cloned().unwrap_or_default()
    }

    fn at_or_above(&self, low: &K) -> Ordinals {
        union(self.entries.range((Bound::Included(low), Bound::Unbounded)))
    }

    fn below(&self, high: &K) -> Ordinals {
        union(self.entries.range((Bound::Unbounded, Bound::Excluded(high))))
    }

    /// Ordinals of entries whose key satisfies `pred`, limited to `selected`.
    fn scan(&self, selected: Option<&Ordinals>, mut pred: impl FnMut(&K) -> bool) -> Ordinals {
        let mut out = Ordinals::new();
        for (key, ordinals) in &self.entries {
            let candidates = ordinals
                .iter()
                .filter(|n| selected.is_none_or(|s| s.contains(*n)))
                .copied()
                .collect::<Vec<_>>();
            if !candidates.is_empty() && pred(key) {
                out.extend(candidates);
            }
        }
        out
    }

    fn postings(&self, render: impl Fn(&K) -> String) -> Postings {
        self.entries
            .iter()
            .map(|(k, ordinals)| (render(k), ordinals.iter().copied().collect()))
            .collect()
    }

    fn max_ordinal(&self) -> Option<usize> {
        self.entries
            .values()
            .filter_map(|ordinals| ordinals.last().copied())
            .max()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

fn union<'a, K: 'a>(iter: impl Iterator<Item = (&'a K, &'a Ordinals)>) -> Ordinals {
    iter.flat_map(|(_, ordinals)| ordinals.iter().copied())
        .collect()
}

/// Free-text key: lexicographic values plus a word table.
#[derive(Debug, Clone, Default)]
pub struct StringKey {
    values: ValueMap<String>,
    words: ValueMap<String>,
}

impl StringKey {
    fn add(&mut self, value: &str, ordinal: usize) {
        self.values.add(value.to_string(), ordinal);
        for word in word_tokens(value) {
            self.words.add(word, ordinal);
        }
    }

    fn serialize(&self) -> KeyDocument {
        KeyDocument {
            values: self.values.postings(Clone::clone),
            words: Some(self.words.postings(Clone::clone)),
            ..KeyDocument::default()
        }
    }

    fn restore(&mut self, doc: &KeyDocument) {
        for (value, ordinals) in &doc.values {
            for n in ordinals {
                self.values.add(value.clone(), *n);
            }
        }
        for (word, ordinals) in doc.words.iter().flatten() {
            for n in ordinals {
                self.words.add(word.clone(), *n);
            }
        }
    }
}

/// Identity key: a [`StringKey`] with derived short-name aliases.
#[derive(Debug, Clone, Default)]
pub struct IdentityKey {
    base: StringKey,
    identities: BTreeMap<String, Ordinals>,
    id_short_name: BTreeMap<String, String>,
}

impl IdentityKey {
    /// Short name assigned to `id`, if any.
    #[must_use]
    pub fn short_name_of(&self, id: &str) -> Option<&str> {
        self.id_short_name.get(id).map(String::as_str)
    }

    /// Assign every id the shortest trailing path suffix that no other id shares.
    fn build_aliases(&mut self) {
        self.identities.clear();
        self.id_short_name.clear();

        let mut pending: BTreeMap<String, Vec<(&String, &Ordinals)>> = BTreeMap::new();
        for (id, ordinals) in &self.base.values.entries {
            pending
                .entry(short_name(id, 1))
                .or_default()
                .push((id, ordinals));
        }

        let mut depth = 1;
        while !pending.is_empty() {
            depth += 1;
            let mut next: BTreeMap<String, Vec<(&String, &Ordinals)>> = BTreeMap::new();
            for (alias, owners) in std::mem::take(&mut pending) {
                if let [(id, ordinals)] = owners.as_slice() {
                    self.identities.insert(alias.clone(), (*ordinals).clone());
                    self.id_short_name.insert((*id).clone(), alias);
                } else {
                    for (id, ordinals) in owners {
                        next.entry(short_name(id, depth))
                            .or_default()
                            .push((id, ordinals));
                    }
                }
            }
            pending = next;
        }
    }

    fn serialize(&self) -> KeyDocument {
        let mut doc = self.base.serialize();
        doc.identities = Some(
            self.identities
                .iter()
                .map(|(alias, ordinals)| (alias.clone(), ordinals.iter().copied().collect()))
                .collect(),
        );
        doc.id_short_name = Some(
            self.id_short_name
                .iter()
                .map(|(id, alias)| (id.clone(), alias.clone()))
                .collect(),
        );
        doc
    }
}

/// The last `n` `/`-separated segments of `id`.
fn short_name(id: &str, n: usize) -> String {
    let segments = id.split('/').collect::<Vec<_>>();
    let start = segments.len().saturating_sub(n);
    segments[start..].join("/")
}

/// Semantic version key.
#[derive(Debug, Clone, Default)]
pub struct SemverKey {
    values: ValueMap<Version>,
}

impl SemverKey {
    fn restore(&mut self, name: &str, doc: &KeyDocument) -> Result<()> {
        for (raw, ordinals) in &doc.values {
            let version = parse_version(raw).map_err(|e| match e {
                Error::InvalidVersion { value, message } => Error::InvalidVersion {
                    value,
                    message: format!("in key '{name}': {message}"),
                },
                other => other,
            })?;
            for n in ordinals {
                self.values.add(version.clone(), *n);
            }
        }
        Ok(())
    }
}

/// Kind-specific storage of a key.
#[derive(Debug, Clone)]
enum Store {
    String(StringKey),
    Identity(IdentityKey),
    Semver(SemverKey),
}

/// One named search facet and its value maps.
#[derive(Debug, Clone)]
pub struct Key {
    name: &'static str,
    aliases: &'static [&'static str],
    parent: Option<usize>,
    children: Vec<usize>,
    store: Store,
}

impl Key {
    pub(crate) fn new(spec: &KeySpec, parent: Option<usize>) -> Self {
        let store = match spec.kind {
            KeyKind::String => Store::String(StringKey::default()),
            KeyKind::Identity => Store::Identity(IdentityKey::default()),
            KeyKind::Semver => Store::Semver(SemverKey::default()),
        };
        Self {
            name: spec.name,
            aliases: spec.aliases,
            parent,
            children: Vec::new(),
            store,
        }
    }

    /// Primary name of the key
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Facet kind
    #[must_use]
    pub fn kind(&self) -> KeyKind {
        match self.store {
            Store::String(_) => KeyKind::String,
            Store::Identity(_) => KeyKind::Identity,
            Store::Semver(_) => KeyKind::Semver,
        }
    }

    /// Number of distinct values held
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.store {
            Store::String(k) => k.values.len(),
            Store::Identity(k) => k.base.values.len(),
            Store::Semver(k) => k.values.len(),
        }
    }

    /// Whether the key holds no values
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short-name alias of `id` (identity keys only).
    #[must_use]
    pub fn short_name_of(&self, id: &str) -> Option<&str> {
        match &self.store {
            Store::Identity(k) => k.short_name_of(id),
            _ => None,
        }
    }

    pub(crate) fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub(crate) fn children(&self) -> &[usize] {
        &self.children
    }

    pub(crate) fn push_child(&mut self, child: usize) {
        self.children.push(child);
    }

    /// Names under which this key may appear in a persisted document.
    pub(crate) fn persisted_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once(self.name).chain(self.aliases.iter().copied())
    }

    /// Normalize raw text into this key's comparable value.
    pub fn coerce(&self, raw: &str) -> Result<KeyValue> {
        match self.store {
            Store::Semver(_) => parse_version(raw).map(KeyValue::Version),
            Store::String(_) | Store::Identity(_) => Ok(KeyValue::Text(raw.to_string())),
        }
    }

    /// Record `value` for `ordinal`; `value` must come from [`Key::coerce`].
    pub(crate) fn add(&mut self, value: &KeyValue, ordinal: usize) {
        match (&mut self.store, value) {
            (Store::String(k), KeyValue::Text(s)) => k.add(s, ordinal),
            (Store::Identity(k), KeyValue::Text(s)) => k.base.add(s, ordinal),
            (Store::Semver(k), KeyValue::Version(v)) => k.values.add(v.clone(), ordinal),
            (_, value) => {
                tracing::warn!(key = self.name, %value, "Ignoring value of mismatched kind");
            }
        }
    }

    /// Whole-corpus pass after a batch of inserts.
    pub(crate) fn done_insertion(&mut self) {
        if let Store::Identity(k) = &mut self.store {
            k.build_aliases();
        }
    }

    /// Ordinals whose value equals `raw`.
    pub(crate) fn equals(&self, raw: &str) -> Result<Ordinals> {
        Ok(match (&self.store, self.coerce(raw)?) {
            (Store::String(k), KeyValue::Text(s)) => k.values.get(&s),
            (Store::Identity(k), KeyValue::Text(s)) => k.base.values.get(&s),
            (Store::Semver(k), KeyValue::Version(v)) => k.values.get(&v),
            _ => Ordinals::new(),
        })
    }

    /// Ordinals having `word` among their tokens.
    pub(crate) fn contains(&self, word: &str) -> Ordinals {
        match &self.store {
            Store::String(k) => k.words.get(&word.to_string()),
            Store::Identity(k) => k.base.words.get(&word.to_string()),
            Store::Semver(_) => Ordinals::new(),
        }
    }

    /// Ordinals whose value is at or above `raw`.
    pub(crate) fn greater_than(&self, raw: &str) -> Result<Ordinals> {
        Ok(match (&self.store, self.coerce(raw)?) {
            (Store::String(k), KeyValue::Text(s)) => k.values.at_or_above(&s),
            (Store::Identity(k), KeyValue::Text(s)) => k.base.values.at_or_above(&s),
            (Store::Semver(k), KeyValue::Version(v)) => k.values.at_or_above(&v),
            _ => Ordinals::new(),
        })
    }

    /// Ordinals whose value is strictly below `raw`.
    pub(crate) fn less_than(&self, raw: &str) -> Result<Ordinals> {
        Ok(match (&self.store, self.coerce(raw)?) {
            (Store::String(k), KeyValue::Text(s)) => k.values.below(&s),
            (Store::Identity(k), KeyValue::Text(s)) => k.base.values.below(&s),
            (Store::Semver(k), KeyValue::Version(v)) => k.values.below(&v),
            _ => Ordinals::new(),
        })
    }

    /// Ordinals (within `selected`) whose value's text satisfies `pred`.
    pub(crate) fn scan_text(
        &self,
        selected: Option<&Ordinals>,
        mut pred: impl FnMut(&str) -> bool,
    ) -> Ordinals {
        match &self.store {
            Store::String(k) => k.values.scan(selected, |s| pred(s)),
            Store::Identity(k) => k.base.values.scan(selected, |s| pred(s)),
            Store::Semver(k) => k.values.scan(selected, |v| pred(&v.to_string())),
        }
    }

    /// Ordinals (within `selected`) whose value matches `pattern`.
    pub(crate) fn matches(&self, pattern: &Regex, selected: Option<&Ordinals>) -> Ordinals {
        self.scan_text(selected, |text| pattern.is_match(text))
    }

    /// Ordinals whose id or short-name alias equals `value`.
    pub(crate) fn name_or_short_name_is(&self, value: &str) -> Result<Ordinals> {
        match &self.store {
            Store::Identity(k) => Ok(k
                .identities
                .get(value)
                .cloned()
                .unwrap_or_else(|| k.base.values.get(&value.to_string()))),
            _ => Err(Error::unsupported(
                self.name,
                self.kind().as_str(),
                "name_or_short_name_is",
            )),
        }
    }

    /// Ordinals (within `selected`) whose version satisfies `range`.
    pub(crate) fn range_match(
        &self,
        range: &VersionRange,
        selected: Option<&Ordinals>,
    ) -> Result<Ordinals> {
        match &self.store {
            Store::Semver(k) => Ok(k.values.scan(selected, |v| range.matches(v))),
            _ => Err(Error::unsupported(
                self.name,
                self.kind().as_str(),
                "range_match",
            )),
        }
    }

    /// Persist this key's maps.
    pub(crate) fn serialize(&self) -> KeyDocument {
        match &self.store {
            Store::String(k) => k.serialize(),
            Store::Identity(k) => k.serialize(),
            Store::Semver(k) => KeyDocument {
                values: k.values.postings(ToString::to_string),
                ..KeyDocument::default()
            },
        }
    }

    /// Rebuild this key from a persisted document, checking every ordinal
    /// against `item_count`.
    pub(crate) fn deserialize(&mut self, doc: &KeyDocument, item_count: usize) -> Result<()> {
        let referenced = doc
            .values
            .iter()
            .chain(doc.words.iter().flatten())
            .flat_map(|(_, ordinals)| ordinals.iter().copied());
        for ordinal in referenced {
            if ordinal >= item_count {
                return Err(Error::OrdinalOutOfRange {
                    key: self.name.to_string(),
                    ordinal,
                    len: item_count,
                });
            }
        }

        match &mut self.store {
            Store::String(k) => k.restore(doc),
            Store::Identity(k) => {
                k.base.restore(doc);
                k.build_aliases();
            }
            Store::Semver(k) => k.restore(self.name, doc)?,
        }
        Ok(())
    }

    /// Highest ordinal referenced by this key
    #[must_use]
    pub fn max_ordinal(&self) -> Option<usize> {
        match &self.store {
            Store::String(k) => k.values.max_ordinal(),
            Store::Identity(k) => k.base.values.max_ordinal(),
            Store::Semver(k) => k.values.max_ordinal(),
        }
    }
}

/// Word tokens of a value.
///
/// Every whitespace-delimited token is a word, and so is every run of
/// consecutive word segments inside it together with the separators between
/// them: `compilers/microsoft/msvc` yields `compilers`, `compilers/microsoft`,
/// `compilers/microsoft/msvc`, `microsoft`, `microsoft/msvc` and `msvc`.
#[must_use]
pub fn word_tokens(value: &str) -> BTreeSet<String> {
    let mut words = BTreeSet::new();
    for token in value.split_whitespace() {
        words.insert(token.to_string());

        let parts = split_segments(token);
        for start in (0..parts.len()).step_by(2) {
            for end in (start..parts.len()).step_by(2) {
                let phrase = parts[start..=end].concat();
                if !phrase.is_empty() {
                    words.insert(phrase);
                }
            }
        }
    }
    words
}

/// Split into alternating word / separator runs; even indices are words.
fn split_segments(token: &str) -> Vec<&str> {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_word = true;
    for (i, c) in token.char_indices() {
        if is_word(c) != in_word {
            parts.push(&token[start..i]);
            start = i;
            in_word = !in_word;
        }
    }
    parts.push(&token[start..]);
    parts
}
