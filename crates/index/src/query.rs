//! Query cursors over a built index.
//!
//! A [`Query`] starts with every item selected. Each predicate narrows the
//! selection to the intersection of the current selection and the predicate's
//! matches, so chained predicates compose as AND. A predicate given an empty
//! value leaves the selection unchanged.

use crate::key::{Key, Ordinals};
use crate::version::VersionRange;
use crate::{Error, Result};
use regex::Regex;

/// A fresh search over one index.
#[derive(Debug, Clone)]
pub struct Query<'a> {
    schema: &'static str,
    items: &'a [String],
    keys: &'a [Key],
    /// `None` means "everything".
    selected: Option<Ordinals>,
}

impl<'a> Query<'a> {
    pub(crate) fn new(schema: &'static str, items: &'a [String], keys: &'a [Key]) -> Self {
        Self {
            schema,
            items,
            keys,
            selected: None,
        }
    }

    /// Start a predicate on the key called `name`.
    pub fn key(&mut self, name: &str) -> Result<Predicate<'_, 'a>> {
        let keys = self.keys;
        let key = keys
            .iter()
            .find(|k| k.name() == name)
            .ok_or_else(|| Error::UnknownKey {
                schema: self.schema.to_string(),
                key: name.to_string(),
            })?;
        Ok(Predicate { query: self, key })
    }

    /// Keep only the given ordinals.
    pub fn filter(&mut self, ordinals: impl IntoIterator<Item = usize>) -> &mut Self {
        let keep: Ordinals = ordinals.into_iter().collect();
        self.narrow(keep);
        self
    }

    /// Current selection; `None` before any predicate ran.
    #[must_use]
    pub fn selected(&self) -> Option<&Ordinals> {
        self.selected.as_ref()
    }

    /// Selected ordinals in ascending order.
    #[must_use]
    pub fn ordinals(&self) -> Vec<usize> {
        match &self.selected {
            Some(selected) => selected
                .iter()
                .copied()
                .filter(|n| *n < self.items.len())
                .collect(),
            None => (0..self.items.len()).collect(),
        }
    }

    /// Item strings of the selection, in ordinal order.
    #[must_use]
    pub fn items(&self) -> Vec<&'a str> {
        let items = self.items;
        self.ordinals()
            .into_iter()
            .map(|n| items[n].as_str())
            .collect()
    }

    /// Number of selected items
    #[must_use]
    pub fn len(&self) -> usize {
        self.ordinals().len()
    }

    /// Whether nothing is selected
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn narrow(&mut self, matches: Ordinals) {
        self.selected = Some(match self.selected.take() {
            Some(current) => current.intersection(&matches).copied().collect(),
            None => matches,
        });
    }
}

/// A predicate bound to one key of a [`Query`].
#[derive(Debug)]
pub struct Predicate<'q, 'a> {
    query: &'q mut Query<'a>,
    key: &'a Key,
}

impl<'q, 'a> Predicate<'q, 'a> {
    /// Items whose value equals `value`.
    pub fn equals(self, value: &str) -> Result<&'q mut Query<'a>> {
        if !value.is_empty() {
            let matches = self.key.equals(value)?;
            self.query.narrow(matches);
        }
        Ok(self.query)
    }

    /// Items having `word` among their word tokens.
    pub fn contains(self, word: &str) -> &'q mut Query<'a> {
        if !word.is_empty() {
            let matches = self.key.contains(word);
            self.query.narrow(matches);
        }
        self.query
    }

    /// Items whose value is at or above `value`.
    pub fn greater_than(self, value: &str) -> Result<&'q mut Query<'a>> {
        if !value.is_empty() {
            let matches = self.key.greater_than(value)?;
            self.query.narrow(matches);
        }
        Ok(self.query)
    }

    /// Items whose value is strictly below `value`.
    pub fn less_than(self, value: &str) -> Result<&'q mut Query<'a>> {
        if !value.is_empty() {
            let matches = self.key.less_than(value)?;
            self.query.narrow(matches);
        }
        Ok(self.query)
    }

    /// Selected items whose value matches the regular expression `pattern`.
    pub fn matches(self, pattern: &str) -> Result<&'q mut Query<'a>> {
        if !pattern.is_empty() {
            let regex = Regex::new(pattern).map_err(|e| Error::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;
            let matches = self.key.matches(&regex, self.query.selected.as_ref());
            self.query.narrow(matches);
        }
        Ok(self.query)
    }

    /// Selected items whose value starts with `prefix`.
    pub fn starts_with(self, prefix: &str) -> &'q mut Query<'a> {
        if !prefix.is_empty() {
            let matches = self
                .key
                .scan_text(self.query.selected.as_ref(), |text| text.starts_with(prefix));
            self.query.narrow(matches);
        }
        self.query
    }

    /// Selected items whose value ends with `suffix`.
    pub fn ends_with(self, suffix: &str) -> &'q mut Query<'a> {
        if !suffix.is_empty() {
            let matches = self
                .key
                .scan_text(self.query.selected.as_ref(), |text| text.ends_with(suffix));
            self.query.narrow(matches);
        }
        self.query
    }

    /// Items whose id or short-name alias is `value`. Identity keys only.
    pub fn name_or_short_name_is(self, value: &str) -> Result<&'q mut Query<'a>> {
        if !value.is_empty() {
            let matches = self.key.name_or_short_name_is(value)?;
            self.query.narrow(matches);
        }
        Ok(self.query)
    }

    /// Selected items whose version satisfies the range `expr`. Semver keys only.
    pub fn range_match(self, expr: &str) -> Result<&'q mut Query<'a>> {
        if expr.trim().is_empty() {
            return Ok(self.query);
        }
        let range = VersionRange::parse(expr)?;
        self.range_match_parsed(&range)
    }

    /// [`Predicate::range_match`] with an already parsed range.
    pub fn range_match_parsed(self, range: &VersionRange) -> Result<&'q mut Query<'a>> {
        let matches = self.key.range_match(range, self.query.selected.as_ref())?;
        self.query.narrow(matches);
        Ok(self.query)
    }
}
