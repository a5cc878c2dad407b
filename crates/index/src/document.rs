//! Persisted form of an index.
//!
//! ```json
//! {
//!   "items": ["compilers/msvc.json", "tools/cmake.json"],
//!   "indexes": {
//!     "id": {
//!       "values": [["compilers/msvc", [0]], ["tools/cmake", [1]]],
//!       "words": [["cmake", [1]], ["compilers", [0]]],
//!       "identities": [["cmake", [1]], ["msvc", [0]]],
//!       "idShortName": [["compilers/msvc", "msvc"], ["tools/cmake", "cmake"]]
//!     }
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered `[value, [ordinals...]]` pairs
pub type Postings = Vec<(String, Vec<usize>)>;

/// A whole index: item strings plus one entry per top-level or nested key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDocument {
    /// Item strings in ordinal order
    #[serde(default)]
    pub items: Vec<String>,
    /// Key documents by key name
    #[serde(default)]
    pub indexes: BTreeMap<String, KeyDocument>,
}

/// The maps of a single key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyDocument {
    /// Value to ordinals, ascending by the key's ordering
    #[serde(default)]
    pub values: Postings,
    /// Word to ordinals (string and identity keys)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<Postings>,
    /// Short-name alias to ordinals (identity keys)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identities: Option<Postings>,
    /// Id to its short-name alias (identity keys)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_short_name: Option<Vec<(String, String)>>,
}
