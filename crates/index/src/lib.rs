//! Typed inverted indexes for artifact search
//!
//! This crate provides the search engine underneath artifact registries:
//! - Typed keys: free text, identities with short-name aliases, semantic versions
//! - Word tokenization for keyword search
//! - Chainable query cursors where each predicate narrows the selection (AND)
//! - A JSON document form for persisting and reloading a built index
//!
//! # Overview
//!
//! An [`Index`] is parameterized by a [`Schema`] that declares its keys and
//! extracts raw values from records. Items are opaque strings addressed by the
//! ordinal at which they were inserted; ordinals are dense and stable for the
//! lifetime of a build.
//!
//! ```
//! use artreg_index::{Index, KeySpec, Schema};
//!
//! struct Tool;
//!
//! impl Schema for Tool {
//!     type Record = str;
//!     const NAME: &'static str = "tool";
//!
//!     fn keys() -> Vec<KeySpec> {
//!         vec![KeySpec::string("description")]
//!     }
//!
//!     fn values(record: &str, _key: &str, _parent: Option<&str>) -> Vec<String> {
//!         vec![record.to_string()]
//!     }
//! }
//!
//! let mut index = Index::<Tool>::new();
//! index.insert("a fast build system", "ninja").unwrap();
//! index.insert("a build system generator", "cmake").unwrap();
//! index.done_insertion();
//!
//! let mut query = index.query();
//! query.key("description").unwrap().contains("generator");
//! assert_eq!(query.items(), vec!["cmake"]);
//! ```

#![expect(
    clippy::missing_errors_doc,
    reason = "Error documentation to be added incrementally"
)]

pub mod document;
mod error;
mod index;
pub mod key;
mod query;
pub mod version;

pub use document::{IndexDocument, KeyDocument};
pub use error::{Error, Result};
pub use index::{Index, Schema};
pub use key::{Key, KeyKind, KeySpec, KeyValue, Ordinals, word_tokens};
pub use query::{Predicate, Query};
pub use version::{VersionRange, parse_version};
