//! Query behavior over a small artifact-like corpus.

use artreg_index::{Error, Index, KeySpec, Schema};

struct Entry {
    id: &'static str,
    version: &'static str,
    summary: &'static str,
}

struct Catalog;

impl Schema for Catalog {
    type Record = Entry;
    const NAME: &'static str = "catalog";

    fn keys() -> Vec<KeySpec> {
        vec![
            KeySpec::identity("id"),
            KeySpec::semver("version"),
            KeySpec::string("summary"),
        ]
    }

    fn values(record: &Entry, key: &str, _parent: Option<&str>) -> Vec<String> {
        match key {
            "id" => vec![record.id.to_string()],
            "version" => vec![record.version.to_string()],
            "summary" => vec![record.summary.to_string()],
            _ => Vec::new(),
        }
    }
}

const CORPUS: &[Entry] = &[
    Entry {
        id: "compilers/microsoft/msvc",
        version: "17.4.0",
        summary: "Microsoft C++ compiler",
    },
    Entry {
        id: "compilers/microsoft/msvc",
        version: "16.11.2",
        summary: "Microsoft C++ compiler",
    },
    Entry {
        id: "tools/kitware/cmake",
        version: "3.24.1",
        summary: "Cross-platform build system generator",
    },
    Entry {
        id: "tools/kitware/cmake",
        version: "3.20.0",
        summary: "Cross-platform build system generator",
    },
    Entry {
        id: "tools/ninja-build/ninja",
        version: "1.11.0",
        summary: "Small build system with a focus on speed",
    },
];

fn catalog() -> Index<Catalog> {
    let mut index = Index::new();
    for (n, entry) in CORPUS.iter().enumerate() {
        index.insert(entry, format!("item-{n}")).unwrap();
    }
    index.done_insertion();
    index
}

#[test]
fn test_fresh_query_selects_everything() {
    let index = catalog();
    let query = index.query();
    assert!(query.selected().is_none());
    assert_eq!(query.len(), CORPUS.len());
}

#[test]
fn test_short_name_lookup() {
    let index = catalog();
    let mut query = index.query();
    query.key("id").unwrap().name_or_short_name_is("cmake").unwrap();
    assert_eq!(query.items(), vec!["item-2", "item-3"]);

    assert_eq!(
        index.key("id").unwrap().short_name_of("compilers/microsoft/msvc"),
        Some("msvc")
    );
}

#[test]
fn test_full_id_lookup() {
    let index = catalog();
    let mut query = index.query();
    query
        .key("id")
        .unwrap()
        .name_or_short_name_is("tools/ninja-build/ninja")
        .unwrap();
    assert_eq!(query.items(), vec!["item-4"]);
}

#[test]
fn test_keyword_search_on_id_segments() {
    let index = catalog();
    let mut query = index.query();
    query.key("id").unwrap().contains("kitware/cmake");
    assert_eq!(query.ordinals(), vec![2, 3]);

    let mut query = index.query();
    query.key("id").unwrap().contains("ninja-build");
    assert_eq!(query.ordinals(), vec![4]);
}

#[test]
fn test_keyword_search_on_summary() {
    let index = catalog();
    let mut query = index.query();
    query.key("summary").unwrap().contains("build");
    assert_eq!(query.ordinals(), vec![2, 3, 4]);
}

#[test]
fn test_predicates_compose_as_and() {
    let index = catalog();
    let mut query = index.query();
    query.key("summary").unwrap().contains("build");
    query.key("version").unwrap().range_match("^3.0.0").unwrap();
    query.key("version").unwrap().greater_than("3.21.0").unwrap();
    assert_eq!(query.items(), vec!["item-2"]);
}

#[test]
fn test_range_match() {
    let index = catalog();
    let mut query = index.query();
    query
        .key("version")
        .unwrap()
        .range_match(">=16.0.0 <17.0.0 || 1.11")
        .unwrap();
    assert_eq!(query.ordinals(), vec![1, 4]);
}

#[test]
fn test_version_bounds() {
    let index = catalog();

    let mut query = index.query();
    query.key("version").unwrap().greater_than("16.11.2").unwrap();
    assert_eq!(query.ordinals(), vec![0, 1]);

    let mut query = index.query();
    query.key("version").unwrap().less_than("3.20.0").unwrap();
    assert_eq!(query.ordinals(), vec![4]);
}

#[test]
fn test_string_bounds_are_lexicographic() {
    let index = catalog();
    let mut query = index.query();
    query.key("id").unwrap().less_than("tools").unwrap();
    assert_eq!(query.ordinals(), vec![0, 1]);
}

#[test]
fn test_scan_predicates() {
    let index = catalog();

    let mut query = index.query();
    query.key("id").unwrap().starts_with("tools/");
    query.key("id").unwrap().ends_with("/ninja");
    assert_eq!(query.ordinals(), vec![4]);

    let mut query = index.query();
    query.key("summary").unwrap().matches(r"^Cross-\w+").unwrap();
    assert_eq!(query.ordinals(), vec![2, 3]);
}

#[test]
fn test_empty_values_do_not_narrow() {
    let index = catalog();
    let mut query = index.query();
    query.key("id").unwrap().equals("").unwrap();
    query.key("summary").unwrap().contains("");
    query.key("version").unwrap().range_match("  ").unwrap();
    assert_eq!(query.len(), CORPUS.len());
}

#[test]
fn test_filter_keeps_only_given_ordinals() {
    let index = catalog();
    let mut query = index.query();
    query.filter([1, 3, 99]);
    query.key("summary").unwrap().contains("compiler");
    assert_eq!(query.ordinals(), vec![1]);
}

#[test]
fn test_no_match_is_empty() {
    let index = catalog();
    let mut query = index.query();
    query.key("id").unwrap().name_or_short_name_is("vcpkg").unwrap();
    assert!(query.is_empty());
    assert!(query.items().is_empty());
}

#[test]
fn test_errors() {
    let index = catalog();

    let mut query = index.query();
    assert!(matches!(
        query.key("summary").unwrap().range_match("^1"),
        Err(Error::UnsupportedOperation { .. })
    ));

    let mut query = index.query();
    assert!(matches!(
        query.key("version").unwrap().equals("seventeen"),
        Err(Error::InvalidVersion { .. })
    ));

    let mut query = index.query();
    assert!(matches!(
        query.key("summary").unwrap().matches("("),
        Err(Error::InvalidPattern { .. })
    ));
}

#[test]
fn test_json_round_trip_preserves_answers() {
    let index = catalog();
    let json = index.to_json().unwrap();
    let restored = Index::<Catalog>::from_json(&json).unwrap();

    let mut query = restored.query();
    query.key("id").unwrap().name_or_short_name_is("msvc").unwrap();
    query.key("version").unwrap().range_match("17").unwrap();
    assert_eq!(query.items(), vec!["item-0"]);
}
