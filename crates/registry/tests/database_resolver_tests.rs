//! Integration tests for the registry database and layered resolution

mod common;

use artreg_registry::{
    ArtifactSearchable, Error, Registry, RegistryDatabase, RegistryLocation, RegistryResolver,
    SearchCriteria, get_artifact,
};
use common::{Fetch, ScriptedFileSystem, metadata, session, write_artifact, zip_of};
use std::sync::Arc;
use tempfile::TempDir;

fn local(dir: &TempDir) -> RegistryLocation {
    RegistryLocation::local(dir.path()).unwrap()
}

#[tokio::test]
async fn test_concurrent_loads_share_one_registry() {
    let home = TempDir::new().unwrap();
    let content = TempDir::new().unwrap();
    write_artifact(content.path(), "ninja.yaml", "tools/ninja", "1.11.1", "Build");

    let fs = ScriptedFileSystem::new(Fetch::Unavailable);
    let session = session(&home, fs);
    let database = RegistryDatabase::new();
    let location = local(&content);

    let loads = (0..8).map(|_| database.load_registry(&session, &location));
    let registries: Vec<_> = futures::future::join_all(loads)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    for registry in &registries[1..] {
        assert!(Arc::ptr_eq(&registries[0], registry));
    }
    assert_eq!(registries[0].count(), 1);
    assert!(database.has(&location));
    assert_eq!(database.get_all_uris(), vec![location.canonical()]);
}

#[tokio::test]
async fn test_equivalent_spellings_share_one_registry() {
    let home = TempDir::new().unwrap();
    let content = TempDir::new().unwrap();
    write_artifact(content.path(), "ninja.yaml", "tools/ninja", "1.11.1", "Build");
    std::fs::create_dir_all(content.path().join("nested")).unwrap();

    let session = session(&home, ScriptedFileSystem::new(Fetch::Unavailable));
    let database = RegistryDatabase::new();

    let plain = local(&content);
    let dotted = RegistryLocation::parse("nested/..", Some(content.path())).unwrap();
    let a = database.load_registry(&session, &plain).await.unwrap();
    let b = database.load_registry(&session, &dotted).await.unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(database.get_all_uris().len(), 1);
}

#[tokio::test]
async fn test_failed_load_is_retried() {
    let home = TempDir::new().unwrap();
    let fs = ScriptedFileSystem::new(Fetch::Unavailable);
    let session = session(&home, fs.clone());
    let database = RegistryDatabase::new();
    let location = RegistryLocation::parse("https://example.com/r.zip", None).unwrap();

    let err = database.load_registry(&session, &location).await.unwrap_err();
    assert!(err.is_transient());
    assert!(!database.has(&location));
    assert!(database.get_all_uris().is_empty());

    fs.respond_with(Fetch::Archive(zip_of(&[(
        "ninja.yaml",
        &metadata("tools/ninja", "1.11.1", "Build"),
    )])));
    let registry = database.load_registry(&session, &location).await.unwrap();
    assert_eq!(registry.count(), 1);
    assert!(database.has(&location));
}

#[tokio::test]
async fn test_update_all_continues_past_failures() {
    let home = TempDir::new().unwrap();
    let content = TempDir::new().unwrap();
    write_artifact(content.path(), "ninja.yaml", "tools/ninja", "1.11.1", "Build");

    let fs = ScriptedFileSystem::new(Fetch::Archive(zip_of(&[(
        "cmake.yaml",
        &metadata("tools/kitware/cmake", "3.27.1", "Generator"),
    )])));
    let session = session(&home, fs.clone());
    let database = Arc::new(RegistryDatabase::new());

    let remote = RegistryLocation::parse("https://example.com/r.zip", None).unwrap();
    let local = local(&content);
    let remote_registry = database.load_registry(&session, &remote).await.unwrap();
    database.load_registry(&session, &local).await.unwrap();

    write_artifact(content.path(), "meson.yaml", "tools/meson", "1.3.0", "Build");
    fs.respond_with(Fetch::Unavailable);

    let mut resolver = RegistryResolver::new(Arc::clone(&database));
    resolver.add(&remote, "upstream").unwrap();
    let outcomes = database.update_all(&resolver).await;

    assert_eq!(outcomes.len(), 2);
    for (uri, outcome) in &outcomes {
        if *uri == remote.canonical() {
            assert!(matches!(outcome, Err(Error::RemoteFileUnavailable { .. })));
        } else {
            assert!(outcome.is_ok());
        }
    }
    assert_eq!(remote_registry.count(), 1);
    assert_eq!(
        database.get_registry_by_uri(&local).unwrap().count(),
        2
    );
}

#[test]
fn test_add_rejects_duplicate_location() {
    let home = TempDir::new().unwrap();
    let content = TempDir::new().unwrap();
    let session = session(&home, ScriptedFileSystem::new(Fetch::Unavailable));
    let database = RegistryDatabase::new();

    let make = || {
        Arc::new(artreg_registry::LocalRegistry::new(session.clone(), local(&content)).unwrap())
    };
    database.add(make()).unwrap();
    assert!(database.add(make()).is_err());
    assert!(database.has(&local(&content)));
}

struct Shadowing {
    _home: TempDir,
    _global: TempDir,
    _project: TempDir,
    global_uri: RegistryLocation,
    project_uri: RegistryLocation,
    global: RegistryResolver,
    project: RegistryResolver,
}

/// A global registry and a project registry both bound as `mslibs`, both
/// carrying `libs/zlib`, with `libs/openssl` only in the global one.
async fn shadowing() -> Shadowing {
    let home = TempDir::new().unwrap();
    let global_dir = TempDir::new().unwrap();
    let project_dir = TempDir::new().unwrap();

    write_artifact(global_dir.path(), "zlib.yaml", "libs/zlib", "1.2.13", "Compression");
    write_artifact(global_dir.path(), "openssl.yaml", "libs/openssl", "3.1.0", "TLS");
    write_artifact(project_dir.path(), "zlib.yaml", "libs/zlib", "1.3.1", "Compression");

    let session = session(&home, ScriptedFileSystem::new(Fetch::Unavailable));
    let database = Arc::new(RegistryDatabase::new());
    let global_uri = local(&global_dir);
    let project_uri = local(&project_dir);
    database.load_registry(&session, &global_uri).await.unwrap();
    database.load_registry(&session, &project_uri).await.unwrap();

    let mut global = RegistryResolver::new(Arc::clone(&database));
    global.add(&global_uri, "mslibs").unwrap();
    let mut project = RegistryResolver::new(database);
    project.add(&project_uri, "mslibs").unwrap();

    Shadowing {
        _home: home,
        _global: global_dir,
        _project: project_dir,
        global_uri,
        project_uri,
        global,
        project,
    }
}

#[tokio::test]
async fn test_child_binding_shadows_parent_name() {
    let fixture = shadowing().await;
    let combined = fixture.global.with(&fixture.project);

    assert_eq!(
        combined.get_registry_location("mslibs"),
        Some(fixture.project_uri.canonical())
    );
    assert_eq!(
        combined.get_registry_name(&fixture.global_uri).as_deref(),
        Some("mslibs")
    );
    let by_name = combined.get_registry_by_name("mslibs").unwrap();
    assert_eq!(by_name.location(), &fixture.project_uri);
}

#[tokio::test]
async fn test_child_search_results_shadow_parent() {
    let fixture = shadowing().await;
    let combined = fixture.global.with(&fixture.project);

    let zlib = combined
        .search(&SearchCriteria::new().id("zlib"))
        .await
        .unwrap();
    let versions: Vec<String> = zlib
        .iter()
        .flat_map(|(_, artifacts)| artifacts.iter().map(|a| a.version.to_string()))
        .collect();
    assert_eq!(versions, vec!["1.3.1"]);
    assert_eq!(zlib[0].1[0].registry, fixture.project_uri.canonical());
    assert_eq!(zlib[0].0, "mslibs:libs/zlib");

    let (_, openssl) = get_artifact(&combined, "openssl", None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(openssl.registry, fixture.global_uri.canonical());

    let all = combined.search(&SearchCriteria::new()).await.unwrap();
    let count: usize = all.iter().map(|(_, artifacts)| artifacts.len()).sum();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_parent_search_is_unaffected_by_composition() {
    let fixture = shadowing().await;
    let _combined = fixture.global.with(&fixture.project);

    let (_, zlib) = get_artifact(&fixture.global, "zlib", None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(zlib.version.to_string(), "1.2.13");
}

#[tokio::test]
async fn test_unloaded_bindings_are_skipped_in_search() {
    let fixture = shadowing().await;
    let mut resolver = fixture.global.clone();
    let missing = RegistryLocation::parse("https://example.com/never-loaded.zip", None).unwrap();
    resolver.add(&missing, "offline").unwrap();

    let results = resolver.search(&SearchCriteria::new()).await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(matches!(
        resolver.get_registry_by_name("offline"),
        Err(Error::RegistryNotFound { .. })
    ));
}
