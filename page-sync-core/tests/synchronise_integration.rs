mod common;

use std::path::Path;

use common::{write_file, InMemoryStore};
use page_sync_core::config::{ConfigError, SyncConfig};
use page_sync_core::contract::{
    LocalFileSystem, MockDocumentStore, RemoteDocument, RemoteDocumentSummary, StoreError,
};
use page_sync_core::links::LinkDiagnostic;
use page_sync_core::synchronise::synchronise;
use page_sync_core::SyncError;
use tempfile::tempdir;

const BASE_URL: &str = "https://wiki.example.com";

fn guide_layout(root: &Path) {
    write_file(root, "guide/readme.md", "Start with the [intro](intro.md).\n");
    write_file(root, "guide/intro.md", "Welcome.\n");
    std::fs::create_dir_all(root.join("empty/deeper")).unwrap();
    write_file(root, "ops/runbooks/deploy.md", "See [guide](../../guide/readme.md).\n");
}

fn config(root: &Path) -> SyncConfig {
    SyncConfig::new(BASE_URL, "1", root)
}

#[tokio::test]
async fn second_run_reuses_every_page() {
    let dir = tempdir().unwrap();
    guide_layout(dir.path());
    let store = InMemoryStore::with_root("Docs", "DOCS");
    let fs = LocalFileSystem;

    let first = synchronise(&config(dir.path()), &store, &fs)
        .await
        .expect("first run should succeed");
    assert_eq!(store.created(), 5, "guide, intro, ops, runbooks, deploy");
    assert_eq!(first.pruned, 2);
    assert_eq!(first.documents.len(), 3);

    let second = synchronise(&config(dir.path()), &store, &fs)
        .await
        .expect("second run should succeed");
    assert_eq!(store.created(), 5, "no new pages on the second run");
    assert_eq!(second.matched, 5);
    assert!(second.materialize.created.is_empty());

    let ids = |report: &page_sync_core::synchronise::SynchroniseReport| {
        let mut ids: Vec<(String, String)> = report
            .documents
            .iter()
            .map(|d| (d.relative_path.clone(), d.remote_id.clone()))
            .collect();
        ids.sort();
        ids
    };
    assert_eq!(ids(&first), ids(&second));
}

#[tokio::test]
async fn links_point_at_created_pages() {
    let dir = tempdir().unwrap();
    guide_layout(dir.path());
    let store = InMemoryStore::with_root("Docs", "DOCS");

    let report = synchronise(&config(dir.path()), &store, &LocalFileSystem)
        .await
        .unwrap();

    let intro = report
        .documents
        .iter()
        .find(|d| d.relative_path == "guide/intro.md")
        .unwrap();
    let guide = report
        .documents
        .iter()
        .find(|d| d.relative_path == "guide")
        .unwrap();
    assert_eq!(
        guide.body,
        format!(
            "Start with the [intro]({BASE_URL}/spaces/DOCS/pages/{}/intro).\n",
            intro.remote_id
        )
    );

    let deploy = report
        .documents
        .iter()
        .find(|d| d.relative_path == "ops/runbooks/deploy.md")
        .unwrap();
    assert_eq!(
        deploy.body,
        format!(
            "See [guide]({BASE_URL}/spaces/DOCS/pages/{}/Guide).\n",
            guide.remote_id
        )
    );
    assert_eq!(report.link_diagnostics().count(), 0);
}

#[tokio::test]
async fn colliding_title_is_qualified_with_ancestor() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "guide/readme.md", "Guide body\n");
    let store = InMemoryStore::with_root("Docs", "DOCS");
    store.insert_page(Some("1"), "Guide", "DOCS", None);

    let report = synchronise(&config(dir.path()), &store, &LocalFileSystem)
        .await
        .unwrap();

    assert_eq!(store.attempted_titles(), vec!["Guide", "Guide > Docs"]);
    let guide = &report.documents[0];
    assert_eq!(guide.title, "Guide");
    let page = store.page(&guide.remote_id).unwrap();
    assert_eq!(page.title, "Guide > Docs");
    assert_eq!(page.source_path.as_deref(), Some("guide"));
}

#[tokio::test]
async fn duplicate_markers_keep_lowest_id() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "guide/readme.md", "Guide body\n");
    let store = InMemoryStore::with_root("Docs", "DOCS");
    let low = store.insert_page(Some("1"), "Guide", "DOCS", Some("guide"));
    let high = store.insert_page(Some("1"), "Guide copy", "DOCS", Some("guide"));

    let report = synchronise(&config(dir.path()), &store, &LocalFileSystem)
        .await
        .unwrap();

    assert_eq!(store.created(), 0);
    assert_eq!(report.documents[0].remote_id, low);
    assert_eq!(report.ambiguous.len(), 1);
    assert_eq!(report.ambiguous[0].chosen_id, low);
    assert_eq!(report.ambiguous[0].orphaned_ids, vec![high]);
}

#[tokio::test]
async fn link_outside_tree_is_reported_and_left_alone() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "notes.md", "Read [this](missing.md) and ![img](pic.png).\n");
    let store = InMemoryStore::with_root("Docs", "DOCS");

    let report = synchronise(&config(dir.path()), &store, &LocalFileSystem)
        .await
        .unwrap();

    assert_eq!(
        report.documents[0].body,
        "Read [this](missing.md) and ![img](pic.png).\n"
    );
    let diagnostics: Vec<&LinkDiagnostic> = report.link_diagnostics().collect();
    assert_eq!(
        diagnostics,
        vec![&LinkDiagnostic::NotInTree {
            source: "notes.md".into(),
            target: "missing.md".into(),
        }]
    );
}

#[tokio::test]
async fn empty_tree_creates_nothing() {
    let dir = tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
    write_file(dir.path(), "a/b/picture.png", "not markdown");
    let store = InMemoryStore::with_root("Docs", "DOCS");

    let report = synchronise(&config(dir.path()), &store, &LocalFileSystem)
        .await
        .unwrap();

    assert_eq!(store.created(), 0);
    assert!(report.documents.is_empty());
    assert_eq!(report.pruned, 2);
}

#[tokio::test]
async fn missing_root_page_aborts() {
    let dir = tempdir().unwrap();
    guide_layout(dir.path());
    let mut store = MockDocumentStore::new();
    store
        .expect_get_document_by_id()
        .returning(|id| Err(StoreError::NotFound(id.to_string())));
    store.expect_create_document().never();

    let result = synchronise(&config(dir.path()), &store, &LocalFileSystem).await;

    assert!(matches!(
        result,
        Err(SyncError::Store(StoreError::NotFound(ref id))) if id == "1"
    ));
}

#[tokio::test]
async fn invalid_config_is_rejected_before_any_call() {
    let dir = tempdir().unwrap();
    let mut store = MockDocumentStore::new();
    store.expect_get_document_by_id().never();

    let config = SyncConfig::new(BASE_URL, "", dir.path());
    let result = synchronise(&config, &store, &LocalFileSystem).await;

    assert!(matches!(
        result,
        Err(SyncError::Config(ConfigError::Missing("root_page_id")))
    ));
}

#[tokio::test]
async fn dry_run_never_creates_pages() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "existing.md", "See [new](new.md).\n");
    write_file(dir.path(), "new.md", "Fresh.\n");

    let mut store = MockDocumentStore::new();
    store.expect_get_document_by_id().returning(|id| {
        Ok(RemoteDocument {
            id: id.to_string(),
            title: "Docs".into(),
            space_key: "DOCS".into(),
            links: Vec::new(),
        })
    });
    store.expect_list_child_documents().returning(|_| {
        Ok(vec![RemoteDocumentSummary {
            id: "5".into(),
            title: "existing".into(),
            source_path: Some("existing.md".into()),
        }])
    });
    store.expect_create_document().never();

    let mut config = config(dir.path());
    config.dry_run = true;
    let report = synchronise(&config, &store, &LocalFileSystem)
        .await
        .expect("dry run should succeed");

    assert_eq!(report.planned, vec!["new.md".to_string()]);
    assert!(report.materialize.created.is_empty());
    assert_eq!(report.documents.len(), 1);
    assert_eq!(report.documents[0].remote_id, "5");
    assert_eq!(report.documents[0].body, "See [new](new.md).\n");
    assert_eq!(
        report.documents[0].diagnostics,
        vec![LinkDiagnostic::NotYetMaterialized {
            source: "existing.md".into(),
            target: "new.md".into(),
        }]
    );
}

#[tokio::test]
async fn invalid_metadata_gets_no_page() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "good.md", "<!-- Space: DOCS -->\nGood.\n");
    write_file(dir.path(), "nospace/bad.md", "No space anywhere.\n");
    // Root page without a space, so only an explicit header supplies one.
    let store = InMemoryStore::with_root("Docs", "");

    let report = synchronise(&config(dir.path()), &store, &LocalFileSystem)
        .await
        .unwrap();

    assert_eq!(report.invalid.len(), 1);
    assert_eq!(report.invalid[0].relative_path, "nospace/bad.md");
    assert_eq!(report.pruned, 1, "nospace is left empty");
    assert_eq!(store.created(), 1);
    assert!(store
        .pages()
        .iter()
        .all(|p| p.source_path.as_deref() != Some("nospace/bad.md")
            && p.source_path.as_deref() != Some("nospace")));
    assert_eq!(report.documents.len(), 1);
    assert_eq!(report.documents[0].relative_path, "good.md");
    assert_eq!(report.documents[0].body, "Good.\n");
}

#[tokio::test]
async fn links_into_failed_subtree_are_not_yet_materialized() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "broken/page.md", "Unreachable.\n");
    write_file(dir.path(), "notes.md", "Read [page](broken/page.md).\n");
    let store = InMemoryStore::with_root("Docs", "DOCS");
    store.reject_path("broken");

    let report = synchronise(&config(dir.path()), &store, &LocalFileSystem)
        .await
        .unwrap();

    assert_eq!(report.materialize.failed.len(), 1);
    assert_eq!(report.materialize.failed[0].relative_path, "broken");
    assert_eq!(report.materialize.skipped, vec!["broken/page.md".to_string()]);
    assert_eq!(report.documents.len(), 1);
    let notes = &report.documents[0];
    assert_eq!(notes.body, "Read [page](broken/page.md).\n");
    assert_eq!(
        notes.diagnostics,
        vec![LinkDiagnostic::NotYetMaterialized {
            source: "notes.md".into(),
            target: "broken/page.md".into(),
        }]
    );
}
