//! End-to-end tests of the project cache: file-store semantics, lazy
//! derivation, invalidation, snapshots, and concurrency.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use pretty_assertions::assert_eq;
use spx_project::{
    default_registry, same_file, Artifact, Features, File, InitialFiles, KindRegistry, KindScope,
    MemFile, Project, ProjectError, KIND_AST,
};

fn file(text: &str) -> File {
    MemFile::new(text)
}

fn files(entries: &[(&str, &str)]) -> HashMap<String, File> {
    entries
        .iter()
        .map(|(path, text)| (path.to_string(), file(text)))
        .collect()
}

fn two_file_project() -> Project {
    Project::new(
        None,
        files(&[("main.spx", "echo 100"), ("bar.spx", "echo 200")]),
        Features::ALL,
    )
}

#[test]
fn basic_ast_package_and_doc() {
    let proj = two_file_project();

    let ast = proj.ast("main.spx").unwrap();
    let shadow = ast.shadow_entry.as_ref().expect("shadow entry");
    assert_eq!(shadow.body.list.len(), 1);

    let pkg = proj.ast_package().unwrap();
    assert_eq!(pkg.name, "main");
    assert_eq!(pkg.files.len(), 2);

    let doc = proj.pkg_doc().unwrap();
    assert_eq!(doc.name, "main");
    assert!(doc.funcs.is_empty());
}

#[test]
fn repeated_queries_share_one_artifact() {
    let proj = two_file_project();

    let first = proj.ast("main.spx").unwrap();
    let second = proj.ast("main.spx").unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let doc1 = proj.pkg_doc().unwrap();
    let doc2 = proj.pkg_doc().unwrap();
    assert!(Arc::ptr_eq(&doc1, &doc2));
}

#[test]
fn snapshot_preserves_built_artifacts_by_identity() {
    let proj = two_file_project();
    let ast = proj.ast("main.spx").unwrap();

    let snap = proj.snapshot();
    let snap_ast = snap.ast("main.spx").unwrap();
    assert!(Arc::ptr_eq(&ast, &snap_ast));
}

#[test]
fn delete_is_isolated_from_snapshots_and_idempotent_delete_fails() {
    let proj = two_file_project();
    let ast = proj.ast("main.spx").unwrap();
    let snap = proj.snapshot();

    proj.delete_file("main.spx").unwrap();
    assert_eq!(proj.ast("main.spx").unwrap_err(), ProjectError::NotFound);

    // The snapshot still answers from the frozen state, same instance.
    let snap_ast = snap.ast("main.spx").unwrap();
    assert!(Arc::ptr_eq(&ast, &snap_ast));

    assert_eq!(
        proj.delete_file("main.spx").unwrap_err(),
        ProjectError::NotFound
    );
}

#[test]
fn rename_on_a_snapshot_leaves_the_live_project_untouched() {
    let proj = two_file_project();
    let old_ast = proj.ast("main.spx").unwrap();
    let snap = proj.snapshot();

    snap.rename_file("main.spx", "foo.spx").unwrap();

    let renamed = snap.ast("foo.spx").unwrap();
    assert!(!Arc::ptr_eq(&old_ast, &renamed), "new path, new entry");
    assert_eq!(snap.ast("main.spx").unwrap_err(), ProjectError::NotFound);

    assert_eq!(
        snap.rename_file("main.spx", "foo.spx").unwrap_err(),
        ProjectError::NotFound
    );
    assert_eq!(
        snap.rename_file("foo.spx", "bar.spx").unwrap_err(),
        ProjectError::AlreadyExists
    );

    // The live project never saw any of it.
    assert!(proj.contains_file("main.spx"));
    assert!(!proj.contains_file("foo.spx"));
    assert!(Arc::ptr_eq(&old_ast, &proj.ast("main.spx").unwrap()));
}

#[test]
fn update_files_replaces_the_store_wholesale() {
    let proj = two_file_project();
    let generation = proj.generation();

    proj.update_files(files(&[
        ("main.spx", "echo 300"),
        ("third.spx", "echo 400"),
    ]));

    assert_eq!(proj.generation(), generation + 1, "one bump per update");
    assert_eq!(proj.ast("bar.spx").unwrap_err(), ProjectError::NotFound);

    assert!(proj.ast("main.spx").is_ok());
    assert_eq!(
        proj.get_file("main.spx").unwrap().content(),
        b"echo 300"
    );
    assert_eq!(
        proj.get_file("third.spx").unwrap().content(),
        b"echo 400"
    );

    let mut count = 0;
    proj.range_files(|_| {
        count += 1;
        true
    });
    assert_eq!(count, 2);
}

#[test]
fn put_file_refreshes_the_ast() {
    let proj = two_file_project();
    let before = proj.ast("main.spx").unwrap();
    assert_eq!(before.shadow_entry.as_ref().unwrap().body.list.len(), 1);

    proj.put_file("main.spx", file("echo 1\necho 2"));

    let after = proj.ast("main.spx").unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(after.shadow_entry.as_ref().unwrap().body.list.len(), 2);
}

#[test]
fn unrelated_file_scope_entries_survive_a_mutation() {
    let proj = two_file_project();
    let bar = proj.ast("bar.spx").unwrap();
    let doc = proj.pkg_doc().unwrap();

    proj.put_file("main.spx", file("echo 300"));

    // Editing one file reparses only that file; the project-scope doc index
    // is rebuilt on next access.
    assert!(Arc::ptr_eq(&bar, &proj.ast("bar.spx").unwrap()));
    assert!(!Arc::ptr_eq(&doc, &proj.pkg_doc().unwrap()));
}

#[test]
fn empty_project_grows_one_file_at_a_time() {
    let proj = Project::new(None, InitialFiles::Empty, Features::ALL);
    proj.put_file("main.gop", file("echo 100"));

    let ast = proj.ast("main.gop").unwrap();
    assert_eq!(ast.shadow_entry.as_ref().unwrap().body.list.len(), 1);

    let parsed = proj.ast_files().unwrap();
    assert_eq!(parsed.len(), 1);

    let info = proj.type_info().unwrap();
    assert!(info.is_ok(), "diagnostics: {:?}", info.diagnostics());
    assert!(info.package().scope().lookup("main").is_some());

    let snap_info = proj.snapshot().type_info().unwrap();
    assert!(Arc::ptr_eq(&info, &snap_info));

    assert_eq!(
        proj.cache("unknown").unwrap_err(),
        ProjectError::UnknownKind
    );

    proj.range_file_contents(|path, f| {
        assert_eq!(path, "main.gop");
        assert_eq!(f.content(), b"echo 100");
        true
    });
}

#[test]
fn lazy_initial_files_load_once_on_first_access() {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loads);
    let proj = Project::new(
        None,
        InitialFiles::lazy(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            files(&[("main.spx", "echo 100")])
        }),
        Features::ALL,
    );
    assert_eq!(loads.load(Ordering::SeqCst), 0);

    let ast = proj.ast("main.spx").unwrap();
    assert_eq!(ast.shadow_entry.as_ref().unwrap().body.list.len(), 1);
    assert_eq!(loads.load(Ordering::SeqCst), 1);

    let _ = proj.ast_files().unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 1);

    assert_eq!(
        proj.file_cache("unknown", "main.spx").unwrap_err(),
        ProjectError::UnknownKind
    );
}

#[test]
fn parse_errors_propagate_and_are_shared_with_snapshots() {
    let proj = Project::new(None, files(&[("main.spx", "100_err")]), Features::ALL);

    let err = proj.ast("main.spx").unwrap_err();
    assert!(matches!(err, ProjectError::Parse(_)), "got {err:?}");

    let snap_err = proj.snapshot().ast("main.spx").unwrap_err();
    assert_eq!(err, snap_err);

    assert!(proj.ast_files().is_err());
    assert!(proj.ast_package().is_err());

    // Fixing the file clears the parse error; the class file still records
    // type diagnostics because no game framework importer is configured.
    proj.put_file("main.spx", file("echo 100"));
    let info = proj.type_info().unwrap();
    assert!(!info.is_ok());
}

#[test]
fn feature_gating_short_circuits_every_kind() {
    let proj = Project::new(None, files(&[("main.spx", "echo 100")]), Features::NONE);

    assert_eq!(
        proj.type_info().unwrap_err(),
        ProjectError::UnknownKind
    );
    assert_eq!(proj.pkg_doc().unwrap_err(), ProjectError::UnknownKind);
    assert_eq!(
        proj.file_cache(KIND_AST, "main.spx").unwrap_err(),
        ProjectError::UnknownKind
    );

    // The merged-package accessor reports the condition by message only.
    let err = proj.ast_package().unwrap_err();
    assert!(!err.is_unknown_kind());
    assert_eq!(err.to_string(), "unknown kind");
}

#[test]
fn wrong_scope_accessor_is_an_unknown_kind() {
    let proj = two_file_project();
    assert_eq!(proj.cache(KIND_AST).unwrap_err(), ProjectError::UnknownKind);
    assert_eq!(
        proj.file_cache("astpkg", "main.spx").unwrap_err(),
        ProjectError::UnknownKind
    );
}

fn registry_with_counting_kind(
    builds: Arc<AtomicUsize>,
    delay_ms: u64,
) -> KindRegistry {
    let mut registry = default_registry();
    registry.register(
        "word-count",
        KindScope::File,
        Features::bit(8),
        Arc::new(move |view: spx_project::ProjectView<'_>, path: &str| {
            builds.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(delay_ms));
            let file = view.get_file(path)?;
            let words = file
                .content()
                .split(|b| b.is_ascii_whitespace())
                .filter(|w| !w.is_empty())
                .count();
            Ok(Arc::new(words) as Artifact)
        }),
    );
    registry
}

#[test]
fn concurrent_requests_share_a_single_build() {
    let builds = Arc::new(AtomicUsize::new(0));
    let registry = registry_with_counting_kind(Arc::clone(&builds), 25);
    let proj = Arc::new(Project::new(
        Some(registry),
        files(&[("main.spx", "echo 100")]),
        Features::ALL,
    ));

    let readers = 8;
    let barrier = Arc::new(Barrier::new(readers));
    let mut handles = Vec::with_capacity(readers);
    for _ in 0..readers {
        let proj = Arc::clone(&proj);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            proj.file_cache("word-count", "main.spx").unwrap()
        }));
    }

    let results: Vec<Artifact> = handles
        .into_iter()
        .map(|h| h.join().expect("reader panicked"))
        .collect();

    assert_eq!(builds.load(Ordering::SeqCst), 1, "single-flight build");
    for other in &results[1..] {
        assert!(Arc::ptr_eq(&results[0], other));
    }
}

#[test]
fn builder_errors_are_cached_until_the_file_changes() {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&builds);
    let mut registry = default_registry();
    registry.register(
        "flaky",
        KindScope::File,
        Features::bit(9),
        Arc::new(move |_view: spx_project::ProjectView<'_>, path: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(ProjectError::build(format!("cannot derive {path}")))
        }),
    );
    let proj = Project::new(
        Some(registry),
        files(&[("main.spx", "echo 100")]),
        Features::ALL,
    );

    let first = proj.file_cache("flaky", "main.spx").unwrap_err();
    let second = proj.file_cache("flaky", "main.spx").unwrap_err();
    assert_eq!(first, second);
    assert_eq!(builds.load(Ordering::SeqCst), 1);

    proj.put_file("main.spx", file("echo 200"));
    let _ = proj.file_cache("flaky", "main.spx").unwrap_err();
    assert_eq!(builds.load(Ordering::SeqCst), 2);
}

#[test]
fn mutating_a_snapshot_never_reaches_the_live_project() {
    let proj = two_file_project();
    let snap = proj.snapshot();

    snap.put_file("extra.spx", file("echo 1"));
    snap.delete_file("bar.spx").unwrap();

    assert_eq!(snap.file_count(), 2);
    assert_eq!(proj.file_count(), 2);
    assert!(!proj.contains_file("extra.spx"));
    assert!(proj.contains_file("bar.spx"));
}

#[test]
fn mutations_bump_the_generation_once_each() {
    let proj = two_file_project();
    let g0 = proj.generation();

    proj.put_file("a.spx", file("echo 1"));
    assert_eq!(proj.generation(), g0 + 1);

    proj.rename_file("a.spx", "b.spx").unwrap();
    assert_eq!(proj.generation(), g0 + 2);

    proj.delete_file("b.spx").unwrap();
    assert_eq!(proj.generation(), g0 + 3);

    // Failed mutations leave the generation alone.
    assert!(proj.delete_file("b.spx").is_err());
    assert_eq!(proj.generation(), g0 + 3);

    let snap = proj.snapshot();
    assert_eq!(snap.generation(), proj.generation());
    proj.put_file("c.spx", file("echo 1"));
    assert_eq!(snap.generation(), g0 + 3, "snapshot generation is frozen");
}

#[test]
fn range_files_stops_when_the_visitor_says_so() {
    let proj = two_file_project();
    let mut visited = 0;
    proj.range_files(|_| {
        visited += 1;
        false
    });
    assert_eq!(visited, 1);
}

#[test]
fn range_ast_files_visits_in_path_order() {
    let proj = Project::new(
        None,
        files(&[
            ("c.spx", "echo 3"),
            ("a.spx", "echo 1"),
            ("b.spx", "echo 2"),
        ]),
        Features::ALL,
    );

    let mut order = Vec::new();
    proj.range_ast_files(|path, _| {
        order.push(path.to_string());
        true
    })
    .unwrap();
    assert_eq!(order, vec!["a.spx", "b.spx", "c.spx"]);
}

#[test]
fn non_source_files_are_stored_but_not_merged() {
    let proj = Project::new(
        None,
        files(&[("main.spx", "echo 1"), ("sprite.json", "{}")]),
        Features::ALL,
    );

    assert_eq!(proj.file_count(), 2);
    let pkg = proj.ast_package().unwrap();
    assert_eq!(pkg.files.len(), 1);
    assert!(pkg.files.contains_key("main.spx"));
}

#[test]
fn replacing_a_file_keeps_handle_identity_semantics() {
    let proj = two_file_project();
    let original = proj.get_file("main.spx").unwrap();

    proj.put_file("main.spx", file("echo 100"));
    let replaced = proj.get_file("main.spx").unwrap();

    // Same bytes, different file.
    assert_eq!(original.content(), replaced.content());
    assert!(!same_file(&original, &replaced));
}
