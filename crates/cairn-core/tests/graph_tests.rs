mod common;

use std::fs;

use cairn_core::{
    code_graph::{index_project, parse_package, IndexOptions},
    db::graph_queries::PackageGraphUpdate,
    models::{CodeEntity, CodeEntityKind, CodeRelationKind},
    params::ParsePackage,
    Deadline,
};
use common::{create_test_project, rewrite_at, write_package};

const MAIN_TS: &str = r#"import { helper } from "./util";

export function foo() {
  return bar();
}

function bar() {
  return helper();
}
"#;

const UTIL_TS: &str = "export function helper() {\n  return 42;\n}\n";

fn names(entities: &[CodeEntity]) -> Vec<&str> {
    entities.iter().map(|e| e.name.as_str()).collect()
}

#[test]
fn test_index_resolves_calls_across_files() {
    let (root, mut db) = create_test_project();
    write_package(
        root.path(),
        "app",
        &[("src/main.ts", MAIN_TS), ("src/util.ts", UTIL_TS)],
    );

    let run = index_project(&mut db, root.path(), IndexOptions::default(), &Deadline::none())
        .expect("Failed to index");
    assert_eq!(run.report.packages, 1);
    assert_eq!(run.report.changed_files, 2);
    assert!(run.report.skipped_packages.is_empty());

    assert_eq!(names(&db.what_calls("bar").unwrap()), vec!["foo"]);
    assert_eq!(names(&db.what_calls("helper").unwrap()), vec!["bar"]);

    let exports = db.exports("src/util.ts").unwrap();
    assert!(names(&exports).contains(&"helper"));

    let importers = db.what_depends_on("src/util.ts").unwrap();
    assert_eq!(importers.len(), 1);
    assert_eq!(importers[0].file_path, "src/main.ts");

    let callers = db.callers("helper", 5, 50, &Deadline::none()).unwrap();
    let depths: Vec<(&str, u32)> = callers
        .iter()
        .map(|d| (d.entity.name.as_str(), d.depth))
        .collect();
    assert!(depths.contains(&("bar", 1)));
    assert!(depths.contains(&("foo", 2)));
}

#[test]
fn test_reindexing_unchanged_project_is_idempotent() {
    let (root, mut db) = create_test_project();
    write_package(
        root.path(),
        "app",
        &[("src/main.ts", MAIN_TS), ("src/util.ts", UTIL_TS)],
    );

    index_project(&mut db, root.path(), IndexOptions::default(), &Deadline::none()).unwrap();
    let before = db.graph_summary().unwrap();

    let run =
        index_project(&mut db, root.path(), IndexOptions::default(), &Deadline::none()).unwrap();
    assert_eq!(run.report.changed_files, 0);
    assert_eq!(run.report.unchanged_files, 2);
    assert_eq!(db.graph_summary().unwrap(), before);

    // A full re-index rebuilds the same graph.
    let run = index_project(
        &mut db,
        root.path(),
        IndexOptions {
            full: true,
            ..Default::default()
        },
        &Deadline::none(),
    )
    .unwrap();
    assert_eq!(run.report.changed_files, 2);
    assert_eq!(db.graph_summary().unwrap(), before);

    let foo = CodeEntity::make_id("app", "src/main.ts", CodeEntityKind::Function, "foo");
    let bar = CodeEntity::make_id("app", "src/main.ts", CodeEntityKind::Function, "bar");
    assert_eq!(
        db.count_code_relationships(&foo, &bar, CodeRelationKind::Calls)
            .unwrap(),
        1
    );
}

#[test]
fn test_deleted_file_drops_entities_and_edges() {
    let (root, mut db) = create_test_project();
    write_package(
        root.path(),
        "app",
        &[("src/main.ts", MAIN_TS), ("src/util.ts", UTIL_TS)],
    );
    index_project(&mut db, root.path(), IndexOptions::default(), &Deadline::none()).unwrap();

    let main_file = CodeEntity::file_id("app", "src/main.ts");
    let util_file = CodeEntity::file_id("app", "src/util.ts");
    assert_eq!(
        db.count_code_relationships(&main_file, &util_file, CodeRelationKind::Imports)
            .unwrap(),
        1
    );

    fs::remove_file(root.path().join("app/src/util.ts")).unwrap();
    let run =
        index_project(&mut db, root.path(), IndexOptions::default(), &Deadline::none()).unwrap();
    assert_eq!(run.report.deleted_files, 1);

    assert!(db.exports("src/util.ts").unwrap().is_empty());
    assert!(db.code_entity(&util_file).unwrap().is_none());
    assert_eq!(
        db.count_code_relationships(&main_file, &util_file, CodeRelationKind::Imports)
            .unwrap(),
        0
    );
    assert!(!db.file_metadata("app").unwrap().contains_key("src/util.ts"));
}

#[test]
fn test_new_definition_repoints_external_calls() {
    let (root, mut db) = create_test_project();
    write_package(
        root.path(),
        "app",
        &[("src/main.ts", "export function run() {\n  return later();\n}\n")],
    );
    index_project(&mut db, root.path(), IndexOptions::default(), &Deadline::none()).unwrap();

    let run_id = CodeEntity::make_id("app", "src/main.ts", CodeEntityKind::Function, "run");
    assert_eq!(
        db.count_code_relationships(&run_id, "ext:later", CodeRelationKind::Calls)
            .unwrap(),
        1
    );

    fs::write(
        root.path().join("app/src/later.ts"),
        "export function later() {\n  return 1;\n}\n",
    )
    .unwrap();
    let run =
        index_project(&mut db, root.path(), IndexOptions::default(), &Deadline::none()).unwrap();
    assert_eq!(run.report.changed_files, 1);

    let later_id = CodeEntity::make_id("app", "src/later.ts", CodeEntityKind::Function, "later");
    assert_eq!(
        db.count_code_relationships(&run_id, "ext:later", CodeRelationKind::Calls)
            .unwrap(),
        0
    );
    assert_eq!(
        db.count_code_relationships(&run_id, &later_id, CodeRelationKind::Calls)
            .unwrap(),
        1
    );
    assert_eq!(names(&db.what_calls("later").unwrap()), vec!["run"]);
}

#[test]
fn test_renamed_symbol_reconnects_callers_when_restored() {
    let (root, mut db) = create_test_project();
    write_package(
        root.path(),
        "app",
        &[("src/main.ts", MAIN_TS), ("src/util.ts", UTIL_TS)],
    );
    let util_path = root.path().join("app/src/util.ts");
    rewrite_at(&util_path, UTIL_TS, 1_000);
    index_project(&mut db, root.path(), IndexOptions::default(), &Deadline::none()).unwrap();

    let bar = CodeEntity::make_id("app", "src/main.ts", CodeEntityKind::Function, "bar");
    let helper = CodeEntity::make_id("app", "src/util.ts", CodeEntityKind::Function, "helper");
    assert_eq!(
        db.count_code_relationships(&bar, &helper, CodeRelationKind::Calls)
            .unwrap(),
        1
    );

    // main.ts is untouched; its call to helper falls back to an external edge.
    rewrite_at(&util_path, &UTIL_TS.replace("helper", "helper2"), 2_000);
    let run =
        index_project(&mut db, root.path(), IndexOptions::default(), &Deadline::none()).unwrap();
    assert_eq!(run.report.changed_files, 1);
    assert_eq!(
        db.count_code_relationships(&bar, &helper, CodeRelationKind::Calls)
            .unwrap(),
        0
    );
    assert_eq!(
        db.count_code_relationships(&bar, "ext:helper", CodeRelationKind::Calls)
            .unwrap(),
        1
    );

    rewrite_at(&util_path, UTIL_TS, 3_000);
    index_project(&mut db, root.path(), IndexOptions::default(), &Deadline::none()).unwrap();
    assert_eq!(
        db.count_code_relationships(&bar, &helper, CodeRelationKind::Calls)
            .unwrap(),
        1
    );
    assert_eq!(
        db.count_code_relationships(&bar, "ext:helper", CodeRelationKind::Calls)
            .unwrap(),
        0
    );
    assert_eq!(names(&db.what_calls("helper").unwrap()), vec!["bar"]);
    let incremental = db.graph_summary().unwrap();

    // A full rebuild of the restored tree agrees with the incremental result.
    index_project(
        &mut db,
        root.path(),
        IndexOptions {
            full: true,
            ..Default::default()
        },
        &Deadline::none(),
    )
    .unwrap();
    assert_eq!(db.graph_summary().unwrap(), incremental);
    assert_eq!(
        db.count_code_relationships(&bar, &helper, CodeRelationKind::Calls)
            .unwrap(),
        1
    );
}

#[test]
fn test_calls_across_packages_survive_removal_and_restore() {
    let (root, mut db) = create_test_project();
    write_package(
        root.path(),
        "app",
        &[("main.ts", "export function run() {\n  return shared();\n}\n")],
    );
    let shared_src = "export function shared() {\n  return 1;\n}\n";
    write_package(root.path(), "lib", &[("index.ts", shared_src)]);
    let lib_path = root.path().join("lib/index.ts");
    rewrite_at(&lib_path, shared_src, 1_000);
    index_project(&mut db, root.path(), IndexOptions::default(), &Deadline::none()).unwrap();

    // `app` is stored before `lib`, so its call starts external and is
    // re-pointed once `lib` defines the symbol.
    let run_id = CodeEntity::make_id("app", "main.ts", CodeEntityKind::Function, "run");
    let shared = CodeEntity::make_id("lib", "index.ts", CodeEntityKind::Function, "shared");
    assert_eq!(
        db.count_code_relationships(&run_id, &shared, CodeRelationKind::Calls)
            .unwrap(),
        1
    );

    rewrite_at(&lib_path, "export const other = 2;\n", 2_000);
    index_project(&mut db, root.path(), IndexOptions::default(), &Deadline::none()).unwrap();
    assert_eq!(
        db.count_code_relationships(&run_id, "ext:shared", CodeRelationKind::Calls)
            .unwrap(),
        1
    );

    rewrite_at(&lib_path, shared_src, 3_000);
    index_project(&mut db, root.path(), IndexOptions::default(), &Deadline::none()).unwrap();
    assert_eq!(
        db.count_code_relationships(&run_id, &shared, CodeRelationKind::Calls)
            .unwrap(),
        1
    );
    assert_eq!(names(&db.what_calls("shared").unwrap()), vec!["run"]);
}

#[test]
fn test_vanished_package_is_removed() {
    let (root, mut db) = create_test_project();
    write_package(root.path(), "app", &[("index.ts", "export const a = 1;\n")]);
    write_package(root.path(), "lib", &[("index.ts", "export const b = 2;\n")]);
    index_project(&mut db, root.path(), IndexOptions::default(), &Deadline::none()).unwrap();
    assert_eq!(db.indexed_packages().unwrap(), vec!["app", "lib"]);

    fs::remove_dir_all(root.path().join("lib")).unwrap();
    index_project(&mut db, root.path(), IndexOptions::default(), &Deadline::none()).unwrap();
    assert_eq!(db.indexed_packages().unwrap(), vec!["app"]);
}

#[test]
fn test_failed_store_keeps_prior_graph() {
    let (root, mut db) = create_test_project();
    write_package(
        root.path(),
        "app",
        &[("src/main.ts", MAIN_TS), ("src/util.ts", UTIL_TS)],
    );
    index_project(&mut db, root.path(), IndexOptions::default(), &Deadline::none()).unwrap();
    let before = db.graph_summary().unwrap();

    let duplicate = CodeEntity::new("app", "src/main.ts", "foo", CodeEntityKind::Function, 3);
    let err = db
        .store_package_graph(&PackageGraphUpdate {
            package: "app".to_string(),
            replaced_files: vec!["src/main.ts".to_string()],
            entities: vec![duplicate.clone(), duplicate],
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, cairn_core::CairnError::Database { .. }));

    assert_eq!(db.graph_summary().unwrap(), before);
    assert_eq!(names(&db.what_calls("bar").unwrap()), vec!["foo"]);
}

#[test]
fn test_parse_package_does_not_touch_database() {
    let (root, db) = create_test_project();
    write_package(
        root.path(),
        "app",
        &[("src/main.ts", MAIN_TS), ("src/util.ts", UTIL_TS)],
    );

    let parsed = parse_package(&ParsePackage {
        path: root.path().join("app"),
        name: "app".to_string(),
        files: Some(vec!["./src/util.ts".to_string()]),
    })
    .expect("Failed to parse package");
    let stats = parsed.stats.expect("Stats should be set");
    assert_eq!(stats.files_parsed, 1);
    assert!(stats.errors.is_empty());
    assert!(parsed
        .entities
        .iter()
        .any(|e| e.name == "helper" && e.exported));

    assert!(db.graph_summary().unwrap().is_empty());
}
