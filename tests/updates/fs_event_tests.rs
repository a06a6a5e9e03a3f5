//! Filesystem events against the reference project

use std::path::PathBuf;

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::EventKind;
use root_index::{DirectoryInfo, FsEvent, ModuleId, MutationBatch, SourceRootType};

use crate::common::*;

#[test]
fn test_create_directory_inside_source() {
    let project = ReferenceProject::new();
    let created = project.create_dir("module1/src1/pack1/sub");

    check_info(
        "module1/src1/pack1/sub",
        &project.index.info_for_file(&created).unwrap(),
        Expected {
            package: Some("pack1.sub"),
            source_root_type: Some(SourceRootType::Source),
            modules_seeing: &["module1"],
            ..Expected::module("module1")
        },
    );
    check_package(&project.index, "pack1.sub", false, &[created]);
    assert_consistent(&project.index);
}

#[test]
fn test_create_missing_ancestors() {
    let project = ReferenceProject::new();
    let outcome = project
        .index
        .apply_one(FsEvent::create_file(p("module1/src1/a/b/C.java")))
        .unwrap();
    assert_eq!(outcome.affected, vec![p("module1/src1/a")]);

    assert!(project.info("module1/src1/a").is_directory());
    assert!(!project.info("module1/src1/a/b/C.java").is_directory());
    assert_eq!(project.info("module1/src1/a/b").package_name.as_deref(), Some("a.b"));
    assert_eq!(project.info("module1/src1/a/b/C.java").package_name, None);
    assert!(project.info("module1/src1/a/b/C.java").is_in_source());
}

#[test]
fn test_delete_directory() {
    let project = ReferenceProject::new();
    project.delete("module1/src1/pack1");

    assert_eq!(*project.info("module1/src1/pack1"), DirectoryInfo::not_in_project());
    check_package(&project.index, "pack1", true, &[]);
    // the source root itself is untouched
    assert!(project.info("module1/src1").is_in_source());
    assert_consistent(&project.index);
}

#[test]
fn test_delete_twice_is_a_noop() {
    let project = ReferenceProject::new();
    let first = project
        .index
        .apply_one(FsEvent::delete(p("module1/src1/pack1")))
        .unwrap();
    assert_eq!(first.affected, vec![p("module1/src1/pack1")]);

    let second = project
        .index
        .apply_one(FsEvent::delete(p("module1/src1/pack1")))
        .unwrap();
    assert!(second.affected.is_empty());
    assert_eq!(second.generation, first.generation + 1);
}

#[test]
fn test_duplicate_create_is_a_noop() {
    let project = ReferenceProject::new();
    let outcome = project
        .index
        .apply_one(FsEvent::create_dir(p("module1/src1/pack1")))
        .unwrap();
    assert!(outcome.affected.is_empty());
}

#[test]
fn test_rename_directory_inside_source() {
    let project = ReferenceProject::new();
    project
        .index
        .apply_one(FsEvent::renamed(p("module1/src1/pack1"), "pack3"))
        .unwrap();

    assert!(!project.info("module1/src1/pack1").is_present());
    assert_eq!(project.info("module1/src1/pack3").package_name.as_deref(), Some("pack3"));
    check_package(&project.index, "pack1", true, &[]);
    check_package(&project.index, "pack3", true, &[p("module1/src1/pack3")]);
}

#[test]
fn test_move_directory_between_source_roots() {
    let project = ReferenceProject::new();
    project.create_dir("module1/src1/pack1/inner");
    project
        .index
        .apply_one(FsEvent::moved(p("module1/src1/pack1"), p("module1/module2/src2/pack1")))
        .unwrap();

    check_info(
        "module1/module2/src2/pack1/inner",
        &project.info("module1/module2/src2/pack1/inner"),
        Expected {
            package: Some("pack1.inner"),
            source_root_type: Some(SourceRootType::Source),
            modules_seeing: &["module2", "module3"],
            ..Expected::module("module2")
        },
    );
    check_package(&project.index, "pack1", true, &[p("module1/module2/src2/pack1")]);
    assert_consistent(&project.index);
}

#[test]
fn test_move_into_new_nested_directory_creates_parents() {
    let project = ReferenceProject::new();
    check_package(&project.index, "pack1", true, &[p("module1/src1/pack1")]);
    assert!(!project.info("module1/src1/p").is_present());

    let outcome = project
        .index
        .apply_one(FsEvent::moved(p("module1/src1/pack1"), p("module1/src1/p/q")))
        .unwrap();
    assert_eq!(outcome.affected, vec![p("module1/src1/p"), p("module1/src1/pack1")]);

    let parent = project.info("module1/src1/p");
    assert!(parent.is_present());
    assert!(parent.is_directory());
    assert_eq!(parent.package_name.as_deref(), Some("p"));
    assert_eq!(project.index.children_under(&p("module1/src1/p")).unwrap(), vec![p("module1/src1/p/q")]);
    check_package(&project.index, "p", true, &[p("module1/src1/p")]);
    check_package(&project.index, "p.q", true, &[p("module1/src1/p/q")]);
    check_package(&project.index, "pack1", true, &[]);
    assert_consistent(&project.index);
}

#[test]
fn test_move_into_absent_directory_outside_content() {
    let ws = Workspace::new("/r").dirs(&["a"]);
    assert!(!ws.info("x").is_present());

    ws.index.apply_one(FsEvent::moved("/r/a", "/r/x/y")).unwrap();
    assert!(ws.info("x").is_present());
    assert!(ws.info("x/y").is_present());
    assert!(!ws.info("a").is_present());
    ws.index.check_consistency(&ws.path("x")).unwrap();
    assert_consistent(&ws.index);
}

#[test]
fn test_move_content_root_away_and_back() {
    let project = ReferenceProject::new();
    project.create_dir("module3/src");

    project
        .index
        .apply_one(FsEvent::moved(p("module3"), p("moved3")))
        .unwrap();
    assert!(!project.info("module3").is_present());
    assert!(!project.info("moved3").is_in_project());
    assert!(!project.info("moved3/src").is_in_project());

    project
        .index
        .apply_one(FsEvent::moved(p("moved3"), p("module3")))
        .unwrap();
    check_info("module3", &project.info("module3"), Expected::module("module3"));
    check_info("module3/src", &project.info("module3/src"), Expected::module("module3"));
}

#[test]
fn test_rename_content_root_away_and_back() {
    let project = ReferenceProject::new();
    project
        .index
        .apply_one(FsEvent::renamed(p("module1/module2"), "renamed"))
        .unwrap();

    // the old tree now belongs to module1 under its new name
    let renamed = project.info("module1/renamed/src2");
    assert_eq!(renamed.module, Some(ModuleId::from("module1")));
    assert!(!renamed.is_in_source());
    // module2's exclude root no longer applies
    assert!(project.info("module1/renamed/src2/excluded").is_in_content());

    project
        .index
        .apply_one(FsEvent::renamed(p("module1/renamed"), "module2"))
        .unwrap();
    assert_excluded(
        "module1/module2/src2/excluded",
        &project.info("module1/module2/src2/excluded"),
        "module2",
    );
    assert!(project.info("module1/module2/src2").is_in_source());
}

#[test]
fn test_replacing_directory_with_file() {
    let project = ReferenceProject::new();
    project.create_file("module1/src1/pack1");

    let info = project.info("module1/src1/pack1");
    assert!(!info.is_directory());
    assert!(info.is_in_source());
    assert_eq!(info.package_name, None);
    check_package(&project.index, "pack1", true, &[]);
}

fn with_file_content_root() -> ReferenceProject {
    let project = ReferenceProject::new();
    project.create_file("content.txt");
    project.apply(
        MutationBatch::new()
            .add_module("fileModule")
            .add_content_root("fileModule", p("content.txt")),
    );
    project
}

#[test]
fn test_file_content_root_modifications() {
    let project = with_file_content_root();
    let info = project.info("content.txt");
    assert_eq!(info.module, Some(ModuleId::from("fileModule")));
    assert!(info.is_in_content());
    assert!(!info.is_directory());

    project.delete("content.txt");
    assert!(!project.info("content.txt").is_in_project());

    project.create_file("content.txt");
    assert!(project.info("content.txt").is_in_content());

    project.create_dir("dir");
    project
        .index
        .apply_one(FsEvent::moved(p("content.txt"), p("dir/content.txt")))
        .unwrap();
    assert!(!project.info("dir/content.txt").is_in_project());
    assert!(!project.info("content.txt").is_present());

    project
        .index
        .apply_one(FsEvent::moved(p("dir/content.txt"), p("content.txt")))
        .unwrap();
    assert!(project.info("content.txt").is_in_content());

    project
        .index
        .apply_one(FsEvent::renamed(p("content.txt"), "renamed.txt"))
        .unwrap();
    assert!(!project.info("renamed.txt").is_in_project());
    project
        .index
        .apply_one(FsEvent::renamed(p("renamed.txt"), "content.txt"))
        .unwrap();
    assert!(project.info("content.txt").is_in_content());
}

#[test]
fn test_file_content_and_source_root() {
    let project = with_file_content_root();
    project.apply(MutationBatch::new().add_source_root(
        "fileModule",
        p("content.txt"),
        SourceRootType::Source,
    ));

    let info = project.info("content.txt");
    assert!(info.is_in_source());
    assert_eq!(info.source_root, Some(p("content.txt")));
    assert_eq!(info.source_root_type, Some(SourceRootType::Source));
    assert_eq!(info.package_name, None);
    assert_eq!(info.order_entry_modules(), vec![ModuleId::from("fileModule")]);

    project.delete("content.txt");
    project.create_file("content.txt");
    assert!(project.info("content.txt").is_in_source());
}

#[test]
fn test_file_exclude_root() {
    let project = ReferenceProject::new();
    project.create_file("module1/excluded.txt");
    project.create_file("module1/src1/Excluded.java");
    project.apply(
        MutationBatch::new()
            .add_exclude_root("module1", p("module1/excluded.txt"))
            .add_exclude_root("module1", p("module1/src1/Excluded.java")),
    );

    assert_excluded("module1/excluded.txt", &project.info("module1/excluded.txt"), "module1");
    assert_excluded(
        "module1/src1/Excluded.java",
        &project.info("module1/src1/Excluded.java"),
        "module1",
    );

    project.delete("module1/excluded.txt");
    project.create_file("module1/excluded.txt");
    assert_excluded("module1/excluded.txt", &project.info("module1/excluded.txt"), "module1");

    let visited = content_paths(&project.index);
    assert_iterated(
        &visited,
        &[p("module1/src1")],
        &[p("module1/excluded.txt"), p("module1/src1/Excluded.java")],
    );
}

#[test]
fn test_batch_of_events_applies_in_order() {
    let project = ReferenceProject::new();
    project
        .index
        .apply_events([
            FsEvent::create_dir(p("module1/src1/tmp/a")),
            FsEvent::renamed(p("module1/src1/tmp"), "kept"),
            FsEvent::delete(p("module1/src1/kept/a")),
            FsEvent::create_dir(p("module1/src1/kept/b")),
        ])
        .unwrap();

    assert!(!project.info("module1/src1/tmp").is_present());
    assert!(!project.info("module1/src1/kept/a").is_present());
    assert_eq!(project.info("module1/src1/kept/b").package_name.as_deref(), Some("kept.b"));
    assert_consistent(&project.index);
}

#[test]
fn test_notify_events_drive_the_index() {
    let project = ReferenceProject::new();

    let create = notify::Event::new(EventKind::Create(CreateKind::Folder))
        .add_path(p("module1/src1/watched"));
    project
        .index
        .apply_events(FsEvent::from_notify(&create))
        .unwrap();
    assert_eq!(project.info("module1/src1/watched").package_name.as_deref(), Some("watched"));

    let rename = notify::Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
        .add_path(p("module1/src1/watched"))
        .add_path(p("module1/src1/seen"));
    project
        .index
        .apply_events(FsEvent::from_notify(&rename))
        .unwrap();
    assert!(!project.info("module1/src1/watched").is_present());
    assert_eq!(project.info("module1/src1/seen").package_name.as_deref(), Some("seen"));

    let remove = notify::Event::new(EventKind::Remove(RemoveKind::Folder))
        .add_path(p("module1/src1/seen"));
    project
        .index
        .apply_events(FsEvent::from_notify(&remove))
        .unwrap();
    assert!(!project.info("module1/src1/seen").is_present());

    // access and metadata events carry no structural change
    let access = notify::Event::new(EventKind::Access(notify::event::AccessKind::Any))
        .add_path(p("module1/src1"));
    assert!(FsEvent::from_notify(&access).is_empty());
}

#[test]
fn test_refresh_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::create_dir_all(root.join("m1/src/pkg/sub")).unwrap();
    std::fs::create_dir_all(root.join("m1/CVS")).unwrap();
    std::fs::write(root.join("m1/src/pkg/A.java"), "class A {}").unwrap();

    let index = root_index::DirectoryIndex::with_defaults(root).unwrap();
    let outcome = index.refresh_from_disk(root).unwrap();
    assert!(!outcome.affected.is_empty());

    index
        .apply(
            MutationBatch::new()
                .add_module("m1")
                .add_content_root("m1", root.join("m1"))
                .add_source_root("m1", root.join("m1/src"), SourceRootType::Source),
        )
        .unwrap();

    assert_eq!(
        index.package_name(&root.join("m1/src/pkg/sub")).unwrap().as_deref(),
        Some("pkg.sub")
    );
    assert!(index.is_in_source(&root.join("m1/src/pkg/A.java")).unwrap());
    assert!(index.is_under_ignored(&root.join("m1/CVS")).unwrap());

    // entries added on disk later show up after another refresh
    std::fs::create_dir_all(root.join("m1/src/pkg/later")).unwrap();
    assert!(!index.info_for_file(&root.join("m1/src/pkg/later")).unwrap().is_present());
    index.refresh_from_disk(&root.join("m1/src")).unwrap();
    assert_eq!(
        index.package_name(&root.join("m1/src/pkg/later")).unwrap().as_deref(),
        Some("pkg.later")
    );
}

#[test]
fn test_refresh_from_disk_rejects_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let index = root_index::DirectoryIndex::with_defaults(dir.path()).unwrap();
    let missing: PathBuf = dir.path().join("missing");
    let err = index.refresh_from_disk(&missing).unwrap_err();
    assert!(err.is_programmer_error());
}
