//! End-to-end scenarios on small layouts

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use root_index::{
    Dependency, DirectoryInfo, ExclusionReason, FsEvent, Library, ModuleId, Mutation,
    MutationBatch, SourceRootType,
};

use crate::common::*;

#[test]
fn test_source_root_package_and_type() {
    let ws = Workspace::new("/ws").dirs(&["m1/src/pkg1"]).roots(
        MutationBatch::new()
            .add_module("m1")
            .add_content_root("m1", "/ws/m1")
            .add_source_root("m1", "/ws/m1/src", SourceRootType::Source),
    );

    let info = ws.info("m1/src/pkg1");
    assert_eq!(info.module, Some(ModuleId::from("m1")));
    assert_eq!(info.source_root_type, Some(SourceRootType::Source));
    assert_eq!(info.package_name.as_deref(), Some("pkg1"));
    assert!(ws.index.is_in_source(&ws.path("m1/src/pkg1")).unwrap());
    assert!(ws.index.is_in_content(&ws.path("m1")).unwrap());
    assert!(!ws.index.is_in_source(&ws.path("m1")).unwrap());
}

#[test]
fn test_exclude_pattern_applies_to_names_at_any_depth() {
    let ws = Workspace::new("/ws")
        .dirs(&["m1/dir"])
        .files(&["m1/a.txt", "m1/dir/a.txt", "m1/A.java", "m1/dir/A.java"])
        .roots(
            MutationBatch::new()
                .add_module("m1")
                .add_content_root("m1", "/ws/m1")
                .with(Mutation::SetExcludePatterns {
                    module: ModuleId::from("m1"),
                    content_root: PathBuf::from("/ws/m1"),
                    patterns: vec!["*.txt".to_string()],
                }),
        );

    for excluded in ["m1/a.txt", "m1/dir/a.txt"] {
        let info = ws.info(excluded);
        assert!(info.is_excluded(), "{} should be excluded", excluded);
        assert_eq!(info.exclusion, Some(ExclusionReason::Pattern));
    }
    for content in ["m1/A.java", "m1/dir/A.java", "m1/dir"] {
        assert!(!ws.info(content).is_excluded(), "{} should not be excluded", content);
    }

    let visited = content_paths(&ws.index);
    assert_iterated(
        &visited,
        &[ws.path("m1/A.java"), ws.path("m1/dir/A.java")],
        &[ws.path("m1/a.txt"), ws.path("m1/dir/a.txt")],
    );
}

#[test]
fn test_exclude_pattern_does_not_match_content_root_itself() {
    let ws = Workspace::new("/ws").dirs(&["gen.txt/inner"]).roots(
        MutationBatch::new()
            .add_module("m1")
            .add_content_root("m1", "/ws/gen.txt")
            .with(Mutation::SetExcludePatterns {
                module: ModuleId::from("m1"),
                content_root: PathBuf::from("/ws/gen.txt"),
                patterns: vec!["*.txt".to_string()],
            }),
    );
    assert!(ws.info("gen.txt").is_in_content());
    assert!(ws.info("gen.txt/inner").is_in_content());
}

#[test]
fn test_library_exclusion_and_module_exclusion_together() {
    let ws = Workspace::new("/ws").dirs(&["lib/cls", "lib/src/exc", "lib/src/pkg"]).roots(
        MutationBatch::new()
            .add_module("m")
            .add_content_root("m", "/ws/lib")
            .add_exclude_root("m", "/ws/lib/src/exc")
            .add_library(
                Library::new("l")
                    .with_classes("/ws/lib/cls")
                    .with_sources("/ws/lib/src")
                    .with_exclusion(|path, is_directory| is_directory && path.ends_with("exc")),
            )
            .add_dependency("m", Dependency::library("l")),
    );

    let exc = ws.path("lib/src/exc");
    assert!(!ws.index.is_in_library_source(&exc).unwrap());
    assert!(ws.index.is_excluded(&exc).unwrap());

    let pkg = ws.path("lib/src/pkg");
    assert!(ws.index.is_in_library_source(&pkg).unwrap());
    assert_eq!(ws.index.package_name(&pkg).unwrap().as_deref(), Some("pkg"));
}

#[test]
fn test_library_exclusion_predicate_outside_content() {
    let ws = Workspace::new("/ws").dirs(&["lib/src/exc/deep", "lib/src/ok"]).roots(
        MutationBatch::new().add_library(
            Library::new("l")
                .with_sources("/ws/lib/src")
                .with_exclusion(|path, _| path.ends_with("exc")),
        ),
    );

    let exc = ws.info("lib/src/exc");
    assert!(!exc.is_in_library_source());
    assert!(exc.is_excluded());
    assert_eq!(exc.exclusion, Some(ExclusionReason::Library));
    assert!(ws.info("lib/src/exc/deep").is_excluded());
    assert!(ws.info("lib/src/ok").is_in_project());
}

fn snapshot(ws: &Workspace, paths: &[&str]) -> BTreeMap<String, Arc<DirectoryInfo>> {
    paths
        .iter()
        .map(|path| (path.to_string(), ws.info(path)))
        .collect()
}

const TOP_TREE: &[&str] = &["top", "top/src", "top/src/pkg", "top/src/pkg/sub", "top/excluded", "top/CVS"];

fn top_workspace() -> Workspace {
    Workspace::new("/ws")
        .dirs(&["top/src/pkg/sub", "top/excluded", "top/CVS"])
        .files(&["top/src/pkg/A.java"])
        .roots(
            MutationBatch::new()
                .add_module("m1")
                .add_content_root("m1", "/ws/top")
                .add_source_root("m1", "/ws/top/src", SourceRootType::Source)
                .add_exclude_root("m1", "/ws/top/excluded"),
        )
}

#[test]
fn test_move_away_and_back_restores_classification() {
    let ws = top_workspace();
    let before = snapshot(&ws, TOP_TREE);
    assert_eq!(before["top/src/pkg/sub"].package_name.as_deref(), Some("pkg.sub"));

    ws.index
        .apply_one(FsEvent::moved("/ws/top", "/ws/top.bak"))
        .unwrap();
    for path in TOP_TREE {
        assert!(!ws.info(path).is_present(), "{} should be gone", path);
    }
    // the moved copy is outside every content root
    let moved = ws.info("top.bak/src/pkg");
    assert!(moved.is_present());
    assert!(!moved.is_in_project());
    assert_eq!(moved.package_name, None);

    ws.index
        .apply_one(FsEvent::moved("/ws/top.bak", "/ws/top"))
        .unwrap();
    assert_eq!(snapshot(&ws, TOP_TREE), before);
    assert!(ws.info("top/src/pkg/A.java").is_in_source());
    assert_consistent(&ws.index);
}

#[test]
fn test_delete_and_recreate_restores_classification() {
    let ws = top_workspace();
    let before = snapshot(&ws, TOP_TREE);

    ws.index.apply_one(FsEvent::delete("/ws/top")).unwrap();
    assert_eq!(*ws.info("top/src"), DirectoryInfo::not_in_project());

    ws.index
        .apply_events([
            FsEvent::create_dir("/ws/top/src/pkg/sub"),
            FsEvent::create_dir("/ws/top/excluded"),
            FsEvent::create_dir("/ws/top/CVS"),
        ])
        .unwrap();
    assert_eq!(snapshot(&ws, TOP_TREE), before);
}

#[test]
fn test_rename_away_and_back_restores_classification() {
    let ws = top_workspace();
    let before = snapshot(&ws, TOP_TREE);

    ws.index.apply_one(FsEvent::renamed("/ws/top", "top.bak")).unwrap();
    assert!(!ws.info("top").is_present());
    ws.index.apply_one(FsEvent::renamed("/ws/top.bak", "top")).unwrap();
    assert_eq!(snapshot(&ws, TOP_TREE), before);
}

fn unloading_workspace() -> Workspace {
    // c -> b, b -exported-> a, d -> b, e -> d
    Workspace::new("/ws")
        .dirs(&["a/src/pkg", "a/excluded", "b", "c", "d", "e"])
        .roots(
            MutationBatch::new()
                .add_module("a")
                .add_content_root("a", "/ws/a")
                .add_source_root("a", "/ws/a/src", SourceRootType::Source)
                .add_exclude_root("a", "/ws/a/excluded")
                .add_module("b")
                .add_content_root("b", "/ws/b")
                .add_module("c")
                .add_content_root("c", "/ws/c")
                .add_module("d")
                .add_content_root("d", "/ws/d")
                .add_module("e")
                .add_content_root("e", "/ws/e")
                .add_dependency("b", Dependency::module("a").exported())
                .add_dependency("c", Dependency::module("b"))
                .add_dependency("d", Dependency::module("b"))
                .add_dependency("e", Dependency::module("d")),
        )
}

#[test]
fn test_unloaded_module_reclassifies_its_content() {
    let ws = unloading_workspace();
    assert_eq!(
        ws.info("a/src/pkg").order_entry_modules(),
        vec![
            ModuleId::from("a"),
            ModuleId::from("b"),
            ModuleId::from("c"),
            ModuleId::from("d"),
        ]
    );

    ws.index
        .apply_one(Mutation::SetUnloadedModules {
            modules: vec![ModuleId::from("a")],
        })
        .unwrap();

    for path in ["a", "a/src", "a/src/pkg", "a/excluded"] {
        let info = ws.info(path);
        assert!(info.is_excluded(), "{} should be excluded", path);
        assert_eq!(info.module, None, "{} should have no module", path);
        assert_eq!(info.content_root, None);
        assert_eq!(info.unloaded_module_name.as_deref(), Some("a"), "{}", path);
        assert!(info.order_entries.is_empty());
        assert_eq!(info.package_name, None);
    }
    assert!(ws.info("b").is_in_content());
    assert_consistent(&ws.index);
}

#[test]
fn test_dependent_unloaded_modules_respect_exports() {
    let ws = unloading_workspace();
    ws.index
        .apply_one(Mutation::SetUnloadedModules {
            modules: vec![ModuleId::from("a")],
        })
        .unwrap();

    let unloaded_of = |module: &str| -> Vec<String> {
        ws.index
            .dependent_unloaded_modules(&ModuleId::from(module))
            .unwrap()
            .into_iter()
            .collect()
    };
    assert_eq!(unloaded_of("b"), vec!["a".to_string()]);
    assert_eq!(unloaded_of("c"), vec!["a".to_string()]);
    assert_eq!(unloaded_of("d"), vec!["a".to_string()]);
    // e only reaches d; d's dependency on b is not exported
    assert!(unloaded_of("e").is_empty());
    assert!(unloaded_of("a").is_empty());

    assert!(ws
        .index
        .dependent_unloaded_modules(&ModuleId::from("ghost"))
        .is_err());
}

#[test]
fn test_reloading_module_restores_content() {
    let ws = unloading_workspace();
    let before = ws.info("a/src/pkg");
    ws.index
        .apply_one(Mutation::SetUnloadedModules {
            modules: vec![ModuleId::from("a")],
        })
        .unwrap();
    ws.index
        .apply_one(Mutation::SetUnloadedModules { modules: Vec::new() })
        .unwrap();
    assert_eq!(ws.info("a/src/pkg"), before);
}
