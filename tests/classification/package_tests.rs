//! Package names and the package-to-directory index

use root_index::config::DEFAULT_IGNORED_NAMES;
use root_index::{IndexConfig, ModuleId, Mutation, MutationBatch, SourceRootType};

use crate::common::*;

#[test]
fn test_directories_by_package_name() {
    let project = ReferenceProject::new();

    check_package(
        &project.index,
        "",
        true,
        &[
            p("module1/src1"),
            p("module1/src1/testSrc"),
            p("module1/res"),
            p("module1/testRes"),
            p("module1/module2/src2"),
            p("module1/lib/src"),
            p("module1/lib/cls"),
            p("module1/additional-lib/src"),
            p("additional-lib/src"),
            p("module1/additional-lib/cls"),
            p("additional-lib/cls"),
        ],
    );
    check_package(
        &project.index,
        "",
        false,
        &[
            p("module1/src1"),
            p("module1/src1/testSrc"),
            p("module1/res"),
            p("module1/testRes"),
            p("module1/module2/src2"),
            p("module1/lib/cls"),
            p("module1/additional-lib/cls"),
            p("additional-lib/cls"),
        ],
    );

    check_package(&project.index, "pack1", true, &[p("module1/src1/pack1")]);
    check_package(&project.index, "pack1", false, &[p("module1/src1/pack1")]);
    check_package(&project.index, "pack2", true, &[p("module1/src1/testSrc/pack2")]);
    check_package(&project.index, "pack2", false, &[p("module1/src1/testSrc/pack2")]);
    check_package(&project.index, ".pack2", false, &[]);
    check_package(&project.index, ".pack2", true, &[]);
}

#[test]
fn test_package_index_follows_created_directories() {
    let project = ReferenceProject::new();
    // populate the package index before the tree changes
    check_package(&project.index, "pack1", true, &[p("module1/src1/pack1")]);

    let lib_cls_pack = project.create_dir("module1/lib/cls/pack1");
    let lib_src_pack = project.create_dir("module1/lib/src/pack1");
    let pack3_cls = project.create_dir("module1/additional-lib/cls/pack3");
    let pack3_src = project.create_dir("module1/additional-lib/src/pack3");
    let pack4_cls = project.create_dir("additional-lib/cls/pack4");
    let pack4_src = project.create_dir("additional-lib/src/pack4");

    check_package(
        &project.index,
        "pack1",
        true,
        &[p("module1/src1/pack1"), lib_src_pack, lib_cls_pack.clone()],
    );
    check_package(&project.index, "pack1", false, &[p("module1/src1/pack1"), lib_cls_pack]);
    check_package(&project.index, "pack3", false, &[pack3_cls.clone()]);
    check_package(&project.index, "pack3", true, &[pack3_src, pack3_cls]);
    check_package(&project.index, "pack4", false, &[pack4_cls.clone()]);
    check_package(&project.index, "pack4", true, &[pack4_src, pack4_cls]);

    project.delete("module1/lib/cls/pack1");
    check_package(
        &project.index,
        "pack1",
        false,
        &[p("module1/src1/pack1")],
    );
}

#[test]
fn test_directories_with_package_prefix() {
    let project = ReferenceProject::new();
    project.apply(
        MutationBatch::new()
            .add_source_root("module3", p("module3"), SourceRootType::Source)
            .with(Mutation::SetPackagePrefix {
                module: ModuleId::from("module3"),
                path: p("module3"),
                package_prefix: "pack1".to_string(),
            }),
    );

    check_package(&project.index, "pack1", true, &[p("module1/src1/pack1"), p("module3")]);
    let info = project.info("module3");
    assert_eq!(info.package_prefix.as_deref(), Some("pack1"));
    assert_eq!(info.package_name.as_deref(), Some("pack1"));
}

#[test]
fn test_package_directories_with_dots() {
    let project = ReferenceProject::new();
    let goo1 = project.create_dir("module1/src1/foo.bar/goo");
    let goo2 = project.create_dir("module1/module2/src2/foo/bar/goo");
    let foo_bar = p("module1/src1/foo.bar");
    let foo = p("module1/module2/src2/foo");
    let bar = p("module1/module2/src2/foo/bar");

    check_package(&project.index, "foo", false, &[foo]);
    check_package(&project.index, "foo.bar", false, &[bar, foo_bar]);
    check_package(&project.index, "foo.bar.goo", false, &[goo2, goo1]);
}

#[test]
fn test_custom_package_separator() {
    let config = IndexConfig {
        package_separator: "/".to_string(),
        ..IndexConfig::default()
    };
    let project = ReferenceProject::with_config(config);
    project.create_dir("module1/src1/foo.bar/goo");

    assert_eq!(
        project.index.package_name(&p("module1/src1/foo.bar/goo")).unwrap().as_deref(),
        Some("foo/bar/goo")
    );
    check_package(&project.index, "foo/bar/goo", true, &[p("module1/src1/foo.bar/goo")]);
}

#[test]
fn test_packages_hidden_by_exclusion_and_ignore() {
    let project = ReferenceProject::new();
    project.create_dir("module1/module2/src2/excluded/inner");
    project.create_dir("module1/module2/src2/CVS/inner");

    assert_eq!(project.info("module1/module2/src2/excluded").package_name, None);
    assert_eq!(project.info("module1/module2/src2/excluded/inner").package_name, None);
    assert_eq!(project.info("module1/module2/src2/CVS/inner").package_name, None);
    check_package(&project.index, "excluded", true, &[]);
    check_package(&project.index, "excluded.inner", true, &[]);
    check_package(&project.index, "CVS.inner", true, &[]);
}

#[test]
fn test_package_count_tracks_global_changes() {
    let project = ReferenceProject::new();
    let before = project.index.read(|s| s.package_count());
    // "", "pack1", "pack2"
    assert_eq!(before, 3);

    let mut patterns: Vec<String> = DEFAULT_IGNORED_NAMES.iter().map(|s| s.to_string()).collect();
    patterns.push("pack1".to_string());
    project.apply(MutationBatch::new().with(Mutation::SetIgnoredNames { patterns }));
    assert_eq!(project.index.read(|s| s.package_count()), 2);
    check_package(&project.index, "pack1", true, &[]);
}
