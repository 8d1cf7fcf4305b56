//! Integration tests for build planning
//!
//! Plans built from in-memory graphs and from `shaders.toml` projects

use pretty_assertions::assert_eq;
use rstest::rstest;
use shadergraph_build::{
    BuildError, BuildMode, BuildSettings, Builder, DebugScript, Label, LibraryCollector, Mnemonic,
    Provided, ShaderGraph, ShaderTarget, TargetIndex,
};
use shadergraph_config::ConfigLoader;
use serial_test::serial;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn label(s: &str) -> Label {
    Label::parse(s).unwrap()
}

fn paths(items: &[&str]) -> Vec<PathBuf> {
    items.iter().map(PathBuf::from).collect()
}

fn builder(targets: Vec<ShaderTarget>, settings: BuildSettings) -> Builder {
    let mut graph = ShaderGraph::new();
    for target in targets {
        graph.add_target(target).unwrap();
    }
    Builder::new(graph, settings)
}

fn release() -> BuildSettings {
    BuildSettings::default().with_output_root("out")
}

/// Create a project directory holding a manifest and the given files
fn create_project(manifest: &str, files: &[&str]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("shaders.toml"), manifest).unwrap();
    for file in files {
        let path = dir.path().join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, format!("// {}\n", file)).unwrap();
    }
    dir
}

#[test]
fn test_two_sources_release_build() {
    let plan = builder(
        vec![ShaderTarget::binary("//:app")
            .unwrap()
            .with_srcs(["a.metal", "b.metal"])],
        release(),
    )
    .plan()
    .unwrap();

    assert_eq!(plan.actions.len(), 3);
    let compiles: Vec<_> = plan
        .actions
        .iter()
        .filter(|a| a.mnemonic == Mnemonic::ShaderCompile)
        .collect();
    assert_eq!(compiles.len(), 2);
    for compile in &compiles {
        assert!(!compile.arguments.iter().any(|a| a == "-frecord-sources"));
        assert!(!compile.arguments.iter().any(|a| a == "-gline-tables-only"));
    }

    let link = plan.link_action(&label("//:app")).unwrap();
    assert_eq!(link.inputs, paths(&["out/a.air", "out/b.air"]));
    assert_eq!(link.outputs, paths(&["out/app.metallib"]));
    assert_eq!(
        link.command_line(),
        vec!["xcrun", "metallib", "-o", "out/app.metallib", "out/a.air", "out/b.air"]
    );
}

#[test]
fn test_diamond_artifacts_appear_once() {
    let plan = builder(
        vec![
            ShaderTarget::library("//d:d").unwrap().with_srcs(["d/d.metal"]),
            ShaderTarget::library("//b:b")
                .unwrap()
                .with_srcs(["b/b.metal"])
                .with_deps(vec![label("//d:d")]),
            ShaderTarget::library("//c:c")
                .unwrap()
                .with_srcs(["c/c.metal"])
                .with_deps(vec![label("//d:d")]),
            ShaderTarget::binary("//a:a")
                .unwrap()
                .with_srcs(["a/a.metal"])
                .with_deps(vec![label("//b:b"), label("//c:c")]),
        ],
        release(),
    )
    .plan()
    .unwrap();

    let link = plan.link_action(&label("//a:a")).unwrap();
    assert_eq!(
        link.inputs,
        paths(&["out/d/d.air", "out/b/b.air", "out/c/c.air", "out/a/a.air"])
    );
    assert_eq!(plan.stats.compile_actions, 4);
    assert_eq!(plan.stats.link_actions, 1);
}

#[test]
fn test_deep_source_change_only_moves_link_inputs() {
    let graph = |leaf_srcs: &[&str]| {
        vec![
            ShaderTarget::library("//leaf:leaf")
                .unwrap()
                .with_srcs(leaf_srcs.to_vec()),
            ShaderTarget::library("//mid:mid")
                .unwrap()
                .with_srcs(["mid/mid.metal"])
                .with_deps(vec![label("//leaf:leaf")]),
            ShaderTarget::library("//other:other")
                .unwrap()
                .with_hdrs(["other/inc/o.h", "other/inc/p.h"])
                .with_include_prefixes("other", "inc"),
            ShaderTarget::binary("//app:app")
                .unwrap()
                .with_deps(vec![label("//mid:mid"), label("//other:other")]),
        ]
    };

    let before = builder(graph(&["leaf/a.metal"]), release()).plan().unwrap();
    let after = builder(graph(&["leaf/a.metal", "leaf/b.metal"]), release())
        .plan()
        .unwrap();

    let link_before = before.link_action(&label("//app:app")).unwrap();
    let link_after = after.link_action(&label("//app:app")).unwrap();
    assert_eq!(link_before.inputs, paths(&["out/leaf/a.air", "out/mid/mid.air"]));
    assert_eq!(
        link_after.inputs,
        paths(&["out/leaf/a.air", "out/leaf/b.air", "out/mid/mid.air"])
    );

    let other = label("//other:other");
    assert_eq!(
        before.virtual_headers[&other].indirections,
        after.virtual_headers[&other].indirections
    );
    assert_eq!(before.stats.indirections, 2);
    assert_eq!(after.stats.indirections, 2);
}

#[test]
fn test_library_publish_node_links_its_closure() {
    let plan = builder(
        vec![
            ShaderTarget::library("//base:base").unwrap().with_srcs(["base/base.metal"]),
            ShaderTarget::library("//kit:kit")
                .unwrap()
                .with_srcs(["kit/kit.metal"])
                .with_deps(vec![label("//base:base")])
                .with_out("kit/Kit.metallib"),
        ],
        release(),
    )
    .plan()
    .unwrap();

    let link = plan.link_action(&label("//kit:kit")).unwrap();
    assert_eq!(link.inputs, paths(&["out/base/base.air", "out/kit/kit.air"]));
    assert_eq!(link.outputs, paths(&["out/kit/Kit.metallib"]));
    assert!(matches!(
        plan.provider(&label("//kit:kit")),
        Some(Provided::Info(_))
    ));
}

#[rstest]
#[case(BuildMode::Debug, true)]
#[case(BuildMode::Release, false)]
fn test_debug_flags_follow_mode(#[case] mode: BuildMode, #[case] expected: bool) {
    let plan = builder(
        vec![ShaderTarget::binary("//:app").unwrap().with_srcs(["a.metal"])],
        release().with_mode(mode),
    )
    .plan()
    .unwrap();

    for action in &plan.actions {
        assert_eq!(
            action.arguments.iter().any(|a| a == "-gline-tables-only"),
            expected
        );
    }
}

#[test]
fn test_cycle_aborts_plan() {
    let result = builder(
        vec![
            ShaderTarget::library("//x:a")
                .unwrap()
                .with_deps(vec![label("//x:b")]),
            ShaderTarget::library("//x:b")
                .unwrap()
                .with_deps(vec![label("//x:a")]),
        ],
        release(),
    )
    .plan();

    assert!(matches!(result, Err(BuildError::CircularDependency(_))));
}

#[test]
fn test_plan_from_manifest_project() {
    let project = create_project(
        r#"
[build]
mode = "debug"
output_root = "out"

[build.platform]
family = "mobile"
minimum_os_version = "14.0"

[[target]]
label = "//shaders:common"
srcs = ["shaders/common.metal"]
hdrs = ["shaders/inc/common.h"]
strip_include_prefix = "inc"
include_prefix = "common"

[[target]]
label = "//shaders:app"
kind = "binary"
srcs = ["shaders/app.metal"]
deps = ["//shaders:common"]
copts = ["-ffast-math"]
"#,
        &["shaders/common.metal", "shaders/inc/common.h", "shaders/app.metal"],
    );

    let config = ConfigLoader::new()
        .load_from_directory(&project.path().join("shaders"))
        .unwrap();
    let plan = Builder::from_manifest(&config.manifest).unwrap().plan().unwrap();

    let app = label("//shaders:app");
    let compile = plan.actions_for(&app).next().unwrap();
    assert_eq!(
        compile.arguments,
        vec![
            "metal",
            "-c",
            "-mios-version-min=14.0",
            "-frecord-sources",
            "-gline-tables-only",
            "-o",
            "out/shaders/app.air",
            "-I",
            "shaders",
            "-I",
            "out/shaders/_virtual_includes/common",
            "shaders/app.metal",
            "-ffast-math",
        ]
    );
    assert!(compile
        .inputs
        .contains(&PathBuf::from("out/shaders/_virtual_includes/common/common/common.h")));

    let written = plan.materialize(project.path()).unwrap();
    assert_eq!(written, 1);
    assert_eq!(plan.materialize(project.path()).unwrap(), 0);

    #[cfg(unix)]
    {
        let header = project
            .path()
            .join("out/shaders/_virtual_includes/common/common/common.h");
        assert_eq!(
            fs::read_to_string(header).unwrap(),
            "// shaders/inc/common.h\n"
        );
    }
}

#[test]
fn test_toolchain_overrides_flow_through_plan() {
    let project = create_project(
        r#"
[build]
mode = "debug"
output_root = "out"

[toolchain]
source_extension = "msl"
header_extension = "hh"
intermediate_extension = "ir"
library_extension = "lib"
debug_flags = ["-g"]

[[target]]
label = "//lib:util"
srcs = ["lib/util.msl", "lib/detail.hh"]
out = "lib/util.lib"

[[target]]
label = "//app:app"
kind = "binary"
srcs = ["app/main.msl"]
deps = ["//lib:util"]
"#,
        &[],
    );

    let config = ConfigLoader::new().load_from_directory(project.path()).unwrap();
    let builder = Builder::from_manifest(&config.manifest).unwrap();
    let plan = builder.plan().unwrap();

    let compile = plan.actions_for(&label("//lib:util")).next().unwrap();
    assert_eq!(compile.inputs, paths(&["lib/util.msl", "lib/detail.hh"]));
    assert_eq!(compile.outputs, paths(&["out/lib/util.ir"]));
    assert!(compile.arguments.contains(&"-g".to_string()));
    assert!(!compile.arguments.contains(&"-frecord-sources".to_string()));

    let link = plan.link_action(&label("//app:app")).unwrap();
    assert_eq!(link.inputs, paths(&["out/lib/util.ir", "out/app/main.ir"]));
    assert_eq!(link.outputs, paths(&["out/app/app.lib"]));
    assert_eq!(
        plan.libraries.get(&label("//lib:util")),
        Some(&PathBuf::from("out/lib/util.lib"))
    );

    let index = TargetIndex::from_graph(builder.graph());
    let libraries = LibraryCollector::for_toolchain(&index, &builder.settings().toolchain)
        .collect(&[label("//app:app")])
        .unwrap();
    assert_eq!(libraries.flatten(), vec!["//lib:util", "//app:app"]);

    let script = DebugScript::from_plan(&libraries, &plan).render();
    assert!(script.contains("-type f -name '*.msl' -print"));
}

/// Restores the working directory when dropped
struct CurrentDirGuard(PathBuf);

impl CurrentDirGuard {
    fn enter(dir: &Path) -> Self {
        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir).unwrap();
        Self(previous)
    }
}

impl Drop for CurrentDirGuard {
    fn drop(&mut self) {
        std::env::set_current_dir(&self.0).unwrap();
    }
}

#[cfg(unix)]
#[test]
#[serial]
fn test_materialize_from_relative_exec_root() {
    let project = create_project("", &["inc/foo/bar.h"]);
    let plan = builder(
        vec![ShaderTarget::library("//:lib")
            .unwrap()
            .with_hdrs(["inc/foo/bar.h"])
            .with_include_prefixes("pkg", "inc")],
        release(),
    )
    .plan()
    .unwrap();

    let _cwd = CurrentDirGuard::enter(project.path());
    assert_eq!(plan.materialize(Path::new(".")).unwrap(), 1);

    let link = Path::new("out/_virtual_includes/lib/pkg/foo/bar.h");
    assert_eq!(fs::read_to_string(link).unwrap(), "// inc/foo/bar.h\n");
    assert_eq!(plan.materialize(Path::new(".")).unwrap(), 0);
}

#[test]
fn test_manifest_with_unknown_dependency() {
    let project = create_project(
        r#"
[[target]]
label = "//shaders:app"
kind = "binary"
srcs = ["shaders/app.metal"]
deps = ["//shaders:missing"]
"#,
        &[],
    );

    let config = ConfigLoader::new().load_from_directory(project.path()).unwrap();
    let result = Builder::from_manifest(&config.manifest).unwrap().plan();
    assert!(matches!(result, Err(BuildError::TargetNotFound { .. })));
}

#[test]
fn test_plan_json_is_consumable() {
    let plan = builder(
        vec![ShaderTarget::binary("//:app").unwrap().with_srcs(["a.metal"])],
        release(),
    )
    .plan()
    .unwrap();

    let json: serde_json::Value = serde_json::from_str(&plan.to_json().unwrap()).unwrap();
    assert_eq!(json["actions"][0]["mnemonic"], "ShaderCompile");
    assert_eq!(json["actions"][0]["executable"], "xcrun");
    assert_eq!(json["actions"][0]["owner"], "//:app");
    assert_eq!(json["stats"]["targets"], 1);
}
