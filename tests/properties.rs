//! Property tests for environment activation and tree determinism

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use angreal::engine::{assemble, Completer, TaskRegistry, RESERVED_ROOT_NAMES};
use angreal::source::default_loaders;
use angreal::storage::Project;
use angreal::venv::{EnvMarker, ExecutionContext, IsolatedEnvironment, ENV_MARKER};
use proptest::prelude::*;
use tempfile::TempDir;

/// Lays out an environment on disk without running any installer
fn fake_environment(root: &Path) -> IsolatedEnvironment {
    let env = IsolatedEnvironment::new(root.join("venv"));
    fs::create_dir_all(env.bin_dir()).unwrap();
    fs::write(env.python_executable(), "").unwrap();
    fs::create_dir_all(env.path().join("lib/python3.11/site-packages")).unwrap();

    let marker = EnvMarker {
        created_at: chrono::Utc::now(),
        python: None,
        requirements_digest: None,
        installer: "pip".into(),
    };
    fs::write(
        env.path().join(ENV_MARKER),
        serde_json::to_string(&marker).unwrap(),
    )
    .unwrap();
    env
}

fn context_strategy() -> impl Strategy<Value = ExecutionContext> {
    let path = prop::collection::vec("/[a-z]{1,8}(/[a-z]{1,8}){0,2}", 0..5);
    let vars = prop::collection::btree_map(
        prop_oneof![
            "[A-Z][A-Z_]{0,10}".prop_map(|s| s),
            Just("PYTHONPATH".to_string()),
            Just("PYTHONHOME".to_string()),
            Just("VIRTUAL_ENV".to_string()),
        ],
        "[ -~]{0,16}",
        0..8,
    )
    .prop_filter("PATH lives outside vars", |vars: &BTreeMap<String, String>| {
        !vars.contains_key("PATH")
    });
    let prefix = prop::option::of("/[a-z]{1,8}");

    (path, vars, prefix).prop_map(|(path, vars, prefix)| ExecutionContext {
        path: path.into_iter().map(PathBuf::from).collect(),
        vars,
        prefix: prefix.map(PathBuf::from),
    })
}

proptest! {
    #[test]
    fn activate_then_deactivate_restores_context(original in context_strategy()) {
        let dir = TempDir::new().unwrap();
        let mut env = fake_environment(dir.path());
        let mut ctx = original.clone();

        env.activate(&mut ctx).unwrap();
        prop_assert_eq!(ctx.path.first(), Some(&env.bin_dir()));
        prop_assert_eq!(ctx.prefix.as_deref(), Some(env.path()));
        prop_assert!(ctx.var("PYTHONHOME").is_none());

        // Activating twice is a no-op
        let once = ctx.clone();
        env.activate(&mut ctx).unwrap();
        prop_assert_eq!(&ctx, &once);

        env.deactivate(&mut ctx);
        prop_assert_eq!(&ctx, &original);

        env.deactivate(&mut ctx);
        prop_assert_eq!(&ctx, &original);
    }

    #[test]
    fn scoped_activation_restores_on_drop(original in context_strategy()) {
        let dir = TempDir::new().unwrap();
        let mut env = fake_environment(dir.path());
        let mut ctx = original.clone();

        {
            let active = env.activate_scoped(&mut ctx).unwrap();
            prop_assert!(active.var("VIRTUAL_ENV").is_some());
        }
        prop_assert_eq!(&ctx, &original);
        prop_assert!(!env.is_active());
    }
}

fn names_strategy() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set("[a-z][a-z0-9]{0,6}", 1..12).prop_map(|names| {
        names
            .into_iter()
            .filter(|name| !RESERVED_ROOT_NAMES.contains(&name.as_str()))
            .collect()
    })
}

/// Writes the commands across a few task files, some of them grouped
fn write_project(root: &Path, names: &BTreeSet<String>, files: usize) {
    let angreal_dir = root.join(".angreal");
    fs::create_dir_all(&angreal_dir).unwrap();

    let mut contents = vec![String::new(); files];
    for (index, name) in names.iter().enumerate() {
        let group = if index % 3 == 0 { "groups = [\"grp\"]\n" } else { "" };
        contents[index % files].push_str(&format!(
            "[[command]]\nname = \"{}\"\n{}run = \"true\"\n\n",
            name, group
        ));
    }
    for (index, content) in contents.iter().enumerate() {
        fs::write(angreal_dir.join(format!("task_{:02}.toml", index)), content).unwrap();
    }
}

fn snapshot(project: &Project) -> (String, Vec<String>) {
    let mut registry = TaskRegistry::new();
    let report = project.discover(&mut registry, &default_loaders()).unwrap();
    assert!(report.is_clean(), "{:?}", report.failures);

    let tree = assemble(&registry).unwrap();
    let json = serde_json::to_string(&tree).unwrap();
    let candidates = Completer::new(&tree).complete(&[String::new()]).to_vec();
    (json, candidates)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn discovery_and_completion_are_deterministic(
        names in names_strategy(),
        files in 1usize..4,
    ) {
        // "grp" is used as the group name and must not also be a command
        let names: BTreeSet<String> = names.into_iter().filter(|n| n != "grp").collect();
        prop_assume!(!names.is_empty());

        let dir = TempDir::new().unwrap();
        write_project(dir.path(), &names, files);
        let project = Project::open(dir.path()).unwrap();

        let first = snapshot(&project);
        let second = snapshot(&project);
        prop_assert_eq!(&first, &second);

        let mut sorted = first.1.clone();
        sorted.sort();
        prop_assert_eq!(&first.1, &sorted);
    }
}
