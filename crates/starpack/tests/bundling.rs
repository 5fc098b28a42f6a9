use std::{cell::RefCell, fs, path::Path, rc::Rc};

use anyhow::Result;
use pretty_assertions::assert_eq;
use ruff_python_parser::parse_module;
use starpack::{
    analyzers::statement_categorizer::export_names,
    config::Config,
    emitter::{self, registry_of},
    error::BundleError,
    orchestrator::{Bundle, BundleOrchestrator},
    resolver::{ModuleResolver, predeclared},
};
use starpack_runtime::{Dialect, ErrorKind, Globals, Thread, Value};
use tempfile::TempDir;

const GEO: &str = "\
PI = 3

def area(r):
    return PI * r * r
";

const MAIN: &str = "\
load(\"geo\", \"area\", \"PI\")
r = PI * 2
a = area(1)
";

fn write_modules(dir: &Path, modules: &[(&str, &str)]) -> Result<()> {
    for (name, source) in modules {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, source)?;
    }
    Ok(())
}

fn star_config() -> Config {
    Config {
        suffix: ".star".to_owned(),
        ..Default::default()
    }
}

/// Bundle `entry`, resolving module names against `root`
fn bundle(root: &Path, entry: &str) -> Result<Bundle, BundleError> {
    BundleOrchestrator::new(star_config())
        .with_root(root)
        .bundle(Path::new(entry))
}

/// Compile and run `bundle`, collecting everything it prints
fn run_bundle(bundle: &Bundle) -> Result<(Globals, Vec<String>)> {
    let program = emitter::compile_bundle(&bundle.module, &Dialect::default())?;
    let printed = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&printed);
    let mut thread = Thread::new("bundle").with_print_handler(Rc::new(move |line: &str| {
        sink.borrow_mut().push(line.to_owned());
    }));
    let globals = program.init(&mut thread, &predeclared()).into_result()?;
    let printed = printed.borrow().clone();
    Ok((globals, printed))
}

#[test]
fn test_bundle_exposes_export_tables() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_modules(temp_dir.path(), &[("geo.star", GEO), ("main.star", MAIN)])?;

    let bundle = bundle(temp_dir.path(), "main.star")?;
    assert_eq!(bundle.load_order, vec!["geo", "main"]);

    let (globals, _) = run_bundle(&bundle)?;
    let registry = registry_of(&globals).expect("bundle defines a registry");
    assert_eq!(registry.keys().collect::<Vec<_>>(), vec!["geo", "main"]);
    assert_eq!(
        registry["geo"].keys().collect::<Vec<_>>(),
        vec!["PI", "area"]
    );
    assert_eq!(registry["geo"]["PI"], Value::Int(3));
    assert_eq!(registry["main"]["r"], Value::Int(6));
    assert_eq!(registry["main"]["a"], Value::Int(3));
    Ok(())
}

#[test]
fn test_diamond_executes_shared_module_once() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_modules(
        temp_dir.path(),
        &[
            ("base.star", "print(\"base\")\nTABLE = {\"k\": 1}\n"),
            ("left.star", "load(\"base\", \"TABLE\")\nLEFT = TABLE\n"),
            ("right.star", "load(\"base\", \"TABLE\")\nRIGHT = TABLE\n"),
            (
                "top.star",
                "load(\"left\", \"LEFT\")\nload(\"right\", \"RIGHT\")\nSAME = LEFT == RIGHT\n",
            ),
        ],
    )?;

    let printed = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&printed);
    let bundle = BundleOrchestrator::new(star_config())
        .with_root(temp_dir.path())
        .with_print_handler(Rc::new(move |_: &str| *counter.borrow_mut() += 1))
        .bundle(Path::new("top.star"))?;
    assert_eq!(*printed.borrow(), 1);
    assert_eq!(bundle.load_order, vec!["base", "left", "right", "top"]);
    assert_eq!(bundle.graph.imports_of("top"), vec!["left", "right"]);

    let (globals, printed) = run_bundle(&bundle)?;
    assert_eq!(printed, vec!["base"]);
    let registry = registry_of(&globals).expect("bundle defines a registry");
    assert!(registry["left"]["LEFT"].identical(&registry["right"]["RIGHT"]));
    assert!(registry["base"]["TABLE"].identical(&registry["left"]["LEFT"]));
    assert_eq!(registry["top"]["SAME"], Value::Bool(true));
    Ok(())
}

#[test]
fn test_cycle_is_reported_from_either_end() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_modules(
        temp_dir.path(),
        &[
            ("a.star", "load(\"b\", \"B\")\nA = 1\n"),
            ("b.star", "load(\"a\", \"A\")\nB = 2\n"),
        ],
    )?;

    let err = bundle(temp_dir.path(), "a.star").expect_err("cycle from a");
    assert_eq!(
        err.cycle(),
        Some(["a", "b", "a"].map(String::from).as_slice())
    );

    let err = bundle(temp_dir.path(), "b.star").expect_err("cycle from b");
    assert_eq!(
        err.cycle(),
        Some(["b", "a", "b"].map(String::from).as_slice())
    );
    Ok(())
}

#[test]
fn test_export_table_matches_categorized_names() -> Result<()> {
    let source = "\
load(\"geo\", \"PI\")
def double(x):
    return x * 2
WIDTH = 4
first, second = 1, 2
SIZES = [WIDTH]
SIZES[0] = 5
TAU = PI * 2
";
    let temp_dir = TempDir::new()?;
    write_modules(temp_dir.path(), &[("geo.star", GEO), ("shapes.star", source)])?;

    let bundle = bundle(temp_dir.path(), "shapes.star")?;
    let (globals, _) = run_bundle(&bundle)?;
    let registry = registry_of(&globals).expect("bundle defines a registry");

    let body = parse_module(source)?.into_syntax().body;
    let expected = export_names(&body);
    assert_eq!(
        registry["shapes"].keys().collect::<Vec<_>>(),
        expected.iter().collect::<Vec<_>>()
    );
    assert_eq!(
        expected.iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["double", "WIDTH", "SIZES", "TAU"]
    );
    Ok(())
}

#[test]
fn test_unexported_symbol_fails_when_bundle_runs() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_modules(
        temp_dir.path(),
        &[
            ("pair.star", "first, second = 1, 2\n"),
            ("main.star", "load(\"pair\", \"first\")\nX = first\n"),
        ],
    )?;

    // Executing the modules directly sees `first` as a global of `pair`
    let bundle = bundle(temp_dir.path(), "main.star")?;
    let program = emitter::compile_bundle(&bundle.module, &Dialect::default())?;

    let output = temp_dir.path().join("out/bundle.spak");
    emitter::write_artifact(&program, &output)?;
    let err = emitter::run_artifact(&output).expect_err("missing export");
    assert_eq!(err.runtime_kind(), Some(ErrorKind::Lookup), "{err}");
    Ok(())
}

#[test]
fn test_backslash_load_resolves_in_bundle() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_modules(
        temp_dir.path(),
        &[
            ("lib/geo.star", GEO),
            ("main.star", "load(\"lib\\\\geo\", \"PI\")\nR = PI * 2\n"),
        ],
    )?;

    let mut resolver = ModuleResolver::new(temp_dir.path(), ".star", Dialect::default());
    let direct = resolver.load_module("main")?;
    assert_eq!(direct.get("R"), Some(&Value::Int(6)));

    let bundle = bundle(temp_dir.path(), "main.star")?;
    assert_eq!(bundle.load_order, vec!["lib/geo", "main"]);
    let (globals, _) = run_bundle(&bundle)?;
    let registry = registry_of(&globals).expect("bundle defines a registry");
    assert_eq!(registry["main"]["R"], Value::Int(6));
    Ok(())
}

#[test]
fn test_nested_entry_loads_relative_to_root() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_modules(
        temp_dir.path(),
        &[
            ("lib/geo.star", GEO),
            ("lib/main.star", "load(\"lib/geo\", \"PI\")\nR = PI * 2\n"),
        ],
    )?;

    let bundle = bundle(temp_dir.path(), "lib/main")?;
    assert_eq!(bundle.load_order, vec!["lib/geo", "lib/main"]);
    let (globals, _) = run_bundle(&bundle)?;
    let registry = registry_of(&globals).expect("bundle defines a registry");
    assert_eq!(registry["lib/main"]["R"], Value::Int(6));
    Ok(())
}

#[test]
fn test_directory_walk_is_deterministic() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_modules(
        temp_dir.path(),
        &[
            ("b.star", "load(\"a\", \"A\")\nB = A + 1\n"),
            ("a.star", "A = 1\n"),
            ("c.txt", "this is not a module (\n"),
        ],
    )?;

    let first = bundle(temp_dir.path(), ".")?;
    let second = bundle(temp_dir.path(), ".")?;
    assert_eq!(first.load_order, vec!["a", "b"]);
    assert_eq!(first.load_order, second.load_order);
    assert_eq!(
        emitter::render_source(&first.module),
        emitter::render_source(&second.module)
    );

    let (globals, _) = run_bundle(&first)?;
    let registry = registry_of(&globals).expect("bundle defines a registry");
    assert_eq!(registry["b"]["B"], Value::Int(2));
    Ok(())
}

#[test]
fn test_artifact_exports_match_direct_execution() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_modules(temp_dir.path(), &[("geo.star", GEO), ("main.star", MAIN)])?;

    let mut resolver = ModuleResolver::new(temp_dir.path(), ".star", Dialect::default());
    let direct = resolver.load_module("main")?;
    let direct_geo = resolver.load_module("geo")?;

    let bundle = bundle(temp_dir.path(), "main.star")?;
    let program = emitter::compile_bundle(&bundle.module, &Dialect::default())?;
    let output = temp_dir.path().join("main.spak");
    emitter::write_artifact(&program, &output)?;
    let globals = emitter::run_artifact(&output)?;
    let registry = registry_of(&globals).expect("bundle defines a registry");

    for (module, globals) in [("main", &direct), ("geo", &direct_geo)] {
        for (name, value) in &registry[module] {
            let direct_value = globals.get(name).expect("exported name is a global");
            assert_eq!(direct_value.repr(), value.repr(), "{module}.{name}");
        }
    }
    Ok(())
}
