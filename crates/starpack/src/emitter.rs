//! Compiling, writing and running bundled programs

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter},
    path::Path,
};

use log::{debug, info};
use ruff_python_ast::ModModule;
use ruff_python_codegen::{Generator, Stylist};
use ruff_python_parser::parse_module;
use starpack_runtime::{Dialect, Globals, Program, Thread, Value};

use crate::{
    code_generator::module_registry::REGISTRY, error::BundleError, resolver::predeclared,
    types::FxIndexMap,
};

/// Path recorded in the compiled bundle
pub const BUNDLE_PATH: &str = "<bundle>";

/// Compile the assembled program under `dialect`
pub fn compile_bundle(module: &ModModule, dialect: &Dialect) -> Result<Program, BundleError> {
    starpack_runtime::compile(BUNDLE_PATH, module, dialect).map_err(|source| {
        BundleError::Artifact {
            path: BUNDLE_PATH.into(),
            source,
        }
    })
}

/// Write `program` to `output`, creating missing parent directories
pub fn write_artifact(program: &Program, output: &Path) -> Result<(), BundleError> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|err| BundleError::io("Failed to create directory", parent, err))?;
    }
    let file = File::create(output)
        .map_err(|err| BundleError::io("Failed to create artifact", output, err))?;
    program
        .write_to(&mut BufWriter::new(file))
        .map_err(|source| BundleError::Artifact {
            path: output.to_path_buf(),
            source,
        })?;
    info!("Wrote {}", output.display());
    Ok(())
}

/// Render the assembled program as source text
///
/// Uses the default style: four-space indentation, double quotes and `\n`
/// line endings.
pub fn render_source(module: &ModModule) -> String {
    let Ok(seed) = parse_module("") else {
        return String::new();
    };
    let stylist = Stylist::from_tokens(seed.tokens(), "");
    let mut rendered = String::new();
    for stmt in &module.body {
        rendered.push_str(&Generator::from(&stylist).stmt(stmt));
        rendered.push('\n');
    }
    rendered
}

/// Read an artifact and run it once with no loader
///
/// The returned globals are frozen.
pub fn run_artifact(path: &Path) -> Result<Globals, BundleError> {
    let file =
        File::open(path).map_err(|err| BundleError::io("Failed to open artifact", path, err))?;
    let program =
        Program::read_from(&mut BufReader::new(file)).map_err(|source| BundleError::Artifact {
            path: path.to_path_buf(),
            source,
        })?;
    debug!("Running artifact {} ({})", path.display(), program.path());

    let mut thread = Thread::new(format!("exec {}", path.display()));
    program
        .init(&mut thread, &predeclared())
        .into_result()
        .map_err(|source| BundleError::Execution {
            module: BUNDLE_PATH.to_owned(),
            source,
        })
}

/// Export tables of an executed bundle: module name to exported bindings
pub fn registry_of(globals: &Globals) -> Option<FxIndexMap<String, FxIndexMap<String, Value>>> {
    let registry = globals.get(REGISTRY)?.as_dict()?.borrow();
    registry
        .iter()
        .map(|(module, exports)| {
            let exports = exports
                .as_dict()?
                .borrow()
                .iter()
                .map(|(name, value)| Some((name.as_str()?.to_owned(), value.clone())))
                .collect::<Option<FxIndexMap<_, _>>>()?;
            Some((module.as_str()?.to_owned(), exports))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::code_generator::Bundler;

    fn bundle_of(modules: &[(&str, &str)]) -> ModModule {
        let mut bundler = Bundler::new();
        for (name, source) in modules {
            let body = parse_module(source)
                .expect("Failed to parse")
                .into_syntax()
                .body;
            bundler.add_module(name, &body);
        }
        bundler.finish()
    }

    #[test]
    fn test_render_source() {
        let module = bundle_of(&[("geo", "PI = 3\n")]);
        insta::assert_snapshot!(render_source(&module), @r#"
        __starpack_registry__ = {}
        def __starpack_init__():
            def __starpack_module_1__():
                __starpack_exports__ = {}
                __starpack_registry__["geo"] = __starpack_exports__
                PI = 3
                __starpack_exports__["PI"] = PI
            __starpack_module_1__()
        __starpack_init__()
        "#);
    }

    #[test]
    fn test_write_and_run_artifact() -> anyhow::Result<()> {
        let module = bundle_of(&[
            ("geo", "PI = 3\n"),
            ("main", "load(\"geo\", \"PI\")\nR = PI * 2\n"),
        ]);
        let program = compile_bundle(&module, &Dialect::default())?;

        let temp_dir = TempDir::new()?;
        let output = temp_dir.path().join("out/nested/bundle.spak");
        write_artifact(&program, &output)?;
        assert!(output.is_file());

        let globals = run_artifact(&output)?;
        assert_eq!(
            globals.names().collect::<Vec<_>>(),
            vec![REGISTRY, "__starpack_init__"]
        );
        let registry = registry_of(&globals).expect("registry");
        assert_eq!(registry["geo"]["PI"], Value::Int(3));
        assert_eq!(registry["main"]["R"], Value::Int(6));
        Ok(())
    }

    #[test]
    fn test_run_missing_artifact_is_io_error() {
        let err = run_artifact(Path::new("/definitely/not/here.spak")).expect_err("missing");
        assert!(matches!(err, BundleError::Io { .. }), "{err}");
    }

    #[test]
    fn test_registry_of_plain_globals() {
        assert!(registry_of(&Globals::new()).is_none());
    }
}
