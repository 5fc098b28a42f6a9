//! Module loading with memoization and cycle detection
//!
//! [`ModuleResolver::load_module`] executes each module at most once per run.
//! Executing a module runs its `load` statements, which call back into the
//! same resolver through the runtime's [`Loader`] hook, so resolution is plain
//! depth-first recursion. Every module that parses and compiles is handed to
//! the [`Bundler`] after its imports, even when its execution fails.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use log::{debug, trace, warn};
use starpack_runtime::{
    Dialect, Globals, Loader, PrintHandler, RuntimeError, Thread, Value, parse,
};

use crate::{
    code_generator::Bundler,
    error::BundleError,
    load_graph::LoadGraph,
    types::{FxIndexMap, LoadState},
    util::normalize_separators,
};

/// Outcome of executing a module once
#[derive(Debug, Clone)]
struct CacheEntry {
    globals: Globals,
    error: Option<BundleError>,
}

impl CacheEntry {
    fn failed(error: BundleError) -> Self {
        Self {
            globals: Globals::new(),
            error: Some(error),
        }
    }

    fn to_result(&self) -> Result<Globals, BundleError> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(self.globals.clone()),
        }
    }
}

/// Names every module sees in addition to the universe
pub fn predeclared() -> Globals {
    let mut globals = Globals::new();
    globals.insert("globalThis", Value::None);
    globals
}

pub struct ModuleResolver {
    root: PathBuf,
    suffix: String,
    dialect: Dialect,
    predeclared: Globals,
    states: FxIndexMap<String, LoadState>,
    cache: FxIndexMap<String, CacheEntry>,
    /// Modules currently being loaded, outermost first
    stack: Vec<String>,
    graph: LoadGraph,
    bundler: Bundler,
    print: Option<PrintHandler>,
}

impl ModuleResolver {
    /// Resolve module names to `root/<name><suffix>`
    pub fn new(root: impl Into<PathBuf>, suffix: impl Into<String>, dialect: Dialect) -> Self {
        Self {
            root: root.into(),
            suffix: suffix.into(),
            dialect,
            predeclared: predeclared(),
            states: FxIndexMap::default(),
            cache: FxIndexMap::default(),
            stack: Vec::new(),
            graph: LoadGraph::new(),
            bundler: Bundler::new(),
            print: None,
        }
    }

    /// Route `print` output of executed modules to `print`
    #[must_use]
    pub fn with_print_handler(mut self, print: PrintHandler) -> Self {
        self.print = Some(print);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Source path of a module
    pub fn module_path(&self, module_name: &str) -> PathBuf {
        self.root.join(format!("{module_name}{}", self.suffix))
    }

    pub fn state(&self, module_name: &str) -> LoadState {
        self.states
            .get(module_name)
            .copied()
            .unwrap_or(LoadState::NotStarted)
    }

    pub fn graph(&self) -> &LoadGraph {
        &self.graph
    }

    pub fn bundler(&self) -> &Bundler {
        &self.bundler
    }

    pub fn into_parts(self) -> (Bundler, LoadGraph) {
        (self.bundler, self.graph)
    }

    /// Load a module, executing it on first request
    ///
    /// Later requests return the cached globals or the cached failure.
    /// Requesting a module that is still loading is a cycle.
    pub fn load_module(&mut self, module_name: &str) -> Result<Globals, BundleError> {
        let module_name = normalize_separators(module_name).into_owned();
        if let Some(importer) = self.stack.last() {
            self.graph.add_load(importer, &module_name);
        } else {
            self.graph.add_module(&module_name);
        }

        match self.state(&module_name) {
            LoadState::Done => {
                trace!("Cache hit for {module_name}");
                return self
                    .cache
                    .get(&module_name)
                    .map_or_else(|| Ok(Globals::new()), CacheEntry::to_result);
            }
            LoadState::InProgress => {
                let start = self
                    .stack
                    .iter()
                    .position(|m| *m == module_name)
                    .unwrap_or(0);
                let mut chain = self.stack[start..].to_vec();
                chain.push(module_name.clone());
                warn!("Cycle in load graph: {}", chain.join(" -> "));
                return Err(BundleError::Cycle {
                    module: module_name,
                    chain,
                });
            }
            LoadState::NotStarted => {}
        }

        self.states
            .insert(module_name.clone(), LoadState::InProgress);
        self.stack.push(module_name.clone());
        let entry = self.execute(&module_name);
        self.stack.pop();

        let result = entry.to_result();
        self.cache.insert(module_name.clone(), entry);
        self.states.insert(module_name, LoadState::Done);
        result
    }

    fn execute(&mut self, module_name: &str) -> CacheEntry {
        let path = self.module_path(module_name);
        debug!("Loading module {module_name} from {}", path.display());

        let source = match fs::read_to_string(&path) {
            Ok(source) => source,
            Err(err) => {
                return CacheEntry::failed(BundleError::io("Failed to read module", path, err));
            }
        };
        let display_path = normalize_separators(&path.to_string_lossy()).into_owned();
        let compiled = parse(&display_path, &source)
            .and_then(|module| module.compile(&self.dialect).map(|program| (module, program)));
        let (module, program) = match compiled {
            Ok(compiled) => compiled,
            Err(source) => {
                return CacheEntry::failed(BundleError::Parse {
                    module: module_name.to_owned(),
                    source,
                });
            }
        };

        let predeclared = self.predeclared.clone();
        let print = self.print.clone();
        let execution = {
            let mut thread = Thread::new(format!("exec {module_name}")).with_loader(self);
            if let Some(print) = print {
                thread = thread.with_print_handler(print);
            }
            program.init(&mut thread, &predeclared)
        };

        let sequence = self.bundler.add_module(module_name, &module.ast().body);
        debug!(
            "Module {module_name} loaded as #{sequence} with {} globals",
            execution.globals.len()
        );

        CacheEntry {
            globals: execution.globals,
            error: execution.error.map(|source| BundleError::Execution {
                module: module_name.to_owned(),
                source,
            }),
        }
    }
}

impl fmt::Debug for ModuleResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleResolver")
            .field("root", &self.root)
            .field("suffix", &self.suffix)
            .field("dialect", &self.dialect)
            .field("states", &self.states)
            .field("stack", &self.stack)
            .finish_non_exhaustive()
    }
}

impl Loader for ModuleResolver {
    fn load(&mut self, module: &str) -> starpack_runtime::Result<Globals> {
        self.load_module(module)
            .map_err(|err| RuntimeError::load(module, err))
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, fs, rc::Rc};

    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use starpack_runtime::ErrorKind;
    use tempfile::TempDir;

    use super::*;

    fn create_test_file(dir: &Path, name: &str, content: &str) -> Result<()> {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    fn resolver(dir: &TempDir) -> ModuleResolver {
        ModuleResolver::new(dir.path(), ".star", Dialect::default())
    }

    #[test]
    fn test_load_module_executes_once() -> Result<()> {
        let temp_dir = TempDir::new()?;
        create_test_file(temp_dir.path(), "c.star", "print(\"c\")\nC = 1\n")?;
        create_test_file(temp_dir.path(), "a.star", "load(\"c\", \"C\")\nA = C + 1\n")?;
        create_test_file(temp_dir.path(), "b.star", "load(\"c\", \"C\")\nB = C + 2\n")?;

        let printed = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&printed);
        let mut resolver =
            resolver(&temp_dir).with_print_handler(Rc::new(move |line: &str| {
                sink.borrow_mut().push(line.to_owned());
            }));

        let a = resolver.load_module("a")?;
        let b = resolver.load_module("b")?;
        assert_eq!(a.get("A"), Some(&Value::Int(2)));
        assert_eq!(b.get("B"), Some(&Value::Int(3)));
        assert!(!a.contains("C"), "loaded names are file-local");

        assert_eq!(*printed.borrow(), vec!["c".to_owned()]);
        assert_eq!(resolver.state("c"), LoadState::Done);
        assert_eq!(
            resolver.bundler().load_order().collect::<Vec<_>>(),
            vec!["c", "a", "b"]
        );
        assert_eq!(resolver.graph().imports_of("b"), vec!["c"]);
        Ok(())
    }

    #[test]
    fn test_cycle_is_detected() -> Result<()> {
        let temp_dir = TempDir::new()?;
        create_test_file(temp_dir.path(), "a.star", "load(\"b\", \"B\")\nA = 1\n")?;
        create_test_file(temp_dir.path(), "b.star", "load(\"a\", \"A\")\nB = 1\n")?;

        let mut resolver = resolver(&temp_dir);
        let err = resolver.load_module("a").expect_err("cycle");
        assert_eq!(
            err.cycle(),
            Some(&["a".to_owned(), "b".to_owned(), "a".to_owned()][..])
        );
        assert!(format!("{:#}", anyhow::Error::new(err)).contains("cycle in load graph"));

        // The cached failure is returned again, not re-executed
        let err = resolver.load_module("b").expect_err("cached failure");
        assert!(err.cycle().is_some());
        assert!(resolver.graph().has_cycle());
        Ok(())
    }

    #[test]
    fn test_self_load_is_a_cycle() -> Result<()> {
        let temp_dir = TempDir::new()?;
        create_test_file(temp_dir.path(), "a.star", "load(\"a\", \"A\")\nA = 1\n")?;

        let err = resolver(&temp_dir).load_module("a").expect_err("cycle");
        assert_eq!(err.cycle(), Some(&["a".to_owned(), "a".to_owned()][..]));
        Ok(())
    }

    #[test]
    fn test_parse_failure_is_cached() -> Result<()> {
        let temp_dir = TempDir::new()?;
        create_test_file(temp_dir.path(), "bad.star", "def broken(:\n")?;

        let mut resolver = resolver(&temp_dir);
        let first = resolver.load_module("bad").expect_err("parse error");
        assert!(matches!(first, BundleError::Parse { .. }), "{first}");
        let second = resolver.load_module("bad").expect_err("parse error");
        assert!(matches!(second, BundleError::Parse { .. }), "{second}");
        assert!(resolver.bundler().is_empty());
        Ok(())
    }

    #[test]
    fn test_execution_failure_keeps_module_bundled() -> Result<()> {
        let temp_dir = TempDir::new()?;
        create_test_file(temp_dir.path(), "boom.star", "X = 1\nY = {}[\"k\"]\n")?;

        let mut resolver = resolver(&temp_dir);
        let err = resolver.load_module("boom").expect_err("lookup error");
        assert_eq!(err.runtime_kind(), Some(ErrorKind::Lookup));
        assert_eq!(resolver.bundler().sequence_of("boom"), Some(1));
        Ok(())
    }

    #[test]
    fn test_missing_module_is_io_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        create_test_file(temp_dir.path(), "main.star", "load(\"nope\", \"x\")\n")?;

        let err = resolver(&temp_dir).load_module("main").expect_err("missing");
        let BundleError::Execution { source, .. } = &err else {
            panic!("expected an execution error, got {err}");
        };
        let cause = source
            .load_cause()
            .and_then(|cause| cause.downcast_ref::<BundleError>());
        assert!(matches!(cause, Some(BundleError::Io { .. })), "{cause:?}");
        Ok(())
    }

    #[test]
    fn test_nested_module_names_and_separators() -> Result<()> {
        let temp_dir = TempDir::new()?;
        create_test_file(temp_dir.path(), "lib/geo.star", "PI = 3\n")?;
        create_test_file(temp_dir.path(), "main.star", "load(\"lib/geo\", \"PI\")\nR = PI\n")?;

        let mut resolver = resolver(&temp_dir);
        resolver.load_module("main")?;
        assert_eq!(resolver.state("lib/geo"), LoadState::Done);
        resolver.load_module(r"lib\geo")?;
        assert_eq!(resolver.bundler().len(), 2);
        assert_eq!(
            resolver.module_path("lib/geo"),
            temp_dir.path().join("lib/geo.star")
        );
        Ok(())
    }

    #[test]
    fn test_global_this_is_predeclared() -> Result<()> {
        let temp_dir = TempDir::new()?;
        create_test_file(temp_dir.path(), "g.star", "G = globalThis\n")?;
        let globals = resolver(&temp_dir).load_module("g")?;
        assert_eq!(globals.get("G"), Some(&Value::None));
        Ok(())
    }
}
