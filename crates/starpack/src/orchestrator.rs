//! Bundling entry points for a single module or a directory of modules

use std::path::{Path, PathBuf};

use log::{debug, info};
use ruff_python_ast::ModModule;
use starpack_runtime::PrintHandler;
use walkdir::WalkDir;

use crate::{
    config::Config, error::BundleError, load_graph::LoadGraph, resolver::ModuleResolver,
    util::{entry_module_name, module_name_for},
};

/// The assembled program together with what was learned building it
#[derive(Debug)]
pub struct Bundle {
    pub module: ModModule,
    /// Modules in the order their synthetic functions run
    pub load_order: Vec<String>,
    pub graph: LoadGraph,
}

pub struct BundleOrchestrator {
    config: Config,
    /// Directory that module names of a single-file entry resolve against
    root: PathBuf,
    print: Option<PrintHandler>,
}

impl BundleOrchestrator {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            root: PathBuf::from("."),
            print: None,
        }
    }

    /// Resolve entries and their loads against `root` instead of the working directory
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Route `print` output of modules executed while bundling
    #[must_use]
    pub fn with_print_handler(mut self, print: PrintHandler) -> Self {
        self.print = Some(print);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Bundle `entry`, a module path or a directory of modules
    ///
    /// A module path is the module name itself, relative to the root, and
    /// may omit the suffix. Its loads resolve against the same root. A
    /// directory is walked with module names relative to that directory.
    pub fn bundle(&self, entry: &Path) -> Result<Bundle, BundleError> {
        let entry_path = self.root.join(entry);
        let resolver = if entry_path.is_dir() {
            let mut resolver = self.resolver(entry_path.clone());
            let modules = walk_directory(&mut resolver)?;
            info!("Bundled {} modules from {}", modules.len(), entry_path.display());
            resolver
        } else {
            let module_name = self.module_name_of_entry(entry)?;
            let mut resolver = self.resolver(self.root.clone());
            resolver.load_module(&module_name)?;
            info!("Bundled {module_name} and its loads");
            resolver
        };

        let (bundler, graph) = resolver.into_parts();
        if let Some(order) = graph.dependency_order() {
            debug!("Dependency order: {}", order.join(", "));
        }
        let violations = graph.order_violations(&bundler);
        debug_assert!(violations.is_empty(), "out of order: {violations:?}");

        Ok(Bundle {
            load_order: bundler.load_order().map(ToOwned::to_owned).collect(),
            module: bundler.finish(),
            graph,
        })
    }

    fn resolver(&self, root: PathBuf) -> ModuleResolver {
        let resolver = ModuleResolver::new(root, self.config.suffix.as_str(), self.config.dialect);
        match &self.print {
            Some(print) => resolver.with_print_handler(print.clone()),
            None => resolver,
        }
    }

    /// Module name of a single-file entry: the normalized path without the suffix
    fn module_name_of_entry(&self, entry: &Path) -> Result<String, BundleError> {
        let relative = entry.strip_prefix(&self.root).unwrap_or(entry);
        entry_module_name(relative, &self.config.suffix).ok_or_else(|| {
            BundleError::Configuration(format!("{} does not name a module", entry.display()))
        })
    }
}

impl std::fmt::Debug for BundleOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleOrchestrator")
            .field("config", &self.config)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

/// Load every module under the resolver's root, in depth-first lexical order
///
/// Files not ending with the suffix are ignored. The first failure aborts
/// the walk. Returns the module names in traversal order.
pub fn walk_directory(resolver: &mut ModuleResolver) -> Result<Vec<String>, BundleError> {
    if resolver.suffix().is_empty() {
        return Err(BundleError::Configuration(
            "a suffix is required to bundle a directory (use --suffix)".to_owned(),
        ));
    }
    let root = resolver.root().to_path_buf();
    let suffix = resolver.suffix().to_owned();

    let mut modules = Vec::new();
    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            let path = err.path().map_or_else(|| root.clone(), Path::to_path_buf);
            BundleError::io("Failed to walk", path, err.into())
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
        let Some(module_name) = module_name_for(relative, &suffix) else {
            debug!("Skipping {}", relative.display());
            continue;
        };
        info!("{module_name}");
        resolver.load_module(&module_name)?;
        modules.push(module_name);
    }
    Ok(modules)
}
