//! Assembly of the bundled program
//!
//! The [`Bundler`] receives each module once, in the order the resolver
//! finishes loading them, and owns the growing body of the container
//! function. [`Bundler::finish`] reads that body out exactly once:
//!
//! ```text
//! __starpack_registry__ = {}
//! def __starpack_init__():
//!     def __starpack_module_1__():
//!         ...
//!     __starpack_module_1__()
//!     ...
//! __starpack_init__()
//! ```

pub mod module_registry;
pub mod module_wrapper;

use log::debug;
use ruff_python_ast::{ModModule, Stmt};

use crate::{ast_builder, ast_builder::statements, types::FxIndexMap};

#[derive(Debug, Default)]
pub struct Bundler {
    /// Statements of the container function, two per module
    container_body: Vec<Stmt>,
    /// Module name to 1-based sequence number, in load order
    sequence: FxIndexMap<String, usize>,
}

impl Bundler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `body` in the next synthetic function and schedule its call
    ///
    /// Returns the module's sequence number. A module is only ever added
    /// once; adding it again returns the original number unchanged.
    pub fn add_module(&mut self, module_name: &str, body: &[Stmt]) -> usize {
        if let Some(&sequence) = self.sequence.get(module_name) {
            debug!("Module {module_name} already bundled as #{sequence}");
            return sequence;
        }
        let sequence = self.sequence.len() + 1;
        let function_name = module_registry::synthetic_function_name(sequence);
        debug!(
            "Bundling module {module_name} as {function_name} ({} statements)",
            body.len()
        );

        let rewritten = module_wrapper::rewrite_module(module_name, body);
        self.container_body
            .push(statements::function_def(&function_name, rewritten));
        self.container_body
            .push(module_registry::generate_call(&function_name));
        self.sequence.insert(module_name.to_owned(), sequence);
        sequence
    }

    /// Sequence number of a bundled module
    pub fn sequence_of(&self, module_name: &str) -> Option<usize> {
        self.sequence.get(module_name).copied()
    }

    /// Bundled modules in the order their synthetic functions run
    pub fn load_order(&self) -> impl Iterator<Item = &str> {
        self.sequence.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Assemble the final program
    pub fn finish(self) -> ModModule {
        debug!("Assembling bundle of {} modules", self.sequence.len());
        ast_builder::module(vec![
            module_registry::generate_registry_init(),
            statements::function_def(module_registry::CONTAINER, self.container_body),
            module_registry::generate_call(module_registry::CONTAINER),
        ])
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use ruff_python_parser::parse_module;

    use super::*;

    fn body(source: &str) -> Vec<Stmt> {
        parse_module(source)
            .expect("Failed to parse")
            .into_syntax()
            .body
    }

    #[test]
    fn test_sequence_follows_add_order() {
        let mut bundler = Bundler::new();
        assert_eq!(bundler.add_module("geo", &body("PI = 3\n")), 1);
        assert_eq!(bundler.add_module("main", &body("x = 1\n")), 2);
        assert_eq!(bundler.add_module("geo", &body("PI = 4\n")), 1);

        assert_eq!(bundler.len(), 2);
        assert_eq!(bundler.sequence_of("main"), Some(2));
        assert_eq!(bundler.load_order().collect::<Vec<_>>(), vec!["geo", "main"]);
    }

    #[test]
    fn test_finish_shape() {
        let mut bundler = Bundler::new();
        bundler.add_module("geo", &body("PI = 3\n"));
        let module = bundler.finish();

        let [Stmt::Assign(_), Stmt::FunctionDef(container), Stmt::Expr(_)] = &module.body[..]
        else {
            panic!("unexpected bundle shape: {:?}", module.body);
        };
        assert_eq!(container.name.as_str(), module_registry::CONTAINER);
        let [Stmt::FunctionDef(synthetic), Stmt::Expr(_)] = &container.body[..] else {
            panic!("unexpected container body");
        };
        assert_eq!(synthetic.name.as_str(), "__starpack_module_1__");
    }

    #[test]
    fn test_empty_bundle_container_passes() {
        let module = Bundler::new().finish();
        let Stmt::FunctionDef(container) = &module.body[1] else {
            panic!("expected the container function");
        };
        assert!(matches!(&container.body[..], [Stmt::Pass(_)]));
    }
}
