//! starpack - flattens a graph of Starlark modules connected by `load`
//! statements into one self-contained compiled artifact.
//!
//! The [`resolver::ModuleResolver`] executes every module once through
//! `starpack_runtime`, detecting load cycles as it goes, and feeds each parsed
//! module to the [`code_generator::Bundler`]. The bundler wraps every module
//! in a synthetic function that publishes its exports into a shared registry,
//! and [`emitter`] compiles the assembled program into an artifact.

pub mod analyzers;
pub mod ast_builder;
pub mod code_generator;
pub mod config;
pub mod dirs;
pub mod emitter;
pub mod error;
pub mod load_graph;
pub mod orchestrator;
pub mod repl;
pub mod resolver;
pub mod types;
pub mod util;
