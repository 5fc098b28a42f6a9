//! Interactive session over the globals of an executed bundle
//!
//! - An input that parses as one expression is evaluated and its `repr`
//!   echoed, unless it is `None`
//! - Anything else runs as statements, with global reassignment allowed;
//!   its bindings are merged into the session
//! - A line ending with `:` opens a block that ends at the first blank line
//! - `:globals` lists the bindings, `:quit` / `:q` or end-of-file exits

use anyhow::Result;
use log::debug;
use ruff_python_ast::Stmt;
use rustyline::{DefaultEditor, error::ReadlineError};
use starpack_runtime::{
    Dialect, Globals, RuntimeError, Thread, Value, eval_expression, load_statement, parse,
};

const PROMPT: &str = ">>> ";
const CONTINUATION: &str = "... ";
const INPUT_PATH: &str = "<stdin>";

/// Bindings and dialect of one interactive session
#[derive(Debug)]
pub struct Session {
    globals: Globals,
    dialect: Dialect,
}

/// What a `:` command asks the loop to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Print(String),
}

impl Session {
    pub fn new(globals: Globals, dialect: Dialect) -> Self {
        Self {
            globals,
            dialect: Dialect {
                allow_global_reassign: true,
                ..dialect
            },
        }
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    /// Evaluate one complete input, returning the text to echo
    pub fn eval_input(&mut self, input: &str) -> Result<Option<String>, RuntimeError> {
        let input = input.trim_end();
        if input.trim().is_empty() {
            return Ok(None);
        }
        let module = parse(INPUT_PATH, input)?;
        let mut thread = Thread::new("REPL");

        if let [stmt @ Stmt::Expr(_)] = module.ast().body.as_slice() {
            if load_statement(stmt).is_none() {
                let value =
                    eval_expression(input.trim_start(), &mut thread, &self.globals, &self.dialect)?;
                return Ok((!matches!(value, Value::None)).then(|| value.repr()));
            }
        }

        let program = module.compile(&self.dialect)?;
        let execution = program.init(&mut thread, &self.globals);
        debug!("Input bound {} names", execution.globals.len());
        self.globals.extend(
            execution
                .globals
                .iter()
                .map(|(name, value)| (name.to_owned(), value.clone())),
        );
        execution.error.map_or(Ok(None), Err)
    }

    /// Interpret a `:` command
    pub fn command(&self, command: &str) -> Command {
        match command {
            ":quit" | ":q" => Command::Quit,
            ":globals" => Command::Print(
                self.globals
                    .names()
                    .map(|name| format!("global: {name}"))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            other => Command::Print(format!("unknown command {other}; try :globals or :quit")),
        }
    }
}

/// Whether a buffered input needs more lines
fn needs_more(buffer: &str, line: &str) -> bool {
    let opens_block = buffer
        .lines()
        .next()
        .is_some_and(|first| first.trim_end().ends_with(':'));
    opens_block && !line.trim().is_empty()
}

/// Report the bound names, then read and evaluate input until `:quit`
#[allow(clippy::print_stdout, clippy::print_stderr)]
pub fn run(globals: Globals, dialect: Dialect) -> Result<()> {
    let mut session = Session::new(globals, dialect);
    for name in session.globals().names() {
        println!("global: {name}");
    }

    let mut editor = DefaultEditor::new()?;
    let mut buffer = String::new();
    loop {
        let prompt = if buffer.is_empty() { PROMPT } else { CONTINUATION };
        match editor.readline(prompt) {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                if buffer.is_empty() && line.trim_start().starts_with(':') {
                    match session.command(line.trim()) {
                        Command::Quit => break,
                        Command::Print(text) => println!("{text}"),
                    }
                    continue;
                }

                buffer.push_str(&line);
                buffer.push('\n');
                if needs_more(&buffer, &line) {
                    continue;
                }
                match session.eval_input(&buffer) {
                    Ok(Some(echo)) => println!("{echo}"),
                    Ok(None) => {}
                    Err(err) => eprintln!("{err}"),
                }
                buffer.clear();
            }
            Err(ReadlineError::Interrupted) => buffer.clear(),
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}
