//! Compiled programs: execution and the binary artifact format

use std::io::{Read, Write};

use log::debug;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    Dialect, Globals, Result, RuntimeError, Thread, compile,
    eval::{Evaluator, Frame},
    ir::Stmt,
    value::Value,
};

/// Leading bytes of every compiled artifact
const MAGIC: &[u8; 4] = b"SPAK";
/// Bumped whenever the serialized IR changes shape
const FORMAT_VERSION: u32 = 1;
const DIGEST_LEN: usize = 32;

/// A compiled, executable module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    path: String,
    dialect: Dialect,
    body: Vec<Stmt>,
}

/// The outcome of running a program's top-level statements
#[derive(Debug)]
pub struct Execution {
    /// Bindings made before execution stopped, already frozen
    pub globals: Globals,
    pub error: Option<RuntimeError>,
}

impl Execution {
    pub fn into_result(self) -> Result<Globals> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.globals),
        }
    }
}

impl Program {
    pub(crate) fn new(path: &str, dialect: Dialect, body: Vec<Stmt>) -> Self {
        Self {
            path: path.to_owned(),
            dialect,
            body,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub const fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// Execute the top-level statements once
    ///
    /// Globals bound before a failure are still returned. Names bound by
    /// `load` are file-local and never appear in the result.
    pub fn init(&self, thread: &mut Thread<'_>, predeclared: &Globals) -> Execution {
        debug!("Executing {} on thread {:?}", self.path, thread.name());
        let frame = Frame::module(predeclared);
        let mut evaluator = Evaluator::new(thread, self.dialect);
        let result = evaluator.exec_module(&self.body, &frame);

        let globals: Globals = frame
            .bindings()
            .into_iter()
            .filter(|(name, _)| !evaluator.is_file_local(name))
            .collect();
        globals.freeze();

        Execution {
            globals,
            error: result.err().map(RuntimeError::from),
        }
    }

    /// Serialize this program as a compiled artifact
    pub fn write_to(&self, writer: &mut impl Write) -> Result<()> {
        let payload = bincode::serialize(self)
            .map_err(|err| RuntimeError::Artifact(format!("cannot encode program: {err}")))?;
        let digest = Sha256::digest(&payload);

        let io = |err| RuntimeError::io("cannot write artifact", err);
        writer.write_all(MAGIC).map_err(io)?;
        writer.write_all(&FORMAT_VERSION.to_le_bytes()).map_err(io)?;
        writer.write_all(&digest).map_err(io)?;
        writer.write_all(&payload).map_err(io)?;
        writer.flush().map_err(io)?;
        debug!(
            "Wrote artifact for {} ({} payload bytes)",
            self.path,
            payload.len()
        );
        Ok(())
    }

    /// Decode a compiled artifact written by [`Program::write_to`]
    pub fn read_from(reader: &mut impl Read) -> Result<Self> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|err| RuntimeError::io("cannot read artifact", err))?;

        let header_len = MAGIC.len() + 4 + DIGEST_LEN;
        if bytes.len() < header_len || !bytes.starts_with(MAGIC) {
            return Err(RuntimeError::Artifact("not a starpack artifact".to_owned()));
        }
        let (header, payload) = bytes.split_at(header_len);
        let mut version = [0u8; 4];
        version.copy_from_slice(&header[MAGIC.len()..MAGIC.len() + 4]);
        let version = u32::from_le_bytes(version);
        if version != FORMAT_VERSION {
            return Err(RuntimeError::Artifact(format!(
                "unsupported format version {version} (expected {FORMAT_VERSION})"
            )));
        }
        let digest = &header[MAGIC.len() + 4..];
        if Sha256::digest(payload).as_slice() != digest {
            return Err(RuntimeError::Artifact("checksum mismatch".to_owned()));
        }
        bincode::deserialize(payload)
            .map_err(|err| RuntimeError::Artifact(format!("cannot decode program: {err}")))
    }
}

/// Evaluate one expression against `env`
pub fn eval_expression(
    source: &str,
    thread: &mut Thread<'_>,
    env: &Globals,
    dialect: &Dialect,
) -> Result<Value> {
    let parsed = ruff_python_parser::parse_expression(source).map_err(|err| {
        let (line, column) =
            crate::syntax::line_column(source, usize::from(err.location.start()));
        RuntimeError::Parse {
            path: "<expr>".to_owned(),
            line,
            column,
            message: err.error.to_string(),
        }
    })?;
    let expr = compile::compile_expression("<expr>", &parsed.syntax().body, dialect)?;
    let frame = Frame::module(env);
    let mut evaluator = Evaluator::new(thread, *dialect);
    Ok(evaluator.eval(&expr, &frame)?)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{ErrorKind, parse};

    fn compile_source(source: &str) -> Program {
        parse("artifact.star", source)
            .and_then(|module| module.compile(&Dialect::default()))
            .expect("compiles")
    }

    #[test]
    fn test_artifact_round_trip_runs() {
        let program = compile_source("def area(r):\n    return 3 * r * r\nA = area(2)\n");
        let mut bytes = Vec::new();
        program.write_to(&mut bytes).expect("writes");
        assert!(bytes.starts_with(b"SPAK"));

        let decoded = Program::read_from(&mut bytes.as_slice()).expect("reads");
        assert_eq!(decoded.path(), "artifact.star");
        let mut thread = Thread::new("artifact");
        let globals = decoded
            .init(&mut thread, &Globals::new())
            .into_result()
            .expect("runs");
        assert_eq!(globals.get("A"), Some(&Value::Int(12)));
        assert_eq!(globals.names().collect::<Vec<_>>(), vec!["area", "A"]);
    }

    #[test]
    fn test_corrupt_artifacts_are_rejected() {
        let program = compile_source("x = 1\n");
        let mut bytes = Vec::new();
        program.write_to(&mut bytes).expect("writes");

        let mut tampered = bytes.clone();
        if let Some(last) = tampered.last_mut() {
            *last ^= 0xff;
        }
        let err = Program::read_from(&mut tampered.as_slice()).expect_err("digest mismatch");
        assert!(matches!(err, RuntimeError::Artifact(_)), "{err}");

        let mut wrong_version = bytes;
        wrong_version[4] = 9;
        let err = Program::read_from(&mut wrong_version.as_slice()).expect_err("bad version");
        assert!(err.to_string().contains("version 9"), "{err}");

        let err = Program::read_from(&mut &b"nope"[..]).expect_err("bad magic");
        assert!(matches!(err, RuntimeError::Artifact(_)), "{err}");
    }

    #[test]
    fn test_partial_globals_survive_failure() {
        let program = compile_source("a = 1\nb = {}[\"missing\"]\nc = 3\n");
        let mut thread = Thread::new("partial");
        let execution = program.init(&mut thread, &Globals::new());
        assert_eq!(execution.globals.names().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(
            execution.error.and_then(|err| err.kind()),
            Some(ErrorKind::Lookup)
        );
    }

    #[test]
    fn test_eval_expression_sees_env() {
        let mut env = Globals::new();
        env.insert("x", Value::Int(20));
        let mut thread = Thread::new("repl");
        let value = eval_expression("x * 2 + 2", &mut thread, &env, &Dialect::default())
            .expect("evaluates");
        assert_eq!(value, Value::Int(42));
    }
}
