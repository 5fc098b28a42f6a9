use std::{fs, path::PathBuf, process::ExitCode};

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use log::{LevelFilter, debug, error, info};
use starpack::{config::Config, emitter, orchestrator::BundleOrchestrator, repl, util};

/// Bundle a graph of Starlark modules into one compiled artifact, or run an
/// artifact in an interactive session.
#[derive(Parser, Debug)]
#[command(name = "starpack", version, about)]
struct Cli {
    /// Entry module or directory of modules; without --output, a compiled artifact to run
    #[arg(short, long, visible_alias = "file")]
    entry: String,

    /// Write the compiled bundle here
    #[arg(short, long)]
    output: Option<String>,

    /// Module file suffix, e.g. ".star"; required for directory entries
    #[arg(long)]
    suffix: Option<String>,

    /// Allow the set data type
    #[arg(long)]
    set: bool,

    /// Allow while statements and recursive functions
    #[arg(long)]
    recursion: bool,

    /// Allow reassignment of globals, and if/for/while statements at top level
    #[arg(long, alias = "globalreassign")]
    global_reassign: bool,

    /// Also write the assembled program as source text
    #[arg(long)]
    emit_source: Option<PathBuf>,

    /// Project configuration file, instead of ./starpack.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(suffix) = &self.suffix {
            config.suffix.clone_from(suffix);
        }
        config.dialect.allow_set |= self.set;
        config.dialect.allow_recursion |= self.recursion;
        config.dialect.allow_global_reassign |= self.global_reassign;
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    let entry = util::normalize_separators(&cli.entry).into_owned();

    match &cli.output {
        Some(output) => compile(cli, config, &entry, &util::normalize_separators(output)),
        None => {
            info!("Executing {entry} in REPL");
            let globals = emitter::run_artifact(entry.as_ref())
                .with_context(|| format!("Failed to run {entry}"))?;
            if let Some(registry) = emitter::registry_of(&globals) {
                for (module, exports) in &registry {
                    debug!("Registered {module}: {} exports", exports.len());
                }
            }
            repl::run(globals, config.dialect)
        }
    }
}

fn compile(cli: &Cli, config: Config, entry: &str, output: &str) -> Result<()> {
    if util::same_path(entry.as_ref(), output.as_ref()) {
        bail!("entry and output are the same path: {entry}");
    }
    info!("Bundling {entry} into {output}");

    let dialect = config.dialect;
    let bundle = BundleOrchestrator::new(config)
        .bundle(entry.as_ref())
        .with_context(|| format!("Failed to bundle {entry}"))?;
    info!("Load order: {}", bundle.load_order.join(", "));

    if let Some(path) = &cli.emit_source {
        fs::write(path, emitter::render_source(&bundle.module))
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    let program = emitter::compile_bundle(&bundle.module, &dialect)?;
    emitter::write_artifact(&program, output.as_ref())?;
    Ok(())
}
