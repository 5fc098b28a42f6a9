//! Layered configuration
//!
//! Sources, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. user config, `<config dir>/starpack/starpack.toml`
//! 3. project config, `./starpack.toml` or the file passed with `--config`
//! 4. the `STARPACK_SUFFIX` environment variable
//! 5. command-line flags, applied by the binary
//!
//! ```toml
//! suffix = ".star"
//!
//! [dialect]
//! set = true
//! recursion = false
//! global-reassign = false
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;
use starpack_runtime::Dialect;

use crate::dirs;

/// Environment variable overriding the configured suffix
pub const SUFFIX_ENV: &str = "STARPACK_SUFFIX";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Appended to a module name to find its source; empty when unset
    pub suffix: String,
    /// Forwarded to the runtime when modules and the bundle are compiled
    pub dialect: Dialect,
}

/// One configuration file; every key is optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    suffix: Option<String>,
    #[serde(default)]
    dialect: DialectFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct DialectFile {
    set: Option<bool>,
    recursion: Option<bool>,
    global_reassign: Option<bool>,
}

impl Config {
    /// Load the user, project and environment layers
    ///
    /// `explicit` replaces the `./starpack.toml` lookup and must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let user = dirs::user_config_file().filter(|path| path.is_file());
        let project = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Some(PathBuf::from(dirs::CONFIG_FILE_NAME)).filter(|path| path.is_file()),
        };
        let env_suffix = std::env::var(SUFFIX_ENV).ok();
        Self::load_from_sources(user.as_deref(), project.as_deref(), env_suffix)
    }

    /// Layer the given sources over the defaults
    pub fn load_from_sources(
        user: Option<&Path>,
        project: Option<&Path>,
        env_suffix: Option<String>,
    ) -> Result<Self> {
        let mut config = Self::default();
        for path in user.into_iter().chain(project) {
            config.apply_file(path)?;
        }
        if let Some(suffix) = env_suffix {
            debug!("Using suffix {suffix:?} from {SUFFIX_ENV}");
            config.suffix = suffix;
        }
        Ok(config)
    }

    fn apply_file(&mut self, path: &Path) -> Result<()> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let file: ConfigFile = toml::from_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        debug!("Applying config file {}", path.display());

        if let Some(suffix) = file.suffix {
            self.suffix = suffix;
        }
        let DialectFile {
            set,
            recursion,
            global_reassign,
        } = file.dialect;
        if let Some(set) = set {
            self.dialect.allow_set = set;
        }
        if let Some(recursion) = recursion {
            self.dialect.allow_recursion = recursion;
        }
        if let Some(global_reassign) = global_reassign {
            self.dialect.allow_global_reassign = global_reassign;
        }
        Ok(())
    }
}
