//! Platform directories used by starpack

use std::path::PathBuf;

use etcetera::{BaseStrategy, choose_base_strategy};

/// File name of both the user and the project configuration
pub const CONFIG_FILE_NAME: &str = "starpack.toml";

/// `<config dir>/starpack`, following the platform's conventions
pub fn user_config_dir() -> Option<PathBuf> {
    choose_base_strategy()
        .ok()
        .map(|strategy| strategy.config_dir().join("starpack"))
}

/// Location of the user-level configuration file
pub fn user_config_file() -> Option<PathBuf> {
    user_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}
