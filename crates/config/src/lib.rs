//! Configuration loading, validation, env substitution, and env overrides.
//!
//! Config files: `homegate.toml`, `homegate.yaml`, or `homegate.json`
//! Searched in `./` then `~/.config/homegate/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values. The environment
//! variables understood by earlier deployments (`NPM_URL`, `WECHAT_TOKEN`,
//! `TELEGRAM_CHAT_ID`, ...) are applied on top of the file.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{apply_env_overrides, discover_and_load, find_or_default_config_path, load_config},
    schema::{
        HomegateConfig, ImageConfig, LogConfig, ProxyConfig, RevertConfig, ServerConfig,
        TelegramConfig, WecomConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
