use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::HomegateConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "homegate.toml",
    "homegate.yaml",
    "homegate.yml",
    "homegate.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<HomegateConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations, then apply environment
/// overrides.
///
/// Search order:
/// 1. `./homegate.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/homegate/homegate.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `HomegateConfig::default()` when no file is found, which is
/// the normal case for container deployments configured purely through env.
pub fn discover_and_load() -> HomegateConfig {
    let mut config = match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                HomegateConfig::default()
            })
        },
        None => {
            debug!("no config file found, using defaults");
            HomegateConfig::default()
        },
    };
    apply_env_overrides(&mut config);
    config
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/homegate/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "homegate").map(|d| d.config_dir().to_path_buf())
}

/// Returns the path of an existing config file, or the default TOML path.
pub fn find_or_default_config_path() -> PathBuf {
    if let Some(path) = find_config_file() {
        return path;
    }
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("homegate.toml")
}

/// Apply the process environment on top of `config`.
pub fn apply_env_overrides(config: &mut HomegateConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

/// Environment variable names and the fields they override. Empty values are
/// ignored so `FOO=` in a compose file does not wipe a file setting.
pub(crate) fn apply_env_overrides_with(
    config: &mut HomegateConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
    let secret = |name: &str| get(name).map(Secret::new);

    if let Some(v) = secret("WECHAT_API_TOKEN") {
        config.wecom.api_token = Some(v);
    }
    if let Some(v) = secret("WECHAT_TOKEN") {
        config.wecom.token = Some(v);
    }
    if let Some(v) = secret("WECHAT_ENCODING_AES_KEY") {
        config.wecom.encoding_aes_key = Some(v);
    }
    if let Some(v) = get("WECHAT_CORP_ID") {
        config.wecom.corp_id = v;
    }
    if let Some(v) = secret("WECHAT_CORP_SECRET") {
        config.wecom.corp_secret = Some(v);
    }
    if let Some(v) = get("WECHAT_AGENT_ID") {
        config.wecom.agent_id = Some(v);
    }

    if let Some(v) = get("NPM_URL") {
        config.proxy.url = v;
    }
    if let Some(v) = get("NPM_ITEM_ID") {
        config.proxy.item_id = v;
    }
    if let Some(v) = get("NPM_IDENTITY") {
        config.proxy.identity = v;
    }
    if let Some(v) = secret("NPM_SECRET") {
        config.proxy.secret = v;
    }

    if let Some(v) = get("PIC_URL_OPEN") {
        config.images.open_url = v;
    }
    if let Some(v) = get("PIC_URL_CLOSED") {
        config.images.closed_url = v;
    }

    if let Some(v) = secret("TELEGRAM_TOKEN") {
        config.telegram.token = Some(v);
    }
    if let Some(v) = get("TELEGRAM_CHAT_ID") {
        config.telegram.chat_id = Some(v);
    }
    if let Some(v) = secret("TELEGRAM_WEBHOOK_SECRET") {
        config.telegram.webhook_secret = Some(v);
    }

    if let Some(v) = get("CURRENT_THREAD_WAIT_TIME") {
        match v.trim().parse::<u64>() {
            Ok(secs) => config.revert.window_secs = secs,
            Err(e) => warn!(value = %v, error = %e, "ignoring invalid CURRENT_THREAD_WAIT_TIME"),
        }
    }
    if let Some(v) = get("LOG_LEVEL") {
        config.log.level = v.to_ascii_lowercase();
    }
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<HomegateConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
