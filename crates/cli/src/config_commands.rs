use {anyhow::Result, clap::Subcommand};

use homegate_config::{HomegateConfig, Severity, ValidationResult};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration (file plus environment) and report errors/warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
}

pub fn handle_config(action: ConfigAction, config: &HomegateConfig) -> Result<()> {
    match action {
        ConfigAction::Check { verbose } => check(config, verbose),
    }
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn check(config: &HomegateConfig, verbose: bool) -> Result<()> {
    let path = homegate_config::find_or_default_config_path();
    if path.exists() {
        eprintln!("Checking {} (with environment overrides)\n", path.display());
    } else {
        eprintln!("No config file found; checking defaults and environment.\n");
    }

    let result = homegate_config::validate(config);
    let lines = render(&result, verbose);
    for line in &lines {
        eprintln!("{line}");
    }
    if !lines.is_empty() {
        eprintln!();
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);
    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }

    if errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn render(result: &ValidationResult, verbose: bool) -> Vec<String> {
    result
        .diagnostics
        .iter()
        .filter(|d| verbose || d.severity != Severity::Info)
        .map(|d| {
            let color = match d.severity {
                Severity::Error => RED,
                Severity::Warning => YELLOW,
                Severity::Info => CYAN,
            };
            if d.path.is_empty() {
                format!("  {BOLD}{color}{}{RESET} {}", d.severity, d.message)
            } else {
                format!("  {BOLD}{color}{}{RESET} {}: {}", d.severity, d.path, d.message)
            }
        })
        .collect()
}
