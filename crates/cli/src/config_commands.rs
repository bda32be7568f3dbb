use std::path::{Path, PathBuf};

use {
    anyhow::{Context, Result},
    botdeck_config::{BotdeckConfig, Severity},
    clap::Subcommand,
    secrecy::Secret,
    tracing::debug,
};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors/warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
    /// Print the resolved configuration with tokens redacted.
    Show,
}

/// A resolved config and the file it came from, if any.
pub struct Loaded {
    pub config: BotdeckConfig,
    pub path: Option<PathBuf>,
}

/// Load `explicit`, else the first discovered config file, else defaults.
///
/// Unlike discovery at library level, a file that exists but fails to
/// parse is an error here.
pub fn load(explicit: Option<&Path>) -> Result<Loaded> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => botdeck_config::find_config_file(),
    };
    let config = match &path {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            botdeck_config::load_config(path)
                .with_context(|| format!("failed to load {}", path.display()))?
        },
        None => BotdeckConfig::default(),
    };
    Ok(Loaded { config, path })
}

/// Command-line values win over the file.
pub fn apply_overrides(config: &mut BotdeckConfig, bind: Option<String>, port: Option<u16>) {
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
}

pub fn redacted(config: &BotdeckConfig) -> BotdeckConfig {
    let mut config = config.clone();
    for bot in &mut config.bots {
        bot.token = Secret::new("[REDACTED]".into());
    }
    if config.queue.url.is_some() {
        config.queue.url = Some(Secret::new("[REDACTED]".into()));
    }
    config
}

pub fn handle_config(action: &ConfigAction, explicit: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Check { verbose } => check(explicit, *verbose),
        ConfigAction::Show => show(explicit),
    }
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn check(explicit: Option<&Path>, verbose: bool) -> Result<()> {
    let loaded = load(explicit)?;
    let result = botdeck_config::validate(&loaded.config);

    if let Some(ref path) = loaded.path {
        eprintln!("Checking {}\n", path.display());
    } else {
        eprintln!("No config file found; checking defaults.\n");
    }

    let mut shown = 0;
    for d in &result.diagnostics {
        if d.severity == Severity::Info && !verbose {
            continue;
        }

        let (color, label) = match d.severity {
            Severity::Error => (RED, "error"),
            Severity::Warning => (YELLOW, "warning"),
            Severity::Info => (CYAN, "info"),
        };

        if d.path.is_empty() {
            eprintln!("  {BOLD}{color}{label}{RESET} {}", d.message);
        } else {
            eprintln!("  {BOLD}{color}{label}{RESET} {}: {}", d.path, d.message);
        }
        shown += 1;
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);

    if shown > 0 {
        eprintln!();
    }

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

fn show(explicit: Option<&Path>) -> Result<()> {
    let loaded = load(explicit)?;
    let rendered = toml::to_string_pretty(&redacted(&loaded.config))
        .context("failed to render config as TOML")?;
    print!("{rendered}");
    Ok(())
}
