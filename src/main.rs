//! Shares a folder via HTTP.
//!
//! Useful for quick sharing on a local network. Not suitable for public
//! hosting over the internet.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod config;
mod content;
mod error;
mod filtered;
mod fs;
mod listing;
mod path_filter;
mod server;
mod utils;

use config::{ConfigError, ShareConfig};

#[derive(Parser, Debug)]
#[command(name = "sharefolder")]
#[command(about = "Share a folder read-only over HTTP")]
#[command(version)]
struct Cli {
    /// Folder to share (the current working directory if not specified)
    folder: Option<PathBuf>,

    /// Address to start the server on
    #[arg(long, env = "SHAREFOLDER_ADDR")]
    addr: Option<String>,

    /// Require basic authentication username
    #[arg(long, env = "SHAREFOLDER_USERNAME")]
    username: Option<String>,

    /// Require basic authentication password
    #[arg(long, env = "SHAREFOLDER_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Prompt for the password on the console instead of passing --password
    #[arg(long)]
    prompt_password: bool,

    /// Config file path (optional)
    #[arg(short, long, env = "SHAREFOLDER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, env = "SHAREFOLDER_VERBOSE")]
    verbose: bool,
}

impl Cli {
    /// Config file values, overridden by whatever was given on the command line.
    fn into_config(self) -> Result<ShareConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ShareConfig::from_file(path)?,
            None => ShareConfig::default(),
        };
        if let Some(addr) = self.addr {
            config.addr = addr;
        }
        if let Some(username) = self.username {
            config.username = username;
        }
        if let Some(password) = self.password {
            config.password = password;
        }
        if let Some(folder) = self.folder {
            config.root = Some(folder);
        }
        Ok(config)
    }
}

fn prompt_password() -> std::io::Result<String> {
    print!("Enter basic authentication password: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "sharefolder=debug,warp=debug"
    } else {
        "sharefolder=info,warp=info"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let prompt = cli.prompt_password;
    let mut config = cli.into_config()?;
    if prompt {
        config.password = prompt_password()?;
    }

    if !config.password.is_empty() {
        info!("Using basic auth password {}", utils::mask(&config.password));
    }
    if !config.username.is_empty() {
        info!("Using basic auth username {}", utils::mask(&config.username));
    }

    server::serve_files(&config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["sharefolder"]).unwrap();
        assert!(!cli.prompt_password);
        let config = cli.into_config().unwrap();
        assert_eq!(config, ShareConfig::default());
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "sharefolder",
            "--addr",
            "127.0.0.1:9000",
            "--username",
            "user",
            "--password",
            "pass",
            "/srv/share",
        ])
        .unwrap();
        let config = cli.into_config().unwrap();
        assert_eq!(config.addr, "127.0.0.1:9000");
        assert_eq!(config.username, "user");
        assert_eq!(config.password, "pass");
        assert_eq!(config.root, Some(PathBuf::from("/srv/share")));
    }

    #[test]
    fn test_cli_overrides_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sharefolder.toml");
        std::fs::write(&path, "addr = \"127.0.0.1:9000\"\nusername = \"file-user\"\npassword = \"file-pass\"\n").unwrap();

        let cli = Cli::try_parse_from([
            "sharefolder",
            "--config",
            path.to_str().unwrap(),
            "--username",
            "cli-user",
        ])
        .unwrap();
        let config = cli.into_config().unwrap();
        assert_eq!(config.addr, "127.0.0.1:9000");
        assert_eq!(config.username, "cli-user");
        assert_eq!(config.password, "file-pass");
    }
}
