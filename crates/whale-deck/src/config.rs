use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

const MIN_TICK_MS: u64 = 50;

#[derive(Parser, Debug)]
#[command(name = "whale-deck")]
#[command(about = "Terminal dashboard for containers, images and volumes", long_about = None)]
pub struct Cli {
    /// Inventory refresh interval in milliseconds
    #[arg(long, env = "WHALE_DECK_TICK_MS", default_value_t = 300)]
    pub tick_ms: u64,
    /// Give up on a single list call after this many milliseconds
    #[arg(long, env = "WHALE_DECK_POLL_TIMEOUT_MS", default_value_t = 2000)]
    pub poll_timeout_ms: u64,
    /// Runtime endpoint (unix:///path/to/docker.sock or tcp://host:port)
    #[arg(long, env = "DOCKER_HOST")]
    pub docker_host: Option<String>,
    /// Also list intermediate images
    #[arg(long)]
    pub all_images: bool,
    /// Append logs to this file instead of discarding them
    #[arg(long, env = "WHALE_DECK_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub tick_rate: Duration,
    pub poll_timeout: Duration,
    pub docker_host: Option<String>,
    pub include_intermediate_images: bool,
    pub log_file: Option<PathBuf>,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        if cli.tick_ms < MIN_TICK_MS {
            bail!("--tick-ms must be at least {MIN_TICK_MS}, got {}", cli.tick_ms);
        }
        if cli.poll_timeout_ms == 0 {
            bail!("--poll-timeout-ms must be greater than zero");
        }
        let docker_host = cli
            .docker_host
            .map(|host| host.trim().to_string())
            .filter(|host| !host.is_empty());

        Ok(Self {
            tick_rate: Duration::from_millis(cli.tick_ms),
            poll_timeout: Duration::from_millis(cli.poll_timeout_ms),
            docker_host,
            include_intermediate_images: cli.all_images,
            log_file: cli.log_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_sub_second_tick() {
        let cli = Cli::try_parse_from(["whale-deck", "--docker-host", " "]).expect("parse");
        let config = Config::from_cli(cli).expect("config");
        assert!(config.tick_rate < Duration::from_secs(1));
        assert!(config.docker_host.is_none());
        assert!(!config.include_intermediate_images);
    }

    #[test]
    fn rejects_tick_below_floor() {
        let cli = Cli::try_parse_from(["whale-deck", "--tick-ms", "10"]).expect("parse");
        assert!(Config::from_cli(cli).is_err());
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "whale-deck",
            "--tick-ms",
            "1000",
            "--poll-timeout-ms",
            "250",
            "--all-images",
            "--docker-host",
            "tcp://10.0.0.2:2375",
        ])
        .expect("parse");
        let config = Config::from_cli(cli).expect("config");
        assert_eq!(config.tick_rate, Duration::from_secs(1));
        assert_eq!(config.poll_timeout, Duration::from_millis(250));
        assert!(config.include_intermediate_images);
        assert_eq!(config.docker_host.as_deref(), Some("tcp://10.0.0.2:2375"));
    }
}
