//! Command-line arguments.

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;
use skydrive_uploader::ConflictAction;

use crate::config::UploaderConfig;

/// What to do when a file with the same name already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictMode {
    /// Prompt on the terminal for every collision.
    Ask,
    Always(ConflictAction),
}

fn parse_conflict_mode(s: &str) -> Result<ConflictMode, String> {
    if s.eq_ignore_ascii_case("ask") {
        return Ok(ConflictMode::Ask);
    }
    s.parse::<ConflictAction>().map(ConflictMode::Always)
}

/// Parses a byte count with an optional kb/mb/gb suffix.
fn parse_size(s: &str) -> Result<u64> {
    let s_lower = s.to_lowercase();

    let (num_str, multiplier): (&str, u64) = if let Some(stripped) = s_lower.strip_suffix("gb") {
        (stripped.trim(), 1024 * 1024 * 1024)
    } else if let Some(stripped) = s_lower.strip_suffix("mb") {
        (stripped.trim(), 1024 * 1024)
    } else if let Some(stripped) = s_lower.strip_suffix("kb") {
        (stripped.trim(), 1024)
    } else {
        (s_lower.as_str(), 1)
    };

    let num = num_str
        .trim()
        .parse::<u64>()
        .map_err(|_| anyhow!("invalid number: '{num_str}'"))?;
    if num == 0 {
        return Err(anyhow!("size must be greater than zero"));
    }

    num.checked_mul(multiplier)
        .ok_or_else(|| anyhow!("size overflows u64"))
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Upload files and folders to a SkyDrive server")]
pub struct Cli {
    /// Files or directories to upload
    #[arg(required = true, value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Destination folder id (0 is the root folder)
    #[arg(long, short = 'p', default_value_t = 0)]
    pub parent_id: i64,

    /// Server URL, e.g. https://drive.example.com
    #[arg(long)]
    pub server: Option<String>,

    /// API token
    #[arg(long)]
    pub token: Option<String>,

    /// ask, rename, replace or skip
    #[arg(long, value_name = "MODE", default_value = "ask", value_parser = parse_conflict_mode)]
    pub on_conflict: ConflictMode,

    /// Files uploaded at the same time
    #[arg(long, short = 'j')]
    pub concurrency: Option<usize>,

    /// Transfer chunk size (e.g. 8mb)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub chunk_size: Option<u64>,

    /// Write server, token and tuning flags back to the config file
    #[arg(long)]
    pub save_config: bool,

    /// Print detailed output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Overrides file values with the flags that were given.
    pub fn apply(&self, config: &mut UploaderConfig) {
        if let Some(server) = &self.server {
            config.server_url = server.clone();
        }
        if let Some(token) = &self.token {
            config.api_token = token.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
    }
}
