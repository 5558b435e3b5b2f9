//! CLI definitions for cronwatch.

use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand};

/// cronwatch CLI.
#[derive(Parser)]
#[command(name = "cronwatch")]
#[command(about = "Persistent recurring job scheduler with failure alerts")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (default: ~/.cronwatch/config.toml)
    #[arg(short, long, global = true, env = "CRONWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the scheduler in the foreground until Ctrl-C
    Run,

    /// Add a job
    #[command(group(
        ArgGroup::new("schedule")
            .required(true)
            .args(["every", "at", "cron"])
    ))]
    Add {
        /// Job name (used in alert messages)
        #[arg(short, long)]
        name: String,

        /// Fixed interval, e.g. 90s, 30m, 2h30m, 1d or plain milliseconds
        #[arg(long, value_parser = parse_duration_ms)]
        every: Option<u64>,

        /// One-shot run at an RFC 3339 timestamp
        #[arg(long)]
        at: Option<String>,

        /// Cron expression (5 or 6 fields, UTC)
        #[arg(long)]
        cron: Option<String>,

        /// Shell command to run
        #[arg(long)]
        command: String,

        /// Working directory for the command
        #[arg(long)]
        cwd: Option<String>,

        /// Free-form description
        #[arg(short, long)]
        description: Option<String>,

        /// Create the job disabled
        #[arg(long)]
        disabled: bool,

        /// Remove the job after its first successful run
        #[arg(long)]
        delete_after_run: bool,
    },

    /// List jobs
    List {
        /// Include disabled jobs
        #[arg(short, long)]
        all: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Remove a job
    Remove {
        /// Job ID
        job_id: String,
    },

    /// Run a job now
    Trigger {
        /// Job ID
        job_id: String,

        /// Only run if the job is enabled and due
        #[arg(long)]
        due: bool,
    },

    /// Show scheduler status
    Status,
}

/// Parse a human duration into milliseconds.
///
/// Accepts unit suffixes `d`, `h`, `m`, `s` and `ms` (combinable, as in
/// `2h30m`) or a bare number of milliseconds.
pub(crate) fn parse_duration_ms(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("duration cannot be empty".to_string());
    }
    if let Ok(ms) = s.parse::<u64>() {
        return if ms == 0 {
            Err("duration must be greater than 0".to_string())
        } else {
            Ok(ms)
        };
    }

    let mut total: u64 = 0;
    let mut digits = String::new();
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        let n: u64 = digits
            .parse()
            .map_err(|_| format!("invalid duration '{}'", s))?;
        digits.clear();

        let unit_ms = match ch {
            'd' => 86_400_000,
            'h' => 3_600_000,
            'm' if chars.peek() == Some(&'s') => {
                chars.next();
                1
            }
            'm' => 60_000,
            's' => 1_000,
            _ => return Err(format!("unknown duration unit '{}' in '{}'", ch, s)),
        };
        total = n
            .checked_mul(unit_ms)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(|| format!("duration '{}' is too large", s))?;
    }

    if !digits.is_empty() {
        return Err(format!("missing unit after '{}' in '{}'", digits, s));
    }
    if total == 0 {
        return Err("duration must be greater than 0".to_string());
    }
    Ok(total)
}
