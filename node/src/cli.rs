//! # CLI Interface
//!
//! Command-line arguments for `strata-node`, via `clap` derive. Two
//! subcommands: `run` and `version`.

use clap::{Parser, Subcommand, ValueEnum};

use crate::logging::LogFormat;

/// Strata devnet node.
///
/// Bootstraps an in-memory ledger with a single block authority and
/// produces blocks until interrupted.
#[derive(Parser, Debug)]
#[command(
    name = "strata-node",
    about = "Strata single-authority devnet node",
    version,
    propagate_version = true
)]
pub struct StrataNodeCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the block generator.
    Run(RunArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Time between blocks, in milliseconds.
    #[arg(long, env = "STRATA_BLOCK_PERIOD_MS", default_value_t = 1000)]
    pub block_period_ms: u64,

    /// Maximum transactions per block.
    #[arg(long, env = "STRATA_MAX_TXS_PER_BLOCK", default_value_t = 10_000)]
    pub max_txs_per_block: usize,

    /// Commit blocks even when nothing is pending.
    #[arg(long, env = "STRATA_EMPTY_BLOCKS")]
    pub empty_blocks: bool,

    /// Issue a demo asset on startup so the first block carries a
    /// transaction.
    #[arg(long)]
    pub demo: bool,

    /// Default log filter when `RUST_LOG` is unset.
    #[arg(long, env = "STRATA_LOG_LEVEL", default_value = "strata_node=info,strata_protocol=info")]
    pub log_level: String,

    /// Log output format.
    #[arg(long, env = "STRATA_LOG_FORMAT", value_enum, default_value_t = LogFormatArg::Pretty)]
    pub log_format: LogFormatArg,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        StrataNodeCli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = StrataNodeCli::try_parse_from([
            "strata-node",
            "run",
            "--block-period-ms",
            "250",
            "--max-txs-per-block",
            "10",
            "--log-format",
            "json",
        ])
        .unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.block_period_ms, 250);
                assert_eq!(args.max_txs_per_block, 10);
                assert_eq!(args.log_format, LogFormatArg::Json);
                assert!(!args.demo);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
