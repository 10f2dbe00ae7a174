use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the cachefarm binary.
#[derive(Debug, Parser)]
#[command(
    name = "cachefarm",
    version,
    about = "Distributed cache refreshers for a load-balanced CMS farm"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "CACHEFARM_CONFIG_FILE",
        value_name = "PATH",
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// List every registered cache refresher.
    Refreshers,
    /// Apply a JSON batch of refresh instructions to a local cache.
    Apply(ApplyArgs),
    /// Validate a JSON payload for one refresher and print what it decodes to.
    Decode(DecodeArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override this server's identity within the farm.
    #[arg(long = "server-identity", value_name = "IDENTITY", global = true)]
    pub server_identity: Option<String>,

    /// Toggle buffering of instructions for remote servers.
    #[arg(
        long = "distributed",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub distributed: Option<bool>,
}

#[derive(Debug, Args, Clone)]
pub struct ApplyArgs {
    /// JSON array of refresh instructions, possibly nested in batches.
    #[arg(long = "instructions", value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub instructions: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct DecodeArgs {
    /// Refresher name (e.g. `content`) or unique id.
    #[arg(long = "refresher", value_name = "NAME_OR_ID")]
    pub refresher: String,

    /// JSON payload file.
    #[arg(long = "payload", value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub payload: PathBuf,
}
