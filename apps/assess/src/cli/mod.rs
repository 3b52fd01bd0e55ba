pub mod app;
pub mod error;
pub mod render;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::telemetry::logging::{LogConfig, LogLevel};

pub use app::run;
pub use error::CliError;

#[derive(Parser, Debug)]
#[command(
    name = "assess",
    about = "Start exam assessments and follow their graded results live",
    author,
    version
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        env = "ASSESS_API_URL",
        help = "Base URL of the assessment API"
    )]
    pub api_url: Option<String>,

    #[arg(
        long,
        global = true,
        env = "ASSESS_WS_URL",
        help = "Base URL of the streaming endpoint (derived from --api-url when unset)"
    )]
    pub ws_url: Option<String>,

    #[command(flatten)]
    pub logging: LoggingArgs,

    #[command(flatten)]
    pub store: StoreArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct LoggingArgs {
    #[arg(
        long = "log-level",
        value_enum,
        global = true,
        env = "ASSESS_LOG_LEVEL",
        default_value_t = LogLevel::Warn,
        help = "Minimum log level (error, warn, info, debug, trace)"
    )]
    pub level: LogLevel,

    #[arg(
        long = "log-file",
        value_name = "PATH",
        global = true,
        env = "ASSESS_LOG_FILE",
        help = "Write structured logs to the specified file"
    )]
    pub file: Option<PathBuf>,
}

impl LoggingArgs {
    pub fn to_config(&self) -> LogConfig {
        LogConfig {
            level: self.level,
            file: self.file.clone(),
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    #[arg(
        long = "store",
        value_name = "PATH",
        global = true,
        env = "ASSESS_STORE_PATH",
        help = "Run history file (defaults to the platform data directory)"
    )]
    pub path: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        conflicts_with = "path",
        help = "Keep run history in memory only"
    )]
    pub ephemeral: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload a student's answers and the answer key, then follow the job
    Submit(SubmitArgs),
    /// Follow an existing job's stream
    Watch(WatchArgs),
    /// List stored runs, newest first
    Runs(RunsArgs),
    /// Cross-run statistics over stored runs
    Insights,
    /// Delete all stored runs
    Clear,
}

#[derive(Args, Debug)]
pub struct SubmitArgs {
    #[arg(long, value_name = "PDF", help = "Student answer sheet")]
    pub student: PathBuf,

    #[arg(long, value_name = "PDF", help = "Answer key")]
    pub key: PathBuf,

    #[arg(long, help = "Print the job id and exit without following the stream")]
    pub detach: bool,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    #[arg(value_name = "JOB_ID")]
    pub job_id: String,
}

#[derive(Args, Debug)]
pub struct RunsArgs {
    #[arg(long, help = "Show only the latest run per student")]
    pub dedup: bool,

    #[arg(long, help = "Print runs as JSON")]
    pub json: bool,
}
