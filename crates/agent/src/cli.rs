use clap::{Args, Parser, Subcommand, ValueEnum};
use infrastructure::config::{LogFormat, LogLevel};
use infrastructure::constants::DEFAULT_HTTP_PORT;

#[derive(Parser, Debug)]
#[command(
    name = "domainwatch-agent",
    about = "Domain availability monitoring agent",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Log level override (takes precedence over LOG_LEVEL)
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Log format: json (default, production) or text (development)
    #[arg(long)]
    pub log_format: Option<LogFormat>,

    /// Output format for query subcommands
    #[arg(short, long, default_value = "table", global = true)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table (default)
    Table,
    /// Raw JSON from the API
    Json,
}

/// Connection parameters for reaching a running agent.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Agent ops API host
    #[arg(long, default_value = "127.0.0.1", env = "DOMAINWATCH_HOST")]
    pub host: String,

    /// Agent ops API port
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT, env = "DOMAINWATCH_PORT")]
    pub port: u16,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Display version and build information
    Version,

    /// Query running monitor status
    Status {
        #[command(flatten)]
        conn: ConnectionArgs,
    },

    /// Check monitor health
    Health {
        #[command(flatten)]
        conn: ConnectionArgs,
    },

    /// List monitored domains with their last verdict
    Domains {
        #[command(flatten)]
        conn: ConnectionArgs,
    },

    /// Show the detailed record for one domain
    Domain {
        #[command(flatten)]
        conn: ConnectionArgs,

        /// Domain name to inspect
        name: String,
    },

    /// Display Prometheus metrics
    Metrics {
        #[command(flatten)]
        conn: ConnectionArgs,

        /// Substring filter on metric lines
        #[arg(long)]
        filter: Option<String>,
    },

    /// Force a domain-list refresh and reschedule all checks
    Refresh {
        #[command(flatten)]
        conn: ConnectionArgs,
    },
}

pub fn parse() -> Cli {
    Cli::parse()
}
