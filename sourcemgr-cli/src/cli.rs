//! CLI argument parsing types using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// `SourceMgr` command-line interface for managing a fleet of game servers
#[derive(Parser)]
#[command(name = "sourcemgr")]
#[command(author, version, about = "SourceMgr game server fleet manager")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration directory
    #[arg(short, long, global = true, env = "SOURCEMGR_CONFIG_DIR")]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// List all endpoints
    #[command(about = "List all configured game servers")]
    List {
        /// Output format for the endpoint list
        #[arg(short, long, default_value = "table", value_enum)]
        format: OutputFormat,
    },

    /// Show endpoint details
    #[command(about = "Show the details of one game server")]
    Show {
        /// Endpoint label, hostname or id
        name: String,
    },

    /// Add a new endpoint
    #[command(about = "Add a game server to the configuration")]
    Add {
        #[command(flatten)]
        fields: EndpointArgs,
    },

    /// Update an endpoint
    #[command(about = "Update an existing game server")]
    Update {
        /// Endpoint label, hostname or id
        name: String,

        #[command(flatten)]
        fields: EndpointArgs,
    },

    /// Delete an endpoint
    #[command(about = "Delete a game server")]
    Delete {
        /// Endpoint label, hostname or id
        name: String,
    },

    /// Duplicate an endpoint
    #[command(about = "Copy a game server under a new id")]
    Duplicate {
        /// Endpoint label, hostname or id
        name: String,

        /// Label for the copy (defaults to "<label> (Copy)")
        #[arg(short, long)]
        new_name: Option<String>,
    },

    /// Poll live status
    #[command(about = "Query the live status of one or all servers")]
    Status {
        /// Endpoint label, hostname or id ("all" polls the whole fleet)
        #[arg(default_value = "all")]
        name: String,

        /// Output format
        #[arg(short, long, default_value = "table", value_enum)]
        format: OutputFormat,
    },

    /// Run an RCON command
    #[command(about = "Run a console command over RCON")]
    Exec {
        /// Console command line
        command: String,

        #[command(flatten)]
        targets: Targets,
    },

    /// Upload a file or directory
    #[command(about = "Upload a local file or directory over FTP/SFTP")]
    Upload {
        /// Local file or directory
        local: PathBuf,

        /// Remote destination (defaults to the file name under the root
        /// directory)
        remote: Option<String>,

        #[command(flatten)]
        targets: Targets,
    },

    /// Create a remote directory
    #[command(about = "Create a remote directory and its missing parents")]
    Mkdir {
        /// Endpoint label, hostname or id
        name: String,

        /// Remote directory path
        path: String,
    },

    /// List a remote directory
    #[command(about = "List a remote directory")]
    Ls {
        /// Endpoint label, hostname or id
        name: String,

        /// Remote directory (defaults to the working directory)
        #[arg(default_value = "")]
        path: String,
    },

    /// Poll the fleet periodically
    #[command(about = "Refresh fleet status periodically until interrupted")]
    Watch {
        /// Seconds between refreshes (defaults to the configured interval)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Stop after this many refresh rounds
        #[arg(long)]
        rounds: Option<usize>,
    },

    /// Manage stored credentials
    #[command(subcommand, about = "Inspect and migrate stored credentials")]
    Secret(SecretCommands),

    /// Generate shell completions
    #[command(about = "Generate shell completion scripts")]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Endpoint fields shared by `add` and `update`
#[derive(Args, Debug, Default)]
pub struct EndpointArgs {
    /// Display label
    #[arg(short = 'n', long = "name")]
    pub label: Option<String>,

    /// Server IP address or hostname
    #[arg(short = 'H', long = "host")]
    pub ip_address: Option<String>,

    /// RCON port (default 27015)
    #[arg(short = 'p', long)]
    pub rcon_port: Option<u16>,

    /// RCON password
    #[arg(long, env = "SOURCEMGR_RCON_PASSWORD", hide_env_values = true)]
    pub rcon_password: Option<String>,

    /// A2S query port (0 uses the RCON port)
    #[arg(long)]
    pub query_port: Option<u16>,

    /// File transfer host (defaults to the server address)
    #[arg(long)]
    pub ftp_host: Option<String>,

    /// File transfer port (defaults to the protocol's port)
    #[arg(long)]
    pub ftp_port: Option<u16>,

    /// File transfer user name
    #[arg(short = 'u', long = "ftp-user")]
    pub ftp_username: Option<String>,

    /// File transfer password
    #[arg(long, env = "SOURCEMGR_FTP_PASSWORD", hide_env_values = true)]
    pub ftp_password: Option<String>,

    /// Directory entered after login
    #[arg(long)]
    pub root_dir: Option<String>,

    /// File transfer protocol (ftp, sftp)
    #[arg(long, value_enum)]
    pub transfer: Option<TransferArg>,
}

/// Which endpoints a fleet command targets
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct Targets {
    /// Endpoint label, hostname or id (repeatable)
    #[arg(short, long = "server", value_name = "NAME")]
    pub servers: Vec<String>,

    /// Every configured endpoint
    #[arg(short, long)]
    pub all: bool,
}

/// Output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned columns
    #[default]
    Table,
    /// JSON array
    Json,
}

/// File transfer protocol argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransferArg {
    /// FTP, upgraded to FTPS when configured
    Ftp,
    /// SFTP over SSH
    Sftp,
}

/// Credential subcommands
#[derive(Subcommand)]
pub enum SecretCommands {
    /// Show how secrets are stored
    #[command(about = "Show vault state and secret counts")]
    Status,

    /// Reseal legacy plaintext secrets
    #[command(about = "Seal every plaintext secret and save the configuration")]
    Migrate,
}
