use clap::{Parser, Subcommand};

/// torgate - Tor exit node feed with an authenticated exclusion list
#[derive(Parser)]
#[command(name = "torgate", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API
    Serve {
        /// Port to bind (defaults to TORGATE_PORT, then 5000)
        #[arg(short, long)]
        port: Option<u16>,
        /// Keep the exclusion list in memory instead of PostgreSQL
        #[arg(long)]
        in_memory: bool,
    },

    /// Manage the exclusion list directly in the database
    Exclusions {
        #[command(subcommand)]
        command: ExclusionCommands,
    },

    /// Issue bearer tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },

    /// Inspect the configured exit node sources
    Sources {
        #[command(subcommand)]
        command: SourceCommands,
    },
}

#[derive(Subcommand)]
pub enum ExclusionCommands {
    /// Add one or more addresses
    Add {
        #[arg(required = true)]
        ips: Vec<String>,
    },
    /// List excluded addresses
    List,
    /// Remove an address
    Remove { ip: String },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Sign a token for a configured user
    Issue {
        #[arg(long)]
        username: String,
        #[arg(long, env = "TORGATE_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[derive(Subcommand)]
pub enum SourceCommands {
    /// Fetch every source once and print the harvested addresses
    Fetch,
}
