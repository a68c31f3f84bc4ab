use clap::{Parser, Subcommand};

/// Keygate — token authentication and storage service
#[derive(Parser)]
#[command(name = "keygate", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind (overrides KEYGATE_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage API tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },

    /// Storage diagnostics
    Storage {
        #[command(subcommand)]
        command: StorageCommands,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Create a token; prints the plaintext secret exactly once
    Create {
        #[arg(long)]
        name: String,
        /// Permission tags, e.g. expenses:read,expenses:write
        #[arg(long, value_delimiter = ',')]
        permissions: Option<Vec<String>>,
        /// Days until expiry; omit for a token that never expires
        #[arg(long)]
        expires_in_days: Option<u32>,
    },
    /// List tokens
    List,
    /// Permanently delete a token
    Revoke {
        #[arg(long)]
        id: String,
    },
}

#[derive(Subcommand)]
pub enum StorageCommands {
    /// Show the active backend and basic health
    Info,
}
