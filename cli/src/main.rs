//! Command-line client for the notes service.
//!
//! Commands:
//! - register, login, refresh, logout, me: account and token lifecycle
//! - notes list|get|create|update|delete: note operations
//! - smoke: health and list checks with a latency summary
//!
//! Configuration via environment:
//! - NOTES_URL: Base URL of the server (default: http://localhost:8080)
//! - NOTES_TOKEN: access token sent as `Authorization: Bearer`

mod commands;

use clap::{Parser, Subcommand};

use commands::{
    auth::{CredentialsArgs, LogoutArgs, MeArgs, RefreshArgs},
    notes::NotesArgs,
    smoke::SmokeArgs,
};

/// Notes API client
///
/// Prints JSON by default; `--human` switches to formatted output.
#[derive(Parser)]
#[command(name = "notes")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output human-readable formatted text instead of JSON
    #[arg(long, global = true)]
    human: bool,

    /// Notes server URL
    #[arg(
        long,
        env = "NOTES_URL",
        default_value = "http://localhost:8080",
        global = true
    )]
    url: String,

    /// Access token for authenticated requests
    #[arg(long, env = "NOTES_TOKEN", global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account
    Register(CredentialsArgs),

    /// Log in and obtain a token pair
    Login(CredentialsArgs),

    /// Rotate a refresh token
    Refresh(RefreshArgs),

    /// Revoke a refresh token
    Logout(LogoutArgs),

    /// Show the claims of the current access token
    Me(MeArgs),

    /// Read and write notes
    Notes(NotesArgs),

    /// Run health and list checks against the server
    Smoke(SmokeArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let client = match commands::build_client(cli.token.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let url = cli.url.trim_end_matches('/');

    let result = match cli.command {
        Commands::Register(args) => commands::auth::register(&client, url, cli.human, args).await,
        Commands::Login(args) => commands::auth::login(&client, url, cli.human, args).await,
        Commands::Refresh(args) => commands::auth::refresh(&client, url, cli.human, args).await,
        Commands::Logout(args) => commands::auth::logout(&client, url, cli.human, args).await,
        Commands::Me(args) => commands::auth::me(&client, url, cli.human, args).await,
        Commands::Notes(args) => commands::notes::execute(&client, url, cli.human, args).await,
        Commands::Smoke(args) => commands::smoke::execute(&client, url, cli.human, args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
