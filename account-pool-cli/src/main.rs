//! Account pool CLI
//!
//! Entry point of the `account-pool` command-line tool.
//!
//! # Exit Codes
//!
//! - `ExitCode::Success` (0): operation completed, or the confirmation was declined
//! - `ExitCode::Error` (1): any failure; the message and its cause chain go to stderr
//!
//! Argument errors are reported by clap with its own usage exit code.

use std::path::PathBuf;
use std::process;

use account_pool_core::ReclaimTarget;
use anyhow::Result;
use clap::{ArgGroup, Parser, Subcommand};

mod commands;
mod output;
mod types;

use types::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "account-pool",
    author,
    version,
    about = "Lend AWS sub-accounts from an Organizations pool to developers and reclaim them",
    long_about = "Manages a pool of pre-provisioned AWS accounts per payer organization:\n\n\
• assign: claim a free account for a user and move it into the claimed OU\n\
• list: show who owns which account\n\
• unassign: return accounts to the pool root and delete the IAM users, roles and policies left in them\n\n\
Examples:\n  \
account-pool assign --payer-account osd-staging-1 --username alice\n  \
account-pool list --payer-account osd-staging-1 --user alice --pretty\n  \
account-pool unassign --payer-account osd-staging-1 --account-id 111111111111"
)]
struct Cli {
    /// Pool configuration file (JSON); the built-in payers are used when absent
    #[arg(long = "config", env = "ACCOUNT_POOL_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'd', long = "debug", global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Claim a free pool account for a user
    #[command(
        long_about = "Selects the first active, untagged account under the payer's root, tags it with \
owner=<username> and claimed=true, verifies the claim was not overwritten by a concurrent run and \
moves the account into the claimed OU. The account ID is printed to stdout."
    )]
    Assign {
        /// Payer (organization) whose pool to allocate from
        #[arg(short = 'p', long = "payer-account")]
        payer_account: String,

        /// User the account is assigned to
        #[arg(short = 'u', long = "username")]
        username: String,

        /// Assign this specific pool account instead of the first free one
        #[arg(short = 'a', long = "account-id")]
        account_id: Option<String>,
    },

    /// Show account ownership as JSON
    #[command(
        long_about = "With --account-id prints the owner of that account, with --user the accounts \
owned by that user. Without either, prints every owner of an account in the claimed OU."
    )]
    List {
        #[arg(short = 'p', long = "payer-account")]
        payer_account: String,

        /// List the accounts owned by this user
        #[arg(short = 'u', long = "user", conflicts_with = "account_id")]
        user: Option<String>,

        /// Print the owner of this account
        #[arg(short = 'a', long = "account-id")]
        account_id: Option<String>,

        /// Pretty-print the JSON output
        #[arg(long = "pretty")]
        pretty: bool,
    },

    /// Reclaim accounts: untag, move back to the pool root, delete tenant IAM artifacts
    #[command(group(
        ArgGroup::new("target")
            .required(true)
            .args(["username", "account_id"])
    ))]
    Unassign {
        #[arg(short = 'p', long = "payer-account")]
        payer_account: String,

        /// Reclaim every account owned by this user
        #[arg(short = 'u', long = "username")]
        username: Option<String>,

        /// Reclaim this account
        #[arg(short = 'a', long = "account-id")]
        account_id: Option<String>,

        /// Do not ask for confirmation
        #[arg(short = 'y', long = "yes")]
        yes: bool,
    },
}

/// Initialize logging based on configuration
fn init_logging(debug: bool) -> Result<()> {
    let log_level = if debug {
        log::LevelFilter::Trace
    } else {
        log::LevelFilter::Error
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_target(false)
        .format_timestamp_secs()
        .init();

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Assign {
            payer_account,
            username,
            account_id,
        } => {
            let (config, payer) = commands::resolve_payer(config_path, &payer_account)?;
            commands::assign(&config, &payer, &username, account_id.as_deref()).await
        }

        Commands::List {
            payer_account,
            user,
            account_id,
            pretty,
        } => {
            let (_, payer) = commands::resolve_payer(config_path, &payer_account)?;
            commands::list(&payer, user.as_deref(), account_id.as_deref(), pretty).await
        }

        Commands::Unassign {
            payer_account,
            username,
            account_id,
            yes,
        } => {
            let (config, payer) = commands::resolve_payer(config_path, &payer_account)?;
            // clap guarantees exactly one of the two
            let target = match (account_id, username) {
                (Some(id), _) => ReclaimTarget::Account(id),
                (None, Some(user)) => ReclaimTarget::User(user),
                (None, None) => anyhow::bail!("one of --username or --account-id is required"),
            };
            commands::unassign(&config, &payer, target, yes).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.debug) {
        eprintln!("account-pool: Failed to initialize logging: {e}");
        process::exit(ExitCode::Error.into());
    }

    let code = match run(cli).await {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            print_cli_command_error(&e);
            ExitCode::Error
        }
    };

    process::exit(code.into());
}

fn print_cli_command_error(e: &anyhow::Error) {
    eprintln!("Error: {e}");
    for cause in e.chain().skip(1) {
        eprintln!("  Caused by: {cause}");
    }
}
