//! Command-line driver for a single Partage replica: local identity, one or
//! more groups, and a filesystem-simulated relay standing in for the real
//! sync server (§6).

mod commands;
mod config;
mod relay_fs;
mod storage_file;

use clap::{Parser, Subcommand};
use config::CliConfig;
use partage_core::GroupId;
use relay_fs::LocalFsRelay;
use std::path::PathBuf;
use std::sync::Arc;
use storage_file::FileStorage;

#[derive(Parser)]
#[command(name = "partage")]
#[command(about = "Offline-first, end-to-end encrypted shared ledger", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Local device identity
    Identity {
        #[command(subcommand)]
        action: IdentityCommand,
    },
    /// Groups this replica holds
    Group {
        #[command(subcommand)]
        action: GroupCommand,
    },
    /// Invite links and join requests
    Invite {
        #[command(subcommand)]
        action: InviteCommand,
    },
    /// Expense and transfer entries
    Entry {
        #[command(subcommand)]
        action: EntryCommand,
    },
    /// Net balances for a group
    Balance {
        #[arg(long)]
        group: String,
    },
    /// A minimum-transaction settlement plan
    Settlement {
        #[arg(long)]
        group: String,
    },
    /// The activity feed for a group
    Activity {
        #[arg(long)]
        group: String,
    },
    /// Pull and push against the relay
    Sync {
        #[arg(long)]
        group: String,
    },
}

#[derive(Subcommand)]
enum IdentityCommand {
    Init,
    Show,
}

#[derive(Subcommand)]
enum GroupCommand {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "USD")]
        currency: String,
    },
    List,
}

#[derive(Subcommand)]
enum InviteCommand {
    Create {
        #[arg(long)]
        group: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "https://partage.app")]
        origin: String,
    },
    Join {
        link: String,
    },
    Approve {
        #[arg(long)]
        group: String,
        #[arg(long)]
        joiner_name: String,
        /// `memberHash:ecdhPublicKeyHex` for every other current member.
        #[arg(long = "recipient", value_parser = parse_recipient)]
        recipients: Vec<(String, String)>,
    },
    /// Wait for this device's own key package to arrive and import it.
    ReceiveKeys {
        #[arg(long)]
        group: String,
    },
}

fn parse_recipient(input: &str) -> Result<(String, String), String> {
    let (hash, key) = input.split_once(':').ok_or_else(|| "expected memberHash:ecdhPublicKeyHex".to_string())?;
    Ok((hash.to_string(), key.to_string()))
}

#[derive(Subcommand)]
enum EntryCommand {
    AddTransfer {
        #[arg(long)]
        group: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: f64,
        #[arg(long, default_value = "USD")]
        currency: String,
    },
    AddExpense {
        #[arg(long)]
        group: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        payer: String,
        #[arg(long)]
        amount: f64,
        #[arg(long, default_value = "USD")]
        currency: String,
        #[arg(long = "beneficiary")]
        beneficiaries: Vec<String>,
    },
    List {
        #[arg(long)]
        group: String,
    },
    Delete {
        #[arg(long)]
        group: String,
        #[arg(long)]
        id: String,
        #[arg(long)]
        reason: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(CliConfig::default_config_path);
    let config = CliConfig::load(&config_path);

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.log_level))
        .init();

    match run(cli.command, &config).await {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            eprintln!("error: {:#}", err);
            std::process::exit(exit_code_for(&err));
        }
    }
}

/// Maps a failure back through to a `PartageError` where possible so exit
/// codes follow §6; anything else (arg parsing, local I/O) is a user error.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<partage_core::PartageError>().map(|e| e.exit_code()).unwrap_or(1)
}

async fn run(command: Command, config: &CliConfig) -> anyhow::Result<()> {
    let storage = Arc::new(FileStorage::open(config.data_dir.join("store.json"))?);
    let relay = Arc::new(LocalFsRelay::new(config.relay_dir.clone()));

    match command {
        Command::Identity { action } => match action {
            IdentityCommand::Init => commands::identity_init(&storage).await,
            IdentityCommand::Show => commands::identity_show(&storage).await,
        },
        Command::Group { action } => match action {
            GroupCommand::Create { name, currency } => commands::group_create(&storage, &relay, name, currency).await,
            GroupCommand::List => commands::group_list(&storage).await,
        },
        Command::Invite { action } => match action {
            InviteCommand::Create { group, name, origin } => commands::invite_create(&relay, GroupId::from(group.as_str()), name, origin).await,
            InviteCommand::Join { link } => commands::invite_join(&storage, &relay, link).await,
            InviteCommand::Approve { group, joiner_name, recipients } => {
                commands::invite_approve(&storage, relay, GroupId::from(group.as_str()), joiner_name, recipients).await
            }
            InviteCommand::ReceiveKeys { group } => commands::invite_receive_keys(&storage, relay, GroupId::from(group.as_str())).await,
        },
        Command::Entry { action } => match action {
            EntryCommand::AddTransfer { group, from, to, amount, currency } => {
                commands::entry_add_transfer(&storage, relay, GroupId::from(group.as_str()), from, to, amount, currency).await
            }
            EntryCommand::AddExpense { group, description, payer, amount, currency, beneficiaries } => {
                commands::entry_add_expense(&storage, relay, GroupId::from(group.as_str()), description, payer, amount, currency, beneficiaries).await
            }
            EntryCommand::List { group } => commands::entry_list(&storage, GroupId::from(group.as_str())).await,
            EntryCommand::Delete { group, id, reason } => commands::entry_delete(&storage, relay, GroupId::from(group.as_str()), id, reason).await,
        },
        Command::Balance { group } => commands::balance_show(&storage, GroupId::from(group.as_str())).await,
        Command::Settlement { group } => commands::settlement_plan(&storage, GroupId::from(group.as_str())).await,
        Command::Activity { group } => commands::activity_list(&storage, GroupId::from(group.as_str())).await,
        Command::Sync { group } => commands::sync_now(&storage, relay, GroupId::from(group.as_str())).await,
    }
}
