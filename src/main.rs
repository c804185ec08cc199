use clap::{Parser, Subcommand};
use custody::config::WalletConfig;
use custody::identity::{Address, Keypair};
use custody::service::LedgerService;
use custody::storage::LedgerStore;
use custody::units::{format_units, parse_units, Amount};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "wallet", version, about = "Custodial ledger: deposit, withdraw, audit")]
struct Cli {
    /// Database directory (overrides CUSTODY_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log filter, e.g. "debug" (overrides CUSTODY_LOG)
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage participant keypairs
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },
    /// Credit external funds to a participant
    Fund { who: String, amount: String },
    /// Move a participant's external funds into the ledger
    Deposit { who: String, amount: String },
    /// Withdraw from a participant's ledger balance
    Withdraw { who: String, amount: String },
    /// Show ledger balance and external funds
    Balance { who: String },
    /// Show funds held in custody
    Custody,
    /// Check recorded balances against custody
    Audit,
    /// Print and clear the event log
    Events,
}

#[derive(Subcommand)]
enum AccountAction {
    /// Generate a keypair and store it under a label
    New {
        #[arg(long)]
        label: String,
    },
    /// List stored labels and their addresses
    List,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = WalletConfig::from_env()?;
    if let Some(dir) = &cli.data_dir {
        config = config.with_data_dir(dir);
    }
    if let Some(filter) = &cli.log {
        config = config.with_log_filter(filter);
    }
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .with_target(false)
        .init();

    let store = LedgerStore::open(&config.data_dir)?;
    info!(data_dir = %config.data_dir.display(), "store opened");

    let decimals = config.decimals;
    let show = |amount: Amount| format_units(amount, decimals);

    match cli.command {
        Command::Account { action } => match action {
            AccountAction::New { label } => {
                if store.load_keypair_with_label(&label)?.is_some() {
                    return Err(format!("label '{}' already exists", label).into());
                }
                let keypair = Keypair::generate();
                store.save_keypair_with_label(&keypair, &label)?;
                store.flush()?;
                println!("{} {}", label, keypair.address());
            }
            AccountAction::List => {
                let mut entries: Vec<_> = address_book(&store)?.into_iter().collect();
                entries.sort();
                for (label, address) in entries {
                    println!("{} {}", label, address);
                }
            }
        },
        command => {
            let book = address_book(&store)?;
            let service = LedgerService::open(store)?;

            match command {
                Command::Fund { who, amount } => {
                    let who = resolve(&book, &who)?;
                    let funds = service.fund(who, parse_units(&amount, decimals)?).await?;
                    println!("{} external funds: {}", who, show(funds));
                }
                Command::Deposit { who, amount } => {
                    let who = resolve(&book, &who)?;
                    service.deposit(who, parse_units(&amount, decimals)?).await?;
                    println!("{} balance: {}", who, show(service.balance_of(&who).await));
                }
                Command::Withdraw { who, amount } => {
                    let who = resolve(&book, &who)?;
                    service.withdraw(who, parse_units(&amount, decimals)?).await?;
                    println!("{} balance: {}", who, show(service.balance_of(&who).await));
                }
                Command::Balance { who } => {
                    let who = resolve(&book, &who)?;
                    println!("ledger balance: {}", show(service.balance_of(&who).await));
                    println!("external funds: {}", show(service.funds_of(&who).await));
                }
                Command::Custody => {
                    println!("custodied: {}", show(service.custodied().await));
                }
                Command::Audit => {
                    service.audit().await?;
                    let stats = service.stats().await;
                    println!(
                        "ok: {} participants, {} recorded, {} deposits, {} withdrawals, {} failed",
                        stats.participants,
                        show(stats.total_balance),
                        stats.deposits,
                        stats.withdrawals,
                        stats.failed_withdrawals
                    );
                }
                Command::Events => {
                    for record in service.drain_events().await? {
                        println!(
                            "#{} {} {}",
                            record.seq(),
                            record.recorded_at().to_rfc3339(),
                            record.event()
                        );
                    }
                }
                Command::Account { .. } => {}
            }
        }
    }

    Ok(())
}

/// Stored labels and the addresses they own
fn address_book(store: &LedgerStore) -> Result<HashMap<String, Address>, Box<dyn std::error::Error>> {
    let mut book = HashMap::new();
    for label in store.list_labels()? {
        if let Some(keypair) = store.load_keypair_with_label(&label)? {
            book.insert(label, keypair.address());
        }
    }
    Ok(book)
}

/// A stored label or a literal address
fn resolve(book: &HashMap<String, Address>, who: &str) -> Result<Address, Box<dyn std::error::Error>> {
    if let Some(address) = book.get(who) {
        return Ok(*address);
    }
    Address::parse(who).map_err(|e| format!("'{}' is neither a label nor an address: {}", who, e).into())
}
