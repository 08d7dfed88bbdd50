mod config;
mod output;
mod scheduler;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use kudos_core::{CancellationAction, CartItem, Product, ShippingInfo, TransactionKind};
use kudos_ledger::{LeaderboardPeriod, Ledger};
use kudos_storage::{HistoryQuery, LedgerDb};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::{default_config_path, NodeConfig};

#[derive(Parser)]
#[command(name = "kudosd")]
#[command(about = "Kudos points ledger", version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the database directory from the config file
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Acting administrator recorded on admin operations
    #[arg(long, default_value = "admin")]
    admin: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage directory accounts
    #[command(subcommand)]
    Account(AccountCommand),

    /// Manage the catalog
    #[command(subcommand)]
    Product(ProductCommand),

    /// Fulfil, cancel and refund orders
    #[command(subcommand)]
    Order(OrderCommand),

    /// Credit points with a reason
    Grant {
        account: String,
        amount: u64,
        #[arg(short, long)]
        reason: String,
    },

    /// Debit points with a reason
    Deduct {
        account: String,
        amount: u64,
        #[arg(short, long)]
        reason: String,
    },

    /// Send a cheer
    Cheer {
        from: String,
        to: String,
        amount: u64,
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Buy catalog items, given as PRODUCT:QTY
    Checkout {
        buyer: String,
        #[arg(required = true, value_parser = parse_cart_item)]
        items: Vec<CartItem>,
        #[arg(long)]
        ship_to: Option<String>,
        #[arg(long)]
        address: Option<String>,
    },

    /// Show an account's balance and quota
    Balance { account: String },

    /// Change an account's monthly give limit
    Limit { account: String, limit: u64 },

    /// List transactions, newest first
    History {
        account: Option<String>,
        #[arg(short, long)]
        kind: Vec<TransactionKind>,
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Points received per account
    Leaderboard {
        #[arg(short, long, value_enum, default_value = "month")]
        period: Period,
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Run one distribution cycle now
    Distribute,

    /// Reset monthly quotas that crossed a month boundary
    ResetQuotas,

    /// Run the distribution and quota schedulers until ctrl-c
    Serve,
}

#[derive(Subcommand)]
enum AccountCommand {
    Add { id: String, name: String },
    Deactivate { id: String },
    Activate { id: String },
}

#[derive(Subcommand)]
enum ProductCommand {
    Add {
        id: String,
        name: String,
        unit_cost: u64,
        #[arg(default_value = "0")]
        inventory: u64,
    },
    Restock { id: String, quantity: u64 },
    Deactivate { id: String },
}

#[derive(Subcommand)]
enum OrderCommand {
    Show { id: String },
    List { buyer: String },
    Receipt { id: String },
    Complete { id: String },
    RequestCancel { id: String, requester: String, reason: String },
    Approve {
        id: String,
        #[arg(short, long)]
        notes: Option<String>,
    },
    Deny {
        id: String,
        #[arg(short, long)]
        notes: Option<String>,
    },
    /// Cancel a pending order outright
    Cancel {
        id: String,
        /// Cancel as this buyer instead of as the admin
        #[arg(long)]
        as_buyer: Option<String>,
    },
    Refund {
        id: String,
        #[arg(short, long)]
        notes: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Period {
    Month,
    Week,
    All,
}

impl From<Period> for LeaderboardPeriod {
    fn from(period: Period) -> Self {
        match period {
            Period::Month => LeaderboardPeriod::Month,
            Period::Week => LeaderboardPeriod::Week,
            Period::All => LeaderboardPeriod::AllTime,
        }
    }
}

fn parse_cart_item(s: &str) -> Result<CartItem, String> {
    let (product, qty) = s
        .rsplit_once(':')
        .ok_or_else(|| format!("expected PRODUCT:QTY, got {}", s))?;
    let quantity = qty
        .parse::<u64>()
        .map_err(|e| format!("bad quantity in {}: {}", s, e))?;
    Ok(CartItem::new(product, quantity))
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let (mut config, found) = NodeConfig::load(&config_path)?;
    init_tracing(&config.log_level);
    if !found {
        tracing::warn!(path = %config_path.display(), "config file not found; using defaults");
    }
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.to_string_lossy().to_string();
    }

    let data_path = config.data_path();
    let db = LedgerDb::open(&data_path)
        .with_context(|| format!("failed to open ledger at {}", data_path.display()))?;
    let ledger = Ledger::new(db, config.ledger.clone());

    run(cli, ledger).await
}

async fn run(cli: Cli, ledger: Ledger) -> Result<()> {
    let admin = cli.admin.as_str();
    let now = chrono::Utc::now();

    match cli.command {
        Commands::Account(cmd) => match cmd {
            AccountCommand::Add { id, name } => {
                let account = ledger.db().register_account(&id, &name, now)?;
                output::ok(format!("account {} registered", account.id));
            }
            AccountCommand::Deactivate { id } => {
                ledger.db().set_account_active(&id, false)?;
                output::ok(format!("account {} deactivated", id));
            }
            AccountCommand::Activate { id } => {
                ledger.db().set_account_active(&id, true)?;
                output::ok(format!("account {} activated", id));
            }
        },

        Commands::Product(cmd) => match cmd {
            ProductCommand::Add {
                id,
                name,
                unit_cost,
                inventory,
            } => {
                let product = ledger
                    .db()
                    .upsert_product(Product::new(id, name, unit_cost, inventory))?;
                output::product(&product);
            }
            ProductCommand::Restock { id, quantity } => {
                let product = ledger.db().restock(&id, quantity)?;
                output::product(&product);
            }
            ProductCommand::Deactivate { id } => {
                let product = ledger.db().set_product_active(&id, false)?;
                output::product(&product);
            }
        },

        Commands::Order(cmd) => order_command(&ledger, cmd, admin)?,

        Commands::Grant {
            account,
            amount,
            reason,
        } => {
            let adjustment = ledger.admin().grant(&account, amount, &reason, admin)?;
            output::balance(&adjustment.balance);
        }

        Commands::Deduct {
            account,
            amount,
            reason,
        } => {
            let adjustment = ledger.admin().deduct(&account, amount, &reason, admin)?;
            output::balance(&adjustment.balance);
        }

        Commands::Cheer {
            from,
            to,
            amount,
            message,
        } => {
            let receipt = ledger
                .cheers()
                .cheer(&from, &to, amount, message.as_deref())?;
            output::ok(format!(
                "{} cheered {} with {} points ({} left this month)",
                from,
                to,
                amount,
                receipt.sender.remaining_quota()
            ));
        }

        Commands::Checkout {
            buyer,
            items,
            ship_to,
            address,
        } => {
            let shipping = match (ship_to, address) {
                (None, None) => None,
                (name, address) => Some(ShippingInfo {
                    recipient_name: name.unwrap_or_else(|| buyer.clone()),
                    address: address.unwrap_or_default(),
                    ..Default::default()
                }),
            };
            let receipt = ledger.checkout().checkout(&buyer, &items, shipping)?;
            output::order(&receipt.order);
            output::balance(&receipt.balance);
        }

        Commands::Balance { account } => {
            output::balance(&ledger.balances().balance(&account)?);
        }

        Commands::Limit { account, limit } => {
            output::balance(&ledger.balances().set_monthly_limit(&account, limit)?);
        }

        Commands::History {
            account,
            kind,
            limit,
        } => {
            let mut query = HistoryQuery::default().kinds(&kind).limit(limit);
            query.account = account;
            output::history(&ledger.log().history(&query)?);
        }

        Commands::Leaderboard { period, limit } => {
            output::leaderboard(&ledger.log().leaderboard(period.into(), limit)?);
        }

        Commands::Distribute => {
            let report = ledger.distributor().distribute().await?;
            output::distribution(&report);
            if !report.is_complete() {
                bail!("{} batch(es) failed; rerun to retry them", report.failed_batches.len());
            }
        }

        Commands::ResetQuotas => {
            let report = ledger.quotas().reset_all_quotas()?;
            output::ok(format!(
                "{} of {} balances reset",
                report.reset, report.scanned
            ));
        }

        Commands::Serve => {
            println!("{}", "Kudos ledger scheduler running (ctrl-c to stop)".cyan().bold());
            scheduler::run(ledger).await?;
        }
    }

    Ok(())
}

fn order_command(ledger: &Ledger, cmd: OrderCommand, admin: &str) -> Result<()> {
    let cancellations = ledger.cancellations();
    match cmd {
        OrderCommand::Show { id } => output::order(&ledger.checkout().order(&id)?),
        OrderCommand::List { buyer } => {
            for order in ledger.checkout().orders_for(&buyer)? {
                output::order(&order);
            }
        }
        OrderCommand::Receipt { id } => output::receipt(&ledger.log().receipt(&id)?),
        OrderCommand::Complete { id } => {
            output::order(&ledger.checkout().complete_order(&id, admin)?)
        }
        OrderCommand::RequestCancel {
            id,
            requester,
            reason,
        } => output::order(&cancellations.request_cancellation(&id, &requester, &reason)?),
        OrderCommand::Approve { id, notes } => {
            let outcome =
                cancellations.resolve_cancellation(&id, CancellationAction::Approve, admin, notes)?;
            output::order(&outcome.order);
        }
        OrderCommand::Deny { id, notes } => {
            let outcome =
                cancellations.resolve_cancellation(&id, CancellationAction::Deny, admin, notes)?;
            output::order(&outcome.order);
        }
        OrderCommand::Cancel { id, as_buyer } => {
            let outcome = match as_buyer {
                Some(buyer) => cancellations.cancel_order(&id, &buyer, false)?,
                None => cancellations.cancel_order(&id, admin, true)?,
            };
            output::order(&outcome.order);
        }
        OrderCommand::Refund { id, notes } => {
            output::order(&cancellations.refund_order(&id, admin, notes)?.order)
        }
    }
    Ok(())
}
