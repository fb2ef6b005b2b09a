#![forbid(unsafe_code)]

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use rand_core::OsRng;
use rpassword::prompt_password;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shadepool_core::{Address, Fr};
use shadepool_wallet::{
    record_entry, sync_entries, KeyStore, NoteStore, Receipt, RpcClient, WormholeDeposit,
};

#[derive(Parser, Debug)]
#[command(name = "shadepool-wallet", version)]
struct Cli {
    #[arg(long = "wallet-db")]
    wallet_db: Option<PathBuf>,
    #[arg(long)]
    indexer: Option<String>,
    #[arg(long = "chain-id")]
    chain_id: Option<u64>,
    /// Account to operate on; defaults to the key store's default key.
    #[arg(long)]
    account: Option<Address>,
    #[arg(long)]
    auth: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate and encrypt a fresh signing key.
    Init,
    /// Import a hex-encoded secp256k1 key.
    Import {
        #[arg(long)]
        key: String,
    },
    Address {
        #[arg(long)]
        all: bool,
    },
    Balance {
        #[arg(long)]
        token: Address,
        #[arg(long = "token-id", default_value_t = 0)]
        token_id: u128,
    },
    Notes,
    Entries,
    /// Pull screening outcomes for tracked bridge entries.
    Sync,
    /// Derive a fresh burn address for a bridge deposit.
    BurnAddress {
        #[arg(long)]
        recipient: Option<Address>,
    },
    /// Record the entry created by funding a burn address.
    RecordEntry {
        /// JSON receipt of the funding transaction.
        #[arg(long)]
        receipt: PathBuf,
        #[arg(long)]
        secret: Fr,
        #[arg(long)]
        recipient: Option<Address>,
    },
}

#[derive(Debug)]
struct ResolvedConfig {
    wallet_db: PathBuf,
    indexer: String,
    chain_id: u64,
    account: Option<Address>,
    auth: Option<String>,
}

fn resolve_config(cli: &Cli) -> Result<ResolvedConfig> {
    let wallet_db = cli
        .wallet_db
        .clone()
        .or_else(|| env::var("SHADEPOOL_WALLET_DB").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("shadepool.wallet.db"));
    let indexer = cli
        .indexer
        .clone()
        .or_else(|| env::var("SHADEPOOL_INDEXER").ok())
        .unwrap_or_else(|| "127.0.0.1:27555".to_string());
    let chain_id = match cli.chain_id {
        Some(id) => id,
        None => match env::var("SHADEPOOL_CHAIN_ID") {
            Ok(raw) => raw.parse().context("SHADEPOOL_CHAIN_ID")?,
            Err(_) => 1,
        },
    };
    let account = match cli.account {
        Some(a) => Some(a),
        None => match env::var("SHADEPOOL_ACCOUNT") {
            Ok(raw) => Some(raw.parse().map_err(|e| anyhow!("SHADEPOOL_ACCOUNT: {e}"))?),
            Err(_) => None,
        },
    };
    let auth = cli.auth.clone().or_else(|| env::var("SHADEPOOL_RPC_AUTH").ok());
    Ok(ResolvedConfig {
        wallet_db,
        indexer,
        chain_id,
        account,
        auth,
    })
}

struct Wallet {
    db: sled::Db,
    keys: KeyStore,
    config: ResolvedConfig,
}

impl Wallet {
    fn open(config: ResolvedConfig) -> Result<Self> {
        let db = sled::open(&config.wallet_db)
            .with_context(|| format!("opening {}", config.wallet_db.display()))?;
        let keys = KeyStore::new(&db)?;
        Ok(Self { db, keys, config })
    }

    fn account(&self) -> Result<Address> {
        match self.config.account {
            Some(a) => Ok(a),
            None => self
                .keys
                .default_address()
                .context("no account given and wallet not initialized"),
        }
    }

    fn store(&self) -> Result<NoteStore> {
        Ok(NoteStore::with_db(&self.db, self.account()?)?)
    }

    fn indexer(&self) -> RpcClient {
        RpcClient::new(&self.config.indexer, self.config.auth.clone())
    }
}

fn prompt_new_password() -> Result<String> {
    let pw = prompt_password("New wallet password: ")?;
    let confirm = prompt_password("Repeat password: ")?;
    if pw != confirm {
        return Err(anyhow!("passwords do not match"));
    }
    Ok(pw)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shadepool_wallet=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    let wallet = Wallet::open(config)?;

    match cli.command {
        Commands::Init => {
            let pw = prompt_new_password()?;
            let addr = wallet.keys.init(&pw)?;
            println!("Initialized wallet. Default address: {addr}");
        }
        Commands::Import { key } => {
            let pw = prompt_new_password()?;
            let addr = wallet.keys.import_key_hex(&key, &pw)?;
            println!("Imported {addr}");
        }
        Commands::Address { all } => {
            if all {
                for addr in wallet.keys.addresses()? {
                    println!("{addr}");
                }
            } else {
                println!("{}", wallet.account()?);
            }
        }
        Commands::Balance { token, token_id } => {
            let summary = wallet
                .store()?
                .balance(wallet.config.chain_id, token, token_id)?;
            println!("shielded: {}", summary.shielded);
            println!("bridged:  {}", summary.bridged);
            println!("total:    {}", summary.total()?);
        }
        Commands::Notes => {
            for note in wallet.store()?.notes()? {
                println!(
                    "{} token={} id={} amount={} status={}",
                    note.id(),
                    note.token,
                    note.token_id,
                    note.amount,
                    note.status.as_str()
                );
            }
        }
        Commands::Entries => {
            for entry in wallet.store()?.entries()? {
                let position = entry
                    .position
                    .map(|p| format!("{}:{}", p.tree_id, p.leaf_index))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "entry {} burn={} amount={} status={} position={}",
                    entry.entry_id,
                    entry.burn_address,
                    entry.amount,
                    entry.status.as_str(),
                    position
                );
            }
        }
        Commands::Sync => {
            let store = wallet.store()?;
            let indexer = wallet.indexer();
            indexer.ping().await.context("indexer unreachable")?;
            let report = sync_entries(&store, &indexer, wallet.config.chain_id).await?;
            info!(?report, "entry sync finished");
            println!(
                "approved={} rejected={} ragequitted={} unchanged={} mismatched={}",
                report.approved,
                report.rejected,
                report.ragequitted,
                report.unchanged,
                report.mismatched
            );
        }
        Commands::BurnAddress { recipient } => {
            let recipient = match recipient {
                Some(r) => r,
                None => wallet.account()?,
            };
            let deposit = WormholeDeposit::generate(recipient, &mut OsRng);
            println!("recipient:    {}", deposit.recipient);
            println!("burn address: {}", deposit.burn_address);
            println!("secret:       {}", deposit.secret);
            eprintln!("Keep the secret; it is required to record and spend the entry.");
        }
        Commands::RecordEntry {
            receipt,
            secret,
            recipient,
        } => {
            let raw = std::fs::read_to_string(&receipt)
                .with_context(|| format!("reading {}", receipt.display()))?;
            let receipt: Receipt = serde_json::from_str(&raw)?;
            let recipient = match recipient {
                Some(r) => r,
                None => wallet.account()?,
            };
            let deposit = WormholeDeposit::from_secret(recipient, secret);
            let record = record_entry(&wallet.store()?, wallet.config.chain_id, &receipt, &deposit)?;
            println!(
                "recorded entry {} ({} from {})",
                record.entry_id, record.amount, record.sender
            );
        }
    }
    Ok(())
}
