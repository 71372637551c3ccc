use clap::{
    ArgGroup,
    Parser,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use std::{
    sync::OnceLock,
    time::Duration,
};
use tarot_contract::{
    AccountId,
    DEFAULT_CONTRACT_ID,
    DEFAULT_IPFS_GATEWAY,
};
use tarot_reader::{
    config::{
        self,
        ApiKey,
        AppConfig,
        NetworkTarget,
        ReadingConfig,
        Resume,
        WalletConfig,
    },
    redirect,
    wallets,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

mod client;
mod ui;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(
    name = "tarot-reader",
    about = "Draw a tarot card on NEAR, read it, and mint the reading",
    version,
    group(ArgGroup::new("network").args(["testnet", "mainnet"]))
)]
struct Args {
    /// Use NEAR testnet (default)
    #[arg(long)]
    testnet: bool,

    /// Use NEAR mainnet
    #[arg(long)]
    mainnet: bool,

    /// Override RPC URL for the selected network
    #[arg(long)]
    rpc_url: Option<String>,

    /// Tarot contract account
    #[arg(long, default_value = DEFAULT_CONTRACT_ID)]
    contract: String,

    /// Account to sign in with at startup
    #[arg(long)]
    account: Option<String>,

    /// NEAR CLI credentials directory (defaults to ~/.near-credentials)
    #[arg(long)]
    credentials_dir: Option<String>,

    /// Wallet redirect URL, or a bare transaction hash, to resume from
    #[arg(long)]
    redirect: Option<String>,

    /// Question asked before the redirected draw
    #[arg(long, requires = "redirect")]
    question: Option<String>,

    /// Completion model
    #[arg(long, default_value = config::DEFAULT_MODEL)]
    model: String,

    /// Chat completion endpoint
    #[arg(long, default_value = config::DEFAULT_COMPLETION_URL)]
    completion_url: String,

    /// Token cap for the generated reading; 0 removes it
    #[arg(long, default_value_t = config::DEFAULT_MAX_TOKENS)]
    max_tokens: u32,

    /// Timeout for each RPC and completion request
    #[arg(long, default_value_t = config::DEFAULT_REQUEST_TIMEOUT.as_secs())]
    request_timeout_secs: u64,

    /// Directory for log files
    #[arg(long, default_value = config::DEFAULT_LOG_DIR)]
    log_dir: String,

    /// Gateway used to show ipfs:// card images
    #[arg(long, default_value = DEFAULT_IPFS_GATEWAY)]
    ipfs_gateway: String,
}

fn init_tracing(log_dir: &str) -> Result<()> {
    let appender = rolling::daily(log_dir, "tarot-reader.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = LOG_GUARD.set(guard);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| eyre!("failed to install tracing subscriber: {e}"))
}

fn build_config(args: Args) -> Result<AppConfig> {
    let network = if args.mainnet {
        NetworkTarget::Mainnet {
            url: args
                .rpc_url
                .unwrap_or_else(|| config::DEFAULT_MAINNET_RPC_URL.to_string()),
        }
    } else {
        NetworkTarget::Testnet {
            url: args
                .rpc_url
                .unwrap_or_else(|| config::DEFAULT_TESTNET_RPC_URL.to_string()),
        }
    };

    let contract_id: AccountId = args
        .contract
        .parse()
        .wrap_err_with(|| format!("invalid contract account {}", args.contract))?;
    let dir = wallets::resolve_credentials_dir(args.credentials_dir.as_deref())?;

    let api_key = ApiKey::from_env().ok_or_else(|| {
        eyre!(
            "Set {} (or {}) to the completion API key",
            config::API_KEY_ENV,
            config::FALLBACK_API_KEY_ENV
        )
    })?;

    let resume = match args.redirect.as_deref() {
        None => None,
        Some(raw) => {
            let tx_hash = redirect::transaction_hash(raw)
                .wrap_err("could not read the redirect")?
                .ok_or_else(|| eyre!("redirect carries no transaction hash: {raw}"))?;
            Some(Resume {
                tx_hash,
                question: args.question,
            })
        }
    };

    Ok(AppConfig {
        network,
        contract_id,
        wallets: WalletConfig::KeyFiles {
            account: args.account,
            dir,
        },
        reading: ReadingConfig {
            endpoint: args.completion_url,
            model: args.model,
            max_tokens: (args.max_tokens > 0).then_some(args.max_tokens),
            api_key,
        },
        request_timeout: Duration::from_secs(args.request_timeout_secs),
        ipfs_gateway: args.ipfs_gateway,
        resume,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    init_tracing(&args.log_dir)?;
    tracing::info!("starting tarot-reader client");
    let app_config = build_config(args)?;
    client::run_app(app_config).await
}
