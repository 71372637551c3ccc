use std::{
    fmt,
    path::PathBuf,
    time::Duration,
};
use tarot_contract::{
    AccountId,
    TxHash,
};

pub const DEFAULT_TESTNET_RPC_URL: &str = "https://rpc.testnet.near.org";
pub const DEFAULT_MAINNET_RPC_URL: &str = "https://rpc.mainnet.near.org";
pub const DEFAULT_COMPLETION_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4";
/// Hard cap on completion length; the prompt itself asks for 150 words.
pub const DEFAULT_MAX_TOKENS: u32 = 300;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_LOG_DIR: &str = "logs";

pub const API_KEY_ENV: &str = "TAROT_API_KEY";
pub const FALLBACK_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkTarget {
    Testnet { url: String },
    Mainnet { url: String },
}

impl NetworkTarget {
    pub fn network_id(&self) -> &'static str {
        match self {
            NetworkTarget::Testnet { .. } => "testnet",
            NetworkTarget::Mainnet { .. } => "mainnet",
        }
    }

    pub fn rpc_url(&self) -> &str {
        match self {
            NetworkTarget::Testnet { url } | NetworkTarget::Mainnet { url } => url,
        }
    }
}

#[derive(Clone, Debug)]
pub enum WalletConfig {
    KeyFiles {
        account: Option<String>,
        dir: PathBuf,
    },
}

/// Completion API key. Never printed.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn from_env() -> Option<Self> {
        [API_KEY_ENV, FALLBACK_API_KEY_ENV]
            .into_iter()
            .filter_map(|name| std::env::var(name).ok())
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
            .map(Self)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Clone, Debug)]
pub struct ReadingConfig {
    pub endpoint: String,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub api_key: ApiKey,
}

/// Where the client picks up when started from a wallet redirect.
#[derive(Clone, Debug)]
pub struct Resume {
    pub tx_hash: TxHash,
    pub question: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub network: NetworkTarget,
    pub contract_id: AccountId,
    pub wallets: WalletConfig,
    pub reading: ReadingConfig,
    pub request_timeout: Duration,
    pub ipfs_gateway: String,
    pub resume: Option<Resume>,
}
