use crate::{
    error::ReadingError,
    invoker::FunctionCaller,
    resolver::{
        TransactionOutcome,
        TransactionQuery,
    },
    session::AccountHandle,
    transaction::{
        SignedTransaction,
        Transaction,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use serde::{
    Deserialize,
    de::DeserializeOwned,
};
use serde_json::{
    Value,
    json,
};
use std::time::Duration;
use tarot_contract::{
    AccountId,
    ContractCall,
    TxHash,
};
use tracing::{
    debug,
    info,
    warn,
};

const UNKNOWN_TRANSACTION: &str = "UNKNOWN_TRANSACTION";
const TIMEOUT_ERROR: &str = "TIMEOUT_ERROR";
/// `send_tx` answers once the transaction is in a block, so the hash it
/// hands back is already known to the nodes behind the RPC endpoint.
const SEND_WAIT_UNTIL: &str = "INCLUDED";
/// Wait for the transaction and its receipts to execute, not for finality.
const TX_WAIT_UNTIL: &str = "EXECUTED_OPTIMISTIC";

/// JSON-RPC client for a NEAR node.
#[derive(Clone)]
pub struct NearRpcClient {
    url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
pub struct AccessKeyView {
    pub nonce: u64,
    pub block_hash: String,
}

#[derive(Debug, Deserialize)]
struct SendTxView {
    #[serde(default)]
    final_execution_status: Option<String>,
}

#[derive(Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorDto>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorDto {
    #[serde(default)]
    cause: Option<RpcCauseDto>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcCauseDto {
    name: String,
}

#[derive(Debug)]
enum RpcCallError {
    Transport(reqwest::Error),
    Status { status: u16, body: String },
    Rpc { cause: Option<String>, message: String },
    Decode(String),
}

impl RpcErrorDto {
    fn describe(&self) -> String {
        let mut out = self.message.clone().unwrap_or_else(|| "RPC error".to_string());
        if let Some(cause) = &self.cause {
            out.push_str(&format!(" ({})", cause.name));
        }
        if let Some(data) = &self.data {
            out.push_str(&format!(": {data}"));
        }
        out
    }
}

impl RpcCallError {
    fn into_reading_error(self, context: &'static str) -> ReadingError {
        match self {
            RpcCallError::Transport(err) => ReadingError::from_http(context, err),
            RpcCallError::Status { status, body } => {
                ReadingError::network(context, format!("node responded with {status}: {body}"))
            }
            RpcCallError::Rpc { message, .. } => ReadingError::network(context, message),
            RpcCallError::Decode(reason) => ReadingError::decode("RPC response", reason),
        }
    }
}

impl NearRpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .wrap_err("failed to build HTTP client for NEAR RPC")?;
        Ok(Self { url, http })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, RpcCallError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": "tarot-reader",
            "method": method,
            "params": params,
        });
        let res = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(RpcCallError::Transport)?;
        let status = res.status();
        let bytes = res.bytes().await.map_err(RpcCallError::Transport)?;
        if !status.is_success() {
            return Err(RpcCallError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        let envelope: RpcEnvelope<T> = serde_json::from_slice(&bytes)
            .map_err(|e| RpcCallError::Decode(format!("{method}: {e}")))?;
        if let Some(error) = envelope.error {
            return Err(RpcCallError::Rpc {
                cause: error.cause.as_ref().map(|c| c.name.clone()),
                message: error.describe(),
            });
        }
        envelope
            .result
            .ok_or_else(|| RpcCallError::Decode(format!("{method}: response has no result")))
    }

    pub async fn view_access_key(
        &self,
        account: &AccessKeyOwner<'_>,
    ) -> Result<AccessKeyView, ReadingError> {
        self.call(
            "query",
            json!({
                "request_type": "view_access_key",
                "finality": "final",
                "account_id": account.account_id.as_str(),
                "public_key": account.public_key,
            }),
        )
        .await
        .map_err(|e| e.into_reading_error("access key lookup failed"))
    }

    /// Submits a signed transaction and returns its hash once a block
    /// includes it. A node-side timeout still hands back the hash, since the
    /// transaction may land after the node stops waiting.
    pub async fn send_tx(&self, signed: &SignedTransaction) -> Result<TxHash, ReadingError> {
        let sent: Result<SendTxView, RpcCallError> = self
            .call(
                "send_tx",
                json!({
                    "signed_tx_base64": signed.to_base64(),
                    "wait_until": SEND_WAIT_UNTIL,
                }),
            )
            .await;
        match sent {
            Ok(view) => {
                debug!(
                    tx_hash = %signed.hash,
                    status = ?view.final_execution_status,
                    "transaction included"
                );
                Ok(signed.hash.clone())
            }
            Err(RpcCallError::Rpc {
                cause: Some(cause), ..
            }) if cause == TIMEOUT_ERROR => {
                warn!(tx_hash = %signed.hash, "node timed out waiting for inclusion");
                Ok(signed.hash.clone())
            }
            Err(e) => Err(e.into_reading_error("transaction submission failed")),
        }
    }
}

pub struct AccessKeyOwner<'a> {
    pub account_id: &'a AccountId,
    pub public_key: String,
}

impl TransactionQuery for NearRpcClient {
    async fn transaction_status(
        &self,
        tx_hash: &TxHash,
        sender: &AccountId,
    ) -> Result<TransactionOutcome, ReadingError> {
        debug!(%tx_hash, %sender, "querying transaction status");
        self.call(
            "tx",
            json!({
                "tx_hash": tx_hash.as_str(),
                "sender_account_id": sender.as_str(),
                "wait_until": TX_WAIT_UNTIL,
            }),
        )
        .await
        .map_err(|e| match e {
            RpcCallError::Rpc { cause: Some(cause), .. } if cause == UNKNOWN_TRANSACTION => {
                ReadingError::NotFound(tx_hash.clone())
            }
            other => other.into_reading_error("transaction status query failed"),
        })
    }
}

impl FunctionCaller for NearRpcClient {
    async fn call_function(
        &self,
        signer: &AccountHandle,
        receiver: &AccountId,
        call: &ContractCall,
    ) -> Result<TxHash, ReadingError> {
        let owner = AccessKeyOwner {
            account_id: signer.account_id(),
            public_key: signer.public_key_string(),
        };
        let access_key = self.view_access_key(&owner).await?;
        let block_hash: [u8; 32] = bs58::decode(&access_key.block_hash)
            .into_vec()
            .map_err(|e| ReadingError::decode("block hash", e))?
            .try_into()
            .map_err(|_| ReadingError::decode("block hash", "expected 32 bytes"))?;

        let tx = Transaction::function_call(signer, access_key.nonce + 1, receiver, block_hash, call);
        let nonce = tx.nonce();
        let signed = tx.sign(signer)?;
        info!(
            method = call.method,
            %receiver,
            nonce,
            tx_hash = %signed.hash,
            "submitting contract call"
        );
        self.send_tx(&signed).await
    }
}
