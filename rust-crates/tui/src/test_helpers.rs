//! In-memory stand-ins for the wallet, the chain and the completion API.

use crate::{
    error::ReadingError,
    invoker::FunctionCaller,
    reading::{
        ChatMessage,
        ChatRequest,
        ChatResponse,
        ChatChoice,
        CompletionApi,
    },
    resolver::{
        TransactionOutcome,
        TransactionQuery,
    },
    session::{
        AccountHandle,
        WalletSession,
    },
};
use base64::{
    Engine as _,
    engine::general_purpose::STANDARD,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use ed25519_dalek::SigningKey;
use serde_json::json;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex,
    },
};
use tarot_contract::{
    AccountId,
    ContractCall,
    TxHash,
};

pub fn account(name: &str) -> AccountHandle {
    let account_id: AccountId = name.parse().expect("valid test account id");
    AccountHandle::new(account_id, SigningKey::from_bytes(&[42u8; 32]))
}

/// Builds a `tx` RPC result for a single function-call transaction.
pub fn outcome(method: &str, success: Option<&str>, logs: &[&str]) -> TransactionOutcome {
    let status = match success {
        Some(value) => json!({ "SuccessValue": STANDARD.encode(value) }),
        None => json!({ "Failure": { "ActionError": { "index": 0 } } }),
    };
    serde_json::from_value(json!({
        "status": status,
        "transaction": {
            "signer_id": "alice.testnet",
            "actions": [{ "FunctionCall": { "method_name": method } }],
        },
        "transaction_outcome": { "outcome": { "logs": logs } },
    }))
    .expect("well-formed test outcome")
}

pub struct FakeSession {
    known: Vec<AccountHandle>,
    account: Option<AccountHandle>,
}

impl FakeSession {
    pub fn signed_in(name: &str) -> Self {
        let handle = account(name);
        Self {
            known: vec![handle.clone()],
            account: Some(handle),
        }
    }

    pub fn signed_out(known: &str) -> Self {
        Self {
            known: vec![account(known)],
            account: None,
        }
    }
}

impl WalletSession for FakeSession {
    fn is_signed_in(&self) -> bool {
        self.account.is_some()
    }

    fn account_id(&self) -> Option<&AccountId> {
        self.account.as_ref().map(AccountHandle::account_id)
    }

    fn account(&self) -> Result<&AccountHandle, ReadingError> {
        self.account.as_ref().ok_or(ReadingError::AuthRequired)
    }

    fn request_sign_in(&mut self, name: &str) -> Result<()> {
        let handle = self
            .known
            .iter()
            .find(|h| h.account_id().as_str() == name)
            .cloned()
            .ok_or_else(|| eyre!("unknown account {name}"))?;
        self.account = Some(handle);
        Ok(())
    }

    fn sign_out(&mut self) {
        self.account = None;
    }
}

#[derive(Clone, Debug)]
pub struct SubmittedCall {
    pub signer: AccountId,
    pub receiver: AccountId,
    pub call: ContractCall,
}

#[derive(Default)]
struct ChainState {
    outcomes: HashMap<String, TransactionOutcome>,
    next_hashes: Vec<TxHash>,
    submitted: Vec<SubmittedCall>,
    status_queries: Vec<(TxHash, AccountId)>,
    fail_queries: bool,
}

/// Fake NEAR node. Submitted calls receive the queued hashes in order; the
/// outcome registered for a hash is returned by status queries.
#[derive(Clone, Default)]
pub struct FakeChain {
    state: Arc<Mutex<ChainState>>,
}

impl FakeChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcome(self, tx_hash: &TxHash, outcome: TransactionOutcome) -> Self {
        self.add_outcome(tx_hash, outcome);
        self
    }

    /// Makes a transaction visible after the fact, as a node catching up would.
    pub fn add_outcome(&self, tx_hash: &TxHash, outcome: TransactionOutcome) {
        self.state
            .lock()
            .unwrap()
            .outcomes
            .insert(tx_hash.to_string(), outcome);
    }

    pub fn with_next_hash(self, tx_hash: TxHash) -> Self {
        self.state.lock().unwrap().next_hashes.push(tx_hash);
        self
    }

    pub fn failing_queries(self) -> Self {
        self.state.lock().unwrap().fail_queries = true;
        self
    }

    pub fn submitted(&self) -> Vec<SubmittedCall> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn status_queries(&self) -> Vec<(TxHash, AccountId)> {
        self.state.lock().unwrap().status_queries.clone()
    }
}

impl TransactionQuery for FakeChain {
    async fn transaction_status(
        &self,
        tx_hash: &TxHash,
        sender: &AccountId,
    ) -> Result<TransactionOutcome, ReadingError> {
        let mut state = self.state.lock().unwrap();
        state
            .status_queries
            .push((tx_hash.clone(), sender.clone()));
        if state.fail_queries {
            return Err(ReadingError::network("transaction status query failed", "connection refused"));
        }
        state
            .outcomes
            .get(tx_hash.as_str())
            .cloned()
            .ok_or_else(|| ReadingError::NotFound(tx_hash.clone()))
    }
}

impl FunctionCaller for FakeChain {
    async fn call_function(
        &self,
        signer: &AccountHandle,
        receiver: &AccountId,
        call: &ContractCall,
    ) -> Result<TxHash, ReadingError> {
        let mut state = self.state.lock().unwrap();
        state.submitted.push(SubmittedCall {
            signer: signer.account_id().clone(),
            receiver: receiver.clone(),
            call: call.clone(),
        });
        if state.next_hashes.is_empty() {
            return Err(ReadingError::network("transaction submission failed", "no hash queued"));
        }
        Ok(state.next_hashes.remove(0))
    }
}

#[derive(Clone)]
enum Reply {
    Text(String),
    Empty,
    Status(u16),
}

/// Fake completion endpoint that counts calls and replies with a canned answer.
#[derive(Clone)]
pub struct FakeCompletions {
    reply: Reply,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl FakeCompletions {
    fn with(reply: Reply) -> Self {
        Self {
            reply,
            requests: Arc::default(),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::with(Reply::Text(text.to_string()))
    }

    pub fn empty() -> Self {
        Self::with(Reply::Empty)
    }

    pub fn rejecting(status: u16) -> Self {
        Self::with(Reply::Status(status))
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl CompletionApi for FakeCompletions {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ReadingError> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.reply {
            Reply::Text(text) => Ok(ChatResponse {
                choices: vec![ChatChoice {
                    message: ChatMessage {
                        role: "assistant".to_string(),
                        content: text.clone(),
                    },
                }],
            }),
            Reply::Empty => Ok(ChatResponse { choices: vec![] }),
            Reply::Status(status) => Err(ReadingError::Generation(format!(
                "completion endpoint responded with {status}"
            ))),
        }
    }
}

/// Serves exactly one HTTP response on a local port and returns its URL.
pub async fn serve_once(status: u16, body: &'static str) -> String {
    use tokio::{
        io::{
            AsyncReadExt,
            AsyncWriteExt,
        },
        net::TcpListener,
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        // read headers, then as much body as content-length announces
        loop {
            let Ok(n) = socket.read(&mut buf).await else {
                return;
            };
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            if let Some(end) = find_header_end(&request) {
                let wanted = content_length(&request[..end]);
                if request.len() >= end + wanted {
                    break;
                }
            }
        }
        let response = format!(
            "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;
    });
    format!("http://{addr}/")
}

fn find_header_end(request: &[u8]) -> Option<usize> {
    request
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
}

fn content_length(headers: &[u8]) -> usize {
    String::from_utf8_lossy(headers)
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.trim()
                .eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse().ok())
                .flatten()
        })
        .unwrap_or(0)
}
