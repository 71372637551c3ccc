use crate::{
    error::ReadingError,
    wallets,
};
use color_eyre::eyre::Result;
use ed25519_dalek::{
    Signer,
    SigningKey,
};
use std::{
    fmt,
    path::PathBuf,
};
use tarot_contract::AccountId;
use tracing::info;

/// A signed-in account able to sign transactions.
#[derive(Clone)]
pub struct AccountHandle {
    account_id: AccountId,
    signing_key: SigningKey,
}

impl AccountHandle {
    pub fn new(account_id: AccountId, signing_key: SigningKey) -> Self {
        Self {
            account_id,
            signing_key,
        }
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// `ed25519:<base58>`, the form NEAR RPC expects.
    pub fn public_key_string(&self) -> String {
        format!(
            "ed25519:{}",
            bs58::encode(self.public_key_bytes()).into_string()
        )
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl fmt::Debug for AccountHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountHandle")
            .field("account_id", &self.account_id)
            .field("public_key", &self.public_key_string())
            .finish_non_exhaustive()
    }
}

/// Sign-in state and signing capability. The client only reads it, except
/// through the explicit sign-in and sign-out calls.
pub trait WalletSession {
    fn is_signed_in(&self) -> bool;

    fn account_id(&self) -> Option<&AccountId>;

    fn account(&self) -> Result<&AccountHandle, ReadingError>;

    fn request_sign_in(&mut self, account: &str) -> Result<()>;

    fn sign_out(&mut self);
}

/// Session backed by NEAR CLI key files.
pub struct KeyFileSession {
    dir: PathBuf,
    network_id: String,
    account: Option<AccountHandle>,
}

impl KeyFileSession {
    pub fn new(dir: PathBuf, network_id: impl Into<String>) -> Self {
        Self {
            dir,
            network_id: network_id.into(),
            account: None,
        }
    }

    pub fn known_accounts(&self) -> Result<Vec<String>> {
        Ok(wallets::list_accounts(&self.dir, &self.network_id)?
            .into_iter()
            .map(|descriptor| descriptor.account_id)
            .collect())
    }
}

impl WalletSession for KeyFileSession {
    fn is_signed_in(&self) -> bool {
        self.account.is_some()
    }

    fn account_id(&self) -> Option<&AccountId> {
        self.account.as_ref().map(AccountHandle::account_id)
    }

    fn account(&self) -> Result<&AccountHandle, ReadingError> {
        self.account.as_ref().ok_or(ReadingError::AuthRequired)
    }

    fn request_sign_in(&mut self, account: &str) -> Result<()> {
        let descriptor = wallets::find_account(&self.dir, &self.network_id, account)?;
        let handle = wallets::load_key(&descriptor)?;
        info!(account = %handle.account_id(), "signed in");
        self.account = Some(handle);
        Ok(())
    }

    fn sign_out(&mut self) {
        if let Some(handle) = self.account.take() {
            info!(account = %handle.account_id(), "signed out");
        }
    }
}
