//! Borsh encoding and signing of single-action `FunctionCall` transactions.
//!
//! Only the subset of the NEAR transaction schema the client submits is
//! modelled here: one signer, one receiver, one function call.

use crate::{
    error::ReadingError,
    session::AccountHandle,
};
use base64::{
    Engine as _,
    engine::general_purpose::STANDARD,
};
use borsh::BorshSerialize;
use sha2::{
    Digest,
    Sha256,
};
use tarot_contract::{
    AccountId,
    ContractCall,
    TxHash,
};

#[derive(Clone, Debug, BorshSerialize)]
enum PublicKey {
    Ed25519([u8; 32]),
}

#[derive(Clone, Debug, BorshSerialize)]
enum Signature {
    Ed25519([u8; 64]),
}

#[derive(Clone, Debug, BorshSerialize)]
struct FunctionCallAction {
    method_name: String,
    args: Vec<u8>,
    gas: u64,
    deposit: u128,
}

/// Variant order fixes the wire tag; only `FunctionCall` is ever built.
#[allow(dead_code)]
#[derive(Clone, Debug, BorshSerialize)]
enum Action {
    CreateAccount,
    DeployContract(Vec<u8>),
    FunctionCall(FunctionCallAction),
}

#[derive(Clone, Debug, BorshSerialize)]
pub struct Transaction {
    signer_id: AccountId,
    public_key: PublicKey,
    nonce: u64,
    receiver_id: AccountId,
    block_hash: [u8; 32],
    actions: Vec<Action>,
}

#[derive(BorshSerialize)]
struct SignedTransactionWire {
    transaction: Transaction,
    signature: Signature,
}

impl Transaction {
    pub fn function_call(
        signer: &AccountHandle,
        nonce: u64,
        receiver: &AccountId,
        block_hash: [u8; 32],
        call: &ContractCall,
    ) -> Self {
        Self {
            signer_id: signer.account_id().clone(),
            public_key: PublicKey::Ed25519(signer.public_key_bytes()),
            nonce,
            receiver_id: receiver.clone(),
            block_hash,
            actions: vec![Action::FunctionCall(FunctionCallAction {
                method_name: call.method.to_string(),
                args: call.args.clone(),
                gas: call.gas,
                deposit: call.deposit,
            })],
        }
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn encode(&self) -> Result<Vec<u8>, ReadingError> {
        borsh::to_vec(self).map_err(encode_error)
    }

    /// Signs the SHA-256 digest of the encoded transaction. The digest is
    /// also the transaction hash.
    pub fn sign(self, signer: &AccountHandle) -> Result<SignedTransaction, ReadingError> {
        let digest: [u8; 32] = Sha256::digest(self.encode()?).into();
        let wire = SignedTransactionWire {
            transaction: self,
            signature: Signature::Ed25519(signer.sign(&digest)),
        };
        Ok(SignedTransaction {
            bytes: borsh::to_vec(&wire).map_err(encode_error)?,
            hash: TxHash::from_digest(digest),
        })
    }
}

fn encode_error(err: std::io::Error) -> ReadingError {
    ReadingError::InvalidInput(format!("transaction could not be encoded: {err}"))
}

#[derive(Clone, Debug)]
pub struct SignedTransaction {
    pub bytes: Vec<u8>,
    pub hash: TxHash,
}

impl SignedTransaction {
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}
