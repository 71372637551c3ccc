use crate::{
    error::ReadingError,
    session::{
        AccountHandle,
        WalletSession,
    },
};
use tarot_contract::{
    AccountId,
    ContractCall,
    MintRequest,
    TxHash,
};
use tracing::info;

/// Signs and submits a contract call, returning the transaction hash once
/// a block includes it. Execution is not awaited.
pub trait FunctionCaller {
    fn call_function(
        &self,
        signer: &AccountHandle,
        receiver: &AccountId,
        call: &ContractCall,
    ) -> impl Future<Output = Result<TxHash, ReadingError>>;
}

/// The two call sites on the tarot contract. Both need a signed-in session;
/// gas and deposit are fixed by [`ContractCall`].
pub struct ContractInvoker<F> {
    caller: F,
    contract_id: AccountId,
}

impl<F: FunctionCaller> ContractInvoker<F> {
    pub fn new(caller: F, contract_id: AccountId) -> Self {
        Self {
            caller,
            contract_id,
        }
    }

    pub fn contract_id(&self) -> &AccountId {
        &self.contract_id
    }

    pub async fn draw(&self, session: &impl WalletSession) -> Result<TxHash, ReadingError> {
        let signer = session.account()?;
        let tx_hash = self
            .caller
            .call_function(signer, &self.contract_id, &ContractCall::draw())
            .await?;
        info!(%tx_hash, account = %signer.account_id(), "draw submitted");
        Ok(tx_hash)
    }

    pub async fn mint(
        &self,
        session: &impl WalletSession,
        request: &MintRequest,
    ) -> Result<TxHash, ReadingError> {
        let signer = session.account()?;
        let tx_hash = self
            .caller
            .call_function(signer, &self.contract_id, &ContractCall::mint(request))
            .await?;
        info!(%tx_hash, receiver = %request.receiver(), "mint submitted");
        Ok(tx_hash)
    }
}
