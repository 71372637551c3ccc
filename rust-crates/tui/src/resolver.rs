use crate::error::ReadingError;
use base64::{
    Engine as _,
    engine::general_purpose::STANDARD,
};
use serde::Deserialize;
use serde_json::Value;
use tarot_contract::{
    AccountId,
    DrawResult,
    MINT_METHOD,
    TxHash,
};
use tracing::debug;

/// Final execution outcome as returned by the `tx` RPC method. Only the
/// parts the client reads are modelled.
#[derive(Clone, Debug, Deserialize)]
pub struct TransactionOutcome {
    #[serde(default)]
    pub status: Value,
    pub transaction: TransactionView,
    pub transaction_outcome: OutcomeWithId,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TransactionView {
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub signer_id: Option<String>,
    #[serde(default)]
    pub actions: Vec<Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct OutcomeWithId {
    pub outcome: ExecutionOutcome,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ExecutionOutcome {
    #[serde(default)]
    pub logs: Vec<String>,
}

impl TransactionOutcome {
    /// Method name of the first action, when it is a function call.
    pub fn method_name(&self) -> Option<&str> {
        self.transaction
            .actions
            .first()?
            .get("FunctionCall")?
            .get("method_name")?
            .as_str()
    }

    /// `status.SuccessValue`, treating an empty value as absent.
    pub fn success_value(&self) -> Option<&str> {
        self.status
            .get("SuccessValue")
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn logs(&self) -> &[String] {
        &self.transaction_outcome.outcome.logs
    }
}

/// Read-only lookup of a transaction's outcome.
pub trait TransactionQuery {
    fn transaction_status(
        &self,
        tx_hash: &TxHash,
        sender: &AccountId,
    ) -> impl Future<Output = Result<TransactionOutcome, ReadingError>>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Draw(DrawResult),
    Minted { token_id: Option<String> },
    Logs(Vec<String>),
}

/// Pure decoding of an outcome; resolving the same outcome twice yields
/// the same result.
pub fn decode_outcome(outcome: &TransactionOutcome) -> Result<Resolution, ReadingError> {
    let Some(encoded) = outcome.success_value() else {
        return Ok(Resolution::Logs(outcome.logs().to_vec()));
    };
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| ReadingError::decode("success value base64", e))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| ReadingError::decode("success value text", e))?;
    debug!(method = ?outcome.method_name(), %text, "decoded success value");

    if outcome.method_name() == Some(MINT_METHOD) {
        let token_id = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|token| token.get("token_id").and_then(Value::as_str).map(str::to_owned));
        return Ok(Resolution::Minted { token_id });
    }

    DrawResult::from_payload(text.as_bytes())
        .map(Resolution::Draw)
        .map_err(|e| ReadingError::decode("draw result", e))
}

pub struct TransactionResolver<Q> {
    query: Q,
}

impl<Q: TransactionQuery> TransactionResolver<Q> {
    pub fn new(query: Q) -> Self {
        Self { query }
    }

    pub async fn resolve(
        &self,
        tx_hash: &TxHash,
        account: &AccountId,
    ) -> Result<Resolution, ReadingError> {
        let outcome = self.query.transaction_status(tx_hash, account).await?;
        decode_outcome(&outcome)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        error::ErrorKind,
        test_helpers::{
            FakeChain,
            outcome,
        },
    };
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn decode_outcome__returns_draw_from_success_value() {
        // given
        let outcome = outcome(
            "draw_cards",
            Some(r#"["The Fool","ipfs://abc123","upright"]"#),
            &[],
        );

        // when
        let resolution = decode_outcome(&outcome).unwrap();

        // then
        assert_eq!(
            resolution,
            Resolution::Draw(DrawResult {
                card: "The Fool".to_string(),
                image_ref: "ipfs://abc123".to_string(),
                orientation: "upright".to_string(),
            })
        );
    }

    #[test]
    fn decode_outcome__returns_logs_verbatim_without_success_value() {
        let outcome = outcome("draw_cards", None, &["Card:XIII Death, Position:reverse", "second"]);

        let resolution = decode_outcome(&outcome).unwrap();

        assert_eq!(
            resolution,
            Resolution::Logs(vec![
                "Card:XIII Death, Position:reverse".to_string(),
                "second".to_string()
            ])
        );
    }

    #[test]
    fn decode_outcome__empty_success_value_counts_as_absent() {
        let mut outcome = outcome("draw_cards", None, &["only log"]);
        outcome.status = json!({ "SuccessValue": "" });

        let resolution = decode_outcome(&outcome).unwrap();

        assert_eq!(resolution, Resolution::Logs(vec!["only log".to_string()]));
    }

    #[test]
    fn decode_outcome__branches_on_mint_method() {
        let outcome = outcome("nft_mint", Some(r#"{"token_id":"4","owner_id":"alice.testnet"}"#), &[]);

        let resolution = decode_outcome(&outcome).unwrap();

        assert_eq!(
            resolution,
            Resolution::Minted {
                token_id: Some("4".to_string())
            }
        );
    }

    #[test]
    fn decode_outcome__malformed_payload_is_decode_failure() {
        let bad_json = outcome("draw_cards", Some("not json"), &[]);
        let mut bad_base64 = outcome("draw_cards", None, &[]);
        bad_base64.status = json!({ "SuccessValue": "%%%" });

        for outcome in [bad_json, bad_base64] {
            let err = decode_outcome(&outcome).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::DecodeFailure);
        }
    }

    #[tokio::test]
    async fn resolve__queries_with_hash_and_account() {
        // given
        let hash = TxHash::from_digest([4u8; 32]);
        let alice: AccountId = "alice.testnet".parse().unwrap();
        let chain = FakeChain::new().with_outcome(
            &hash,
            outcome("draw_cards", Some(r#"["XIX The Sun","ipfs://cid/19.png","upright"]"#), &[]),
        );
        let resolver = TransactionResolver::new(chain.clone());

        // when
        let resolution = resolver.resolve(&hash, &alice).await.unwrap();

        // then
        assert!(matches!(resolution, Resolution::Draw(ref d) if d.card == "XIX The Sun"));
        assert_eq!(chain.status_queries(), vec![(hash, alice)]);
    }

    #[tokio::test]
    async fn resolve__surfaces_not_found_and_network_failures() {
        let hash = TxHash::from_digest([4u8; 32]);
        let alice: AccountId = "alice.testnet".parse().unwrap();

        let missing = TransactionResolver::new(FakeChain::new())
            .resolve(&hash, &alice)
            .await
            .unwrap_err();
        let offline = TransactionResolver::new(FakeChain::new().failing_queries())
            .resolve(&hash, &alice)
            .await
            .unwrap_err();

        assert_eq!(missing.kind(), ErrorKind::NotFound);
        assert_eq!(offline.kind(), ErrorKind::NetworkFailure);
    }

    proptest! {
        #[test]
        fn decode_outcome__is_a_pure_function_of_the_outcome(
            card in "[A-Za-z ]{1,20}",
            cid in "[a-z0-9]{1,40}",
            upright in any::<bool>(),
        ) {
            let orientation = if upright { "upright" } else { "reverse" };
            let payload = serde_json::to_string(&[&card, &format!("ipfs://{cid}"), &orientation.to_string()]).unwrap();
            let outcome = outcome("draw_cards", Some(&payload), &[]);

            let first = decode_outcome(&outcome).unwrap();
            let second = decode_outcome(&outcome).unwrap();

            prop_assert_eq!(first, second);
        }
    }
}
