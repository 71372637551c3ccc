use borsh::BorshSerialize;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    str::FromStr,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("invalid account id '{id}': {reason}")]
    Account { id: String, reason: String },
    #[error("transaction hash '{0}' is not base58")]
    HashEncoding(String),
    #[error("transaction hash '{hash}' decodes to {len} bytes, expected 32")]
    HashLength { hash: String, len: usize },
}

/// A NEAR account id such as `alice.testnet`. Borsh-encodes as the
/// length-prefixed string transactions carry.
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, BorshSerialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(near_account_id::AccountId);

impl AccountId {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    fn parse_near(raw: String) -> Result<Self, IdError> {
        match near_account_id::AccountId::try_from(raw.clone()) {
            Ok(id) => Ok(Self(id)),
            Err(e) => Err(IdError::Account {
                id: raw,
                reason: e.to_string(),
            }),
        }
    }
}

impl FromStr for AccountId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_near(s.to_string())
    }
}

impl TryFrom<String> for AccountId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_near(value)
    }
}

impl From<AccountId> for String {
    fn from(value: AccountId) -> Self {
        value.0.into()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Base58 transaction hash, as computed from the signed transaction and carried
/// in the wallet's `transactionHashes` redirect parameter.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxHash(String);

impl TxHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self(bs58::encode(digest).into_string())
    }

    fn validate(raw: &str) -> Result<(), IdError> {
        let bytes = bs58::decode(raw)
            .into_vec()
            .map_err(|_| IdError::HashEncoding(raw.to_string()))?;
        if bytes.len() != 32 {
            return Err(IdError::HashLength {
                hash: raw.to_string(),
                len: bytes.len(),
            });
        }
        Ok(())
    }
}

impl FromStr for TxHash {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::validate(trimmed)?;
        Ok(Self(trimmed.to_string()))
    }
}

impl TryFrom<String> for TxHash {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TxHash> for String {
    fn from(value: TxHash) -> Self {
        value.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn AccountId__accepts_named_and_implicit_accounts() {
        for raw in [
            "alice.testnet",
            "tarotv0.testnet",
            "a-b_c.near",
            "98793cd91a3f870fb126f66285808c7e094afcfc4eda8a970f6648cdf0dbd6de",
        ] {
            assert!(raw.parse::<AccountId>().is_ok(), "{raw} should be valid");
        }
    }

    #[test]
    fn AccountId__rejects_bad_shapes() {
        for raw in ["a", "Alice.testnet", ".alice", "alice.", "al..ice", "al ice"] {
            assert!(
                matches!(raw.parse::<AccountId>(), Err(IdError::Account { .. })),
                "{raw} should be invalid"
            );
        }
    }

    #[test]
    fn AccountId__borsh_encodes_as_length_prefixed_string() {
        // given
        let id: AccountId = "alice.testnet".parse().unwrap();

        // when
        let bytes = borsh::to_vec(&id).unwrap();

        // then
        assert_eq!(bytes, borsh::to_vec("alice.testnet").unwrap());
    }

    #[test]
    fn TxHash__requires_32_byte_base58() {
        // given
        let digest = [7u8; 32];
        let hash = TxHash::from_digest(digest);

        // when
        let parsed: TxHash = hash.as_str().parse().unwrap();

        // then
        assert_eq!(parsed, hash);
        assert!(matches!(
            "abc".parse::<TxHash>(),
            Err(IdError::HashLength { .. })
        ));
        assert!(matches!(
            "0OIl".parse::<TxHash>(),
            Err(IdError::HashEncoding(_))
        ));
    }
}
