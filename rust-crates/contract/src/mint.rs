use crate::ids::AccountId;
use serde::Serialize;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MintField {
    Receiver,
    Question,
    Reading,
    Card,
    Orientation,
}

impl fmt::Display for MintField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MintField::Receiver => "receiver",
            MintField::Question => "question",
            MintField::Reading => "reading",
            MintField::Card => "card",
            MintField::Orientation => "orientation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("mint request is missing its {0}")]
pub struct MintRequestError(pub MintField);

/// Everything `nft_mint` needs, checked to be present before anything is sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MintRequest {
    receiver: AccountId,
    question: String,
    reading: String,
    card: String,
    orientation: String,
}

/// Wire shape of the `nft_mint` arguments.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct MintArgs<'a> {
    pub receiver_id: &'a str,
    pub question: &'a str,
    pub reading: &'a str,
    pub card: &'a str,
    pub position: &'a str,
}

impl MintRequest {
    pub fn new(
        receiver: Option<AccountId>,
        question: &str,
        reading: &str,
        card: &str,
        orientation: &str,
    ) -> Result<Self, MintRequestError> {
        let receiver = receiver.ok_or(MintRequestError(MintField::Receiver))?;
        let present = |value: &str, field| {
            if value.trim().is_empty() {
                Err(MintRequestError(field))
            } else {
                Ok(value.to_string())
            }
        };
        Ok(Self {
            receiver,
            question: present(question, MintField::Question)?,
            reading: present(reading, MintField::Reading)?,
            card: present(card, MintField::Card)?,
            orientation: present(orientation, MintField::Orientation)?,
        })
    }

    pub fn receiver(&self) -> &AccountId {
        &self.receiver
    }

    pub fn args(&self) -> MintArgs<'_> {
        MintArgs {
            receiver_id: self.receiver.as_str(),
            question: &self.question,
            reading: &self.reading,
            card: &self.card,
            position: &self.orientation,
        }
    }

    pub fn to_args_json(&self) -> Vec<u8> {
        serde_json::json!(self.args()).to_string().into_bytes()
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    fn alice() -> Option<AccountId> {
        Some("alice.testnet".parse().unwrap())
    }

    #[test]
    fn MintRequest__serializes_all_five_fields() {
        // given
        let request = MintRequest::new(
            alice(),
            "Will it rain?",
            "The Fool suggests a leap.",
            "0 The Fool",
            "upright",
        )
        .unwrap();

        // when
        let json: serde_json::Value =
            serde_json::from_slice(&request.to_args_json()).unwrap();

        // then
        assert_eq!(
            json,
            serde_json::json!({
                "receiver_id": "alice.testnet",
                "question": "Will it rain?",
                "reading": "The Fool suggests a leap.",
                "card": "0 The Fool",
                "position": "upright",
            })
        );
    }

    #[test]
    fn MintRequest__rejects_each_missing_field() {
        let cases = [
            (
                MintRequest::new(None, "q", "r", "c", "upright"),
                MintField::Receiver,
            ),
            (
                MintRequest::new(alice(), "  ", "r", "c", "upright"),
                MintField::Question,
            ),
            (
                MintRequest::new(alice(), "q", "", "c", "upright"),
                MintField::Reading,
            ),
            (
                MintRequest::new(alice(), "q", "r", "", "upright"),
                MintField::Card,
            ),
            (
                MintRequest::new(alice(), "q", "r", "c", ""),
                MintField::Orientation,
            ),
        ];
        for (result, field) in cases {
            assert_eq!(result, Err(MintRequestError(field)));
        }
    }
}
