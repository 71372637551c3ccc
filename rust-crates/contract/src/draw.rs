use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;
use std::fmt;

pub const DEFAULT_IPFS_GATEWAY: &str = "https://nftstorage.link/ipfs";

const UPRIGHT: &str = "upright";

#[derive(Debug, thiserror::Error)]
pub enum DrawDecodeError {
    #[error("draw payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("draw payload is not a JSON array")]
    NotAnArray,
    #[error("draw payload has {0} elements, expected at least 3")]
    TooShort(usize),
    #[error("draw payload element {0} is not a string")]
    NotAString(usize),
}

/// The card the contract drew, decoded from `[card, imageRef, orientation]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawResult {
    pub card: String,
    pub image_ref: String,
    /// Raw orientation text as returned by the contract.
    pub orientation: String,
}

impl DrawResult {
    pub fn from_payload(payload: &[u8]) -> Result<Self, DrawDecodeError> {
        let value: Value = serde_json::from_slice(payload)?;
        let items = value.as_array().ok_or(DrawDecodeError::NotAnArray)?;
        if items.len() < 3 {
            return Err(DrawDecodeError::TooShort(items.len()));
        }
        let field = |idx: usize| {
            items[idx]
                .as_str()
                .map(str::to_owned)
                .ok_or(DrawDecodeError::NotAString(idx))
        };
        Ok(Self {
            card: field(0)?,
            image_ref: field(1)?,
            orientation: field(2)?,
        })
    }

    pub fn orientation(&self) -> Orientation {
        Orientation::from_raw(&self.orientation)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Upright,
    Reversed,
}

impl Orientation {
    /// Only the exact text `upright` is upright; the contract spells the
    /// other side `reverse`, and anything unknown is shown reversed too.
    pub fn from_raw(raw: &str) -> Self {
        if raw == UPRIGHT {
            Orientation::Upright
        } else {
            Orientation::Reversed
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::Upright => f.write_str("upright"),
            Orientation::Reversed => f.write_str("reversed"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageTransform {
    pub rotation_degrees: u16,
}

impl ImageTransform {
    pub fn is_rotated(&self) -> bool {
        self.rotation_degrees != 0
    }
}

pub fn image_transform(orientation: &str) -> ImageTransform {
    match Orientation::from_raw(orientation) {
        Orientation::Upright => ImageTransform {
            rotation_degrees: 0,
        },
        Orientation::Reversed => ImageTransform {
            rotation_degrees: 180,
        },
    }
}

/// Resolves an `ipfs://` reference through an HTTP gateway.
pub fn image_url(image_ref: &str, gateway: &str) -> String {
    match image_ref.strip_prefix("ipfs://") {
        Some(path) => format!("{}/{}", gateway.trim_end_matches('/'), path),
        None => image_ref.to_string(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn from_payload__maps_first_three_elements() {
        // given
        let payload = br#"["The Fool","ipfs://abc123","upright"]"#;

        // when
        let draw = DrawResult::from_payload(payload).unwrap();

        // then
        assert_eq!(
            draw,
            DrawResult {
                card: "The Fool".to_string(),
                image_ref: "ipfs://abc123".to_string(),
                orientation: "upright".to_string(),
            }
        );
    }

    #[test]
    fn from_payload__ignores_trailing_elements() {
        let payload = br#"["XVI The Tower","ipfs://cid/16.png","reverse","extra"]"#;

        let draw = DrawResult::from_payload(payload).unwrap();

        assert_eq!(draw.card, "XVI The Tower");
        assert_eq!(draw.orientation(), Orientation::Reversed);
    }

    #[test]
    fn from_payload__rejects_wrong_shapes() {
        assert!(matches!(
            DrawResult::from_payload(b"not json"),
            Err(DrawDecodeError::Json(_))
        ));
        assert!(matches!(
            DrawResult::from_payload(br#"{"card":"x"}"#),
            Err(DrawDecodeError::NotAnArray)
        ));
        assert!(matches!(
            DrawResult::from_payload(br#"["a","b"]"#),
            Err(DrawDecodeError::TooShort(2))
        ));
        assert!(matches!(
            DrawResult::from_payload(br#"["a",1,"upright"]"#),
            Err(DrawDecodeError::NotAString(1))
        ));
    }

    #[test]
    fn image_transform__upright_is_not_rotated() {
        assert_eq!(image_transform("upright").rotation_degrees, 0);
        assert_eq!(image_transform("reverse").rotation_degrees, 180);
        assert_eq!(image_transform("reversed").rotation_degrees, 180);
        assert_eq!(image_transform("Upright").rotation_degrees, 180);
    }

    proptest! {
        #[test]
        fn image_transform__anything_but_upright_is_rotated(raw in "\\PC*") {
            prop_assume!(raw != "upright");
            prop_assert_eq!(image_transform(&raw).rotation_degrees, 180);
        }
    }

    #[test]
    fn image_url__rewrites_ipfs_refs_only() {
        assert_eq!(
            image_url("ipfs://bafy/3.png", DEFAULT_IPFS_GATEWAY),
            "https://nftstorage.link/ipfs/bafy/3.png"
        );
        assert_eq!(
            image_url("ipfs://bafy/3.png", "https://gw.example/ipfs/"),
            "https://gw.example/ipfs/bafy/3.png"
        );
        assert_eq!(
            image_url("https://example.com/x.png", DEFAULT_IPFS_GATEWAY),
            "https://example.com/x.png"
        );
    }
}
