//! Facts about the tarot contract deployed on NEAR: where it lives, which
//! methods the client calls, what it attaches to them and how the values it
//! returns are shaped.

pub mod draw;
pub mod ids;
pub mod mint;

pub use draw::{
    DEFAULT_IPFS_GATEWAY,
    DrawDecodeError,
    DrawResult,
    ImageTransform,
    Orientation,
    image_transform,
    image_url,
};
pub use ids::{
    AccountId,
    IdError,
    TxHash,
};
pub use mint::{
    MintArgs,
    MintField,
    MintRequest,
    MintRequestError,
};

pub const DEFAULT_CONTRACT_ID: &str = "tarotv0.testnet";

pub const DRAW_METHOD: &str = "draw_cards";
pub const MINT_METHOD: &str = "nft_mint";

/// 30 TGas, attached to both calls.
pub const CALL_GAS: u64 = 30_000_000_000_000;
/// 0.5 NEAR.
pub const DRAW_DEPOSIT: u128 = 500_000_000_000_000_000_000_000;
/// 1 NEAR mint price plus storage.
pub const MINT_DEPOSIT: u128 = 1_060_000_000_000_000_000_000_000;

/// JSON arguments of `draw_cards`. The method takes none.
pub fn draw_args() -> Vec<u8> {
    b"{}".to_vec()
}

/// A fixed-method call on the tarot contract: method, JSON args, gas and deposit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractCall {
    pub method: &'static str,
    pub args: Vec<u8>,
    pub gas: u64,
    pub deposit: u128,
}

impl ContractCall {
    pub fn draw() -> Self {
        Self {
            method: DRAW_METHOD,
            args: draw_args(),
            gas: CALL_GAS,
            deposit: DRAW_DEPOSIT,
        }
    }

    pub fn mint(request: &MintRequest) -> Self {
        Self {
            method: MINT_METHOD,
            args: request.to_args_json(),
            gas: CALL_GAS,
            deposit: MINT_DEPOSIT,
        }
    }
}

/// Formats a yoctoNEAR amount as NEAR with up to four decimals.
pub fn format_near(yocto: u128) -> String {
    const YOCTO_PER_NEAR: u128 = 1_000_000_000_000_000_000_000_000;
    const SCALE: u128 = YOCTO_PER_NEAR / 10_000;
    let whole = yocto / YOCTO_PER_NEAR;
    let frac = (yocto % YOCTO_PER_NEAR) / SCALE;
    if frac == 0 {
        return format!("{whole} NEAR");
    }
    let frac = format!("{frac:04}");
    format!("{whole}.{} NEAR", frac.trim_end_matches('0'))
}
