use crate::error::ReadingError;
use tarot_contract::TxHash;
use url::Url;

const TX_HASHES_PARAM: &str = "transactionHashes";
const ERROR_CODE_PARAM: &str = "errorCode";

/// Extracts the transaction hash from a wallet redirect.
///
/// Accepts either the full callback URL or a bare hash. The wallet may
/// append several comma-separated hashes; the last one belongs to the
/// call that triggered the redirect. Returns `None` when the URL carries
/// no hash at all.
pub fn transaction_hash(input: &str) -> Result<Option<TxHash>, ReadingError> {
    let input = input.trim();
    if !input.contains("://") {
        return Ok(Some(input.parse()?));
    }
    let url = Url::parse(input)
        .map_err(|e| ReadingError::InvalidInput(format!("redirect URL: {e}")))?;
    let mut hashes = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            ERROR_CODE_PARAM => {
                return Err(ReadingError::InvalidInput(format!(
                    "wallet reported {value}"
                )));
            }
            TX_HASHES_PARAM => hashes = Some(value.into_owned()),
            _ => {}
        }
    }
    let Some(hashes) = hashes else {
        return Ok(None);
    };
    match hashes.split(',').map(str::trim).filter(|h| !h.is_empty()).last() {
        Some(last) => Ok(Some(last.parse()?)),
        None => Ok(None),
    }
}
