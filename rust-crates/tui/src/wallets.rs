use crate::session::AccountHandle;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use ed25519_dalek::SigningKey;
use serde::Deserialize;
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};
use tarot_contract::AccountId;

const ED25519_PREFIX: &str = "ed25519:";

#[derive(Clone, Debug)]
pub struct KeyFileDescriptor {
    pub account_id: String,
    pub path: PathBuf,
}

impl KeyFileDescriptor {
    pub fn new(account_id: impl Into<String>, path: PathBuf) -> Self {
        Self {
            account_id: account_id.into(),
            path,
        }
    }
}

/// On-disk layout written by the NEAR CLI.
#[derive(Deserialize)]
struct KeyFile {
    account_id: String,
    public_key: String,
    #[serde(alias = "secret_key")]
    private_key: String,
}

pub fn default_credentials_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").wrap_err("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".near-credentials"))
}

pub fn resolve_credentials_dir(dir: Option<&str>) -> Result<PathBuf> {
    match dir {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            Ok(PathBuf::from(expanded.into_owned()))
        }
        None => default_credentials_dir(),
    }
}

pub fn list_accounts(dir: &Path, network_id: &str) -> Result<Vec<KeyFileDescriptor>> {
    let dir = dir.join(network_id);
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut accounts = Vec::new();
    for entry in fs::read_dir(&dir).wrap_err("Failed to read credentials directory")? {
        let entry = entry.wrap_err("Failed to read credentials entry")?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| eyre!("Invalid key filename {:?}", path))?
            .to_owned();
        accounts.push(KeyFileDescriptor::new(name, path));
    }
    accounts.sort_by(|a, b| a.account_id.cmp(&b.account_id));
    Ok(accounts)
}

pub fn find_account(dir: &Path, network_id: &str, name: &str) -> Result<KeyFileDescriptor> {
    let accounts = list_accounts(dir, network_id)?;
    accounts
        .into_iter()
        .find(|a| a.account_id == name)
        .ok_or_else(|| {
            eyre!(
                "No {network_id} key for '{name}' in {}",
                dir.to_string_lossy()
            )
        })
}

pub fn load_key(descriptor: &KeyFileDescriptor) -> Result<AccountHandle> {
    let raw = fs::read_to_string(&descriptor.path).wrap_err_with(|| {
        format!("Failed to read key file {}", descriptor.path.display())
    })?;
    let file: KeyFile = serde_json::from_str(&raw)
        .wrap_err_with(|| format!("Malformed key file for '{}'", descriptor.account_id))?;
    let account_id: AccountId = file
        .account_id
        .parse()
        .wrap_err("Key file names an invalid account id")?;

    let secret = decode_ed25519(&file.private_key).wrap_err("Unreadable private key")?;
    // the CLI stores seed || public key; older files keep only the seed
    let seed: [u8; 32] = match secret.len() {
        32 | 64 => secret[..32]
            .try_into()
            .map_err(|_| eyre!("Private key seed has the wrong length"))?,
        other => return Err(eyre!("Private key is {other} bytes, expected 32 or 64")),
    };
    let signing_key = SigningKey::from_bytes(&seed);

    let public = decode_ed25519(&file.public_key).wrap_err("Unreadable public key")?;
    if public.as_slice() != signing_key.verifying_key().as_bytes() {
        return Err(eyre!(
            "Key file for '{}' has a public key that does not match its private key",
            descriptor.account_id
        ));
    }

    Ok(AccountHandle::new(account_id, signing_key))
}

fn decode_ed25519(encoded: &str) -> Result<Vec<u8>> {
    let body = encoded
        .strip_prefix(ED25519_PREFIX)
        .ok_or_else(|| eyre!("only ed25519 keys are supported"))?;
    bs58::decode(body)
        .into_vec()
        .map_err(|e| eyre!("invalid base58: {e}"))
}
