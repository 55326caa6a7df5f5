//! Helper functions

use anyhow::{Context, Result};
use solana_sdk::signature::Keypair;
use std::path::Path;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

pub fn current_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

pub fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

pub fn load_keypair(path: &Path) -> Result<Keypair> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read keypair file: {:?}", path))?;

    let bytes: Vec<u8> = serde_json::from_str(&content)
        .with_context(|| "Failed to parse keypair JSON")?;

    Keypair::from_bytes(&bytes).map_err(|e| anyhow::anyhow!("Invalid keypair: {}", e))
}

/// Load a keypair from an env var (JSON byte array or base58) before
/// falling back to a file path.
pub fn load_keypair_from_env_or_file(env_var: &str, file_path: &Path) -> Result<Keypair> {
    if let Ok(key_str) = std::env::var(env_var) {
        if let Ok(bytes) = serde_json::from_str::<Vec<u8>>(&key_str) {
            return Keypair::from_bytes(&bytes)
                .map_err(|e| anyhow::anyhow!("Invalid keypair from env: {}", e));
        }
        if let Ok(bytes) = bs58::decode(&key_str).into_vec() {
            return Keypair::from_bytes(&bytes)
                .map_err(|e| anyhow::anyhow!("Invalid keypair from env: {}", e));
        }
        anyhow::bail!("Env var {} set but not a valid keypair", env_var);
    }
    load_keypair(file_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_monotonic_enough() {
        let a = current_timestamp_millis();
        let b = current_timestamp_millis();
        assert!(b >= a);
    }
}
