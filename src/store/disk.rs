use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use rand::RngCore;
use std::path::{Path, PathBuf};

use super::{CredentialRecord, StoreError};

const NONCE_LEN: usize = 12;

fn record_path(dir: &Path, credential_id: &[u8]) -> PathBuf {
    let hex: String = credential_id.iter().map(|b| format!("{b:02x}")).collect();
    dir.join(format!("{hex}.bin"))
}

/// Encrypt + write credential to `dir/{credential_id_hex}.bin`. Also used to
/// rewrite a record after `last_used_at` changes.
pub(crate) fn write_credential(
    aes_key: &[u8; 32],
    dir: &Path,
    record: &CredentialRecord,
) -> Result<(), StoreError> {
    let mut buf = Vec::new();
    ciborium::into_writer(record, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(aes_key)
        .map_err(|e| StoreError::Encryption(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), buf.as_slice())
        .map_err(|e| StoreError::Encryption(e.to_string()))?;
    zeroize::Zeroize::zeroize(&mut buf);

    let mut file_bytes = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    file_bytes.extend_from_slice(&nonce_bytes);
    file_bytes.extend_from_slice(&ciphertext);

    std::fs::write(record_path(dir, &record.credential_id), file_bytes)?;
    Ok(())
}

/// Read + decrypt + deserialize credential from `path`.
pub(crate) fn read_credential(
    aes_key: &[u8; 32],
    path: &Path,
) -> Result<CredentialRecord, StoreError> {
    let bytes = std::fs::read(path)?;
    if bytes.len() < NONCE_LEN {
        return Err(StoreError::Corrupt("file too short".into()));
    }
    let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_LEN);

    let cipher = Aes256Gcm::new_from_slice(aes_key)
        .map_err(|e| StoreError::Encryption(e.to_string()))?;
    let mut plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|e| StoreError::Encryption(e.to_string()))?;

    let record = ciborium::from_reader(plaintext.as_slice())
        .map_err(|e| StoreError::Serialization(e.to_string()));
    zeroize::Zeroize::zeroize(&mut plaintext);
    record
}

pub(crate) fn delete_credential(dir: &Path, credential_id: &[u8]) -> Result<(), StoreError> {
    std::fs::remove_file(record_path(dir, credential_id))?;
    Ok(())
}

/// Remove every credential file in `dir`, including ones `load_all`
/// skipped. Returns how many files were removed.
pub(crate) fn remove_all(dir: &Path) -> Result<usize, StoreError> {
    let mut count = 0usize;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("bin") {
            continue;
        }
        std::fs::remove_file(&path)?;
        count += 1;
    }
    Ok(count)
}

/// Load all valid credential files from `dir`, ordered by insertion
/// sequence. Logs and skips corrupt files.
pub(crate) fn load_all(
    aes_key: &[u8; 32],
    dir: &Path,
) -> Result<Vec<CredentialRecord>, StoreError> {
    let mut records = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("bin") {
            continue;
        }
        match read_credential(aes_key, &path) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping corrupt credential file");
            }
        }
    }
    records.sort_by_key(|r| r.sequence);
    Ok(records)
}

/// Read the store key from `path`, generating and writing a fresh one on
/// first use.
pub fn load_or_create_key(path: &Path) -> Result<[u8; 32], StoreError> {
    if path.exists() {
        let bytes = std::fs::read(path)?;
        return bytes
            .as_slice()
            .try_into()
            .map_err(|_| StoreError::Corrupt(format!("{} is not 32 bytes", path.display())));
    }
    let mut key = [0u8; 32];
    rand::rngs::OsRng
        .try_fill_bytes(&mut key)
        .map_err(|e| StoreError::Encryption(e.to_string()))?;
    std::fs::write(path, key)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    tracing::info!(path = %path.display(), "Generated new store key");
    Ok(key)
}
