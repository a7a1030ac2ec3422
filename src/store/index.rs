use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use sha2::{Digest, Sha256};

use super::{StoreError, credential::{CredentialRecord, VerificationMethod}, disk};

/// Handle shared between ceremony clients. Mutations take the write lock,
/// so duplicate checks and inserts are atomic with respect to each other.
pub type SharedStore = Arc<RwLock<CredentialStore>>;

struct Disk {
    aes_key: [u8; 32],
    creds_dir: PathBuf,
}

/// Authoritative owner of every credential record, kept in insertion order.
pub struct CredentialStore {
    disk: Option<Disk>,
    records: Vec<CredentialRecord>,
    next_sequence: u64,
}

impl CredentialStore {
    /// A store that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            disk: None,
            records: Vec::new(),
            next_sequence: 0,
        }
    }

    /// Load all credentials from disk into memory.
    pub fn load(aes_key: [u8; 32], creds_dir: PathBuf) -> Result<Self, StoreError> {
        let records = disk::load_all(&aes_key, &creds_dir)?;
        let next_sequence = records.last().map_or(0, |r| r.sequence + 1);
        Ok(Self {
            disk: Some(Disk { aes_key, creds_dir }),
            records,
            next_sequence,
        })
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(RwLock::new(self))
    }

    /// All records in insertion order, optionally restricted to one
    /// verification method.
    pub fn list(&self, method: Option<VerificationMethod>) -> Vec<CredentialRecord> {
        self.records
            .iter()
            .filter(|r| method.is_none_or(|m| r.verification_method == m))
            .cloned()
            .collect()
    }

    /// Records scoped to `rp_id`, in insertion order.
    pub fn list_for_rp(&self, rp_id: &str) -> Vec<CredentialRecord> {
        let hash = Sha256::digest(rp_id.as_bytes());
        self.records
            .iter()
            .filter(|r| r.rp_id_hash.as_slice() == hash.as_slice())
            .cloned()
            .collect()
    }

    pub fn get_by_id(&self, id: &[u8]) -> Option<&CredentialRecord> {
        self.records.iter().find(|r| r.credential_id == id)
    }

    pub fn contains(&self, id: &[u8]) -> bool {
        self.get_by_id(id).is_some()
    }

    /// Insert a new record. The store is left untouched on failure.
    pub fn add(&mut self, mut record: CredentialRecord) -> Result<(), StoreError> {
        if record.credential_id.is_empty() {
            return Err(StoreError::Corrupt("empty credential_id".into()));
        }
        if self.contains(&record.credential_id) {
            return Err(StoreError::Duplicate(crate::codec::encode(&record.credential_id)));
        }
        record.sequence = self.next_sequence;
        if let Some(d) = &self.disk {
            disk::write_credential(&d.aes_key, &d.creds_dir, &record)?;
        }
        self.next_sequence += 1;
        self.records.push(record);
        Ok(())
    }

    /// Remove a record and wipe its in-memory copy.
    pub fn delete(&mut self, id: &[u8]) -> Result<(), StoreError> {
        let pos = self
            .records
            .iter()
            .position(|r| r.credential_id == id)
            .ok_or(StoreError::NotFound)?;
        if let Some(d) = &self.disk {
            disk::delete_credential(&d.creds_dir, id)?;
        }
        let mut record = self.records.remove(pos);
        record.wipe();
        Ok(())
    }

    /// Set `last_used_at` on an existing record.
    pub fn touch(&mut self, id: &[u8], timestamp: u64) -> Result<(), StoreError> {
        let record = self
            .records
            .iter_mut()
            .find(|r| r.credential_id == id)
            .ok_or(StoreError::NotFound)?;
        let previous = record.last_used_at.replace(timestamp);
        if let Some(d) = &self.disk {
            if let Err(e) = disk::write_credential(&d.aes_key, &d.creds_dir, record) {
                record.last_used_at = previous;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Delete every record and every credential file on disk, including
    /// files that failed to load. Returns how many records were removed.
    /// Memory is cleared even if a file cannot be removed.
    pub fn wipe(&mut self) -> Result<usize, StoreError> {
        let count = self.records.len();
        for mut record in self.records.drain(..) {
            record.wipe();
        }
        if let Some(d) = &self.disk {
            let files = disk::remove_all(&d.creds_dir)?;
            tracing::info!(records = count, files, "Credential store wiped");
        }
        Ok(count)
    }

    pub fn credential_count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
