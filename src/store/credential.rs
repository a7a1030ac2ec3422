use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::codec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMethod {
    Biometric,
    Passcode,
    Platform,
    None,
}

impl std::fmt::Display for VerificationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Biometric => "biometric",
            Self::Passcode => "passcode",
            Self::Platform => "platform",
            Self::None => "none",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub version:             u8,
    pub sequence:            u64,       // insertion order, assigned by the store
    pub credential_id:       Vec<u8>,
    pub rp_id:               String,
    pub rp_id_hash:          Vec<u8>,   // SHA-256(rp_id)
    pub user_id:             Vec<u8>,
    pub user_name:           String,
    pub user_display_name:   String,
    pub verification_method: VerificationMethod,
    pub created_at:          u64,       // Unix timestamp
    pub last_used_at:        Option<u64>,
}

impl CredentialRecord {
    pub fn credential_id_b64(&self) -> String {
        codec::encode(&self.credential_id)
    }

    /// Overwrite identifying material in place before the record is dropped.
    pub fn wipe(&mut self) {
        self.credential_id.zeroize();
        self.rp_id_hash.zeroize();
        self.user_id.zeroize();
        self.user_name.zeroize();
        self.user_display_name.zeroize();
    }

    /// Multi-line listing used by `passrite list`. A record that was never
    /// used renders an empty `LastUsedDate`.
    pub fn summary(&self) -> String {
        format!(
            "CredID:{}\nUsername: {}\nUserDisplayName: {}\nRpId: {}\nRpIdHash:{}\nMethod: {}\nCreationDate: {}\nLastUsedDate: {}",
            self.credential_id_b64(),
            self.user_name,
            self.user_display_name,
            self.rp_id,
            codec::encode(&self.rp_id_hash),
            self.verification_method,
            format_timestamp(Some(self.created_at)),
            format_timestamp(self.last_used_at),
        )
    }
}

/// `%Y-%m-%d %H:%M:%S` in UTC; absent or out-of-range timestamps become "".
pub fn format_timestamp(ts: Option<u64>) -> String {
    ts.and_then(|t| i64::try_from(t).ok())
        .and_then(|t| chrono::DateTime::from_timestamp(t, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
