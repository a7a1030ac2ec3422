use serde::{Serialize, Serializer};

use crate::codec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum UserVerificationRequirement {
    #[default]
    Required,
    Preferred,
    Discouraged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttestationPreference {
    None,
    Indirect,
    #[default]
    Direct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum AuthenticatorAttachment {
    #[default]
    #[serde(rename = "platform")]
    Platform,
    #[serde(rename = "cross-platform")]
    CrossPlatform,
}

/// COSE algorithm identifiers.
pub const ALG_ES256: i64 = -7;
pub const ALG_EDDSA: i64 = -8;
pub const ALG_RS256: i64 = -257;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PubKeyCredParam {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub alg: i64,
}

impl PubKeyCredParam {
    pub fn public_key(alg: i64) -> Self {
        Self { kind: "public-key", alg }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialDescriptor {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(serialize_with = "as_base64url")]
    pub id: Vec<u8>,
}

impl CredentialDescriptor {
    pub fn public_key(id: Vec<u8>) -> Self {
        Self { kind: "public-key", id }
    }
}

pub(crate) fn as_base64url<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&codec::encode(bytes))
}
