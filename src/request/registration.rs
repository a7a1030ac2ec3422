use serde::Serialize;

use super::RequestError;
use super::types::*;
use crate::codec;
use crate::config::{DEFAULT_RP_ID, USER_HANDLE_LEN};

/// Caller-supplied inputs for a registration ceremony.
#[derive(Debug, Clone)]
pub struct RegistrationParams {
    pub user_name:             String,
    /// Defaults to `user_name`.
    pub user_display_name:     Option<String>,
    /// Random handle generated when absent.
    pub user_id:               Option<Vec<u8>>,
    pub rp_id:                 String,
    /// Defaults to `rp_id`.
    pub rp_name:               Option<String>,
    pub challenge:             Vec<u8>,
    pub user_verification:     UserVerificationRequirement,
    pub attestation:           AttestationPreference,
    pub attachment:            AuthenticatorAttachment,
    pub algorithms:            Vec<i64>,
    pub resident_key_required: bool,
}

impl RegistrationParams {
    pub fn new(user_name: impl Into<String>, challenge: Vec<u8>) -> Self {
        Self {
            user_name: user_name.into(),
            user_display_name: None,
            user_id: None,
            rp_id: DEFAULT_RP_ID.to_string(),
            rp_name: None,
            challenge,
            user_verification: UserVerificationRequirement::Required,
            attestation: AttestationPreference::Direct,
            attachment: AuthenticatorAttachment::Platform,
            algorithms: vec![ALG_ES256],
            resident_key_required: false,
        }
    }

    pub fn rp_id(mut self, rp_id: impl Into<String>) -> Self {
        self.rp_id = rp_id.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserEntity {
    pub name: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(serialize_with = "as_base64url")]
    pub id: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelyingParty {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatorSelection {
    #[serde(rename = "userVerification")]
    pub user_verification: UserVerificationRequirement,
    #[serde(rename = "authenticatorAttachment")]
    pub authenticator_attachment: AuthenticatorAttachment,
    #[serde(rename = "requireResidentKey")]
    pub require_resident_key: bool,
}

/// Validated registration document. Fields are read-only once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationRequest {
    user: UserEntity,
    rp: RelyingParty,
    #[serde(serialize_with = "as_base64url")]
    challenge: Vec<u8>,
    attestation: AttestationPreference,
    #[serde(rename = "authenticatorSelection")]
    authenticator_selection: AuthenticatorSelection,
    #[serde(rename = "pubKeyCredParams")]
    pub_key_cred_params: Vec<PubKeyCredParam>,
}

impl RegistrationRequest {
    pub fn user(&self) -> &UserEntity {
        &self.user
    }

    pub fn rp(&self) -> &RelyingParty {
        &self.rp
    }

    pub fn challenge(&self) -> &[u8] {
        &self.challenge
    }

    pub fn attestation(&self) -> AttestationPreference {
        self.attestation
    }

    pub fn authenticator_selection(&self) -> &AuthenticatorSelection {
        &self.authenticator_selection
    }

    pub fn user_verification(&self) -> UserVerificationRequirement {
        self.authenticator_selection.user_verification
    }

    pub fn resident_key_required(&self) -> bool {
        self.authenticator_selection.require_resident_key
    }

    /// Signature algorithms in the caller's priority order.
    pub fn algorithms(&self) -> impl Iterator<Item = i64> + '_ {
        self.pub_key_cred_params.iter().map(|p| p.alg)
    }
}

pub fn build_registration(params: RegistrationParams) -> Result<RegistrationRequest, RequestError> {
    if params.user_name.trim().is_empty() {
        return Err(RequestError::EmptyUserName);
    }
    if params.challenge.is_empty() {
        return Err(RequestError::EmptyChallenge);
    }
    if params.rp_id.trim().is_empty() {
        return Err(RequestError::EmptyRelyingParty);
    }
    if params.algorithms.is_empty() {
        return Err(RequestError::NoAlgorithms);
    }

    let user_id = match params.user_id {
        Some(id) if !id.is_empty() => id,
        _ => codec::random_bytes(USER_HANDLE_LEN)?,
    };
    let display_name = params
        .user_display_name
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| params.user_name.clone());
    let rp_name = params.rp_name.unwrap_or_else(|| params.rp_id.clone());

    let mut algorithms = Vec::with_capacity(params.algorithms.len());
    for alg in params.algorithms {
        if !algorithms.contains(&alg) {
            algorithms.push(alg);
        }
    }

    let request = RegistrationRequest {
        user: UserEntity {
            name: params.user_name,
            display_name,
            id: user_id,
        },
        rp: RelyingParty {
            id: params.rp_id,
            name: rp_name,
        },
        challenge: params.challenge,
        attestation: params.attestation,
        authenticator_selection: AuthenticatorSelection {
            user_verification: params.user_verification,
            authenticator_attachment: params.attachment,
            require_resident_key: params.resident_key_required,
        },
        pub_key_cred_params: algorithms.into_iter().map(PubKeyCredParam::public_key).collect(),
    };
    tracing::debug!(user = %request.user.name, rp = %request.rp.id, "Built registration request");
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_user_and_challenge() {
        let err = build_registration(RegistrationParams::new("  ", vec![1])).unwrap_err();
        assert!(matches!(err, RequestError::EmptyUserName));
        let err = build_registration(RegistrationParams::new("alice", vec![])).unwrap_err();
        assert!(matches!(err, RequestError::EmptyChallenge));
    }

    #[test]
    fn generates_user_handle_and_defaults() {
        let req = build_registration(RegistrationParams::new("alice", vec![7; 32]).rp_id("rp.test"))
            .unwrap();
        assert_eq!(req.user().id.len(), USER_HANDLE_LEN);
        assert_eq!(req.user().display_name, "alice");
        assert_eq!(req.rp().name, "rp.test");
        assert_eq!(req.algorithms().collect::<Vec<_>>(), vec![ALG_ES256]);
    }

    #[test]
    fn keeps_supplied_user_handle_and_dedups_algorithms() {
        let mut params = RegistrationParams::new("bob", vec![1, 2, 3]);
        params.user_id = Some(b"fixed-handle".to_vec());
        params.algorithms = vec![ALG_EDDSA, ALG_ES256, ALG_EDDSA, ALG_RS256];
        let req = build_registration(params).unwrap();
        assert_eq!(req.user().id, b"fixed-handle");
        assert_eq!(req.algorithms().collect::<Vec<_>>(), vec![ALG_EDDSA, ALG_ES256, ALG_RS256]);
    }

    #[test]
    fn serializes_to_webauthn_shape() {
        let mut params = RegistrationParams::new("alice", vec![0xfb, 0xff]).rp_id("example.com");
        params.user_id = Some(vec![0; 3]);
        let json = serde_json::to_value(build_registration(params).unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "user": {"name": "alice", "displayName": "alice", "id": "AAAA"},
                "rp": {"id": "example.com", "name": "example.com"},
                "challenge": "-_8",
                "attestation": "direct",
                "authenticatorSelection": {
                    "userVerification": "required",
                    "authenticatorAttachment": "platform",
                    "requireResidentKey": false
                },
                "pubKeyCredParams": [{"type": "public-key", "alg": -7}]
            })
        );
    }
}
