use serde::Serialize;
use sha2::{Digest, Sha256};

use super::RequestError;
use super::types::*;
use crate::codec;
use crate::config::DEFAULT_RP_ID;
use crate::store::CredentialStore;

/// Caller-supplied inputs for an authentication ceremony.
#[derive(Debug, Clone)]
pub struct AuthenticationParams {
    pub rp_id:                  String,
    pub challenge:              Vec<u8>,
    pub user_verification:      UserVerificationRequirement,
    /// Explicit allow-list; every entry must be registered for `rp_id`.
    pub allow_credential_ids:   Vec<Vec<u8>>,
    /// Fill the allow-list from the relying party's stored credentials when
    /// no explicit list is given, failing with `NoCredentials` if it has none.
    pub restrict_to_registered: bool,
}

impl AuthenticationParams {
    pub fn new(challenge: Vec<u8>) -> Self {
        Self {
            rp_id: DEFAULT_RP_ID.to_string(),
            challenge,
            user_verification: UserVerificationRequirement::Required,
            allow_credential_ids: Vec::new(),
            restrict_to_registered: true,
        }
    }

    pub fn rp_id(mut self, rp_id: impl Into<String>) -> Self {
        self.rp_id = rp_id.into();
        self
    }
}

/// Validated authentication document. An empty allow-list means any
/// credential for the relying party is eligible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticationRequest {
    #[serde(rename = "allowCredentials", skip_serializing_if = "Vec::is_empty")]
    allow_credentials: Vec<CredentialDescriptor>,
    #[serde(rename = "userVerification")]
    user_verification: UserVerificationRequirement,
    #[serde(serialize_with = "as_base64url")]
    challenge: Vec<u8>,
    #[serde(rename = "rpId")]
    rp_id: String,
}

impl AuthenticationRequest {
    pub fn challenge(&self) -> &[u8] {
        &self.challenge
    }

    pub fn rp_id(&self) -> &str {
        &self.rp_id
    }

    pub fn user_verification(&self) -> UserVerificationRequirement {
        self.user_verification
    }

    pub fn allow_credential_ids(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.allow_credentials.iter().map(|d| d.id.as_slice())
    }

    pub fn allows(&self, credential_id: &[u8]) -> bool {
        self.allow_credentials.is_empty()
            || self.allow_credentials.iter().any(|d| d.id == credential_id)
    }
}

pub fn build_authentication(
    params: AuthenticationParams,
    store: &CredentialStore,
) -> Result<AuthenticationRequest, RequestError> {
    if params.challenge.is_empty() {
        return Err(RequestError::EmptyChallenge);
    }
    if params.rp_id.trim().is_empty() {
        return Err(RequestError::EmptyRelyingParty);
    }

    let rp_id_hash = Sha256::digest(params.rp_id.as_bytes());
    let mut allow: Vec<Vec<u8>> = Vec::with_capacity(params.allow_credential_ids.len());
    for id in params.allow_credential_ids {
        let registered = store
            .get_by_id(&id)
            .is_some_and(|r| r.rp_id_hash.as_slice() == rp_id_hash.as_slice());
        if !registered {
            return Err(RequestError::UnknownCredential(codec::encode(&id)));
        }
        if !allow.contains(&id) {
            allow.push(id);
        }
    }

    if allow.is_empty() && params.restrict_to_registered {
        // Store iteration is insertion order, so the allow-list is too.
        allow = store
            .list_for_rp(&params.rp_id)
            .into_iter()
            .map(|r| r.credential_id)
            .collect();
        if allow.is_empty() {
            return Err(RequestError::NoCredentials);
        }
    }

    let request = AuthenticationRequest {
        allow_credentials: allow.into_iter().map(CredentialDescriptor::public_key).collect(),
        user_verification: params.user_verification,
        challenge: params.challenge,
        rp_id: params.rp_id,
    };
    tracing::debug!(
        rp = %request.rp_id,
        allowed = request.allow_credentials.len(),
        "Built authentication request"
    );
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CredentialRecord, VerificationMethod};

    fn record_for(rp_id: &str, id: u8) -> CredentialRecord {
        CredentialRecord {
            version: 1,
            sequence: 0,
            credential_id: vec![id; 4],
            rp_id: rp_id.into(),
            rp_id_hash: Sha256::digest(rp_id.as_bytes()).to_vec(),
            user_id: vec![1; 16],
            user_name: format!("user{id}"),
            user_display_name: format!("User {id}"),
            verification_method: VerificationMethod::Passcode,
            created_at: 1_000,
            last_used_at: None,
        }
    }

    fn record(id: u8) -> CredentialRecord {
        record_for(DEFAULT_RP_ID, id)
    }

    #[test]
    fn empty_store_with_restriction_is_no_credentials() {
        let store = CredentialStore::in_memory();
        let err = build_authentication(AuthenticationParams::new(vec![1]), &store).unwrap_err();
        assert!(matches!(err, RequestError::NoCredentials));
    }

    #[test]
    fn unrestricted_request_allows_any_credential() {
        let store = CredentialStore::in_memory();
        let mut params = AuthenticationParams::new(vec![1]);
        params.restrict_to_registered = false;
        let req = build_authentication(params, &store).unwrap();
        assert_eq!(req.allow_credential_ids().count(), 0);
        assert!(req.allows(b"anything"));
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("allowCredentials").is_none());
    }

    #[test]
    fn allow_list_follows_insertion_order() {
        let mut store = CredentialStore::in_memory();
        for id in [9u8, 3, 5] {
            store.add(record(id)).unwrap();
        }
        let req = build_authentication(AuthenticationParams::new(vec![1]), &store).unwrap();
        let ids: Vec<u8> = req.allow_credential_ids().map(|id| id[0]).collect();
        assert_eq!(ids, vec![9, 3, 5]);
    }

    #[test]
    fn explicit_ids_must_be_registered() {
        let mut store = CredentialStore::in_memory();
        store.add(record(1)).unwrap();
        let mut params = AuthenticationParams::new(vec![1]);
        params.allow_credential_ids = vec![vec![2; 4]];
        let err = build_authentication(params, &store).unwrap_err();
        assert!(matches!(err, RequestError::UnknownCredential(_)));

        let mut params = AuthenticationParams::new(vec![1]);
        params.allow_credential_ids = vec![vec![1; 4]];
        let req = build_authentication(params, &store).unwrap();
        assert!(req.allows(&[1; 4]));
        assert!(!req.allows(&[2; 4]));
    }

    #[test]
    fn allow_list_is_scoped_to_relying_party() {
        let mut store = CredentialStore::in_memory();
        store.add(record_for("a.example", 1)).unwrap();
        store.add(record_for("b.example", 2)).unwrap();
        store.add(record_for("a.example", 3)).unwrap();

        let req = build_authentication(AuthenticationParams::new(vec![1]).rp_id("a.example"), &store).unwrap();
        let ids: Vec<u8> = req.allow_credential_ids().map(|id| id[0]).collect();
        assert_eq!(ids, vec![1, 3]);

        let err = build_authentication(AuthenticationParams::new(vec![1]).rp_id("c.example"), &store)
            .unwrap_err();
        assert!(matches!(err, RequestError::NoCredentials));

        let mut params = AuthenticationParams::new(vec![1]).rp_id("b.example");
        params.allow_credential_ids = vec![vec![1; 4]];
        let err = build_authentication(params, &store).unwrap_err();
        assert!(matches!(err, RequestError::UnknownCredential(_)));
    }

    #[test]
    fn serializes_to_webauthn_shape() {
        let mut store = CredentialStore::in_memory();
        store.add(record_for("rp.test", 0)).unwrap();
        let req =
            build_authentication(AuthenticationParams::new(vec![0xfb, 0xff]).rp_id("rp.test"), &store)
                .unwrap();
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            serde_json::json!({
                "allowCredentials": [{"type": "public-key", "id": "AAAAAA"}],
                "userVerification": "required",
                "challenge": "-_8",
                "rpId": "rp.test"
            })
        );
    }
}
