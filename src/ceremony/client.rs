use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::sync::oneshot;

use super::state::{CeremonyKind, CeremonyState};
use super::{CeremonyError, CeremonyOutcome};
use crate::config::CEREMONY_TIMEOUT_SECS;
use crate::request::{
    AuthenticationParams, AuthenticationRequest, CeremonyRequest, RegistrationParams,
    build_authentication, build_registration,
};
use crate::store::credential::unix_now;
use crate::store::{CredentialRecord, CredentialStore, SharedStore, StoreError};
use crate::verify::{Assertion, Attestation, Verifier, VerifyError};

type CeremonyResult = Result<CeremonyOutcome, CeremonyError>;

struct Slot {
    state:      CeremonyState,
    generation: u64,
    cancel:     Option<oneshot::Sender<()>>,
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

fn advance(slot: &mut Slot, next: CeremonyState) {
    debug_assert!(
        slot.state.can_advance_to(&next),
        "illegal ceremony transition {:?} -> {:?}",
        slot.state,
        next
    );
    tracing::trace!(from = ?slot.state, to = ?next, "Ceremony transition");
    slot.state = next;
}

/// Pending result of one ceremony. The outcome is delivered exactly once,
/// either through [`outcome`](Self::outcome) or [`on_complete`](Self::on_complete).
pub struct CeremonyHandle {
    kind:       CeremonyKind,
    generation: u64,
    slot:       Arc<Mutex<Slot>>,
    result:     oneshot::Receiver<CeremonyResult>,
}

impl CeremonyHandle {
    pub fn kind(&self) -> CeremonyKind {
        self.kind
    }

    /// Withdraw before verification resolves. Returns false when the
    /// ceremony already moved past the verification step.
    pub fn cancel(&self) -> bool {
        let mut slot = lock(&self.slot);
        if slot.generation != self.generation {
            return false;
        }
        match slot.cancel.take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    pub async fn outcome(self) -> CeremonyResult {
        self.result.await.unwrap_or(Err(CeremonyError::Aborted))
    }

    /// Invoke `callback` with the outcome once it is known.
    pub fn on_complete<F>(self, callback: F)
    where
        F: FnOnce(CeremonyResult) + Send + 'static,
    {
        tokio::spawn(async move { callback(self.outcome().await) });
    }
}

/// Runs registration and authentication ceremonies against a verifier,
/// one at a time. Independent clients may share the same store.
///
/// Ceremonies run on the ambient tokio runtime.
pub struct CeremonyClient<V> {
    verifier: Arc<V>,
    store:    SharedStore,
    slot:     Arc<Mutex<Slot>>,
    timeout:  Duration,
}

impl<V: Verifier + 'static> CeremonyClient<V> {
    pub fn new(verifier: Arc<V>, store: SharedStore) -> Self {
        Self {
            verifier,
            store,
            slot: Arc::new(Mutex::new(Slot {
                state: CeremonyState::Idle,
                generation: 0,
                cancel: None,
            })),
            timeout: Duration::from_secs(CEREMONY_TIMEOUT_SECS),
        }
    }

    /// Upper bound on the verification step.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn state(&self) -> CeremonyState {
        lock(&self.slot).state
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn verifier(&self) -> &Arc<V> {
        &self.verifier
    }

    /// Cancel whichever ceremony is awaiting verification.
    pub fn cancel(&self) -> bool {
        match lock(&self.slot).cancel.take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    fn begin(&self, kind: CeremonyKind) -> Result<(u64, oneshot::Receiver<()>), CeremonyError> {
        let mut slot = lock(&self.slot);
        if slot.state.in_flight() {
            tracing::warn!(%kind, current = ?slot.state, "Ceremony rejected, another is in flight");
            return Err(CeremonyError::Busy);
        }
        advance(&mut slot, CeremonyState::Building(kind));
        slot.generation += 1;
        let (tx, rx) = oneshot::channel();
        slot.cancel = Some(tx);
        Ok((slot.generation, rx))
    }

    fn fail_build(&self, kind: CeremonyKind, err: CeremonyError) -> CeremonyError {
        let mut slot = lock(&self.slot);
        slot.cancel = None;
        advance(&mut slot, CeremonyState::Completed { kind, success: false });
        tracing::warn!(%kind, error = %err, "Ceremony request rejected");
        err
    }

    /// Move to `AwaitingVerification` and drive the rest of the ceremony on
    /// a task. `commit` runs only if verification succeeded and nobody
    /// cancelled; its store update happens before the outcome is delivered.
    fn spawn<T, Fut, C>(
        &self,
        kind: CeremonyKind,
        generation: u64,
        mut cancel_rx: oneshot::Receiver<()>,
        verification: Fut,
        commit: C,
    ) -> CeremonyHandle
    where
        T: Send + 'static,
        Fut: Future<Output = Result<T, CeremonyError>> + Send + 'static,
        C: FnOnce(T) -> CeremonyResult + Send + 'static,
    {
        advance(&mut lock(&self.slot), CeremonyState::AwaitingVerification(kind));

        let (result_tx, result_rx) = oneshot::channel();
        let slot = self.slot.clone();
        let timeout = self.timeout;
        tokio::spawn(async move {
            // The verifier runs on its own task so a panic there still ends
            // the ceremony in a terminal state.
            let mut verify_task = tokio::spawn(verification);
            let verified = tokio::select! {
                biased;
                Ok(()) = &mut cancel_rx => Err(CeremonyError::Cancelled),
                res = tokio::time::timeout(timeout, &mut verify_task) => match res {
                    Err(_) => Err(CeremonyError::Timeout),
                    Ok(Ok(result)) => result,
                    Ok(Err(e)) => {
                        tracing::error!(%kind, error = %e, "Verifier task failed");
                        Err(CeremonyError::Aborted)
                    }
                },
            };
            verify_task.abort();

            // A cancel that got in before this point wins over a late success.
            let cancelled = lock(&slot).cancel.take().is_none();
            let result = match verified {
                Ok(_) if cancelled => Err(CeremonyError::Cancelled),
                other => other.and_then(commit),
            };

            let next = match &result {
                Ok(_) => CeremonyState::Completed { kind, success: true },
                Err(CeremonyError::Cancelled) => CeremonyState::Cancelled(kind),
                Err(_) => CeremonyState::Completed { kind, success: false },
            };
            advance(&mut lock(&slot), next);
            match &result {
                Ok(_) => tracing::info!(%kind, "Ceremony completed"),
                Err(CeremonyError::Cancelled) => tracing::info!(%kind, "Ceremony cancelled"),
                Err(e) => tracing::warn!(%kind, error = %e, "Ceremony failed"),
            }
            if result_tx.send(result).is_err() {
                tracing::debug!(%kind, "Ceremony outcome dropped, handle gone");
            }
        });

        CeremonyHandle {
            kind,
            generation,
            slot: self.slot.clone(),
            result: result_rx,
        }
    }

    /// Build a registration request and start verification. On success the
    /// new record is added to the store.
    pub fn start_registration(&self, params: RegistrationParams) -> Result<CeremonyHandle, CeremonyError> {
        let kind = CeremonyKind::Registration;
        let (generation, cancel_rx) = self.begin(kind)?;
        let request = build_registration(params).map_err(|e| self.fail_build(kind, e.into()))?;
        tracing::debug!(
            "Registration request:\n{}",
            CeremonyRequest::Registration(request.clone()).to_json()
        );

        let verifier = self.verifier.clone();
        let verify_request = request.clone();
        let verification = async move {
            verifier
                .register(&verify_request)
                .await
                .map_err(|e| verification_failed(verifier.as_ref(), e))
        };

        let store = self.store.clone();
        let commit = move |attestation: Attestation| {
            if attestation.credential_id.is_empty() {
                return Err(CeremonyError::InvalidResponse("empty credential id".into()));
            }
            let record = CredentialRecord {
                version: 1,
                sequence: 0,
                credential_id: attestation.credential_id,
                rp_id: request.rp().id.clone(),
                rp_id_hash: Sha256::digest(request.rp().id.as_bytes()).to_vec(),
                user_id: request.user().id.clone(),
                user_name: request.user().name.clone(),
                user_display_name: request.user().display_name.clone(),
                verification_method: attestation.verification_method,
                created_at: unix_now(),
                last_used_at: None,
            };
            let id = record.credential_id.clone();
            let mut store = store.write().map_err(|_| StoreError::Poisoned)?;
            store.add(record)?;
            let stored = store.get_by_id(&id).cloned().ok_or(StoreError::NotFound)?;
            tracing::info!(cred_id = %stored.credential_id_b64(), user = %stored.user_name, "Credential stored");
            Ok(CeremonyOutcome::Registered(stored))
        };

        Ok(self.spawn(kind, generation, cancel_rx, verification, commit))
    }

    /// Build an authentication request against the current store contents
    /// and start verification. On success the chosen record's
    /// `last_used_at` is updated.
    pub fn start_authentication(&self, params: AuthenticationParams) -> Result<CeremonyHandle, CeremonyError> {
        let kind = CeremonyKind::Authentication;
        let (generation, cancel_rx) = self.begin(kind)?;
        let (request, candidates) = {
            let store = self
                .store
                .read()
                .map_err(|_| self.fail_build(kind, StoreError::Poisoned.into()))?;
            let request = build_authentication(params, &store)
                .map_err(|e| self.fail_build(kind, e.into()))?;
            let candidates = eligible(&store, &request);
            (request, candidates)
        };
        tracing::debug!(
            "Authentication request:\n{}",
            CeremonyRequest::Authentication(request.clone()).to_json()
        );

        let verifier = self.verifier.clone();
        let verify_request = request.clone();
        let verification = async move {
            verifier
                .authenticate(&verify_request, &candidates)
                .await
                .map_err(|e| verification_failed(verifier.as_ref(), e))
        };

        let store = self.store.clone();
        let commit = move |assertion: Assertion| {
            if !request.allows(&assertion.credential_id) {
                return Err(CeremonyError::InvalidResponse(
                    "assertion for a credential outside the allow-list".into(),
                ));
            }
            let rp_id_hash = Sha256::digest(request.rp_id().as_bytes());
            let mut store = store.write().map_err(|_| StoreError::Poisoned)?;
            let same_rp = store
                .get_by_id(&assertion.credential_id)
                .is_some_and(|r| r.rp_id_hash.as_slice() == rp_id_hash.as_slice());
            if !same_rp {
                return Err(CeremonyError::InvalidResponse(
                    "assertion for a credential of another relying party".into(),
                ));
            }
            store.touch(&assertion.credential_id, unix_now())?;
            let record = store
                .get_by_id(&assertion.credential_id)
                .cloned()
                .ok_or(StoreError::NotFound)?;
            tracing::info!(cred_id = %record.credential_id_b64(), user = %record.user_name, "Credential used");
            Ok(CeremonyOutcome::Authenticated(record))
        };

        Ok(self.spawn(kind, generation, cancel_rx, verification, commit))
    }

    pub async fn register(&self, params: RegistrationParams) -> CeremonyResult {
        self.start_registration(params)?.outcome().await
    }

    pub async fn authenticate(&self, params: AuthenticationParams) -> CeremonyResult {
        self.start_authentication(params)?.outcome().await
    }
}

/// Records the verifier may choose from: the relying party's credentials,
/// narrowed to the allow-list when it is not empty.
fn eligible(store: &CredentialStore, request: &AuthenticationRequest) -> Vec<CredentialRecord> {
    store
        .list_for_rp(request.rp_id())
        .into_iter()
        .filter(|r| request.allows(&r.credential_id))
        .collect()
}

fn verification_failed<V: Verifier + ?Sized>(verifier: &V, err: VerifyError) -> CeremonyError {
    match err {
        VerifyError::Cancelled => CeremonyError::Cancelled,
        VerifyError::Timeout => CeremonyError::Timeout,
        other => {
            let lockout_remaining_secs = match &other {
                VerifyError::LockedOut { remaining_secs } => *remaining_secs,
                _ => verifier.lockout_remaining_secs(),
            };
            CeremonyError::VerificationFailed {
                reason: other.to_string(),
                attempts_remaining: verifier.attempts_remaining(),
                lockout_remaining_secs,
            }
        }
    }
}
