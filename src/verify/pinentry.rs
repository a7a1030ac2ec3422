use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use secrecy::ExposeSecret;
use zeroize::Zeroize;

use super::prompt::{VerifyPrompt, authentication_prompt, registration_prompt};
use super::{Assertion, Attestation, Verifier, VerifyError};
use crate::codec;
use crate::config::{CEREMONY_TIMEOUT_SECS, CREDENTIAL_ID_LEN};
use crate::passcode::PasscodeAuthenticator;
use crate::request::{AuthenticationRequest, RegistrationRequest};
use crate::store::credential::unix_now;
use crate::store::{CredentialRecord, VerificationMethod};

/// Verifier backed by a `pinentry` dialog: a confirmation for the platform
/// method, passcode entry checked against a [`PasscodeAuthenticator`] for
/// the passcode method.
pub struct PinentryVerifier {
    pinentry_bin:  String,
    method:        VerificationMethod,
    passcode:      Option<Arc<Mutex<PasscodeAuthenticator>>>,
    passcode_path: Option<PathBuf>,
    timeout:       Duration,
}

impl PinentryVerifier {
    pub fn platform(pinentry_bin: impl Into<String>) -> Self {
        Self::confirmation(pinentry_bin, VerificationMethod::Platform)
    }

    /// A plain OK/Deny dialog, recorded as `method` on new credentials.
    /// Passcode falls back to platform since it needs an authenticator.
    pub fn confirmation(pinentry_bin: impl Into<String>, method: VerificationMethod) -> Self {
        let method = match method {
            VerificationMethod::Passcode => VerificationMethod::Platform,
            other => other,
        };
        Self {
            pinentry_bin: pinentry_bin.into(),
            method,
            passcode: None,
            passcode_path: None,
            timeout: Duration::from_secs(CEREMONY_TIMEOUT_SECS),
        }
    }

    /// Passcode verification. When `persist_to` is set the authenticator's
    /// lockout state is saved there after every attempt.
    pub fn passcode(
        pinentry_bin: impl Into<String>,
        authenticator: Arc<Mutex<PasscodeAuthenticator>>,
        persist_to: Option<PathBuf>,
    ) -> Self {
        Self {
            method: VerificationMethod::Passcode,
            passcode: Some(authenticator),
            passcode_path: persist_to,
            ..Self::platform(pinentry_bin)
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn method(&self) -> VerificationMethod {
        self.method
    }

    async fn run_dialog<T, F>(&self, dialog: F) -> Result<T, VerifyError>
    where
        T: Send + 'static,
        F: FnOnce(&str) -> Result<T, VerifyError> + Send + 'static,
    {
        run_dialog(&self.pinentry_bin, self.timeout, dialog).await
    }

    async fn confirm(&self, prompt: VerifyPrompt) -> Result<(), VerifyError> {
        let confirmed = self
            .run_dialog(move |bin| {
                let mut dialog = ::pinentry::ConfirmationDialog::with_binary(bin)
                    .ok_or_else(|| VerifyError::Unavailable(format!("pinentry binary not found: {bin}")))?;
                dialog
                    .with_ok("Confirm")
                    .with_cancel("Deny")
                    .confirm(&format!("{}\n\n{}", prompt.title, prompt.description))
                    .map_err(dialog_error)
            })
            .await?;
        if confirmed {
            Ok(())
        } else {
            Err(VerifyError::Denied("user declined".into()))
        }
    }

    async fn enter_passcode(&self, prompt: VerifyPrompt) -> Result<String, VerifyError> {
        self.run_dialog(move |bin| passcode_dialog(bin, &prompt, None)).await
    }

    fn authenticator(&self) -> Result<&Arc<Mutex<PasscodeAuthenticator>>, VerifyError> {
        self.passcode
            .as_ref()
            .ok_or_else(|| VerifyError::Unavailable("no passcode authenticator configured".into()))
    }

    async fn verify_user(&self, prompt: VerifyPrompt) -> Result<(), VerifyError> {
        if self.method != VerificationMethod::Passcode {
            return self.confirm(prompt).await;
        }

        let auth = self.authenticator()?;
        let remaining = self.lockout_remaining_secs();
        if remaining > 0 {
            return Err(VerifyError::LockedOut { remaining_secs: remaining });
        }

        let mut candidate = self.enter_passcode(prompt).await?;
        let result = {
            let mut guard = auth.lock().unwrap_or_else(PoisonError::into_inner);
            let result = guard.verify(&candidate, unix_now());
            if let Some(path) = &self.passcode_path {
                if let Err(e) = guard.save(path) {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to persist passcode state");
                }
            }
            result
        };
        candidate.zeroize();
        result.map_err(VerifyError::from)
    }
}

async fn run_dialog<T, F>(pinentry_bin: &str, timeout: Duration, dialog: F) -> Result<T, VerifyError>
where
    T: Send + 'static,
    F: FnOnce(&str) -> Result<T, VerifyError> + Send + 'static,
{
    let bin = pinentry_bin.to_string();
    let join = tokio::task::spawn_blocking(move || dialog(&bin));
    match tokio::time::timeout(timeout, join).await {
        Err(_) => Err(VerifyError::Timeout),
        Ok(Err(e)) => Err(VerifyError::Unavailable(e.to_string())),
        Ok(Ok(result)) => result,
    }
}

fn passcode_dialog(
    bin: &str,
    prompt: &VerifyPrompt,
    confirmation: Option<&str>,
) -> Result<String, VerifyError> {
    let mut input = ::pinentry::PassphraseInput::with_binary(bin)
        .ok_or_else(|| VerifyError::Unavailable(format!("pinentry binary not found: {bin}")))?;
    input
        .with_title(&prompt.title)
        .with_description(&prompt.description)
        .with_prompt("Passcode:")
        .with_ok("OK")
        .with_cancel("Cancel");
    if let Some(confirm_prompt) = confirmation {
        input.with_confirmation(confirm_prompt, "Passcodes do not match");
    }
    input
        .interact()
        .map(|secret| secret.expose_secret().to_string())
        .map_err(dialog_error)
}

/// Only a user cancel counts as `Cancelled`; transport failures surface as
/// `Unavailable`.
fn dialog_error(err: ::pinentry::Error) -> VerifyError {
    match err {
        ::pinentry::Error::Cancelled => VerifyError::Cancelled,
        ::pinentry::Error::Timeout => VerifyError::Timeout,
        other => VerifyError::Unavailable(other.to_string()),
    }
}

/// Ask for a passcode outside any ceremony (passcode management). With
/// `confirm` the user types it twice.
pub async fn ask_passcode(
    pinentry_bin: &str,
    description: &str,
    confirm: bool,
) -> Result<String, VerifyError> {
    let prompt = VerifyPrompt {
        title: "passrite".to_string(),
        description: description.to_string(),
    };
    run_dialog(
        pinentry_bin,
        Duration::from_secs(CEREMONY_TIMEOUT_SECS),
        move |bin| passcode_dialog(bin, &prompt, confirm.then_some("Repeat passcode:")),
    )
    .await
}

#[async_trait::async_trait]
impl Verifier for PinentryVerifier {
    async fn register(&self, request: &RegistrationRequest) -> Result<Attestation, VerifyError> {
        let prompt = registration_prompt(
            &request.rp().id,
            &request.rp().name,
            &request.user().display_name,
            self.method,
        );
        self.verify_user(prompt).await?;
        tracing::info!(method = %self.method, "User verification confirmed");

        let credential_id = codec::random_bytes(CREDENTIAL_ID_LEN)
            .map_err(|e| VerifyError::Unavailable(e.to_string()))?;
        Ok(Attestation {
            credential_id,
            verification_method: self.method,
        })
    }

    async fn authenticate(
        &self,
        request: &AuthenticationRequest,
        candidates: &[CredentialRecord],
    ) -> Result<Assertion, VerifyError> {
        let mut allowed = candidates.iter().filter(|c| request.allows(&c.credential_id));
        let chosen = allowed
            .clone()
            .find(|c| c.verification_method == self.method)
            .or_else(|| allowed.next())
            .ok_or(VerifyError::NoEligibleCredential)?;

        let prompt = authentication_prompt(
            request.rp_id(),
            Some(chosen.user_display_name.as_str()),
            self.method,
        );
        self.verify_user(prompt).await?;
        tracing::info!(method = %self.method, "User verification confirmed");

        Ok(Assertion {
            credential_id: chosen.credential_id.clone(),
        })
    }

    fn lockout_remaining_secs(&self) -> u64 {
        self.passcode.as_ref().map_or(0, |auth| {
            auth.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .lockout()
                .remaining_secs(unix_now())
        })
    }

    fn attempts_remaining(&self) -> Option<u32> {
        self.passcode.as_ref().map(|auth| {
            auth.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .lockout()
                .attempts_remaining()
        })
    }
}
