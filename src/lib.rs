pub mod ceremony;
pub mod codec;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod passcode;
pub mod request;
pub mod store;
pub mod verify;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;

pub use ceremony::{CeremonyClient, CeremonyError, CeremonyHandle, CeremonyOutcome, CeremonyState};
pub use error::{Error, Result};

use config::{Command, Config, PasscodeCommand};
use passcode::{PasscodeAuthenticator, PasscodePolicy, PasscodeRuleEngine, ValidationResult};
use request::{AuthenticationParams, RegistrationParams};
use store::{CredentialStore, SharedStore, VerificationMethod};
use verify::{LockoutPolicy, PinentryVerifier, ask_passcode};

const CREDENTIALS_DIR: &str = "credentials";
const STORE_KEY_FILE: &str = "store.key";
const PASSCODE_FILE: &str = "passcode.bin";

/// Open (creating if needed) the encrypted credential store under `data_dir`.
pub fn open_store(data_dir: &Path) -> Result<CredentialStore> {
    let creds_dir = data_dir.join(CREDENTIALS_DIR);
    std::fs::create_dir_all(&creds_dir)?;
    let key = store::load_or_create_key(&data_dir.join(STORE_KEY_FILE))?;
    Ok(CredentialStore::load(key, creds_dir)?)
}

pub fn rule_engine(cfg: &Config) -> Result<PasscodeRuleEngine> {
    let mut policy = PasscodePolicy {
        min_length: cfg.min_passcode_length,
        max_length: cfg.max_passcode_length,
        ..PasscodePolicy::default()
    };
    for kind in &cfg.disabled_rules {
        policy.active.remove(kind);
    }
    Ok(PasscodeRuleEngine::new(policy)?)
}

pub fn open_passcode(cfg: &Config, data_dir: &Path) -> Result<PasscodeAuthenticator> {
    let policy = LockoutPolicy {
        max_retry_count: cfg.max_retry_count,
        base_lockout_secs: cfg.base_lockout_secs,
    };
    Ok(PasscodeAuthenticator::load(
        &data_dir.join(PASSCODE_FILE),
        rule_engine(cfg)?,
        policy,
    )?)
}

fn resolve_data_dir(cfg: &Config) -> anyhow::Result<PathBuf> {
    let dir = match &cfg.data_dir {
        Some(dir) => dir.clone(),
        None => directories::ProjectDirs::from("", "", "passrite")
            .ok_or_else(|| anyhow::anyhow!("cannot determine XDG data dir"))?
            .data_dir()
            .to_path_buf(),
    };
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

pub async fn run(cfg: Config) -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;
    let level = match cfg.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(std::io::stderr)
        .init();

    let data_dir = resolve_data_dir(&cfg)?;

    // Preflight checks
    diagnostics::check(&cfg, &data_dir)?;

    // Single-instance lock
    let lock_dir = std::env::var("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| data_dir.clone());
    let lock_path = lock_dir.join("passrite.lock");
    let lock_file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)?;
    let mut lock = fd_lock::RwLock::new(lock_file);
    let _guard = lock
        .try_write()
        .map_err(|_| anyhow::anyhow!("passrite is already running (lock: {})", lock_path.display()))?;

    let store = open_store(&data_dir)
        .context("Failed to load credential store")?
        .into_shared();
    tracing::info!(
        count = store.read().map(|s| s.credential_count()).unwrap_or_default(),
        "Credential store loaded"
    );

    match cfg.command.clone() {
        Command::Register { user, display_name, resident_key } => {
            let client = ceremony_client(&cfg, &data_dir, store)?;
            let mut params = RegistrationParams::new(user, codec::random_bytes(config::CHALLENGE_LEN)?)
                .rp_id(cfg.rp_id.clone());
            params.user_display_name = display_name;
            params.resident_key_required = resident_key;
            let outcome = client.register(params).await?;
            println!("Registered:\n{}", outcome.record().summary());
        }
        Command::Authenticate { any, user_verification } => {
            let client = ceremony_client(&cfg, &data_dir, store)?;
            let mut params = AuthenticationParams::new(codec::random_bytes(config::CHALLENGE_LEN)?)
                .rp_id(cfg.rp_id.clone());
            params.user_verification = user_verification;
            params.restrict_to_registered = !any;
            match client.authenticate(params).await {
                Ok(outcome) => println!("Authenticated:\n{}", outcome.record().summary()),
                Err(e) if e.is_no_credentials() => {
                    println!("No registered credentials. Run `passrite register <user>` first.");
                }
                Err(e) => {
                    if let Some(secs) = e.lockout_remaining_secs() {
                        println!("Locked out. Try again in {secs}s.");
                    }
                    return Err(e.into());
                }
            }
        }
        Command::List { method } => {
            let records = store
                .read()
                .map_err(|_| anyhow::anyhow!("store lock poisoned"))?
                .list(method);
            if records.is_empty() {
                println!("No registered credentials.");
            }
            for record in records {
                println!("{}\n", record.summary());
            }
        }
        Command::Delete { credential_id } => {
            let id = codec::decode(&credential_id).context("invalid credential id")?;
            store
                .write()
                .map_err(|_| anyhow::anyhow!("store lock poisoned"))?
                .delete(&id)?;
            println!("Deleted {credential_id}");
        }
        Command::Wipe => {
            let count = store
                .write()
                .map_err(|_| anyhow::anyhow!("store lock poisoned"))?
                .wipe()?;
            println!("Deleted {count} credential(s) from {}", data_dir.join(CREDENTIALS_DIR).display());
        }
        Command::Passcode(cmd) => passcode_command(&cfg, &data_dir, cmd).await?,
        Command::CheckPasscode { candidate } => match rule_engine(&cfg)?.evaluate(&candidate) {
            ValidationResult::Pass => println!("Passcode accepted"),
            ValidationResult::Fail { rule, reason } => println!("Rejected by {rule} rule: {reason}"),
        },
    }
    Ok(())
}

fn ceremony_client(
    cfg: &Config,
    data_dir: &Path,
    store: SharedStore,
) -> anyhow::Result<CeremonyClient<PinentryVerifier>> {
    let verifier = match cfg.method {
        VerificationMethod::Passcode => {
            let auth = open_passcode(cfg, data_dir)?;
            if !auth.has_passcode() {
                anyhow::bail!("no passcode set; run `passrite passcode create` first");
            }
            PinentryVerifier::passcode(
                cfg.pinentry.clone(),
                Arc::new(Mutex::new(auth)),
                Some(data_dir.join(PASSCODE_FILE)),
            )
        }
        other => PinentryVerifier::confirmation(cfg.pinentry.clone(), other),
    };
    Ok(CeremonyClient::new(Arc::new(verifier), store))
}

async fn passcode_command(cfg: &Config, data_dir: &Path, cmd: PasscodeCommand) -> anyhow::Result<()> {
    let path = data_dir.join(PASSCODE_FILE);
    let mut auth = open_passcode(cfg, data_dir)?;
    let now = store::credential::unix_now();
    match cmd {
        PasscodeCommand::Create => {
            let chosen = ask_passcode(&cfg.pinentry, "Choose a new passcode", true).await?;
            auth.create_passcode(&chosen)?;
            println!("Passcode created");
        }
        PasscodeCommand::Change => {
            let current = ask_passcode(&cfg.pinentry, "Enter your current passcode", false).await?;
            let chosen = ask_passcode(&cfg.pinentry, "Choose a new passcode", true).await?;
            let result = auth.change_passcode(&current, &chosen, now);
            auth.save(&path)?;
            result?;
            println!("Passcode changed");
        }
        PasscodeCommand::Delete => {
            let current = ask_passcode(&cfg.pinentry, "Enter your current passcode", false).await?;
            let result = auth.delete_passcode(&current, now);
            auth.save(&path)?;
            result?;
            println!("Passcode deleted");
        }
        PasscodeCommand::Status => {
            println!("Passcode set: {}", auth.has_passcode());
            println!("Attempts remaining: {}", auth.lockout().attempts_remaining());
            println!("Lockout remaining: {}s", auth.lockout().remaining_secs(now));
            let active: Vec<String> = auth.engine().policy().active.iter().map(|k| k.to_string()).collect();
            println!("Active rules: {}", active.join(", "));
        }
    }
    auth.save(&path)?;
    Ok(())
}
