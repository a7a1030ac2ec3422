use std::path::Path;

use crate::config::{Command, Config, PasscodeCommand};
use crate::store::VerificationMethod;

fn needs_pinentry(cfg: &Config) -> bool {
    match &cfg.command {
        Command::Register { .. } | Command::Authenticate { .. } => true,
        Command::Passcode(cmd) => !matches!(cmd, PasscodeCommand::Status),
        Command::List { .. } | Command::Delete { .. } | Command::Wipe | Command::CheckPasscode { .. } => false,
    }
}

fn passcode_bounds_error(min: usize, max: usize) -> Option<String> {
    if min >= 1 && min <= max {
        return None;
    }
    Some(format!(
        "invalid passcode length bounds: min {min}, max {max}\n  \
         → pass --min-passcode-length <= --max-passcode-length (min >= 1)"
    ))
}

pub fn check(cfg: &Config, data_dir: &Path) -> anyhow::Result<()> {
    let mut errors: Vec<String> = Vec::new();

    // Check 1: relying party id
    if cfg.rp_id.trim().is_empty() {
        errors.push("--rp-id must not be empty".to_string());
    }

    // Check 2: passcode length bounds
    if let Some(err) = passcode_bounds_error(cfg.min_passcode_length, cfg.max_passcode_length) {
        errors.push(err);
    }

    // Check 3: data dir writable
    let probe = data_dir.join(".probe");
    match std::fs::write(&probe, b"") {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
        }
        Err(e) => errors.push(format!(
            "cannot write to data dir {}: {e}\n  \
             → pass --data-dir pointing at a writable directory",
            data_dir.display()
        )),
    }

    // Check 4: pinentry binary found
    if needs_pinentry(cfg) {
        if let Err(e) = std::process::Command::new(&cfg.pinentry).arg("--version").output() {
            errors.push(format!(
                "pinentry binary not found: '{}': {e}\n  \
                 → install pinentry or pass --pinentry <path>",
                cfg.pinentry
            ));
        }
    }

    // Check 5: unsupported verification methods
    if cfg.method == VerificationMethod::Biometric {
        tracing::warn!("No biometric verifier on this platform, falling back to a confirmation dialog");
    }

    if errors.is_empty() {
        return Ok(());
    }

    for err in &errors {
        eprintln!("ERROR: {err}");
    }
    anyhow::bail!("{} preflight check(s) failed", errors.len());
}
