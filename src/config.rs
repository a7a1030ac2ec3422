use std::path::PathBuf;

use crate::passcode::RuleKind;
use crate::request::UserVerificationRequirement;
use crate::store::VerificationMethod;

pub const DEFAULT_RP_ID: &str = "passrite.local";
pub const USER_HANDLE_LEN: usize = 16;
pub const CHALLENGE_LEN: usize = 32;
pub const CREDENTIAL_ID_LEN: usize = 32;
pub const CEREMONY_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_MIN_PASSCODE_LENGTH: usize = 6;
pub const DEFAULT_MAX_PASSCODE_LENGTH: usize = 8;
pub const DEFAULT_MAX_RETRY_COUNT: u32 = 5;
pub const DEFAULT_BASE_LOCKOUT_SECS: u64 = 30;
pub const MAX_LOCKOUT_SECS: u64 = 24 * 60 * 60;

#[derive(clap::Parser, Debug, Clone)]
#[command(name = "passrite", version, about)]
pub struct Config {
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    #[arg(long, default_value = DEFAULT_RP_ID, global = true)]
    pub rp_id: String,
    #[arg(long, default_value = "pinentry", global = true)]
    pub pinentry: String,
    /// Defaults to the XDG data directory.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
    /// Verification method for new ceremonies.
    #[arg(long, value_enum, default_value_t = VerificationMethod::Platform, global = true)]
    pub method: VerificationMethod,
    #[arg(long, default_value_t = DEFAULT_MAX_RETRY_COUNT, global = true)]
    pub max_retry_count: u32,
    #[arg(long, default_value_t = DEFAULT_BASE_LOCKOUT_SECS, global = true)]
    pub base_lockout_secs: u64,
    #[arg(long, default_value_t = DEFAULT_MIN_PASSCODE_LENGTH, global = true)]
    pub min_passcode_length: usize,
    #[arg(long, default_value_t = DEFAULT_MAX_PASSCODE_LENGTH, global = true)]
    pub max_passcode_length: usize,
    /// Passcode rules to switch off (all are on by default).
    #[arg(long = "disable-rule", value_enum, global = true)]
    pub disabled_rules: Vec<RuleKind>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Register a new credential for USER.
    Register {
        user: String,
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        resident_key: bool,
    },
    /// Authenticate with a registered credential.
    Authenticate {
        /// Leave the allow-list empty instead of listing registered credentials.
        #[arg(long)]
        any: bool,
        #[arg(long, value_enum, default_value_t = UserVerificationRequirement::Required)]
        user_verification: UserVerificationRequirement,
    },
    /// List registered credentials.
    List {
        #[arg(long, value_enum)]
        method: Option<VerificationMethod>,
    },
    /// Delete a credential by its base64url ID.
    Delete { credential_id: String },
    /// Delete every stored credential.
    Wipe,
    #[command(subcommand)]
    Passcode(PasscodeCommand),
    /// Check a candidate passcode against the active rules.
    CheckPasscode { candidate: String },
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum PasscodeCommand {
    Create,
    Change,
    Delete,
    /// Show lockout state.
    Status,
}
