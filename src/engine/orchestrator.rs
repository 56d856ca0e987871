//! Ties every component together into the one verification attempt the
//! host drives per login (§4.9), mirroring the open/verify/commit sequence
//! of the source module's `google_authenticator()` driver and the
//! bootstrap ordering the teacher uses in `main.rs`.

use nix::unistd::Uid;

use crate::engine::error::{PamTotpError, Result};
use crate::engine::options::ModuleOptions;
use crate::engine::privilege::PrivilegeGuard;
use crate::engine::secret::Secret;
use crate::engine::skew::SkewUpdate;
use crate::engine::state::{io, record::StateRecord};
use crate::engine::{path, rate_limiter, replay, scratch, skew, totp};

/// Identity details the host resolved before calling in — username/uid/home
/// directory lookup is the host's job, not this engine's (see SPEC_FULL.md
/// §6 on the host/engine split).
#[derive(Debug, Clone)]
pub struct HostIdentity {
    pub username: String,
    pub uid: u32,
    pub home_dir: String,
}

/// The host's side of the conversation: ask the user for a code and get
/// back whatever they typed, or `None` if the host couldn't prompt at all.
pub trait Conversation {
    fn prompt_for_code(&mut self) -> Option<String>;
}

fn read_code(conversation: &mut dyn Conversation) -> Result<u32> {
    let response = conversation.prompt_for_code().ok_or(PamTotpError::NoCode)?;
    if response.is_empty() {
        return Err(PamTotpError::NoCode);
    }
    if !response.chars().all(|c| c.is_ascii_digit()) {
        return Err(PamTotpError::NonNumericCode);
    }
    response.parse::<u32>().map_err(|_| PamTotpError::CodeOutOfRange)
}

/// The scratch/time-based decision tree, run once the file is open and the
/// secret decoded. Returns early (via `?`) the moment an earlier stage in
/// the source module's `&&` chain would have, but every stage that ran
/// still leaves its mark on `record` for the caller to persist.
fn verify_once(
    record: &mut StateRecord,
    secret: &Secret,
    conversation: &mut dyn Conversation,
    now_secs: u64,
    no_skew_adj: bool,
) -> Result<()> {
    rate_limiter::enforce(record, now_secs)?;

    let code = read_code(conversation)?;

    if scratch::try_consume(record, code) {
        return Ok(());
    }

    if !record.has("TOTP_AUTH") {
        return Err(PamTotpError::NotTotpAccount);
    }

    let tm_now = (now_secs / 30) as i64;
    match totp::verify(secret, record, code, tm_now, no_skew_adj)? {
        totp::Match::Found { tm } => {
            let window = totp::window_size(record)?;
            replay::enforce(record, tm, window)?;
            Ok(())
        }
        totp::Match::NotFound { skew_probe: Some(candidate) } => match skew::reconcile(record, tm_now, candidate)? {
            SkewUpdate::Established(_) => Ok(()),
            SkewUpdate::StillAccumulating | SkewUpdate::NoChange => Err(PamTotpError::NoWindowMatch),
        },
        totp::Match::NotFound { skew_probe: None } => Err(PamTotpError::NoWindowMatch),
    }
}

/// Run one full authentication attempt: locate and open the state file
/// under the target user's identity, verify the submitted code, and
/// persist any ledger changes — win or lose — before returning the
/// verdict.
pub fn authenticate(
    identity: &HostIdentity,
    options: &ModuleOptions,
    conversation: &mut dyn Conversation,
    now_secs: u64,
) -> Result<()> {
    let secret_path = path::expand(options.path_spec(), &identity.home_dir, &identity.username);
    let path = std::path::Path::new(&secret_path);

    let _privilege = PrivilegeGuard::drop_to(Uid::from_raw(identity.uid))?;

    let (text, guard) = io::open_and_read(path, identity.uid)?;
    let mut record = StateRecord::parse(&text);
    let before = record.clone();

    let secret = Secret::decode(&record.secret_line)?;

    let outcome = verify_once(&mut record, &secret, conversation, now_secs, options.no_skew_adj);

    if record != before {
        io::commit(path, guard, &record.serialize())?;
    }

    outcome
}
