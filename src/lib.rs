//! Time-based (and scratch-code) two-factor verification engine, modeled
//! on the Google Authenticator PAM module's on-disk state format and
//! verification algorithm.
//!
//! The crate is host-agnostic: nothing here knows about PAM, sshd, or any
//! other caller. A host resolves a [`HostIdentity`], supplies a
//! [`Conversation`] implementation to prompt the user, and calls
//! [`authenticate`]. See `SPEC_FULL.md` §6 for the full external-interface
//! contract.

pub mod engine;

pub use engine::error::{ErrorKind, PamTotpError};
pub use engine::options::ModuleOptions;
pub use engine::orchestrator::{Conversation, HostIdentity};

use tracing::{info, warn};

/// Outcome of one verification attempt, stripped of the internal error
/// detail a host has no use for beyond logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Granted,
    Denied { kind: ErrorKind },
}

fn run(identity: &HostIdentity, options: &ModuleOptions, conversation: &mut dyn Conversation, now_secs: u64) -> Verdict {
    match engine::orchestrator::authenticate(identity, options, conversation, now_secs) {
        Ok(()) => {
            info!(user = %identity.username, "verification code accepted");
            Verdict::Granted
        }
        Err(e) => {
            warn!(user = %identity.username, kind = %e.kind(), error = %e, "verification attempt denied");
            Verdict::Denied { kind: e.kind() }
        }
    }
}

/// Authenticate a login attempt. Corresponds to `pam_sm_authenticate`.
pub fn authenticate(identity: &HostIdentity, options: &ModuleOptions, conversation: &mut dyn Conversation, now_secs: u64) -> Verdict {
    run(identity, options, conversation, now_secs)
}

/// Corresponds to `pam_sm_open_session`, which the source module treats
/// identically to `pam_sm_authenticate`.
pub fn open_session(identity: &HostIdentity, options: &ModuleOptions, conversation: &mut dyn Conversation, now_secs: u64) -> Verdict {
    run(identity, options, conversation, now_secs)
}

/// Corresponds to `pam_sm_setcred`: this module has no credentials to
/// establish, so it always succeeds.
pub fn set_credentials() -> Verdict {
    Verdict::Granted
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoResponse;
    impl Conversation for NoResponse {
        fn prompt_for_code(&mut self) -> Option<String> {
            None
        }
    }

    #[test]
    fn set_credentials_always_succeeds() {
        assert_eq!(set_credentials(), Verdict::Granted);
    }

    #[test]
    fn missing_state_file_is_denied_not_a_panic() {
        let identity = HostIdentity {
            username: "nobody".into(),
            uid: nix::unistd::getuid().as_raw(),
            home_dir: "/nonexistent-for-test".into(),
        };
        let options = ModuleOptions::default();
        let verdict = authenticate(&identity, &options, &mut NoResponse, 0);
        assert!(matches!(verdict, Verdict::Denied { .. }));
    }
}
