//! Scoped effective-uid drop, so the state file is read and written as its
//! owner even when the host process is still running as root (needed for
//! NFS-mounted home directories, same as the source module's `setuser`).

use nix::unistd::{geteuid, seteuid, Uid};

use crate::engine::error::{PamTotpError, Result};

/// Drops the effective uid to `target` for as long as the guard is alive,
/// restoring the previous uid on drop. Restoration failure is fatal — we'd
/// rather abort than keep running as the wrong user — so `Drop` panics in
/// that case, same as leaving the process in an unknown privilege state.
pub struct PrivilegeGuard {
    restore_to: Uid,
}

impl PrivilegeGuard {
    pub fn drop_to(target: Uid) -> Result<Self> {
        let restore_to = geteuid();
        if restore_to != target {
            seteuid(target).map_err(|e| PamTotpError::Privilege(e.to_string()))?;
        }
        Ok(PrivilegeGuard { restore_to })
    }
}

impl Drop for PrivilegeGuard {
    fn drop(&mut self) {
        if geteuid() != self.restore_to {
            seteuid(self.restore_to).expect("failed to restore effective uid after state file access");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_to_current_uid_is_a_noop() {
        let current = geteuid();
        let guard = PrivilegeGuard::drop_to(current).unwrap();
        assert_eq!(geteuid(), current);
        drop(guard);
        assert_eq!(geteuid(), current);
    }
}
