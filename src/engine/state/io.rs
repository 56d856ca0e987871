//! State file open/read/commit (§4.2), grounded on the bearer-token
//! read/reconcile/atomic-rewrite flow the teacher uses for its own
//! credential file (`auth::atomic_write_token_file`).
//!
//! A secret file must be a regular file owned by the expected uid, mode
//! exactly `0400`, and between 1 byte and 64KiB. Commits are optimistic:
//! the original size/mtime are captured at open time and re-checked right
//! before the rename so a concurrent session can't clobber a scratch-code
//! consumption.

use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::fs::{MetadataExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use crate::engine::error::{PamTotpError, Result};

const MIN_SIZE: u64 = 1;
const MAX_SIZE: u64 = 64 * 1024;
const REQUIRED_MODE: u32 = 0o400;
const MODE_MASK: u32 = 0o3577;

/// Size/mtime captured when the file was opened, used to detect a
/// concurrent writer before committing.
#[derive(Debug, Clone, Copy)]
pub struct OpenGuard {
    size: u64,
    mtime: i64,
}

/// Open the state file, validate its ownership and permissions, and read
/// its full contents as text.
pub fn open_and_read(path: &Path, expected_uid: u32) -> Result<(String, OpenGuard)> {
    let file = OpenOptions::new()
        .read(true)
        .custom_flags(nix::libc::O_NOFOLLOW)
        .open(path)
        .map_err(PamTotpError::StateFileUnreadable)?;
    let meta = file.metadata().map_err(PamTotpError::StateFileUnreadable)?;

    if !meta.is_file() || meta.uid() != expected_uid || meta.permissions().mode() & MODE_MASK != REQUIRED_MODE {
        return Err(PamTotpError::WrongOwnerOrMode);
    }

    let size = meta.len();
    if size < MIN_SIZE || size > MAX_SIZE {
        return Err(PamTotpError::SizeOutOfBounds);
    }

    let mut raw = Vec::with_capacity(size as usize);
    (&file).take(size).read_to_end(&mut raw).map_err(PamTotpError::Io)?;

    if raw.contains(&0u8) {
        return Err(PamTotpError::ContainsNul);
    }
    let text = String::from_utf8(raw).map_err(|_| PamTotpError::ContainsNul)?;

    Ok((text, OpenGuard { size, mtime: meta.mtime() }))
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push("~");
    PathBuf::from(name)
}

/// Atomically replace the state file with `contents`, refusing if the file
/// has changed since `guard` was captured.
pub fn commit(path: &Path, guard: OpenGuard, contents: &str) -> Result<()> {
    let tmp_path = tmp_path_for(path);

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(REQUIRED_MODE)
        .custom_flags(nix::libc::O_NOFOLLOW)
        .open(&tmp_path)
        .map_err(PamTotpError::Io)?;

    let current = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) => {
            let _ = fs::remove_file(&tmp_path);
            return Err(PamTotpError::Io(e));
        }
    };
    if current.len() != guard.size || current.mtime() != guard.mtime {
        let _ = fs::remove_file(&tmp_path);
        return Err(PamTotpError::CommitRaceLost);
    }

    if let Err(e) = file.write_all(contents.as_bytes()) {
        drop(file);
        let _ = fs::remove_file(&tmp_path);
        return Err(PamTotpError::Io(e));
    }
    drop(file);

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(PamTotpError::Io(e));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt as _;

    #[test]
    fn rejects_wrong_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret");
        fs::write(&path, "JBSWY3DPEHPK3PXP\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o440)).unwrap();
        let err = open_and_read(&path, nix::unistd::getuid().as_raw()).unwrap_err();
        assert!(matches!(err, PamTotpError::WrongOwnerOrMode));
    }

    #[test]
    fn reads_contents_and_commits_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret");
        fs::write(&path, "JBSWY3DPEHPK3PXP\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o400)).unwrap();

        let (text, guard) = open_and_read(&path, nix::unistd::getuid().as_raw()).unwrap();
        assert_eq!(text, "JBSWY3DPEHPK3PXP\n");

        commit(&path, guard, "JBSWY3DPEHPK3PXP\n\" TOTP_AUTH\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "JBSWY3DPEHPK3PXP\n\" TOTP_AUTH\n");
        assert!(!tmp_path_for(&path).exists());
    }

    #[test]
    fn commit_fails_if_file_changed_since_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret");
        fs::write(&path, "JBSWY3DPEHPK3PXP\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o400)).unwrap();

        let (_text, guard) = open_and_read(&path, nix::unistd::getuid().as_raw()).unwrap();
        // Someone else rewrites the file in the meantime.
        std::thread::sleep(std::time::Duration::from_millis(1100));
        fs::write(&path, "JBSWY3DPEHPK3PXPXX\n").unwrap();

        let err = commit(&path, guard, "malicious\n").unwrap_err();
        assert!(matches!(err, PamTotpError::CommitRaceLost));
        assert!(!tmp_path_for(&path).exists());
    }

    #[test]
    fn rejects_embedded_nul() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret");
        fs::write(&path, b"AB\0CD\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o400)).unwrap();
        let err = open_and_read(&path, nix::unistd::getuid().as_raw()).unwrap_err();
        assert!(matches!(err, PamTotpError::ContainsNul));
    }
}
