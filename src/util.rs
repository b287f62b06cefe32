//! Shared filesystem helpers for owner-only local state.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Owner-only file mode for keys and credentials.
pub const PRIVATE_FILE_MODE: u32 = 0o600;

/// Owner-only directory mode for `~/.hush`.
pub const PRIVATE_DIR_MODE: u32 = 0o700;

/// `~/.hush`, or `None` when no home directory can be determined.
pub fn hush_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".hush"))
}

/// Create `dir` (and parents). A directory created here gets mode 0700;
/// an existing directory is left alone.
pub fn create_private_dir(dir: &Path) -> io::Result<()> {
    if dir.as_os_str().is_empty() || dir.exists() {
        return Ok(());
    }
    fs::create_dir_all(dir)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(PRIVATE_DIR_MODE))?;
    }

    Ok(())
}

/// `OpenOptions` for writing a file that only the owner can read.
pub fn private_file_options() -> fs::OpenOptions {
    let mut options = fs::OpenOptions::new();
    options.write(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(PRIVATE_FILE_MODE);
    }

    options
}

/// Replace `path` with `contents` via a temp file + rename, mode 0600.
pub fn write_private_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        create_private_dir(parent)?;
    }

    let tmp_path = temp_sibling(path);
    let mut file = private_file_options().create_new(true).open(&tmp_path)?;

    let written = file.write_all(contents).and_then(|_| file.sync_all());
    drop(file);

    let result = written.and_then(|_| fs::rename(&tmp_path, path));
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

/// `.<name>.<uuid>.tmp` next to `path`. Never collides with a user file.
fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
}

/// Log a warning when a sensitive file is readable by group or others.
#[cfg(unix)]
pub fn warn_if_not_private(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Ok(metadata) = fs::metadata(path) {
        let mode = metadata.permissions().mode() & 0o777;
        if mode & 0o077 != 0 {
            tracing::warn!(
                path = %path.display(),
                mode = format!("{:o}", mode),
                "File is accessible by other users; run `chmod 600` on it"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_private_file_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("creds.json");

        write_private_file(&path, b"first").unwrap();
        write_private_file(&path, b"second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("creds.json")]);
    }

    #[test]
    fn write_private_file_leaves_neighbouring_tmp_files_alone() {
        let dir = tempfile::tempdir().unwrap();
        let notes = dir.path().join("prod.tmp");
        fs::write(&notes, "user notes").unwrap();

        write_private_file(&dir.path().join("prod.env"), b"A=1\n").unwrap();

        assert_eq!(fs::read_to_string(&notes).unwrap(), "user notes");
        assert_eq!(
            fs::read_to_string(dir.path().join("prod.env")).unwrap(),
            "A=1\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn write_private_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.env");
        write_private_file(&path, b"A=1\n").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, PRIVATE_FILE_MODE);
    }

    #[cfg(unix)]
    #[test]
    fn create_private_dir_leaves_existing_dirs_alone() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o755)).unwrap();
        create_private_dir(dir.path()).unwrap();

        let mode = fs::metadata(dir.path()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o755);
    }
}
