//! Owner-only filesystem helpers.

use std::io;
use std::path::Path;

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
pub(crate) fn set_file_permissions_0600(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// Create a directory (and parents) with 0700 permissions on Unix.
pub(crate) fn create_private_dir(path: &Path) -> io::Result<()> {
    std::fs::create_dir_all(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

/// Write `contents` to `path` so that readers see either the old file or the
/// complete new one: write a sibling temp file, fsync, then rename over.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    use std::io::Write;

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = Path::new(&tmp_name);

    {
        let mut file = std::fs::File::create(tmp)?;
        set_file_permissions_0600(tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    std::fs::rename(tmp, path)?;

    #[cfg(unix)]
    if let Some(parent) = path.parent() {
        // Persist the rename itself
        std::fs::File::open(parent)?.sync_all()?;
    }
    Ok(())
}
