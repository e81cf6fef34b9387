use std::io::{self, Write};

use camino::Utf8Path;
use tempfile::Builder;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Replaces `path` with `contents` through a temporary sibling file.
///
/// The temporary file is synced before it is renamed into place, so readers
/// see either the previous payload or the new one.
pub(super) fn atomic_write(path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
    let Some(directory) = path.parent() else {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("'{path}' has no parent directory"),
        ));
    };

    let mut builder = Builder::new();
    builder.prefix(path.file_name().unwrap_or("hearthd")).suffix(".tmp");
    #[cfg(unix)]
    builder.permissions(std::fs::Permissions::from_mode(0o600));

    let mut staged = builder.tempfile_in(directory.as_std_path())?;
    staged.write_all(contents)?;
    staged.as_file().sync_all()?;
    staged
        .persist(path.as_std_path())
        .map_err(|error| error.error)?;
    Ok(())
}
