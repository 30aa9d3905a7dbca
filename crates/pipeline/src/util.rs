use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Rename a corrupted document to `<name>.old` so the original bytes
/// survive reinitialization. An existing backup is overwritten; losing an
/// older backup is preferable to losing the current bytes.
pub fn backup_file_to_old(path: &Path) -> std::io::Result<PathBuf> {
    let mut backup_name = path.as_os_str().to_os_string();
    backup_name.push(".old");
    let backup_path = PathBuf::from(backup_name);
    if path.exists() {
        std::fs::rename(path, &backup_path)?;
        debug!("backed up corrupted document to {}", backup_path.display());
    }
    Ok(backup_path)
}

/// Write a JSON document wholesale. Documents are small; a full rewrite on
/// every mutation is the persistence model.
pub fn write_json_document(path: &Path, document: &serde_json::Value) -> Result<()> {
    let text = serde_json::to_string_pretty(document)?;
    std::fs::write(path, text)
        .with_context(|| format!("failed to write document {}", path.display()))?;
    Ok(())
}

/// Move a produced artifact into its family folder, keeping the file name.
/// Falls back to copy-and-remove when rename crosses filesystems.
pub fn move_into_folder(artifact: &Path, folder: &Path) -> Result<PathBuf> {
    let file_name = artifact
        .file_name()
        .with_context(|| format!("artifact has no file name: {}", artifact.display()))?;
    let target = folder.join(file_name);
    if target == artifact {
        return Ok(target);
    }
    if std::fs::rename(artifact, &target).is_err() {
        std::fs::copy(artifact, &target)
            .with_context(|| format!("failed to move artifact to {}", target.display()))?;
        std::fs::remove_file(artifact).ok();
    }
    Ok(target)
}
