use anyhow::Result;
use std::fs;
use std::path::Path;
use tracing::info;

/// Delete the converted JSON and the downloaded spreadsheet. Errors, a
/// missing file included, propagate to the caller.
pub fn remove_artifacts(json: &Path, xlsx: &Path) -> Result<()> {
    fs::remove_file(json)?;
    fs::remove_file(xlsx)?;
    info!(json = %json.display(), xlsx = %xlsx.display(), "deleted local artifacts");
    Ok(())
}
