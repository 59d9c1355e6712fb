use thiserror::Error;

/// One variant per fatal pipeline stage. The driver renders the variant and
/// exits with status 1; only notification failures stay out of this enum
/// (the notifier reports a plain `bool`).
#[derive(Debug, Error)]
pub enum StageError {
    #[error("drive authentication failed: {0:#}")]
    Auth(anyhow::Error),

    #[error("drive search failed: {0:#}")]
    Search(anyhow::Error),

    #[error("no remote file matching {0:?} in the search window")]
    NotFound(String),

    #[error("download failed: {0:#}")]
    Download(anyhow::Error),

    #[error("spreadsheet conversion failed: {0:#}")]
    Convert(anyhow::Error),

    #[error("bucket upload failed: {0:#}")]
    Upload(anyhow::Error),
}
