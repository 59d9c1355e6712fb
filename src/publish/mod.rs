use anyhow::{Context, Result};
use google_cloud_storage::client::google_cloud_auth::credentials::CredentialsFile;
use google_cloud_storage::client::{Client, ClientConfig};
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use std::path::Path;
use tracing::info;

use crate::config::Config;
use crate::error::StageError;

/// Upload the converted file to the configured bucket under its own
/// filename. Re-running with the same name overwrites the object.
pub async fn upload(cfg: &Config, local: &Path) -> Result<(), StageError> {
    upload_inner(cfg, local).await.map_err(StageError::Upload)
}

async fn upload_inner(cfg: &Config, local: &Path) -> Result<()> {
    let object_name = object_key(local)?;

    let credentials =
        CredentialsFile::new_from_file(cfg.credentials_path.to_string_lossy().into_owned())
            .await
            .with_context(|| {
                format!(
                    "loading service account key {}",
                    cfg.credentials_path.display()
                )
            })?;
    let config = ClientConfig::default()
        .with_credentials(credentials)
        .await
        .context("authenticating to cloud storage")?;
    let client = Client::new(config);

    let bytes = tokio::fs::read(local)
        .await
        .with_context(|| format!("reading {}", local.display()))?;
    let size = bytes.len();

    let request = UploadObjectRequest {
        bucket: cfg.bucket.clone(),
        ..Default::default()
    };
    client
        .upload_object(
            &request,
            bytes,
            &UploadType::Simple(Media::new(object_name.clone())),
        )
        .await
        .with_context(|| format!("uploading {object_name}"))?;

    info!(bucket = %cfg.bucket, object = %object_name, bytes = size, "uploaded");
    Ok(())
}

/// Object key for a local file: its filename, nothing else.
pub fn object_key(local: &Path) -> Result<String> {
    local
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no filename", local.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn object_key_is_the_bare_filename() {
        let path = PathBuf::from("./out/desligados_05032024.json");
        assert_eq!(object_key(&path).unwrap(), "desligados_05032024.json");
    }

    #[test]
    fn directory_path_has_no_key() {
        assert!(object_key(Path::new("/")).is_err());
    }
}
