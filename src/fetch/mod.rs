use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDate};
use futures_util::StreamExt;
use google_cloud_storage::client::google_cloud_auth::credentials::CredentialsFile;
use google_cloud_storage::client::google_cloud_auth::project::Config as AuthConfig;
use google_cloud_storage::client::google_cloud_auth::token::DefaultTokenSourceProvider;
use google_cloud_token::{TokenSource as _, TokenSourceProvider};
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::config::Config;
use crate::error::StageError;

const DRIVE_SCOPES: [&str; 1] = ["https://www.googleapis.com/auth/drive.readonly"];
const FILES_ENDPOINT: &str = "https://www.googleapis.com/drive/v3/files";

/// Minimal slice of Drive file metadata the pipeline needs.
#[derive(Debug, Clone, Deserialize)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

/// Read-only Drive client backed by a service-account token.
pub struct DriveClient {
    http: Client,
    // Full `Authorization` header value, "Bearer ..." included.
    authorization: String,
}

impl DriveClient {
    pub async fn new(credentials_path: &Path) -> Result<Self, StageError> {
        Self::connect(credentials_path).await.map_err(StageError::Auth)
    }

    async fn connect(credentials_path: &Path) -> Result<Self> {
        let credentials =
            CredentialsFile::new_from_file(credentials_path.to_string_lossy().into_owned())
                .await
                .with_context(|| {
                    format!("loading service account key {}", credentials_path.display())
                })?;
        let auth_config = AuthConfig::default().with_scopes(&DRIVE_SCOPES);
        let provider =
            DefaultTokenSourceProvider::new_with_credentials(auth_config, Box::new(credentials))
                .await
                .context("building drive token source")?;
        let authorization = provider
            .token_source()
            .token()
            .await
            .map_err(|e| anyhow!("minting drive access token: {e}"))?;

        Ok(Self {
            http: Client::new(),
            authorization,
        })
    }

    /// List non-folder files modified on or after `since`, following
    /// `nextPageToken` until the listing is exhausted.
    pub async fn search_modified(&self, since: NaiveDate) -> Result<Vec<DriveFile>, StageError> {
        self.search_inner(since).await.map_err(StageError::Search)
    }

    async fn search_inner(&self, since: NaiveDate) -> Result<Vec<DriveFile>> {
        let query = modified_query(since);
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(FILES_ENDPOINT)
                .header(AUTHORIZATION, self.authorization.as_str())
                .query(&[
                    ("q", query.as_str()),
                    ("fields", "nextPageToken, files(id, name)"),
                ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page: FileList = request
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
                .context("decoding drive file listing")?;
            files.extend(page.files);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(files)
    }

    /// Download the file's binary content in chunks to `dest_dir` under its
    /// original name, logging progress as chunks arrive. Returns the full
    /// path of the saved file.
    pub async fn download(
        &self,
        file: &DriveFile,
        dest_dir: impl AsRef<Path>,
    ) -> Result<PathBuf, StageError> {
        self.download_inner(file, dest_dir.as_ref())
            .await
            .map_err(StageError::Download)
    }

    async fn download_inner(&self, file: &DriveFile, dest_dir: &Path) -> Result<PathBuf> {
        let dest_path = dest_dir.join(&file.name);
        if let Some(parent) = dest_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let resp = self
            .http
            .get(format!("{FILES_ENDPOINT}/{}", file.id))
            .header(AUTHORIZATION, self.authorization.as_str())
            .query(&[("alt", "media")])
            .send()
            .await?
            .error_for_status()?;

        let total = resp.content_length();
        let mut stream = resp.bytes_stream();
        let mut out = File::create(&dest_path)
            .await
            .with_context(|| format!("creating {}", dest_path.display()))?;
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            out.write_all(&chunk).await?;
            written += chunk.len() as u64;
            match total {
                Some(total) if total > 0 => {
                    info!("download {}%", written * 100 / total);
                }
                _ => info!(bytes = written, "downloading"),
            }
        }
        out.flush().await?;

        Ok(dest_path)
    }
}

/// Drive metadata query for non-folder files modified on or after the given
/// local date. Start-of-day keeps same-day files inside the window.
pub fn modified_query(since: NaiveDate) -> String {
    format!(
        "mimeType != 'application/vnd.google-apps.folder' and modifiedTime > '{}T00:00:00'",
        since
    )
}

/// Pick the file to process: among names containing `marker`, the last one
/// listed wins. Zero matches is an explicit error, never a silent skip.
pub fn select_marked<'a>(files: &'a [DriveFile], marker: &str) -> Result<&'a DriveFile, StageError> {
    files
        .iter()
        .filter(|f| f.name.contains(marker))
        .last()
        .ok_or_else(|| StageError::NotFound(marker.to_string()))
}

/// Run the whole fetch stage: authenticate, search today's files, pick the
/// marked one and download it into the work dir.
pub async fn fetch(cfg: &Config) -> Result<PathBuf, StageError> {
    let client = DriveClient::new(&cfg.credentials_path).await?;
    let today = Local::now().date_naive();
    let files = client.search_modified(today).await?;
    let target = select_marked(&files, &cfg.name_marker)?;
    info!(name = %target.name, id = %target.id, "selected remote file");
    client.download(target, &cfg.work_dir).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn file(id: &str, name: &str) -> DriveFile {
        DriveFile {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn query_excludes_folders_and_starts_at_midnight() {
        let q = modified_query(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        assert!(q.contains("mimeType != 'application/vnd.google-apps.folder'"));
        assert!(q.contains("modifiedTime > '2024-03-05T00:00:00'"));
    }

    #[test]
    fn last_marked_file_wins() {
        let files = vec![
            file("a", "2024 Base Folha.xlsx"),
            file("b", "notes.txt"),
            file("c", "2024 Base Leak.xlsx"),
        ];
        let picked = select_marked(&files, "Base").unwrap();
        assert_eq!(picked.id, "c");
    }

    #[test]
    fn no_marked_file_is_an_explicit_error() {
        let files = vec![file("a", "notes.txt"), file("b", "report.pdf")];
        let err = select_marked(&files, "Base").unwrap_err();
        assert!(matches!(err, StageError::NotFound(marker) if marker == "Base"));
    }

    #[test]
    fn empty_listing_is_an_explicit_error() {
        assert!(matches!(
            select_marked(&[], "Base"),
            Err(StageError::NotFound(_))
        ));
    }

    #[test]
    fn file_list_decodes_drive_payload() {
        let payload = r#"{
            "nextPageToken": "tok",
            "files": [{"id": "1abc", "name": "2024 Base Folha.xlsx"}]
        }"#;
        let list: FileList = serde_json::from_str(payload).unwrap();
        assert_eq!(list.next_page_token.as_deref(), Some("tok"));
        assert_eq!(list.files.len(), 1);
        assert_eq!(list.files[0].name, "2024 Base Folha.xlsx");
    }

    #[test]
    fn file_list_tolerates_empty_result() {
        let list: FileList = serde_json::from_str("{}").unwrap();
        assert!(list.files.is_empty());
        assert!(list.next_page_token.is_none());
    }
}
