//! Multipart staging: files land in the upload directory and are removed when
//! their `StagedFile` guard drops, whether or not the upload succeeded.

use std::{collections::HashMap, path::Path};

use anyhow::Context;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::{
    error::ApiResult,
    extract::Multipart,
    storage::{MediaStorage, UploadedAsset},
};

/// Upload held in the staging directory until the guard drops.
#[derive(Debug)]
pub struct StagedFile {
    file: NamedTempFile,
    pub content_type: String,
}

impl StagedFile {
    pub async fn write(dir: &Path, content_type: String, data: &[u8]) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("create upload dir {}", dir.display()))?;
        let file = tempfile::Builder::new()
            .prefix("upload-")
            .tempfile_in(dir)
            .with_context(|| format!("create staged file in {}", dir.display()))?;
        tokio::fs::write(file.path(), data)
            .await
            .with_context(|| format!("stage upload {}", file.path().display()))?;
        debug!(path = %file.path().display(), bytes = data.len(), "upload staged");
        Ok(Self { file, content_type })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Text fields and staged files of a multipart request.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub files: HashMap<String, StagedFile>,
}

impl MultipartForm {
    /// Reads every part; parts in `file_fields` are staged to disk, the rest are text.
    pub async fn read(
        Multipart(mut mp): Multipart,
        dir: &Path,
        file_fields: &[&str],
    ) -> ApiResult<Self> {
        let mut form = MultipartForm::default();
        while let Some(field) = mp.next_field().await? {
            let Some(name) = field.name().map(|s| s.to_string()) else {
                continue;
            };
            if file_fields.contains(&name.as_str()) {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let data = field.bytes().await?;
                if data.is_empty() {
                    continue;
                }
                let staged = StagedFile::write(dir, content_type, &data).await?;
                form.files.insert(name, staged);
            } else {
                let text = field.text().await?;
                form.fields.insert(name, text);
            }
        }
        Ok(form)
    }

    /// Trimmed, non-empty text field.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn take_file(&mut self, name: &str) -> Option<StagedFile> {
        self.files.remove(name)
    }
}

/// Pushes a staged file to the media host. The staged copy is removed on return.
pub async fn upload_staged(
    storage: &dyn MediaStorage,
    staged: StagedFile,
    folder: &str,
) -> anyhow::Result<UploadedAsset> {
    storage
        .upload(staged.path(), folder, &staged.content_type)
        .await
}

/// Best-effort removal of a replaced asset; failures are logged only.
pub async fn delete_asset_quietly(storage: &dyn MediaStorage, public_id: Option<&str>) {
    let Some(public_id) = public_id else {
        return;
    };
    if let Err(e) = storage.delete(public_id).await {
        warn!(error = %e, public_id, "failed to delete replaced asset");
    }
}

/// Removes assets uploaded earlier in a request whose database write failed.
pub async fn roll_back_uploads(storage: &dyn MediaStorage, assets: &[&UploadedAsset]) {
    for asset in assets {
        warn!(public_id = %asset.public_id, "discarding upload after failed write");
        delete_asset_quietly(storage, Some(&asset.public_id)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::fake::FakeStorage;

    #[tokio::test]
    async fn staged_file_removed_after_successful_upload() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagedFile::write(dir.path(), "image/png".into(), b"png-bytes")
            .await
            .unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.exists());

        let storage = FakeStorage::default();
        let asset = upload_staged(&storage, staged, "avatars").await.unwrap();
        assert!(asset.public_id.starts_with("avatars/"));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn staged_file_removed_after_failed_upload() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagedFile::write(dir.path(), "image/png".into(), b"png-bytes")
            .await
            .unwrap();
        let path = staged.path().to_path_buf();

        let storage = FakeStorage {
            fail_uploads: true,
            ..Default::default()
        };
        assert!(upload_staged(&storage, staged, "avatars").await.is_err());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn staging_creates_missing_upload_dir() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("public").join("temp");
        let staged = StagedFile::write(&dir, "video/mp4".into(), b"mp4").await.unwrap();
        assert!(staged.path().starts_with(&dir));
        assert_eq!(std::fs::read(staged.path()).unwrap(), b"mp4");
    }

    #[tokio::test]
    async fn delete_asset_quietly_skips_missing_id() {
        let storage = FakeStorage::default();
        delete_asset_quietly(&storage, None).await;
        delete_asset_quietly(&storage, Some("avatars/old")).await;
        assert_eq!(*storage.deleted.lock().unwrap(), vec!["avatars/old".to_string()]);
    }

    #[tokio::test]
    async fn roll_back_deletes_every_asset() {
        let storage = FakeStorage::default();
        let video = UploadedAsset {
            url: "https://media.local/videos/v".into(),
            public_id: "videos/v".into(),
            duration: Some(3.0),
        };
        let thumb = UploadedAsset {
            url: "https://media.local/thumbnails/t".into(),
            public_id: "thumbnails/t".into(),
            duration: None,
        };
        roll_back_uploads(&storage, &[&video, &thumb]).await;
        assert_eq!(
            *storage.deleted.lock().unwrap(),
            vec!["videos/v".to_string(), "thumbnails/t".to_string()]
        );
    }
}
