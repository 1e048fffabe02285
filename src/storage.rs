use std::{
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use tempfile::{NamedTempFile, TempPath};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::StorageConfig;

/// An upload parked in the uploads directory. The file is removed when this is dropped.
#[derive(Debug)]
pub struct TempUpload {
    path: TempPath,
}

impl TempUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the file now rather than on drop, logging instead of failing.
    pub fn discard(self) {
        let path = self.path.to_path_buf();
        if let Err(e) = self.path.close() {
            warn!(error = %e, path = %path.display(), "failed to delete temporary upload");
        }
    }
}

#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn stage_upload(&self, body: Bytes) -> anyhow::Result<TempUpload>;
    /// Copies a staged upload into the image store and returns the new file name.
    async fn persist_upload(&self, upload: TempUpload, ext: &str) -> anyhow::Result<String>;
    async fn read_image(&self, file_name: &str) -> anyhow::Result<Option<Bytes>>;
    /// Returns `false` when there was nothing to delete.
    async fn delete_image(&self, file_name: &str) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct DiskStorage {
    images_dir: PathBuf,
    uploads_dir: PathBuf,
}

impl DiskStorage {
    pub fn new(cfg: &StorageConfig) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&cfg.images_dir)
            .with_context(|| format!("create {}", cfg.images_dir.display()))?;
        std::fs::create_dir_all(&cfg.uploads_dir)
            .with_context(|| format!("create {}", cfg.uploads_dir.display()))?;
        Ok(Self {
            images_dir: cfg.images_dir.clone(),
            uploads_dir: cfg.uploads_dir.clone(),
        })
    }

    fn image_path(&self, file_name: &str) -> Option<PathBuf> {
        is_plain_file_name(file_name).then(|| self.images_dir.join(file_name))
    }
}

/// A bare file name: no separators, no parent references.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

#[async_trait]
impl StorageClient for DiskStorage {
    async fn stage_upload(&self, body: Bytes) -> anyhow::Result<TempUpload> {
        let dir = self.uploads_dir.clone();
        let path = tokio::task::spawn_blocking(move || -> anyhow::Result<TempPath> {
            let mut file = NamedTempFile::new_in(&dir).context("create temporary upload")?;
            file.write_all(&body).context("write temporary upload")?;
            Ok(file.into_temp_path())
        })
        .await
        .context("stage upload task")??;

        debug!(path = %path.display(), "upload staged");
        Ok(TempUpload { path })
    }

    async fn persist_upload(&self, upload: TempUpload, ext: &str) -> anyhow::Result<String> {
        let file_name = format!("{}.{}", Uuid::new_v4(), ext);
        let dest = self.images_dir.join(&file_name);
        tokio::fs::copy(upload.path(), &dest)
            .await
            .with_context(|| format!("copy upload to {}", dest.display()))?;
        upload.discard();
        Ok(file_name)
    }

    async fn read_image(&self, file_name: &str) -> anyhow::Result<Option<Bytes>> {
        let Some(path) = self.image_path(file_name) else {
            return Ok(None);
        };
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }

    async fn delete_image(&self, file_name: &str) -> anyhow::Result<bool> {
        let Some(path) = self.image_path(file_name) else {
            return Ok(false);
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("delete {}", path.display())),
        }
    }
}
