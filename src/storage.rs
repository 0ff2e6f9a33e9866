//! Filesystem layout shared by the handlers: the state document plus the
//! two upload categories under one root directory.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::atomic::AtomicFile;
use crate::config::{BOLETOS_DIR, COMPROVANTES_DIR, DOCUMENT_FILE};

/// Upload category, deciding the directory and public URL prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetCategory {
    Comprovantes,
    Boletos,
}

impl AssetCategory {
    pub fn dir_name(self) -> &'static str {
        match self {
            AssetCategory::Comprovantes => COMPROVANTES_DIR,
            AssetCategory::Boletos => BOLETOS_DIR,
        }
    }

    pub fn url_prefix(self) -> &'static str {
        match self {
            AssetCategory::Comprovantes => "/comprovantes",
            AssetCategory::Boletos => "/boletos",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub async fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root).await
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    pub fn document_path(&self) -> PathBuf {
        self.root.join(DOCUMENT_FILE)
    }

    pub fn category_dir(&self, category: AssetCategory) -> PathBuf {
        self.root.join(category.dir_name())
    }

    /// Writes an upload under its category directory, creating the
    /// directory on first use. An existing file of the same name is
    /// replaced in full, there is no versioning.
    ///
    /// The filename is derived from client-supplied fields, so it gets
    /// the same traversal rejection as the read path.
    pub async fn store_upload(
        &self,
        category: AssetCategory,
        filename: &str,
        data: &[u8],
    ) -> Result<PathBuf, StorageError> {
        check_name(filename)?;
        let dir = self.category_dir(category);
        fs::create_dir_all(&dir).await?;
        let target = dir.join(filename);
        self.write_atomic(&target, data).await?;
        Ok(target)
    }

    /// Replaces the state document in full.
    pub async fn write_document(&self, data: &[u8]) -> Result<(), StorageError> {
        self.write_atomic(&self.document_path(), data).await
    }

    async fn write_atomic(&self, target: &Path, data: &[u8]) -> Result<(), StorageError> {
        let mut atomic = AtomicFile::new(target).await?;
        if let Err(err) = atomic.file_mut().write_all(data).await {
            atomic.cleanup().await;
            return Err(StorageError::Io(err));
        }
        atomic.finalize().await?;
        Ok(())
    }

    /// Resolves a requested asset name inside a category directory.
    ///
    /// The name comes verbatim from the URL path, so anything that could
    /// step outside the directory is rejected outright.
    pub fn resolve_asset(
        &self,
        category: AssetCategory,
        name: &str,
    ) -> Result<PathBuf, StorageError> {
        check_name(name)?;
        Ok(self.category_dir(category).join(name))
    }
}

/// Rejects names that could step outside a category directory.
fn check_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(StorageError::InvalidPath);
    }
    Ok(())
}

#[derive(Debug)]
pub enum StorageError {
    InvalidPath,
    Io(io::Error),
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        StorageError::Io(err)
    }
}
