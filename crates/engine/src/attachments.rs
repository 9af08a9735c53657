//! File attachments (uploaded CSVs, invoices, labels and images).
//!
//! Files live under one root directory, split by [`Folder`]. Stored names are
//! random, only the extension chosen by the uploader is kept.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::{EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Folder {
    Listings,
    Orders,
    Invoices,
    Labels,
    Avatars,
    Products,
}

impl Folder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Listings => "listings",
            Self::Orders => "orders",
            Self::Invoices => "invoices",
            Self::Labels => "labels",
            Self::Avatars => "avatars",
            Self::Products => "products",
        }
    }
}

#[derive(Clone, Debug)]
pub struct AttachmentStore {
    root: PathBuf,
}

impl AttachmentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `bytes` under a new random name and returns that name.
    pub async fn save(&self, folder: Folder, bytes: &[u8], extension: &str) -> ResultEngine<String> {
        if bytes.is_empty() {
            return Err(EngineError::InvalidInput("file is empty".to_string()));
        }
        let extension = normalize_extension(extension)?;
        let dir = self.root.join(folder.as_str());
        tokio::fs::create_dir_all(&dir).await?;

        let name = format!("{}.{extension}", Uuid::new_v4().simple());
        tokio::fs::write(dir.join(&name), bytes).await?;
        tracing::debug!(folder = folder.as_str(), name = %name, "attachment stored");
        Ok(name)
    }

    pub async fn read(&self, folder: Folder, name: &str) -> ResultEngine<Vec<u8>> {
        let path = self.path(folder, name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(EngineError::KeyNotFound(name.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Deletes a stored file. A missing file is not an error.
    pub async fn remove(&self, folder: Folder, name: &str) -> ResultEngine<()> {
        let path = self.path(folder, name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Best-effort cleanup used after a failed write.
    pub(crate) async fn discard(&self, folder: Folder, name: &str) {
        if let Err(err) = self.remove(folder, name).await {
            tracing::warn!(folder = folder.as_str(), name, "failed to remove attachment: {err}");
        }
    }

    fn path(&self, folder: Folder, name: &str) -> ResultEngine<PathBuf> {
        if name.is_empty()
            || name.contains(['/', '\\'])
            || name.starts_with('.')
            || name.contains("..")
        {
            return Err(EngineError::InvalidInput(format!(
                "invalid file name: {name}"
            )));
        }
        Ok(self.root.join(folder.as_str()).join(name))
    }
}

pub(crate) fn normalize_extension(extension: &str) -> ResultEngine<String> {
    let ext = extension.trim().trim_start_matches('.').to_ascii_lowercase();
    if ext.is_empty() || ext.len() > 10 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(EngineError::InvalidInput(format!(
            "invalid file extension: {extension}"
        )));
    }
    Ok(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> AttachmentStore {
        AttachmentStore::new(
            std::env::temp_dir().join(format!("market-attachments-{}", Uuid::new_v4().simple())),
        )
    }

    #[test]
    fn extension_rules() {
        assert_eq!(normalize_extension(".PDF").unwrap(), "pdf");
        assert_eq!(normalize_extension("csv").unwrap(), "csv");
        assert!(normalize_extension("").is_err());
        assert!(normalize_extension("../x").is_err());
        assert!(normalize_extension("tar.gz").is_err());
    }

    #[tokio::test]
    async fn save_read_remove() {
        let store = temp_store();
        let name = store.save(Folder::Invoices, b"%PDF", "pdf").await.unwrap();
        assert!(name.ends_with(".pdf"));
        assert_eq!(store.read(Folder::Invoices, &name).await.unwrap(), b"%PDF");

        store.remove(Folder::Invoices, &name).await.unwrap();
        assert!(matches!(
            store.read(Folder::Invoices, &name).await,
            Err(EngineError::KeyNotFound(_))
        ));
        // Removing twice is fine.
        store.remove(Folder::Invoices, &name).await.unwrap();

        let _ = tokio::fs::remove_dir_all(store.root()).await;
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let store = temp_store();
        assert!(matches!(
            store.read(Folder::Avatars, "../secret").await,
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn empty_upload_is_rejected() {
        let store = temp_store();
        assert!(store.save(Folder::Labels, b"", "pdf").await.is_err());
    }
}
