use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::{debug, info};
use tokio::fs;

/// Upload folder with a `thumbnails/` subdirectory
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
    thumbnails: PathBuf,
}

impl UploadStore {
    /// Opens the store, creating both directories if needed
    pub async fn open(root: impl Into<PathBuf>, thumbnails: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let thumbnails = thumbnails.into();
        for dir in [&root, &thumbnails] {
            if !fs::try_exists(dir).await? {
                info!("creating folder {}", dir.display());
            }
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(Self { root, thumbnails })
    }

    /// Path of an uploaded file, the name must already be sanitized
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn thumbnail_path(&self, name: &str) -> PathBuf {
        self.thumbnails.join(name)
    }

    /// Writes a file, overwriting any previous upload with the same name
    pub async fn save(&self, name: &str, contents: &[u8]) -> Result<PathBuf> {
        let path = self.path(name);
        fs::write(&path, contents)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        debug!("saved {} ({} bytes)", path.display(), contents.len());
        Ok(path)
    }

    pub async fn save_thumbnail(&self, name: &str, contents: &[u8]) -> Result<PathBuf> {
        let path = self.thumbnail_path(name);
        fs::write(&path, contents)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    pub async fn exists(&self, name: &str) -> Result<bool> {
        Ok(fs::metadata(self.path(name)).await.map(|m| m.is_file()).unwrap_or(false))
    }

    pub async fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path(name);
        fs::read(&path).await.with_context(|| format!("failed to read {}", path.display()))
    }

    pub async fn read_thumbnail(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.thumbnail_path(name)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Names of all uploaded files, sorted
    pub async fn list(&self) -> Result<Vec<String>> {
        list_files(&self.root).await
    }

    pub async fn remove(&self, name: &str) -> Result<()> {
        let path = self.path(name);
        fs::remove_file(&path)
            .await
            .with_context(|| format!("failed to remove {}", path.display()))
    }

    /// Removes a thumbnail, a missing one is not an error
    pub async fn remove_thumbnail(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.thumbnail_path(name)).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    /// Removes every upload and thumbnail, returning the upload names
    pub async fn clear(&self) -> Result<Vec<String>> {
        let names = self.list().await?;
        for name in &names {
            self.remove(name).await?;
        }
        for name in list_files(&self.thumbnails).await? {
            self.remove_thumbnail(&name).await?;
        }
        Ok(names)
    }
}

async fn list_files(dir: &Path) -> Result<Vec<String>> {
    let mut names = vec![];
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Reduces a client supplied file name to a safe single path component
pub fn sanitize_filename(name: &str) -> Result<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        bail!("invalid file name: {name:?}");
    }
    Ok(cleaned.to_string())
}

/// File name without its last extension
pub fn file_stem(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(sanitize_filename("C:\\models\\chair.obj").unwrap(), "chair.obj");
        assert_eq!(sanitize_filename("my chair (1).obj").unwrap(), "my_chair__1_.obj");
        assert_eq!(sanitize_filename(".hidden.obj").unwrap(), "hidden.obj");
    }

    #[test]
    fn sanitize_rejects_empty_names() {
        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("..").is_err());
        assert!(sanitize_filename("dir/").is_err());
    }

    #[test]
    fn stems() {
        assert_eq!(file_stem("chair.obj"), "chair");
        assert_eq!(file_stem("chair.thumb.png"), "chair.thumb");
        assert_eq!(file_stem("chair"), "chair");
    }

    #[tokio::test]
    async fn save_list_and_clear() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = UploadStore::open(dir.path().join("up"), dir.path().join("up/thumbnails")).await?;

        store.save("b.obj", b"v 0 0 0").await?;
        store.save("a.obj", b"v 1 1 1").await?;
        store.save_thumbnail("a.png", b"png").await?;

        assert_eq!(store.list().await?, vec!["a.obj", "b.obj"]);
        assert!(store.exists("a.obj").await?);
        assert!(!store.exists("thumbnails").await?);
        assert_eq!(store.read_thumbnail("a.png").await?, Some(b"png".to_vec()));

        store.save("a.obj", b"v 2 2 2").await?;
        assert_eq!(store.read("a.obj").await?, b"v 2 2 2");

        assert_eq!(store.clear().await?, vec!["a.obj", "b.obj"]);
        assert!(store.list().await?.is_empty());
        assert_eq!(store.read_thumbnail("a.png").await?, None);
        Ok(())
    }
}
