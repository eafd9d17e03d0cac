use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use futures::future::try_join_all;
use regex::Regex;
use reqwest::multipart::{Form, Part};

/// A model waiting for upload, with its optional thumbnail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub file: PathBuf,
    pub thumbnail: Option<PathBuf>,
}

/// Client side staging list of files pending submission
///
/// Files whose extension matches the thumbnail pattern are attached to the
/// model with the same stem, whichever of the two is queued first.
#[derive(Debug, Clone)]
pub struct UploadQueue {
    items: Vec<QueueItem>,
    orphans: Vec<PathBuf>,
    category: Option<String>,
    thumbnail_suffix: Option<Regex>,
}

fn stem(path: &Path) -> Option<&std::ffi::OsStr> {
    path.file_stem()
}

impl UploadQueue {
    pub fn new(thumbnail_suffix: Option<Regex>) -> Self {
        Self { items: vec![], orphans: vec![], category: None, thumbnail_suffix }
    }

    pub fn set_category(&mut self, category: Option<String>) {
        self.category = category.filter(|c| !c.is_empty());
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    /// Thumbnails that matched no queued model
    pub fn orphans(&self) -> &[PathBuf] {
        &self.orphans
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn is_thumbnail(&self, path: &Path) -> bool {
        match (&self.thumbnail_suffix, path.extension()) {
            (Some(re), Some(ext)) => re.is_match(&ext.to_string_lossy()),
            _ => false,
        }
    }

    fn contains(&self, path: &Path) -> bool {
        self.orphans.iter().any(|p| p == path)
            || self
                .items
                .iter()
                .any(|item| item.file == path || item.thumbnail.as_deref() == Some(path))
    }

    /// Queues a file, returns false if it was already queued
    pub fn push(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if self.contains(&path) {
            return false;
        }

        if self.is_thumbnail(&path) {
            let owner = self
                .items
                .iter_mut()
                .find(|item| item.thumbnail.is_none() && stem(&item.file) == stem(&path));
            match owner {
                Some(item) => item.thumbnail = Some(path),
                None => self.orphans.push(path),
            }
            return true;
        }

        let orphan = self.orphans.iter().position(|p| stem(p) == stem(&path));
        let thumbnail = orphan.map(|i| self.orphans.remove(i));
        self.items.push(QueueItem { file: path, thumbnail });
        true
    }

    /// Removes a model (with its thumbnail) or a thumbnail from the queue
    pub fn remove(&mut self, path: &Path) -> bool {
        let before = self.items.len() + self.orphans.len();
        self.items.retain(|item| item.file != path);
        self.orphans.retain(|p| p != path);
        let mut removed = before != self.items.len() + self.orphans.len();
        for item in self.items.iter_mut() {
            if item.thumbnail.as_deref() == Some(path) {
                item.thumbnail = None;
                removed = true;
            }
        }
        removed
    }

    /// Moves an item, indices are clamped to the queue bounds
    pub fn move_item(&mut self, from: usize, to: usize) {
        if self.items.is_empty() {
            return;
        }
        let last = self.items.len() - 1;
        let item = self.items.remove(from.min(last));
        self.items.insert(to.min(last), item);
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.orphans.clear();
    }

    /// Splits the queue into queues of at most `size` models
    pub fn into_batches(self, size: usize) -> Vec<UploadQueue> {
        self.items
            .chunks(size.max(1))
            .map(|chunk| UploadQueue {
                items: chunk.to_vec(),
                orphans: vec![],
                category: self.category.clone(),
                thumbnail_suffix: self.thumbnail_suffix.clone(),
            })
            .collect()
    }

    /// Builds the multipart body understood by `POST /upload`
    pub async fn to_form(&self) -> Result<Form> {
        let parts = try_join_all(self.items.iter().map(|item| async move {
            let thumbnail = match &item.thumbnail {
                Some(path) => Some(file_part(path).await?),
                None => None,
            };
            anyhow::Ok((file_part(&item.file).await?, thumbnail))
        }))
        .await?;

        let mut form = Form::new();
        for (file, thumbnail) in parts {
            form = form.part("objFiles", file);
            if let Some(thumbnail) = thumbnail {
                form = form.part("thumbnails", thumbnail);
            }
        }
        if let Some(category) = &self.category {
            form = form.text("category", category.clone());
        }
        Ok(form)
    }
}

async fn file_part(path: &Path) -> Result<Part> {
    let data =
        tokio::fs::read(path).await.with_context(|| format!("failed to read {}", path.display()))?;
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    Ok(Part::bytes(data).file_name(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> UploadQueue {
        UploadQueue::new(Some(Regex::new("(?i)^(png|jpe?g)$").unwrap()))
    }

    #[test]
    fn thumbnails_attach_by_stem() {
        let mut q = queue();
        assert!(q.push("models/chair.png"));
        assert!(q.push("models/chair.obj"));
        assert!(q.push("models/table.obj"));
        assert!(q.push("models/table.JPG"));
        assert!(q.push("models/lamp.png"));

        assert_eq!(q.len(), 2);
        assert_eq!(q.items()[0].thumbnail, Some(PathBuf::from("models/chair.png")));
        assert_eq!(q.items()[1].thumbnail, Some(PathBuf::from("models/table.JPG")));
        assert_eq!(q.orphans(), &[PathBuf::from("models/lamp.png")]);
    }

    #[test]
    fn duplicates_are_ignored() {
        let mut q = queue();
        assert!(q.push("a.obj"));
        assert!(!q.push("a.obj"));
        assert!(q.push("a.png"));
        assert!(!q.push("a.png"));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn without_thumbnail_pattern_everything_is_a_model() {
        let mut q = UploadQueue::new(None);
        q.push("a.png");
        q.push("a.obj");
        assert_eq!(q.len(), 2);
        assert!(q.items().iter().all(|item| item.thumbnail.is_none()));
    }

    #[test]
    fn remove_and_reorder() {
        let mut q = queue();
        for name in ["a.obj", "b.obj", "c.obj", "b.png"] {
            q.push(name);
        }

        q.move_item(2, 0);
        let order: Vec<_> = q.items().iter().map(|i| i.file.clone()).collect();
        assert_eq!(order, vec![PathBuf::from("c.obj"), "a.obj".into(), "b.obj".into()]);

        q.move_item(0, 99);
        assert_eq!(q.items()[2].file, PathBuf::from("c.obj"));

        assert!(q.remove(Path::new("b.png")));
        assert!(q.items().iter().all(|item| item.thumbnail.is_none()));
        assert!(q.remove(Path::new("a.obj")));
        assert!(!q.remove(Path::new("a.obj")));
        assert_eq!(q.len(), 2);

        q.clear();
        assert!(q.is_empty());
    }

    #[test]
    fn batches_keep_the_category() {
        let mut q = queue();
        q.set_category(Some("furniture".to_string()));
        for name in ["a.obj", "b.obj", "c.obj"] {
            q.push(name);
        }
        let batches = q.into_batches(2);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1].len(), 1);
        assert_eq!(batches[1].category(), Some("furniture"));
    }
}
