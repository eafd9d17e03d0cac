use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tokio::task::spawn_blocking;
use utoipa::ToSchema;

use crate::config::{DataDir, SearchOptions, ServiceOptions};
use crate::db::{Database, NewObject, ObjectRecord, crud, init_db};
use crate::descriptor::{Characteristics, DescriptorClient};
use crate::mesh::{ObjModel, simplify};
use crate::search::{SearchHit, rank};
use crate::metrics;
use crate::storage::{UploadStore, file_stem, sanitize_filename};

/// Failures caused by the request rather than by the service
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Invalid(String),
}

/// A file received from a client
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub contents: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct UploadBatch {
    pub files: Vec<UploadFile>,
    pub thumbnails: Vec<UploadFile>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadOutcome {
    /// Stored file names
    pub files: Vec<String>,
    /// Characteristics of each stored file, `null` when the service omitted it
    pub results: BTreeMap<String, Option<Characteristics>>,
}

/// Catalogued model as served by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ObjectDocument {
    pub id: i64,
    pub filename: String,
    pub category: Option<String>,
    #[serde(rename = "uploadDate")]
    pub upload_date: String,
    pub thumbnail: Option<String>,
    #[schema(value_type = Object)]
    pub characteristics: Option<Characteristics>,
}

impl TryFrom<ObjectRecord> for ObjectDocument {
    type Error = anyhow::Error;

    fn try_from(record: ObjectRecord) -> Result<Self> {
        let characteristics = serde_json::from_str(&record.characteristics)
            .with_context(|| format!("corrupted characteristics of {}", record.filename))?;
        Ok(Self {
            id: record.id,
            filename: record.filename,
            category: record.category,
            upload_date: record.upload_date,
            thumbnail: record.thumbnail,
            characteristics,
        })
    }
}

/// Simplified model produced by [`Catalog::transform`]
#[derive(Debug, Clone)]
pub struct Transformed {
    pub filename: String,
    pub obj: String,
    pub original_vertices: usize,
    pub vertices: usize,
    pub collapsed_edges: usize,
}

pub struct CatalogBuilder {
    data_dir: DataDir,
    database_name: String,
    service: Option<ServiceOptions>,
}

impl CatalogBuilder {
    pub fn new(data_dir: DataDir) -> Self {
        Self { data_dir, database_name: "meshdex".to_string(), service: None }
    }

    pub fn database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = name.into();
        self
    }

    pub fn service(mut self, opts: ServiceOptions) -> Self {
        self.service = Some(opts);
        self
    }

    pub async fn open(self) -> Result<Catalog> {
        let service = self.service.ok_or_else(|| anyhow!("descriptor service is not configured"))?;
        fs::create_dir_all(self.data_dir.path()).await?;
        fs::create_dir_all(self.data_dir.transformed()).await?;

        let store = UploadStore::open(self.data_dir.uploads(), self.data_dir.thumbnails()).await?;
        let db = init_db(self.data_dir.database(&self.database_name)).await?;
        info!("{} model(s) in catalogue", crud::count(&db).await?);
        let descriptors = DescriptorClient::new(&service)?;
        info!("descriptor service: {}", descriptors.base_url());

        Ok(Catalog { data_dir: self.data_dir, store, db, descriptors })
    }
}

/// Uploaded models, their metadata and the descriptor service behind them
pub struct Catalog {
    data_dir: DataDir,
    store: UploadStore,
    db: Database,
    descriptors: DescriptorClient,
}

impl Catalog {
    /// Stores the files, computes their characteristics and records them
    ///
    /// Thumbnails are kept only when their stem matches one of the files.
    pub async fn upload(&self, batch: UploadBatch) -> Result<UploadOutcome> {
        let category = batch.category.filter(|c| !c.trim().is_empty());

        let mut saved = vec![];
        for file in batch.files {
            let Ok(name) = sanitize_filename(&file.name) else {
                warn!("ignoring file with invalid name {:?}", file.name);
                continue;
            };
            self.store.save(&name, &file.contents).await?;
            let hash = blake3::hash(&file.contents);
            saved.push((name, hash, file.contents));
        }
        if saved.is_empty() {
            return Err(CatalogError::Invalid("No images provided".to_string()).into());
        }

        let stems: HashSet<&str> = saved.iter().map(|(name, _, _)| file_stem(name)).collect();
        let mut thumbnails = HashMap::new();
        for thumb in &batch.thumbnails {
            let Ok(name) = sanitize_filename(&thumb.name) else {
                warn!("ignoring thumbnail with invalid name {:?}", thumb.name);
                continue;
            };
            if !stems.contains(file_stem(&name)) {
                warn!("ignoring thumbnail {name}, no uploaded file matches it");
                continue;
            }
            self.store.save_thumbnail(&name, &thumb.contents).await?;
            thumbnails.insert(file_stem(&name).to_string(), name);
        }

        let files: Vec<String> = saved.iter().map(|(name, _, _)| name.clone()).collect();
        info!("uploaded {files:?} (category: {category:?})");

        let request = saved.iter().map(|(name, _, data)| (name.clone(), data.clone())).collect();
        let mut computed = self.descriptors.calculate(request).await?;

        let mut results = BTreeMap::new();
        let mut replaced = vec![];
        let mut tx = self.db.begin().await?;
        for (name, hash, _) in &saved {
            let characteristics = computed.remove(name);
            if characteristics.is_none() {
                warn!("descriptor service returned nothing for {name}");
            }
            let ok = characteristics.as_ref().is_some_and(|c| c.error().is_none());
            metrics::inc_uploaded_files(category.as_deref(), ok);

            let thumbnail = thumbnails.get(file_stem(name)).map(String::as_str);
            if let (Some(old), Some(new)) = (crud::find_thumbnail(&mut *tx, name).await?, thumbnail) {
                if old != new {
                    replaced.push(old);
                }
            }

            let json = serde_json::to_string(&characteristics)?;
            let object = NewObject {
                filename: name,
                category: category.as_deref(),
                hash: hash.as_bytes(),
                thumbnail,
                characteristics: &json,
            };
            crud::upsert_object(&mut *tx, &object).await?;
            results.insert(name.clone(), characteristics);
        }
        tx.commit().await?;

        for thumbnail in replaced {
            self.remove_unreferenced_thumbnail(&thumbnail).await?;
        }

        Ok(UploadOutcome { files, results })
    }

    /// Contents of an uploaded file
    pub async fn download(&self, name: &str) -> Result<Vec<u8>> {
        let name = self.existing_file(name).await?;
        self.store.read(&name).await
    }

    pub async fn thumbnail(&self, name: &str) -> Result<Vec<u8>> {
        let not_found = || CatalogError::NotFound(format!("Thumbnail '{name}' not found"));
        let safe = sanitize_filename(name).map_err(|_| not_found())?;
        Ok(self.store.read_thumbnail(&safe).await?.ok_or_else(not_found)?)
    }

    pub async fn list_files(&self) -> Result<Vec<String>> {
        self.store.list().await
    }

    /// Removes a file together with its thumbnail and metadata
    pub async fn delete(&self, name: &str) -> Result<()> {
        let name = self.existing_file(name).await?;
        self.store.remove(&name).await?;
        let thumbnail = crud::find_thumbnail(&self.db, &name).await?;
        let deleted = crud::delete_by_filename(&self.db, &name).await?;
        if let Some(thumbnail) = thumbnail {
            self.remove_unreferenced_thumbnail(&thumbnail).await?;
        }
        info!("deleted {name} ({deleted} record(s))");
        Ok(())
    }

    /// Thumbnails may be shared by models with the same stem
    async fn remove_unreferenced_thumbnail(&self, name: &str) -> Result<()> {
        let references = crud::count_thumbnail_references(&self.db, name).await?;
        if references == 0 {
            self.store.remove_thumbnail(name).await?;
        } else {
            debug!("keeping thumbnail {name}, {references} model(s) still use it");
        }
        Ok(())
    }

    /// Removes every file and every record, returning the removed file names
    pub async fn delete_all(&self) -> Result<Vec<String>> {
        let names = self.store.clear().await?;
        let deleted = crud::delete_all(&self.db).await?;
        info!("deleted {} file(s) and {deleted} record(s)", names.len());
        Ok(names)
    }

    pub async fn documents(&self) -> Result<Vec<ObjectDocument>> {
        to_documents(crud::find_all(&self.db).await?)
    }

    pub async fn documents_by_filename(&self, name: &str) -> Result<Vec<ObjectDocument>> {
        to_documents(crud::find_by_filename(&self.db, name).await?)
    }

    pub async fn documents_by_category(&self, category: &str) -> Result<Vec<ObjectDocument>> {
        to_documents(crud::find_by_category(&self.db, category).await?)
    }

    /// Ranks the catalogue against the characteristics of the query file
    pub async fn search(
        &self,
        name: &str,
        contents: Vec<u8>,
        opts: SearchOptions,
    ) -> Result<Vec<SearchHit>> {
        let name = sanitize_filename(name).unwrap_or_else(|_| "query.obj".to_string());
        let mut computed = self.descriptors.calculate(vec![(name.clone(), contents)]).await?;
        let query = computed
            .remove(&name)
            .ok_or_else(|| anyhow!("descriptor service returned no result for {name}"))?;
        if let Some(error) = query.error() {
            let msg = format!("Failed to calculate descriptors: {error}");
            return Err(CatalogError::Invalid(msg).into());
        }
        let Characteristics::Mesh(query) = query else {
            return Err(CatalogError::Invalid("query has no mesh descriptors".to_string()).into());
        };

        let candidates: Vec<(String, Characteristics)> = self
            .documents()
            .await?
            .into_iter()
            .filter_map(|doc| Some((doc.filename, doc.characteristics?)))
            .collect();

        let start = Instant::now();
        let hits = spawn_blocking(move || {
            let candidates = candidates.par_iter().map(|(name, c)| (name.as_str(), c));
            rank(&query, candidates, &opts)
        })
        .await?;
        metrics::observe_search(start.elapsed().as_secs_f64());

        info!("search for {name} ranked {} model(s)", hits.len());
        Ok(hits)
    }

    /// Simplifies an OBJ model and keeps a copy under the transformed folder
    pub async fn transform(&self, name: &str, text: &str, rate: f64) -> Result<Transformed> {
        let model = ObjModel::parse(text)
            .map_err(|e| CatalogError::Invalid(format!("Invalid OBJ file: {e:#}")))?;
        if !(rate.is_finite() && rate > 0.0) {
            let msg = "Reduction rate is required and must be a positive float".to_string();
            return Err(CatalogError::Invalid(msg).into());
        }

        let original_vertices = model.vertices.len();
        let simplified = spawn_blocking(move || simplify(&model, rate)).await??;

        let base = sanitize_filename(name).unwrap_or_else(|_| "model.obj".to_string());
        let filename = format!("transformed_{base}");
        let obj = simplified.model.to_obj_string();
        let path = self.data_dir.transformed().join(&filename);
        fs::write(&path, &obj).await.with_context(|| format!("failed to write {}", path.display()))?;
        info!(
            "simplified {base}: {original_vertices} -> {} vertices, {} edge(s) collapsed",
            simplified.model.vertices.len(),
            simplified.collapsed_edges
        );

        Ok(Transformed {
            filename,
            obj,
            original_vertices,
            vertices: simplified.model.vertices.len(),
            collapsed_edges: simplified.collapsed_edges,
        })
    }

    async fn existing_file(&self, name: &str) -> Result<String> {
        let not_found = || CatalogError::NotFound(format!("Image '{name}' not found"));
        let safe = sanitize_filename(name).map_err(|_| not_found())?;
        if safe != name || !self.store.exists(&safe).await? {
            return Err(not_found().into());
        }
        Ok(safe)
    }
}

fn to_documents(records: Vec<ObjectRecord>) -> Result<Vec<ObjectDocument>> {
    records.into_iter().map(ObjectDocument::try_from).collect()
}
