use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use indicatif::ProgressBar;
use log::{info, warn};
use regex::Regex;
use walkdir::WalkDir;

use crate::cli::SubCommandExtend;
use crate::client::ApiClient;
use crate::config::{ClientOptions, Opts};
use crate::queue::UploadQueue;
use crate::utils::pb_style;

#[derive(Parser, Debug, Clone)]
pub struct UploadCommand {
    #[command(flatten)]
    pub client: ClientOptions,
    /// Files or directories to upload
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
    /// Category of the uploaded models
    #[arg(short, long)]
    pub category: Option<String>,
    /// Suffixes of the model files, separated by commas
    #[arg(short, long, default_value = "obj")]
    pub suffix: String,
    /// Suffixes of thumbnail files, separated by commas, empty to disable
    #[arg(short, long, default_value = "png,jpg,jpeg")]
    pub thumbnail_suffix: String,
    /// Models per request
    #[arg(short, long, default_value_t = 16)]
    pub batch_size: usize,
}

fn suffix_regex(suffix: &str) -> Result<Option<Regex>> {
    if suffix.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(Regex::new(&format!("(?i)^({})$", suffix.replace(',', "|")))?))
}

fn matches(re: &Option<Regex>, ext: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(ext))
}

impl UploadCommand {
    /// Walks the given paths and queues every matching file
    pub fn build_queue(&self) -> Result<UploadQueue> {
        let models = suffix_regex(&self.suffix)?;
        let thumbnails = suffix_regex(&self.thumbnail_suffix)?;
        let mut queue = UploadQueue::new(thumbnails.clone());
        queue.set_category(self.category.clone());

        for root in &self.paths {
            for entry in WalkDir::new(root).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                let ext = path.extension().map(|e| e.to_string_lossy()).unwrap_or_default();
                if matches(&models, &ext) || matches(&thumbnails, &ext) {
                    queue.push(path);
                }
            }
        }
        Ok(queue)
    }
}

impl SubCommandExtend for UploadCommand {
    async fn run(&self, _opts: &Opts) -> anyhow::Result<()> {
        let queue = self.build_queue()?;
        for orphan in queue.orphans() {
            warn!("no model matches thumbnail {}", orphan.display());
        }
        if queue.is_empty() {
            anyhow::bail!("no model found in {:?}", self.paths);
        }
        info!("uploading {} model(s)", queue.len());

        let client = ApiClient::new(&self.client.api)?;
        let pb = ProgressBar::new(queue.len() as u64).with_style(pb_style());
        for batch in queue.into_batches(self.batch_size) {
            let outcome = client.upload(&batch).await?;
            for (name, characteristics) in &outcome.results {
                match characteristics.as_ref().and_then(|c| c.error()) {
                    Some(error) => pb.println(format!("[ERR] {name}: {error}")),
                    None => pb.println(format!("[OK] {name}")),
                }
            }
            pb.inc(batch.len() as u64);
        }
        pb.finish_and_clear();

        Ok(())
    }
}
