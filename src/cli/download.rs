use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::info;

use crate::cli::SubCommandExtend;
use crate::client::ApiClient;
use crate::config::{ClientOptions, Opts};
use crate::storage::sanitize_filename;

#[derive(Parser, Debug, Clone)]
pub struct DownloadCommand {
    #[command(flatten)]
    pub client: ClientOptions,
    /// Uploaded file to fetch
    pub filename: String,
    /// Output file, defaults to the file name in the current directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl SubCommandExtend for DownloadCommand {
    async fn run(&self, _opts: &Opts) -> anyhow::Result<()> {
        let client = ApiClient::new(&self.client.api)?;
        let data = client.download(&self.filename).await?;
        let output = match &self.output {
            Some(output) => output.clone(),
            None => PathBuf::from(sanitize_filename(&self.filename)?),
        };
        tokio::fs::write(&output, &data)
            .await
            .with_context(|| format!("failed to write {}", output.display()))?;
        info!("saved {} ({} bytes)", output.display(), data.len());
        Ok(())
    }
}
