use clap::Parser;

use crate::cli::SubCommandExtend;
use crate::client::ApiClient;
use crate::config::{ClientOptions, Opts};

#[derive(Parser, Debug, Clone)]
pub struct DeleteCommand {
    #[command(flatten)]
    pub client: ClientOptions,
    /// Uploaded file to delete
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    pub filename: Option<String>,
    /// Delete every uploaded file
    #[arg(long)]
    pub all: bool,
}

impl SubCommandExtend for DeleteCommand {
    async fn run(&self, _opts: &Opts) -> anyhow::Result<()> {
        let client = ApiClient::new(&self.client.api)?;
        let message = match &self.filename {
            Some(filename) => client.delete(filename).await?,
            None => client.delete_all().await?,
        };
        println!("{message}");
        Ok(())
    }
}
