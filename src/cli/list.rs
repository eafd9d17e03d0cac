use clap::Parser;

use crate::cli::{OutputFormat, SubCommandExtend};
use crate::client::ApiClient;
use crate::config::{ClientOptions, Opts};

#[derive(Parser, Debug, Clone)]
pub struct ListCommand {
    #[command(flatten)]
    pub client: ClientOptions,
    /// Only list documents of this category
    #[arg(short, long)]
    pub category: Option<String>,
    /// Output format
    #[arg(long, value_enum, value_name = "FORMAT", default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for ListCommand {
    async fn run(&self, _opts: &Opts) -> anyhow::Result<()> {
        let client = ApiClient::new(&self.client.api)?;
        let documents = match &self.category {
            Some(category) => client.documents_by_category(category).await?,
            None => client.documents().await?,
        };

        match self.output_format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&documents)?),
            OutputFormat::Table => {
                for doc in &documents {
                    let status = match doc.characteristics.as_ref().and_then(|c| c.error()) {
                        Some(error) => error,
                        None => "ok",
                    };
                    println!(
                        "{}\t{}\t{}\t{}",
                        doc.upload_date,
                        doc.category.as_deref().unwrap_or("-"),
                        doc.filename,
                        status
                    );
                }
            }
        }
        Ok(())
    }
}
