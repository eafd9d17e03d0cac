use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};

use crate::cli::SubCommandExtend;
use crate::client::ApiClient;
use crate::config::{ClientOptions, Opts};
use crate::search::SearchHit;

#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    #[command(flatten)]
    pub client: ClientOptions,
    /// Query model
    pub model: PathBuf,
    /// Number of results
    #[arg(short = 'n', long)]
    pub top_n: Option<usize>,
    /// Output format
    #[arg(long, value_enum, value_name = "FORMAT", default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for SearchCommand {
    async fn run(&self, _opts: &Opts) -> anyhow::Result<()> {
        let client = ApiClient::new(&self.client.api)?;
        let result = client.search(&self.model, self.top_n).await?;
        print_result(&result, self.output_format)
    }
}

fn print_result(result: &[SearchHit], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?)
        }
        OutputFormat::Table => {
            for hit in result {
                println!("{:.4}\t{}", hit.score, hit.filename);
            }
        }
    }
    Ok(())
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Table,
}
