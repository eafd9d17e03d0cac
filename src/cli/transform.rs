use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::info;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::mesh::{ObjModel, simplify};

#[derive(Parser, Debug, Clone)]
pub struct TransformCommand {
    /// OBJ model to simplify
    pub input: PathBuf,
    /// Edges not longer than this are collapsed
    #[arg(short, long, value_name = "LENGTH")]
    pub rate: f64,
    /// Output file, defaults to `transformed_<input>` next to the input
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl TransformCommand {
    fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let name = self.input.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
            self.input.with_file_name(format!("transformed_{name}"))
        })
    }
}

impl SubCommandExtend for TransformCommand {
    async fn run(&self, _opts: &Opts) -> anyhow::Result<()> {
        let text = tokio::fs::read_to_string(&self.input)
            .await
            .with_context(|| format!("failed to read {}", self.input.display()))?;
        let model = ObjModel::parse(&text)
            .with_context(|| format!("failed to parse {}", self.input.display()))?;
        let result = simplify(&model, self.rate)?;

        let output = self.output_path();
        tokio::fs::write(&output, result.model.to_obj_string()).await?;
        info!("wrote {}", output.display());
        println!(
            "{} -> {} vertices, {} -> {} faces, {} edge(s) collapsed",
            model.vertices.len(),
            result.model.vertices.len(),
            model.faces.len(),
            result.model.faces.len(),
            result.collapsed_edges
        );
        Ok(())
    }
}
