use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use clap::{Parser, Subcommand, ValueEnum};
use directories::ProjectDirs;

use crate::cli::*;

static DATA_DIR: LazyLock<String> = LazyLock::new(|| {
    ProjectDirs::from("", "meshdex", "meshdex")
        .map(|dirs| dirs.data_dir().to_string_lossy().into_owned())
        .unwrap_or_else(|| "./meshdex-data".to_string())
});

fn default_data_dir() -> &'static str {
    DATA_DIR.as_str()
}

#[derive(Parser, Debug, Clone)]
pub struct ServiceOptions {
    /// Descriptor service address, either `host:port` or a full URL
    #[arg(long, env = "IMAGES_SERVICE", default_value = "127.0.0.1:5000")]
    pub descriptor_service: String,
    /// Multipart field the descriptor service reads files from
    #[arg(long, value_enum, default_value_t = DescriptorField::Files)]
    pub descriptor_field: DescriptorField,
    /// Descriptor service request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 300)]
    pub descriptor_timeout: u64,
}

impl ServiceOptions {
    /// Base URL of the descriptor service, with a scheme
    pub fn base_url(&self) -> String {
        let url = self.descriptor_service.trim_end_matches('/');
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("http://{url}")
        }
    }
}

#[derive(Parser, Debug, Clone, Copy)]
pub struct SearchOptions {
    /// Number of results returned by a similarity search
    #[arg(long, value_name = "N", default_value_t = 5)]
    pub top_n: usize,
    /// Weight of the Fourier coefficient distance
    #[arg(long, value_name = "WEIGHT", default_value_t = 0.5)]
    pub w1: f64,
    /// Weight of the Zernike moment distance
    #[arg(long, value_name = "WEIGHT", default_value_t = 0.5)]
    pub w2: f64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self { top_n: 5, w1: 0.5, w2: 0.5 }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct ClientOptions {
    /// meshdex API base URL
    #[arg(long, env = "MESHDEX_API", default_value = "http://127.0.0.1:8000")]
    pub api: String,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "meshdex", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// meshdex data directory (database, uploads, transformed models)
    #[arg(short, long, env = "MESHDEX_DATA_DIR", default_value = default_data_dir())]
    pub data_dir: DataDir,
    /// Database file name, without extension
    #[arg(long, env = "DATABASE_NAME", default_value = "meshdex")]
    pub database_name: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// Start the HTTP API
    Server(ServerCommand),
    /// Upload models to a running server
    Upload(UploadCommand),
    /// Search a running server for similar models
    Search(SearchCommand),
    /// List catalogued documents
    List(ListCommand),
    /// Delete one or all uploaded models
    Delete(DeleteCommand),
    /// Download an uploaded model
    Download(DownloadCommand),
    /// Simplify an OBJ model locally by collapsing short edges
    Transform(TransformCommand),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorField {
    /// 3D models, sent as `files`
    Files,
    /// 2D images, sent as `images`
    Images,
}

impl DescriptorField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Files => "files",
            Self::Images => "images",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DataDir {
    path: PathBuf,
}

impl DataDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Path of the metadata database
    pub fn database(&self, name: &str) -> PathBuf {
        self.path.join(format!("{name}.db"))
    }

    /// Directory holding uploaded models
    pub fn uploads(&self) -> PathBuf {
        self.path.join("uploaded")
    }

    /// Directory holding thumbnails of uploaded models
    pub fn thumbnails(&self) -> PathBuf {
        self.uploads().join("thumbnails")
    }

    /// Directory holding simplified models
    pub fn transformed(&self) -> PathBuf {
        self.path.join("transformed")
    }
}

impl FromStr for DataDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_url_gets_a_scheme() {
        let mut opts = ServiceOptions {
            descriptor_service: "localhost:5000".to_string(),
            descriptor_field: DescriptorField::Files,
            descriptor_timeout: 10,
        };
        assert_eq!(opts.base_url(), "http://localhost:5000");

        opts.descriptor_service = "https://descriptors.local/".to_string();
        assert_eq!(opts.base_url(), "https://descriptors.local");
    }

    #[test]
    fn data_dir_layout() {
        let dir = DataDir::new("/srv/meshdex");
        assert_eq!(dir.database("catalog"), PathBuf::from("/srv/meshdex/catalog.db"));
        assert_eq!(dir.thumbnails(), PathBuf::from("/srv/meshdex/uploaded/thumbnails"));
        assert_eq!(dir.transformed(), PathBuf::from("/srv/meshdex/transformed"));
    }
}
