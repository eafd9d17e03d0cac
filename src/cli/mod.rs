mod delete;
mod download;
mod list;
mod search;
mod server;
mod transform;
mod upload;

pub use delete::*;
pub use download::*;
pub use list::*;
pub use search::*;
pub use server::*;
pub use transform::*;
pub use upload::*;

use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}
