use clap::Parser;
use log::info;
use tokio::net::TcpListener;

use crate::cli::SubCommandExtend;
use crate::config::{SearchOptions, ServiceOptions};
use crate::{CatalogBuilder, Opts, server};

#[derive(Parser, Debug, Clone)]
pub struct ServerCommand {
    #[command(flatten)]
    pub service: ServiceOptions,
    #[command(flatten)]
    pub search: SearchOptions,
    /// Listen address
    #[arg(long, env = "MESHDEX_ADDR", default_value = "127.0.0.1:8000")]
    pub addr: String,
    /// Listen port, overrides the port of `--addr`
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,
    /// Maximum request body size in MiB
    #[arg(long, value_name = "MIB", default_value_t = 16)]
    pub body_limit: usize,
}

impl ServerCommand {
    fn listen_addr(&self) -> String {
        match self.port {
            Some(port) => {
                let host = self.addr.rsplit_once(':').map_or(self.addr.as_str(), |(host, _)| host);
                format!("{host}:{port}")
            }
            None => self.addr.clone(),
        }
    }
}

impl SubCommandExtend for ServerCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let catalog = CatalogBuilder::new(opts.data_dir.clone())
            .database_name(&opts.database_name)
            .service(self.service.clone())
            .open()
            .await?;

        let state = server::AppState::new(catalog, self.search);
        let app = server::create_app(state, self.body_limit * 1024 * 1024);

        let addr = self.listen_addr();
        info!("server running on http://{addr}");
        let listener = TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_overrides_addr() {
        let cmd = ServerCommand::parse_from(["server", "--addr", "0.0.0.0:8000", "--port", "3000"]);
        assert_eq!(cmd.listen_addr(), "0.0.0.0:3000");
    }
}
