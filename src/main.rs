use clap::Parser;
use meshdex::Opts;
use meshdex::cli::SubCommandExtend;
use meshdex::config::SubCommand;

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();

    match &opts.subcmd {
        SubCommand::Server(config) => config.run(&opts).await,
        SubCommand::Upload(config) => config.run(&opts).await,
        SubCommand::Search(config) => config.run(&opts).await,
        SubCommand::List(config) => config.run(&opts).await,
        SubCommand::Delete(config) => config.run(&opts).await,
        SubCommand::Download(config) => config.run(&opts).await,
        SubCommand::Transform(config) => config.run(&opts).await,
    }
}
