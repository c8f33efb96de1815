use std::sync::Arc;

use clap::Parser;

use catalogd::api::{self, AppState};
use catalogd::cli::{Args, Command};
use catalogd::processor::{Processor, RandomHeadChecker};
use catalogd::store::{EventStore, InMemoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Hello => {
            println!("Hello, World!");
            Ok(())
        },
        Command::Server { host, port } => {
            catalogd::tracing::initialize()?;

            let store: Arc<dyn EventStore> = Arc::new(InMemoryStore::new());
            let processor = Processor::new(store.clone(), Arc::new(RandomHeadChecker));

            let app = api::router(AppState { store, processor });

            let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
            tracing::info!(%host, port, "catalog service listening");

            axum::serve(listener, app).await?;

            Ok(())
        },
    }
}
