use anyhow::Result;
use convertease_api::setup;
use convertease_core::Config;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    let (state, app) = setup::initialize_app(config.clone()).await?;

    setup::server::start_server(&config, app, state).await
}
