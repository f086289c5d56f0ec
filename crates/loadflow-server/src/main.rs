use loadflow_server::config::{self, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    loadflow_server::init_tracing();

    let config = ServerConfig::from_env();
    loadflow_server::serve(config).await
}
