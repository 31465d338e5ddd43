use clap::Parser;
use whep_viewer_lib::ViewerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    whep_viewer_lib::run(ViewerConfig::parse()).await
}
