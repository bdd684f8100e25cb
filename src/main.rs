use anyhow::Result;
use codevault::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
