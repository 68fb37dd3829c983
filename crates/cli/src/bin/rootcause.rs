use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    rootcause_cli::main_entry().await
}
