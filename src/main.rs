use anyhow::Result;
use mssql_exporter::cli::{actions, start};

#[tokio::main]
async fn main() -> Result<()> {
    let action = start::start()?;

    actions::run::handle(action).await?;

    Ok(())
}
