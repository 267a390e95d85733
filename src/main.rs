#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = testquest::run().await {
        eprintln!("testquest fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
