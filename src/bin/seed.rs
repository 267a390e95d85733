#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = testquest::run_seed().await {
        eprintln!("testquest-seed fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
