use anyhow::anyhow;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    init_tracing()?;
    if let Err(e) = datatrace::run() {
        eprintln!("Error [{}]: {}", e.kind(), e);
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_env("DATATRACE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}
