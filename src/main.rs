use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "guest-shim",
    version,
    about = "Run a WebAssembly module's wasm_main against the env sys_* host calls."
)]
struct Cli {
    /// Path to the guest module (.wasm)
    module: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("guest_shim=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("guest-shim starting with {}", cli.module.display());

    let report = guest_shim::wasm::run(&cli.module)
        .with_context(|| format!("running {}", cli.module.display()))?;

    if let Some(trap) = report.trap {
        anyhow::bail!("guest trapped: {trap}");
    }
    Ok(())
}
