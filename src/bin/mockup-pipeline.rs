//! Mockup pipeline CLI
//!
//! Compositing, background removal, thumbnail normalization and filesystem
//! reconciliation tools built on the mockup-pipeline library.

#[cfg(feature = "cli")]
use mockup_pipeline::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> std::process::ExitCode {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
