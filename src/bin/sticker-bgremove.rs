//! Sticker background removal CLI tool
//!
//! Command-line interface for cutting the subject out of an image with the
//! sticker-bgremove library, using the Tract or ONNX Runtime backend.

#[cfg(feature = "cli")]
use sticker_bgremove::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
