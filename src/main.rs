//! dmgpkg - convert macOS disk images into installer packages.
//!
//! Exit status: 0 on success, 1 when the input image is missing, 2 on usage
//! errors, 3 when the image holds nothing packageable, 130 when interrupted,
//! otherwise the status of the failing packaging tool.

use std::process;

#[tokio::main]
async fn main() {
    env_logger::init();

    let exit_code = dmgpkg::cli::run().await;
    process::exit(exit_code);
}
