//! ANP agent HTTP entrypoint.

use std::process;

#[tokio::main]
async fn main() {
    if let Err(error) = anp_rs::run().await {
        eprintln!("{error}");
        process::exit(1);
    }
}
