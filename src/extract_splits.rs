use clap::Parser;
use log::{error, info};

use htr_corpus::{run_extraction, SplitArgs};

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = SplitArgs::parse();
    let config = args.to_config();

    info!("Starting the split extraction...");

    if let Err(e) = run_extraction(&config) {
        error!("Failed to extract split annotations: {}", e);
        std::process::exit(1);
    }
}
