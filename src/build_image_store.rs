use clap::Parser;
use log::{error, info, warn};

use htr_corpus::{run_store_build, StoreArgs};

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = StoreArgs::parse();

    if let Some(jobs) = args.jobs {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
        {
            warn!("Could not size the decoding pool to {} threads: {}", jobs, e);
        }
    }

    let config = args.to_config();
    info!("Starting the image store build...");

    if let Err(e) = run_store_build(&config) {
        error!("Failed to build image store: {}", e);
        std::process::exit(1);
    }
}
