use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template(&format!(
            "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
            label
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// Create a spinner for streams whose length is not known up front
pub fn create_spinner(label: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template(&format!(
            "{{spinner:.green}} [{}] [{{elapsed_precise}}] {{pos}} records {{msg}}",
            label
        ))
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb
}

/// Create an output directory if needed, leaving existing contents alone
pub fn create_output_directory(path: &Path) -> std::io::Result<std::path::PathBuf> {
    if !path.exists() {
        log::debug!("Creating output directory {:?}", path);
        fs::create_dir_all(path)?;
    }
    Ok(path.to_path_buf())
}
