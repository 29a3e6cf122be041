//! Progress indicators for chunk batches
//!
//! Bars draw to stderr and hide themselves when stderr is not a terminal.

use indicatif::{ProgressBar, ProgressStyle};

/// Create a progress bar counting chunks
pub fn create_chunk_progress(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} chunks ({eta})")
            .expect("Invalid progress bar template")
            .progress_chars("#>-"),
    );
    pb.set_message(message.to_string());
    pb
}

/// Create a spinner for a single lifecycle request
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("Invalid spinner template"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_chunk_progress() {
        let pb = create_chunk_progress(12, "Allocating chunks");
        assert_eq!(pb.length(), Some(12));
        pb.inc(3);
        assert_eq!(pb.position(), 3);
    }

    #[test]
    fn test_create_spinner() {
        let pb = create_spinner("Starting transaction");
        assert!(!pb.is_finished());
        pb.finish_and_clear();
    }
}
