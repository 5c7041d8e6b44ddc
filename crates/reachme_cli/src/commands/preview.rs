//! Preview command implementation.

use reachme_push::derive_preview;
use std::path::Path;

/// Runs the preview command.
pub fn run(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let payload =
        std::fs::read(file).map_err(|e| format!("cannot read {}: {}", file.display(), e))?;
    match derive_preview(&payload) {
        Some(preview) => {
            println!("{}", preview.title);
            println!("{}", preview.body);
        }
        None => println!("No notification for this payload"),
    }
    Ok(())
}
