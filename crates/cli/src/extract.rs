use std::path::PathBuf;
use tracing::info;

pub fn run(
    jar: PathBuf,
    destination: PathBuf,
    skip_empty_dirs: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    rejar_core::extract::extract(&jar, &destination, !skip_empty_dirs)?;
    info!("Extracted {} into {}", jar.display(), destination.display());
    Ok(())
}
