//! Validate a config file.

use anyhow::{Context, Result};
use room_client::AdapterConfig;
use std::path::Path;

/// Run the check-config command.
pub fn run(path: &Path) -> Result<()> {
    let config = AdapterConfig::from_file(path)
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;

    println!("=== {} ===", path.display());
    print!("{}", config.to_toml_string()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn valid_config_passes() {
        let file = config_file("app = \"arena\"\nroom = \"lobby\"\n\n[clock]\nmax_samples = 5\n");
        assert!(run(file.path()).is_ok());
    }

    #[test]
    fn empty_config_uses_defaults() {
        let file = config_file("");
        assert!(run(file.path()).is_ok());
    }

    #[test]
    fn zero_samples_rejected() {
        let file = config_file("[clock]\nmax_samples = 0\n");

        let err = run(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("max_samples"));
    }

    #[test]
    fn malformed_toml_rejected() {
        let file = config_file("room = [unterminated");
        assert!(run(file.path()).is_err());
    }

    #[test]
    fn missing_file_rejected() {
        let err = run(Path::new("/nonexistent/roomlink.toml")).unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/roomlink.toml"));
    }
}
