use anyhow::Context;
use folio_core::UploadFile;
use folio_processing::content_type_for_filename;
use std::path::Path;

/// Initialize tracing for the CLI. Logs go to stderr so stdout stays JSON.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Read a file from disk, guessing its content type from the extension
pub fn read_upload_file(path: &Path) -> anyhow::Result<UploadFile> {
    let data = std::fs::read(path).with_context(|| format!("Read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid file name: {}", path.display()))?;

    Ok(UploadFile::new(
        file_name,
        content_type_for_filename(file_name),
        data,
    ))
}

/// Human-readable byte count (e.g. "1.5 MB")
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Text progress bar, e.g. `[#####     ]  50%`
pub fn progress_bar(percent: u8, width: usize) -> String {
    let percent = percent.min(100);
    let filled = width * percent as usize / 100;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        " ".repeat(width - filled),
        percent
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn progress_bar_bounds() {
        assert_eq!(progress_bar(0, 10), "[          ]   0%");
        assert_eq!(progress_bar(50, 10), "[#####     ]  50%");
        assert_eq!(progress_bar(100, 4), "[####] 100%");
        assert_eq!(progress_bar(250, 4), "[####] 100%");
    }

    #[test]
    fn read_upload_file_guesses_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Cover.PNG");
        std::fs::write(&path, b"png-bytes").unwrap();

        let file = read_upload_file(&path).unwrap();
        assert_eq!(file.file_name, "Cover.PNG");
        assert_eq!(file.content_type, "image/png");
        assert_eq!(file.size(), 9);
    }

    #[test]
    fn read_upload_file_missing() {
        let err = read_upload_file(Path::new("/nonexistent/a.jpg")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/a.jpg"));
    }
}
