pub mod srt;

pub use srt::{parse_srt, CueSource, SrtSource};

use anyhow::{Context, Result};
use std::path::Path;

/// Subtitle format detection result
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputFormat {
    Srt,
    Unknown,
}

/// Detect the format of subtitle text by looking at its first block
pub fn detect_format(text: &str) -> InputFormat {
    let mut lines = text
        .trim_start_matches('\u{feff}')
        .lines()
        .map(str::trim)
        .skip_while(|l| l.is_empty());

    let index = lines.next().unwrap_or_default();
    let timing = lines.next().unwrap_or_default();

    if !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()) && timing.contains("-->") {
        InputFormat::Srt
    } else {
        InputFormat::Unknown
    }
}

/// Read a subtitle file from disk as text
pub fn load_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read subtitle file {}", path.display()))?;

    let text = String::from_utf8(data)
        .with_context(|| format!("Subtitle file {} is not valid UTF-8", path.display()))?;

    if detect_format(&text) == InputFormat::Unknown {
        tracing::warn!("{} does not look like a numbered subtitle file", path.display());
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_detect_format() {
        assert_eq!(
            detect_format("1\n00:00:01,000 --> 00:00:02,000\nHi"),
            InputFormat::Srt
        );
        assert_eq!(
            detect_format("\u{feff}\n\n12\r\n00:00:01,000 --> 00:00:02,000\r\n"),
            InputFormat::Srt
        );
        assert_eq!(detect_format("WEBVTT\n\n00:01.000 --> 00:02.000"), InputFormat::Unknown);
        assert_eq!(detect_format(""), InputFormat::Unknown);
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "1\n00:00:01,000 --> 00:00:02,000\nHi\n").unwrap();

        let text = load_file(file.path()).unwrap();
        assert_eq!(parse_srt(&text).len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_file("/definitely/not/here.srt").unwrap_err();
        assert!(err.to_string().contains("Failed to read subtitle file"));
    }
}
