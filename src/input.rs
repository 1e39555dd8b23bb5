use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Open a text input, transparently decompressing `.gz` files
pub fn open_input<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;

    // Check by file extension (faster than reading magic bytes)
    let is_compressed = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext == "gz" || ext == "bgz")
        .unwrap_or(false);

    if is_compressed {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_reads_plain_and_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("names.txt");
        std::fs::write(&plain, "a\nb\n").unwrap();

        let gz = dir.path().join("names.txt.gz");
        let mut encoder = GzEncoder::new(File::create(&gz).unwrap(), Compression::default());
        encoder.write_all(b"a\nb\n").unwrap();
        encoder.finish().unwrap();

        for path in [plain, gz] {
            let lines: Vec<String> = open_input(&path)
                .unwrap()
                .lines()
                .collect::<std::io::Result<_>>()
                .unwrap();
            assert_eq!(lines, vec!["a", "b"]);
        }
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = open_input("/nonexistent/taxmatch/input.tsv").err().unwrap();
        assert!(err.to_string().contains("/nonexistent/taxmatch/input.tsv"));
    }
}
