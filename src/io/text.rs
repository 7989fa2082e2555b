//! # Plain-Text File Handles
//!
//! Every interchange file is delimited text. Readers transparently decompress
//! `.gz` input; a missing file is always a hard error.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{AbacusError, Result};

fn is_gzipped(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "gz" || e == "bgz")
        .unwrap_or(false)
}

/// Open a text file for buffered line reading
pub fn open_reader(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AbacusError::file_not_found(path),
        _ => AbacusError::Io(e),
    })?;

    let reader: Box<dyn BufRead + Send> = if is_gzipped(path) {
        Box::new(BufReader::new(MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(reader)
}

/// Create (truncate) a text file for buffered writing
pub fn create_writer(path: &Path) -> Result<Box<dyn Write + Send>> {
    let file = File::create(path)?;

    let writer: Box<dyn Write + Send> = if is_gzipped(path) {
        Box::new(BufWriter::new(GzEncoder::new(file, Compression::default())))
    } else {
        Box::new(BufWriter::new(file))
    };
    Ok(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_gzip_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lines.txt.gz");
        {
            let mut w = create_writer(&path).unwrap();
            writeln!(w, "hello").unwrap();
            writeln!(w, "world").unwrap();
            w.flush().unwrap();
        }
        let mut contents = String::new();
        open_reader(&path).unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "hello\nworld\n");
    }

    #[test]
    fn test_missing_file() {
        let err = open_reader(Path::new("/nonexistent/input.haps")).err();
        assert!(matches!(err, Some(AbacusError::FileNotFound { .. })));
    }
}
