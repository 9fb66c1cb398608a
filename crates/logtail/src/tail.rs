//! Bounded-memory tail reads over plain and gzip-compressed files.
//!
//! Plain files are read backwards from the end in fixed-size chunks, so only
//! the requested lines are ever held in memory. Compressed streams cannot seek
//! and are read forward with a trimmed ring of candidate lines.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::error::{LogTailError, Result};

/// Upper bound on the line buffer reserved before any line has been read.
const INITIAL_LINE_CAPACITY: usize = 1024;

/// Opens a file for forward line reading, decompressing `.gz` transparently.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or is a `.zip` archive.
pub fn open_lines(path: &Path) -> Result<LineIter> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let file = File::open(path)?;
    let reader: Box<dyn BufRead + Send> = match ext.as_deref() {
        Some("gz") => Box::new(BufReader::new(MultiGzDecoder::new(file))),
        Some("zip") => {
            return Err(LogTailError::Io(io::Error::new(
                io::ErrorKind::Unsupported,
                "unsupported archive format: zip",
            )));
        }
        _ => Box::new(BufReader::new(file)),
    };
    Ok(LineIter::new(reader))
}

/// Decodes one line of raw bytes, dropping the trailing `\n` and `\r`.
pub(crate) fn decode_line(mut bytes: &[u8]) -> String {
    if let [rest @ .., b'\n'] = bytes {
        bytes = rest;
    }
    if let [rest @ .., b'\r'] = bytes {
        bytes = rest;
    }
    String::from_utf8_lossy(bytes).into_owned()
}

/// Forward line iterator with lossy UTF-8 decoding per complete line.
pub struct LineIter {
    reader: Box<dyn BufRead + Send>,
    buf: Vec<u8>,
}

impl LineIter {
    fn new(reader: Box<dyn BufRead + Send>) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(256),
        }
    }
}

impl Iterator for LineIter {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => Some(Ok(decode_line(&self.buf))),
            Err(e) => Some(Err(e)),
        }
    }
}

/// Returns the last lines of a file without reading all of it when possible.
#[derive(Debug, Clone, Copy)]
pub struct TailReader {
    chunk_size: usize,
}

impl Default for TailReader {
    fn default() -> Self {
        Self::new()
    }
}

impl TailReader {
    const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

    /// Creates a reader with the default backward chunk size.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
        }
    }

    /// Creates a reader with a custom backward chunk size (minimum 1 byte).
    #[must_use]
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Returns up to `num_lines` trailing lines, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error on read, seek or decompression failure.
    pub fn last_lines(&self, path: &Path, num_lines: usize) -> Result<Vec<String>> {
        if num_lines == 0 {
            return Ok(Vec::new());
        }

        let is_compressed = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("gz") || ext.eq_ignore_ascii_case("zip"));

        if is_compressed {
            Self::last_lines_forward(path, num_lines)
        } else {
            self.last_lines_backward(path, num_lines)
        }
    }

    fn last_lines_backward(&self, path: &Path, num_lines: usize) -> Result<Vec<String>> {
        let mut file = File::open(path)?;
        let mut pos = file.metadata()?.len();
        if pos == 0 {
            return Ok(Vec::new());
        }

        // Lines collected newest first; `current` holds the bytes of the line
        // being assembled, in reverse.
        let mut lines: Vec<String> = Vec::with_capacity(num_lines.min(INITIAL_LINE_CAPACITY));
        let mut current: Vec<u8> = Vec::new();
        let mut chunk = vec![0u8; self.chunk_size];
        let mut skip_trailing_newline = true;

        while pos > 0 {
            let read_size = (pos as usize).min(self.chunk_size);
            pos -= read_size as u64;
            file.seek(SeekFrom::Start(pos))?;
            file.read_exact(&mut chunk[..read_size])?;

            for &byte in chunk[..read_size].iter().rev() {
                if skip_trailing_newline {
                    skip_trailing_newline = false;
                    if byte == b'\n' {
                        continue;
                    }
                }
                if byte == b'\n' {
                    lines.push(Self::finish_line(&mut current));
                    if lines.len() == num_lines {
                        lines.reverse();
                        return Ok(lines);
                    }
                } else {
                    current.push(byte);
                }
            }
        }

        // Start of file: the earliest line has no newline before it.
        lines.push(Self::finish_line(&mut current));
        lines.reverse();
        Ok(lines)
    }

    fn finish_line(current: &mut Vec<u8>) -> String {
        current.reverse();
        let line = decode_line(current);
        current.clear();
        line
    }

    fn last_lines_forward(path: &Path, num_lines: usize) -> Result<Vec<String>> {
        let limit = num_lines.saturating_mul(2);
        let mut window: VecDeque<String> = VecDeque::with_capacity(limit.min(INITIAL_LINE_CAPACITY));

        for line in open_lines(path)? {
            window.push_back(line?);
            if window.len() > limit {
                let excess = window.len() - num_lines;
                window.drain(..excess);
            }
        }

        let skip = window.len().saturating_sub(num_lines);
        Ok(window.into_iter().skip(skip).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_plain(dir: &TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).expect("write");
        path
    }

    fn write_gz(dir: &TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut encoder = GzEncoder::new(File::create(&path).expect("create"), Compression::default());
        encoder.write_all(content).expect("compress");
        encoder.finish().expect("finish");
        path
    }

    fn forward_suffix(path: &Path, n: usize) -> Vec<String> {
        let all: Vec<String> = open_lines(path)
            .expect("open")
            .collect::<io::Result<_>>()
            .expect("read");
        let skip = all.len().saturating_sub(n);
        all.into_iter().skip(skip).collect()
    }

    #[test]
    fn empty_file_yields_nothing() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_plain(&dir, "empty.log", b"");
        assert!(TailReader::new().last_lines(&path, 50).expect("tail").is_empty());
    }

    #[test]
    fn returns_last_lines_oldest_first() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_plain(&dir, "app.log", b"one\ntwo\nthree\nfour\n");
        let lines = TailReader::new().last_lines(&path, 2).expect("tail");
        assert_eq!(lines, vec!["three", "four"]);
    }

    #[test]
    fn includes_earliest_partial_line() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_plain(&dir, "app.log", b"first\nsecond");
        let lines = TailReader::new().last_lines(&path, 10).expect("tail");
        assert_eq!(lines, vec!["first", "second"]);
    }

    #[test]
    fn discards_carriage_returns() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_plain(&dir, "app.log", b"a\r\nb\r\nc\r\n");
        let lines = TailReader::new().last_lines(&path, 2).expect("tail");
        assert_eq!(lines, vec!["b", "c"]);
    }

    #[test]
    fn multibyte_characters_across_chunk_boundaries() {
        let dir = TempDir::new().expect("tempdir");
        let content = "로그 한 줄\nünïcödé ✓\n日本語のログ\n";
        let path = write_plain(&dir, "app.log", content.as_bytes());
        let lines = TailReader::with_chunk_size(3).last_lines(&path, 3).expect("tail");
        assert_eq!(lines, vec!["로그 한 줄", "ünïcödé ✓", "日本語のログ"]);
    }

    #[test]
    fn gzip_tail() {
        let dir = TempDir::new().expect("tempdir");
        let content: String = (1..=1000).map(|i| format!("line {i}\n")).collect();
        let path = write_gz(&dir, "app.1.log.gz", content.as_bytes());
        let lines = TailReader::new().last_lines(&path, 3).expect("tail");
        assert_eq!(lines, vec!["line 998", "line 999", "line 1000"]);
    }

    #[test]
    fn gzip_shorter_than_request() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_gz(&dir, "app.1.log.gz", b"only\n");
        assert_eq!(TailReader::new().last_lines(&path, 10).expect("tail"), vec!["only"]);
    }

    #[test]
    fn zip_is_unsupported() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_plain(&dir, "old.zip", b"PK");
        let err = TailReader::new().last_lines(&path, 10).expect_err("zip");
        assert!(matches!(err, LogTailError::Io(ref e) if e.kind() == io::ErrorKind::Unsupported));
    }

    #[test]
    fn huge_request_returns_available_lines() {
        let dir = TempDir::new().expect("tempdir");
        let plain = write_plain(&dir, "app.log", b"a\nb\n");
        let gz = write_gz(&dir, "app.log.gz", b"a\nb\n");
        let reader = TailReader::new();

        assert_eq!(reader.last_lines(&plain, usize::MAX / 64).expect("tail"), vec!["a", "b"]);
        assert_eq!(reader.last_lines(&gz, usize::MAX).expect("tail"), vec!["a", "b"]);
    }

    #[test]
    fn zero_lines_requested() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_plain(&dir, "app.log", b"a\nb\n");
        assert!(TailReader::new().last_lines(&path, 0).expect("tail").is_empty());
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = TempDir::new().expect("tempdir");
        let err = TailReader::new()
            .last_lines(&dir.path().join("nope.log"), 5)
            .expect_err("missing");
        assert!(matches!(err, LogTailError::Io(_)));
    }

    proptest! {
        #[test]
        fn plain_tail_equals_forward_suffix(
            lines in prop::collection::vec("[a-z\u{e9}\u{4e2d} ]{0,12}", 0..40),
            trailing_newline in any::<bool>(),
            n in 0usize..50,
            chunk in 1usize..64,
        ) {
            let dir = TempDir::new().expect("tempdir");
            let mut content = lines.join("\n");
            if trailing_newline && !content.is_empty() {
                content.push('\n');
            }
            let path = write_plain(&dir, "app.log", content.as_bytes());

            let tailed = TailReader::with_chunk_size(chunk).last_lines(&path, n).expect("tail");
            prop_assert!(tailed.len() <= n);
            prop_assert_eq!(tailed, forward_suffix(&path, n));
        }

        #[test]
        fn gzip_tail_equals_forward_suffix(
            lines in prop::collection::vec("[a-z0-9 ]{0,12}", 0..60),
            n in 0usize..20,
        ) {
            let dir = TempDir::new().expect("tempdir");
            let content = lines.iter().map(|l| format!("{l}\n")).collect::<String>();
            let path = write_gz(&dir, "app.log.gz", content.as_bytes());

            let tailed = TailReader::new().last_lines(&path, n).expect("tail");
            prop_assert!(tailed.len() <= n);
            prop_assert_eq!(tailed, forward_suffix(&path, n));
        }
    }
}
