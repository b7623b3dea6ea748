//! Line-by-line reading of a file from its last line to its first.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Reads a file backwards in fixed-size chunks.
///
/// Each refill reads the chunk preceding the current offset, appends the
/// partial first line carried over from the previous chunk, and splits on
/// `\n`. The first element of the split may continue in the next chunk, so
/// it becomes the new carry; the rest are complete lines, handed out last to
/// first. Once offset 0 is reached the carry is the file's first line.
///
/// The file handle is released when the reader is dropped.
#[derive(Debug)]
pub struct ReverseLineReader {
    file: File,
    offset: u64,
    chunk_size: usize,
    carry: Vec<u8>,
    lines: Vec<Vec<u8>>,
    started: bool,
    finished: bool,
}

impl ReverseLineReader {
    pub fn open(path: &Path) -> io::Result<Self> {
        Self::with_chunk_size(path, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(path: &Path, chunk_size: usize) -> io::Result<Self> {
        if chunk_size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "chunk size must be greater than 0",
            ));
        }
        let file = File::open(path)?;
        let offset = file.metadata()?.len();
        Ok(Self {
            file,
            offset,
            chunk_size,
            carry: Vec::new(),
            lines: Vec::new(),
            started: false,
            finished: offset == 0,
        })
    }

    /// Returns the line preceding the last one returned, starting with the
    /// file's last line. `Ok(None)` marks the beginning of the file.
    ///
    /// Lines are returned without their `\n`. A single trailing newline at
    /// the end of the file does not produce an empty line.
    pub fn read_previous_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.read_previous_line_bytes()?.map(decode))
    }

    /// Same as [`ReverseLineReader::read_previous_line`] but returns the
    /// line's bytes as stored, without UTF-8 replacement.
    pub fn read_previous_line_bytes(&mut self) -> io::Result<Option<Vec<u8>>> {
        loop {
            if let Some(line) = self.lines.pop() {
                return Ok(Some(line));
            }
            if self.finished {
                return Ok(None);
            }
            if self.offset == 0 {
                self.finished = true;
                return Ok(Some(std::mem::take(&mut self.carry)));
            }
            self.fill()?;
        }
    }

    fn fill(&mut self) -> io::Result<()> {
        let size = (self.chunk_size as u64).min(self.offset);
        self.offset -= size;
        self.file.seek(SeekFrom::Start(self.offset))?;

        let mut buf = vec![0u8; size as usize];
        self.file.read_exact(&mut buf)?;
        buf.append(&mut self.carry);

        // Only the end of the file carries a terminating newline to drop.
        if !self.started {
            if buf.last() == Some(&b'\n') {
                buf.pop();
            }
            self.started = true;
        }

        let mut parts = buf.split(|b| *b == b'\n');
        self.carry = parts.next().map(<[u8]>::to_vec).unwrap_or_default();
        self.lines = parts.map(<[u8]>::to_vec).collect();
        Ok(())
    }
}

fn decode(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

impl Iterator for ReverseLineReader {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_previous_line().transpose()
    }
}

/// Returns the last `n` lines of a file in file order. Files with fewer
/// lines are returned whole.
pub fn tail(path: &Path, n: usize) -> io::Result<Vec<String>> {
    let mut reader = ReverseLineReader::open(path)?;
    let mut lines = Vec::with_capacity(n);
    while lines.len() < n {
        match reader.read_previous_line()? {
            Some(line) => lines.push(line),
            None => break,
        }
    }
    lines.reverse();
    Ok(lines)
}
