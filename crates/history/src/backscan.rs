//! Reverse line reader.
//!
//! Reads a seekable source in fixed-size chunks from the end toward the
//! start, yielding lines last-first. Only the region actually consumed is
//! read, so pulling the newest few lines of a huge log is cheap.

use std::io::{self, Read, Seek, SeekFrom};

const CHUNK_SIZE: u64 = 4096;

/// Iterator over the lines of a source, last line first.
///
/// Line terminators (`\n`, `\r\n`) are stripped. A trailing newline yields
/// an empty first line; invalid UTF-8 is replaced lossily.
pub struct BackwardLines<R> {
    reader: R,
    /// Bytes in front of `buf` that have not been read yet.
    remaining: u64,
    /// Bytes read but not yet yielded; always starts at offset `remaining`.
    buf: Vec<u8>,
    chunk_size: u64,
    done: bool,
}

impl<R: Read + Seek> BackwardLines<R> {
    /// Scan the whole source.
    pub fn new(mut reader: R) -> io::Result<Self> {
        let len = reader.seek(SeekFrom::End(0))?;
        Ok(Self::with_len(reader, len))
    }

    /// Scan only the first `len` bytes, e.g. the size captured by a stat
    /// before reading, so bytes appended mid-scan are ignored.
    pub fn with_len(reader: R, len: u64) -> Self {
        Self {
            reader,
            remaining: len,
            buf: Vec::new(),
            chunk_size: CHUNK_SIZE,
            done: false,
        }
    }

    #[cfg(test)]
    fn chunk_size(mut self, size: u64) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    fn fill(&mut self) -> io::Result<()> {
        let n = self.chunk_size.min(self.remaining);
        let start = self.remaining - n;

        self.reader.seek(SeekFrom::Start(start))?;
        let mut chunk = vec![0u8; n as usize];
        self.reader.read_exact(&mut chunk)?;

        chunk.extend_from_slice(&self.buf);
        self.buf = chunk;
        self.remaining = start;
        Ok(())
    }
}

impl<R: Read + Seek> Iterator for BackwardLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            if let Some(pos) = self.buf.iter().rposition(|&b| b == b'\n') {
                let line = self.buf.split_off(pos + 1);
                self.buf.truncate(pos);
                return Some(Ok(decode(line)));
            }

            if self.remaining == 0 {
                self.done = true;
                return Some(Ok(decode(std::mem::take(&mut self.buf))));
            }

            if let Err(e) = self.fill() {
                self.done = true;
                return Some(Err(e));
            }
        }

        None
    }
}

fn decode(mut line: Vec<u8>) -> String {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    match String::from_utf8(line) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}
