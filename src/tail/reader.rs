//! Incremental reader for a single growing log file.

use crate::error::TailError;
use crate::session::LogKind;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Upper bound on bytes consumed by one `read_new_lines` call.
pub const MAX_READ_BYTES: u64 = 8 * 1024 * 1024;

/// Where a freshly attached reader starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    /// Replay everything already in the file.
    Beginning,
    /// Skip existing content and only report lines appended from now on.
    End,
}

/// Snapshot of a monitored file's read position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredFile {
    pub path: PathBuf,
    pub kind: LogKind,
    /// Byte offset just past the last line handed out.
    pub offset: u64,
    /// File size observed by the last read.
    pub last_size: u64,
}

#[derive(Debug, Default)]
struct Cursor {
    offset: u64,
    last_size: u64,
}

/// Hands out the lines appended to a file since the previous call.
///
/// The cursor is only ever advanced here, under its own lock, so the
/// watcher and the poll timer can both call [`read_new_lines`] and the
/// second caller simply finds nothing new.
///
/// [`read_new_lines`]: LineReader::read_new_lines
#[derive(Debug)]
pub struct LineReader {
    path: PathBuf,
    kind: LogKind,
    cursor: Mutex<Cursor>,
}

impl LineReader {
    pub fn new(path: impl Into<PathBuf>, kind: LogKind, start: StartPosition) -> Self {
        let path = path.into();
        let cursor = match start {
            StartPosition::Beginning => Cursor::default(),
            StartPosition::End => {
                let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                Cursor {
                    offset: size,
                    last_size: size,
                }
            }
        };

        Self {
            path,
            kind,
            cursor: Mutex::new(cursor),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> LogKind {
        self.kind
    }

    pub fn monitored(&self) -> MonitoredFile {
        let cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        MonitoredFile {
            path: self.path.clone(),
            kind: self.kind,
            offset: cursor.offset,
            last_size: cursor.last_size,
        }
    }

    /// Read every complete line appended since the last call, in file order.
    ///
    /// - A missing file yields no lines and leaves the cursor alone.
    /// - A file smaller than last time was rotated or truncated: it is
    ///   read again from offset 0.
    /// - A trailing line without its newline is left for the next call.
    pub fn read_new_lines(&self) -> Result<Vec<String>, TailError> {
        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);

        let size = match fs::metadata(&self.path) {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TailError::io(&self.path, e)),
        };

        if size < cursor.last_size || size < cursor.offset {
            tracing::info!(
                path = %self.path.display(),
                old_size = cursor.last_size,
                new_size = size,
                "log file shrank, reading from start"
            );
            cursor.offset = 0;
        }
        cursor.last_size = size;

        if size == cursor.offset {
            return Ok(Vec::new());
        }

        let mut file = match open_shared(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TailError::io(&self.path, e)),
        };
        file.seek(SeekFrom::Start(cursor.offset))
            .map_err(|e| TailError::io(&self.path, e))?;

        let pending = size - cursor.offset;
        let budget = pending.min(MAX_READ_BYTES);
        let mut reader = BufReader::new(file.take(budget));
        let (lines, consumed) = read_complete_lines(&mut reader, pending > budget)
            .map_err(|e| TailError::io(&self.path, e))?;

        cursor.offset += consumed;
        tracing::debug!(
            kind = %self.kind,
            lines = lines.len(),
            offset = cursor.offset,
            "read new lines"
        );
        Ok(lines)
    }

    /// Consume whatever follows the last complete line, for a file that is
    /// known to be finished. Returns `None` if nothing (or only blanks) is
    /// left.
    pub fn read_trailing_line(&self) -> Result<Option<String>, TailError> {
        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);

        let size = match fs::metadata(&self.path) {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(TailError::io(&self.path, e)),
        };
        if size <= cursor.offset {
            return Ok(None);
        }

        let mut file = open_shared(&self.path).map_err(|e| TailError::io(&self.path, e))?;
        file.seek(SeekFrom::Start(cursor.offset))
            .map_err(|e| TailError::io(&self.path, e))?;
        let mut raw = Vec::new();
        let consumed = file
            .take((size - cursor.offset).min(MAX_READ_BYTES))
            .read_to_end(&mut raw)
            .map_err(|e| TailError::io(&self.path, e))?;

        cursor.offset += consumed as u64;
        cursor.last_size = size;

        let mut lines = Vec::new();
        push_line(&mut lines, &raw);
        Ok(lines.pop())
    }

    /// Hold the cursor lock for `hold`, calling `locked` once it is taken.
    #[cfg(test)]
    pub(crate) fn hold_cursor(&self, hold: std::time::Duration, locked: impl FnOnce()) {
        let _cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        locked();
        std::thread::sleep(hold);
    }
}

/// Read newline-terminated lines until the stream ends.
///
/// Returns the non-empty lines and the number of bytes they occupied. An
/// unterminated tail is not consumed, unless `capped` says the stream was
/// cut short and no complete line fit, in which case it is taken as is so
/// an oversized line cannot stall the reader.
fn read_complete_lines<R: BufRead>(reader: &mut R, capped: bool) -> io::Result<(Vec<String>, u64)> {
    let mut lines = Vec::new();
    let mut consumed = 0u64;
    let mut buf = Vec::new();
    let mut saw_complete = false;

    loop {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf)?;
        if n == 0 {
            break;
        }
        if buf.last() != Some(&b'\n') {
            if capped && !saw_complete {
                consumed += n as u64;
                push_line(&mut lines, &buf);
            }
            break;
        }
        saw_complete = true;
        consumed += n as u64;
        push_line(&mut lines, &buf);
    }

    Ok((lines, consumed))
}

fn push_line(lines: &mut Vec<String>, raw: &[u8]) {
    let text = String::from_utf8_lossy(raw);
    let line = text.trim_end_matches(['\r', '\n']);
    if !line.trim().is_empty() {
        lines.push(line.to_string());
    }
}

/// Open for reading while the game keeps writing (and may rotate) the file.
#[cfg(windows)]
fn open_shared(path: &Path) -> io::Result<File> {
    use std::fs::OpenOptions;
    use std::os::windows::fs::OpenOptionsExt;

    const FILE_SHARE_READ: u32 = 0x1;
    const FILE_SHARE_WRITE: u32 = 0x2;
    const FILE_SHARE_DELETE: u32 = 0x4;

    OpenOptions::new()
        .read(true)
        .share_mode(FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE)
        .open(path)
}

#[cfg(not(windows))]
fn open_shared(path: &Path) -> io::Result<File> {
    File::open(path)
}
