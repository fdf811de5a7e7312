//! Named pipe plumbing.
//!
//! Creation and removal of the FIFOs, non-blocking opens, and a line reader
//! that waits for input with `poll(2)` so reads can be bounded by a timeout.

use std::ffi::CString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt};
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::time::{Duration, Instant};

/// Replace whatever is at `path` with a fresh named pipe.
pub fn create_pipe(path: &Path) -> io::Result<()> {
    if fs::symlink_metadata(path).is_ok() {
        fs::remove_file(path)?;
        log::debug!("Removed existing file at {}", path.display());
    }

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    // SAFETY: c_path is a valid NUL-terminated string for the duration of the call.
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    log::info!("Created pipe: {}", path.display());
    Ok(())
}

pub fn create_pipes(paths: &[&Path]) -> io::Result<()> {
    for path in paths {
        create_pipe(path)?;
    }
    Ok(())
}

/// Remove a pipe. Missing files are not an error.
pub fn remove_pipe(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            log::debug!("Removed pipe: {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

pub fn remove_pipes(paths: &[&Path]) -> io::Result<()> {
    for path in paths {
        remove_pipe(path)?;
    }
    Ok(())
}

pub fn is_fifo(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_fifo())
        .unwrap_or(false)
}

/// Open the write end without blocking.
///
/// Fails with `ENXIO` while nobody has the pipe open for reading. On success
/// the handle is switched back to blocking writes.
pub fn open_writer(path: &Path) -> io::Result<File> {
    let file = OpenOptions::new()
        .write(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)?;
    set_nonblocking(&file, false)?;
    Ok(file)
}

/// Open the read end without blocking. Succeeds even if no writer exists yet.
pub fn open_reader(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
}

fn set_nonblocking(file: &File, nonblocking: bool) -> io::Result<()> {
    let fd = file.as_raw_fd();
    // SAFETY: fd is owned by `file` and stays open for both calls.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    let flags = if nonblocking {
        flags | libc::O_NONBLOCK
    } else {
        flags & !libc::O_NONBLOCK
    };
    // SAFETY: as above.
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Wait until `file` is readable (or hung up). `timeout_ms < 0` waits forever.
fn poll_readable(file: &File, timeout_ms: i32) -> io::Result<bool> {
    let mut pfd = libc::pollfd {
        fd: file.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };
    // SAFETY: pfd is a single valid pollfd that outlives the call.
    let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }
    Ok(rc > 0)
}

/// Result of a bounded line read.
#[derive(Debug, PartialEq, Eq)]
pub enum LineRead {
    Line(String),
    TimedOut,
    /// The writer went away.
    Eof,
}

/// Longest record accepted before the input is treated as garbage.
pub const MAX_LINE_BYTES: usize = 1 << 20;

/// Buffered reader yielding one `\n`-terminated record at a time.
pub struct LineReader {
    file: File,
    pending: Vec<u8>,
    max_line: usize,
}

impl LineReader {
    pub fn new(file: File) -> Self {
        Self {
            file,
            pending: Vec::new(),
            max_line: MAX_LINE_BYTES,
        }
    }

    pub fn set_max_line(&mut self, max_line: usize) {
        self.max_line = max_line;
    }

    /// Read the next line, waiting at most `timeout` (`None` waits forever).
    ///
    /// Partial input stays buffered across calls.
    pub fn read_line(&mut self, timeout: Option<Duration>) -> io::Result<LineRead> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if let Some(line) = self.take_line()? {
                return Ok(LineRead::Line(line));
            }

            let wait_ms = match deadline {
                None => -1,
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(LineRead::TimedOut);
                    }
                    let remaining = (deadline - now).as_millis().max(1);
                    i32::try_from(remaining).unwrap_or(i32::MAX)
                }
            };

            if !poll_readable(&self.file, wait_ms)? {
                continue;
            }
            if !self.fill()? {
                return Ok(LineRead::Eof);
            }
        }
    }

    fn take_line(&mut self) -> io::Result<Option<String>> {
        let Some(pos) = self.pending.iter().position(|&b| b == b'\n') else {
            return Ok(None);
        };
        let rest = self.pending.split_off(pos + 1);
        let mut line = std::mem::replace(&mut self.pending, rest);
        line.pop();
        String::from_utf8(line)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Read whatever is available. Returns `false` only on end of stream.
    ///
    /// An unterminated record longer than `max_line` is dropped as `InvalidData`.
    fn fill(&mut self) -> io::Result<bool> {
        let mut buf = [0u8; 4096];
        loop {
            match self.file.read(&mut buf) {
                Ok(0) => return Ok(false),
                Ok(n) => {
                    self.pending.extend_from_slice(&buf[..n]);
                    if self.pending.len() > self.max_line && !self.pending.contains(&b'\n') {
                        let max = self.max_line;
                        self.pending.clear();
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("record exceeds {max} bytes without a newline"),
                        ));
                    }
                    return Ok(true);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                // Spurious wakeup, the caller polls again.
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(true),
                Err(e) => return Err(e),
            }
        }
    }
}
