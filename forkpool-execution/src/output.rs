//! Standard-output capture for the duration of one task invocation
//!
//! The capture swaps a temporary file over file descriptor 1, so everything
//! the task writes to the process's real standard output lands in the file
//! instead. A file backing (rather than a pipe) means a chatty task can never
//! deadlock against a full kernel buffer.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::fd::AsRawFd;

/// RAII capture of the process's standard output.
///
/// Between [`begin`](Self::begin) and [`finish`](Self::finish) fd 1 points at
/// a temporary file. Dropping a capture without finishing restores fd 1 and
/// discards the captured text.
#[derive(Debug)]
pub struct StdoutCapture {
    saved_stdout: libc::c_int,
    backing: File,
}

impl StdoutCapture {
    /// Redirect standard output into an unlinked temporary file
    pub fn begin() -> io::Result<Self> {
        io::stdout().flush()?;

        let backing = tempfile::tempfile()?;

        let saved_stdout = unsafe { libc::dup(libc::STDOUT_FILENO) };
        if saved_stdout < 0 {
            return Err(io::Error::last_os_error());
        }

        if unsafe { libc::dup2(backing.as_raw_fd(), libc::STDOUT_FILENO) } < 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(saved_stdout) };
            return Err(err);
        }

        Ok(Self {
            saved_stdout,
            backing,
        })
    }

    /// Restore standard output and return everything captured since `begin`
    pub fn finish(mut self) -> io::Result<String> {
        self.restore()?;

        let mut text = String::new();
        self.backing.seek(SeekFrom::Start(0))?;
        self.backing.read_to_string(&mut text)?;
        Ok(text)
    }

    fn restore(&mut self) -> io::Result<()> {
        if self.saved_stdout < 0 {
            return Ok(());
        }

        io::stdout().flush()?;

        let ret = unsafe { libc::dup2(self.saved_stdout, libc::STDOUT_FILENO) };
        unsafe { libc::close(self.saved_stdout) };
        self.saved_stdout = -1;

        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for StdoutCapture {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}
