#![cfg(unix)]

use std::io;
use std::os::fd::AsRawFd;

use crate::executor::open_redirect_file;
use crate::redirect::{RedirectTarget, RedirectionSet};

/// One rebound stdio stream: which fd was replaced and a duplicate of
/// what it pointed to before.
struct SavedFd {
    stdio_fd: libc::c_int,
    saved_fd: libc::c_int,
}

/// RAII guard that rebinds the shell's own stdio fds for a builtin.
///
/// For each redirection: open the target, `dup` the stdio fd, `dup2`
/// the file over it, close the file fd. Dropping the guard restores the
/// saved fds — on every exit path, including errors partway through
/// `apply` (whatever was already rebound is undone when the partial
/// guard is dropped).
pub(crate) struct RedirectGuard {
    saved: Vec<SavedFd>,
}

impl RedirectGuard {
    pub(crate) fn apply(redirections: &RedirectionSet) -> io::Result<Self> {
        let mut guard = RedirectGuard { saved: Vec::new() };

        if let Some(target) = &redirections.stdout {
            guard.rebind(libc::STDOUT_FILENO, target)?;
        }
        if let Some(target) = &redirections.stderr {
            guard.rebind(libc::STDERR_FILENO, target)?;
        }

        Ok(guard)
    }

    fn rebind(&mut self, stdio_fd: libc::c_int, target: &RedirectTarget) -> io::Result<()> {
        let file = open_redirect_file(target)?;

        let saved_fd = dup_fd(stdio_fd)?;
        if let Err(e) = dup2_fd(file.as_raw_fd(), stdio_fd) {
            close_fd(saved_fd);
            return Err(e);
        }
        // `file` drops here, closing the opened fd; the stdio fd keeps
        // the description alive.
        self.saved.push(SavedFd { stdio_fd, saved_fd });
        Ok(())
    }
}

impl Drop for RedirectGuard {
    fn drop(&mut self) {
        // Restore in reverse order and close each saved fd exactly once.
        for SavedFd { stdio_fd, saved_fd } in self.saved.drain(..).rev() {
            let _ = dup2_fd(saved_fd, stdio_fd);
            close_fd(saved_fd);
        }
    }
}

fn dup_fd(fd: libc::c_int) -> io::Result<libc::c_int> {
    loop {
        let rc = unsafe { libc::dup(fd) };
        if rc >= 0 {
            return Ok(rc);
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(err);
    }
}

fn dup2_fd(src: libc::c_int, dst: libc::c_int) -> io::Result<()> {
    loop {
        let rc = unsafe { libc::dup2(src, dst) };
        if rc >= 0 {
            return Ok(());
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(err);
    }
}

fn close_fd(fd: libc::c_int) {
    unsafe {
        libc::close(fd);
    }
}
