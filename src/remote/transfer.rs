//! SFTP-based staging of files between the local and remote filesystems.
//!
//! Transfers are blocking and single-shot. A failure surfaces immediately as
//! `Error::Transfer`; nothing here retries or cleans up partial files.

use crate::error::{Error, Result};
use log::debug;
use ssh2::Sftp;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// File-copy capability between the local machine and the remote.
pub trait FileTransfer {
    /// Copies a local file to `remote`, overwriting it if present.
    fn put(&mut self, local: &Path, remote: &str) -> Result<u64>;

    /// Copies the remote file at `remote` into `local`.
    fn get(&mut self, remote: &str, local: &Path) -> Result<u64>;

    /// Writes in-memory content directly to `remote`.
    fn write_remote(&mut self, remote: &str, contents: &[u8]) -> Result<()>;
}

/// Handles file transfers over an SFTP subsystem of an SSH session.
pub struct SftpTransfer {
    sftp: Sftp,
}

impl SftpTransfer {
    /// Wraps an open SFTP channel.
    pub fn new(sftp: Sftp) -> Self {
        Self { sftp }
    }
}

impl FileTransfer for SftpTransfer {
    fn put(&mut self, local: &Path, remote: &str) -> Result<u64> {
        let context = format!("put {} -> {}", local.display(), remote);

        let mut source = File::open(local).map_err(|e| Error::transfer(&context, e))?;
        let mut target = self
            .sftp
            .create(Path::new(remote))
            .map_err(|e| Error::transfer(&context, e))?;

        let bytes = io::copy(&mut source, &mut target).map_err(|e| Error::transfer(&context, e))?;
        target.flush().map_err(|e| Error::transfer(&context, e))?;

        debug!("Uploaded {} bytes to {}", bytes, remote);
        Ok(bytes)
    }

    fn get(&mut self, remote: &str, local: &Path) -> Result<u64> {
        let context = format!("get {} -> {}", remote, local.display());

        let mut source = self
            .sftp
            .open(Path::new(remote))
            .map_err(|e| Error::transfer(&context, e))?;
        let mut target = File::create(local).map_err(|e| Error::transfer(&context, e))?;

        let bytes = io::copy(&mut source, &mut target).map_err(|e| Error::transfer(&context, e))?;
        target.flush().map_err(|e| Error::transfer(&context, e))?;

        debug!("Downloaded {} bytes from {}", bytes, remote);
        Ok(bytes)
    }

    fn write_remote(&mut self, remote: &str, contents: &[u8]) -> Result<()> {
        let context = format!("write {}", remote);

        let mut target = self
            .sftp
            .create(Path::new(remote))
            .map_err(|e| Error::transfer(&context, e))?;
        target
            .write_all(contents)
            .and_then(|_| target.flush())
            .map_err(|e| Error::transfer(&context, e))?;

        debug!("Wrote {} bytes to {}", contents.len(), remote);
        Ok(())
    }
}
