//! One-shot socket-pair channel between a parent and its forked child
//!
//! A [`ResultChannel`] is created before the fork. The parent keeps the
//! [`ParentEndpoint`], the child keeps the [`ChildEndpoint`], and each side
//! drops the endpoint it does not own right after the fork. The child writes
//! one serialized envelope and closes; the parent reads to end-of-stream.
//! There is no length prefix: stream closure is the delimiter.

use nix::sys::socket::{socketpair, AddressFamily, SockFlag, SockType};
use std::fs::File;
use std::io::{Read, Write};
use std::os::fd::OwnedFd;

use crate::error::IpcError;
use crate::protocol::ResultEnvelope;

/// Factory for connected endpoint pairs
pub struct ResultChannel;

impl ResultChannel {
    /// Create a connected endpoint pair for one task
    pub fn pair() -> Result<(ParentEndpoint, ChildEndpoint), IpcError> {
        let (parent_fd, child_fd) = socketpair(
            AddressFamily::Unix,
            SockType::Stream,
            None,
            SockFlag::empty(),
        )
        .map_err(|e| IpcError::ChannelCreation(e.to_string()))?;

        Ok((
            ParentEndpoint { fd: parent_fd },
            ChildEndpoint { fd: child_fd },
        ))
    }
}

/// The endpoint retained by the parent process. Dropping it closes the
/// parent's side of the channel.
#[derive(Debug)]
pub struct ParentEndpoint {
    fd: OwnedFd,
}

impl ParentEndpoint {
    /// Read the child's single message to end-of-stream and decode it.
    ///
    /// Consumes the endpoint: the channel is closed on every path, including
    /// errors. An empty stream means the child exited before completing its
    /// one write and is reported as [`IpcError::NoData`].
    pub fn receive(self) -> Result<ResultEnvelope, IpcError> {
        let mut stream = File::from(self.fd);
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf)?;

        if buf.is_empty() {
            return Err(IpcError::NoData);
        }

        serde_json::from_slice(&buf).map_err(|e| IpcError::Deserialization(e.to_string()))
    }
}

/// The endpoint retained by the forked child. Dropping it closes the child's
/// side of the channel, which the parent observes as end-of-stream.
#[derive(Debug)]
pub struct ChildEndpoint {
    fd: OwnedFd,
}

impl ChildEndpoint {
    /// Serialize the envelope and write it as the channel's single message.
    ///
    /// Consumes the endpoint so exactly one write can ever occur; the close
    /// on drop is what delimits the message for the parent.
    pub fn send(self, envelope: &ResultEnvelope) -> Result<(), IpcError> {
        let bytes = serde_json::to_vec(envelope)
            .map_err(|e| IpcError::Serialization(e.to_string()))?;

        let mut stream = File::from(self.fd);
        stream.write_all(&bytes)?;
        stream.flush()?;
        Ok(())
    }
}
