// SPDX-License-Identifier: MIT OR Apache-2.0

//! Library error types

use std::{fmt, io};

use thiserror::Error;

use crate::frame::ExceptionResponse;

/// A specialized [`Result`](std::result::Result) type for Modbus operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the client.
///
/// Two taxonomies meet here: [`Error::Exception`] carries a well-formed
/// response in which the server reported a Modbus exception code, while all
/// other variants describe failures inside the library or on the transport.
/// [`Error::InvalidRequest`] is raised before any I/O takes place and leaves
/// an open connection untouched.
#[derive(Debug, Error)]
pub enum Error {
    /// A request argument is outside the range the protocol can express.
    ///
    /// Detected during request building; nothing has been sent.
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),

    /// Resolving the configured host name failed.
    #[error("name resolution failed: {0}")]
    NameResolve(#[source] io::Error),

    /// Establishing the TCP connection failed.
    #[error("connect failed: {0}")]
    Connect(#[source] io::Error),

    /// Writing the request frame failed.
    #[error("send failed: {0}")]
    Send(#[source] io::Error),

    /// Reading the response frame failed, or the response did not echo the
    /// request header.
    #[error("receive failed: {0}")]
    Recv(#[source] io::Error),

    /// The received bytes do not form a valid Modbus/TCP frame.
    #[error("malformed frame: {0}")]
    FrameFormat(#[source] io::Error),

    /// The configured timeout elapsed before a response arrived.
    #[error("request timed out")]
    Timeout,

    /// The connection is closed (or was closed by the peer mid-request).
    #[error("socket closed")]
    SocketClosed,

    /// The server answered with a Modbus exception.
    #[error(transparent)]
    Exception(#[from] ExceptionResponse),
}

impl Error {
    /// The flat classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::NameResolve(_) => ErrorKind::NameResolve,
            Self::Connect(_) => ErrorKind::Connect,
            Self::Send(_) => ErrorKind::Send,
            Self::Recv(_) => ErrorKind::Recv,
            Self::FrameFormat(_) => ErrorKind::FrameFormat,
            Self::Timeout => ErrorKind::Timeout,
            Self::SocketClosed => ErrorKind::SocketClosed,
            Self::Exception(_) => ErrorKind::Exception,
        }
    }
}

/// Flat client-side error classification.
///
/// This is what the blocking client records as `last_error` between
/// requests. [`ErrorKind::Crc`] is reserved for serial-line framing and is
/// never produced by the TCP transport.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The last request completed without error.
    #[default]
    NoError,
    /// A request argument was rejected before any I/O.
    InvalidRequest,
    /// Host name resolution failed.
    NameResolve,
    /// TCP connect failed.
    Connect,
    /// Socket send failed.
    Send,
    /// Socket receive failed or the response header did not match.
    Recv,
    /// The configured timeout elapsed.
    Timeout,
    /// A received frame was malformed.
    FrameFormat,
    /// The server reported a Modbus exception.
    Exception,
    /// Bad CRC on a received serial-line frame.
    Crc,
    /// The socket is closed.
    SocketClosed,
}

impl ErrorKind {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::NoError => "no error",
            Self::InvalidRequest => "invalid request argument",
            Self::NameResolve => "name resolve error",
            Self::Connect => "connect error",
            Self::Send => "socket send error",
            Self::Recv => "socket recv error",
            Self::Timeout => "recv timeout occurred",
            Self::FrameFormat => "frame format error",
            Self::Exception => "modbus exception occurred",
            Self::Crc => "bad CRC on receive frame",
            Self::SocketClosed => "socket is closed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
