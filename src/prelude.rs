// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types

pub use crate::client;

#[cfg(feature = "sync")]
pub mod sync {
    //! Re-exports of the blocking client.
    pub use crate::client::sync::*;
}

pub mod tcp {
    //! Re-exports of the TCP client and server entry points.
    pub use crate::client::tcp::*;

    #[cfg(feature = "server")]
    pub use crate::server::tcp::*;
}

pub use crate::client::{Client, Reader, Writer};

pub use crate::data::{BankConfig, DataBank, DataStore, SessionInfo};

pub use crate::device_id::DeviceIdentification;

#[cfg(feature = "server")]
pub use crate::server::{DataService, Service};

pub use crate::{
    Error, ErrorKind, ExceptionCode, ExceptionResponse, Request, Response, Slave, SlaveId,
};
