// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(rust_2018_idioms)]
#![warn(missing_debug_implementations)]
#![warn(unreachable_pub)]
#![cfg_attr(not(test), warn(unsafe_code))]
#![warn(clippy::all)]
#![warn(rustdoc::broken_intra_doc_links)]
#![doc = include_str!("../README.md")]

pub mod prelude;

pub mod client;

pub mod data;

pub mod device_id;

pub mod slave;

#[cfg(feature = "server")]
pub mod server;

mod codec;
mod error;
mod frame;

pub use crate::{
    error::{Error, ErrorKind, Result},
    frame::{
        Address, Coil, DeviceIdentificationResponse, ExceptionCode, ExceptionResponse,
        FunctionCode, Quantity, Request, Response, Word,
    },
    slave::{Slave, SlaveId},
};

#[cfg(feature = "server")]
pub use crate::frame::SlaveRequest;
