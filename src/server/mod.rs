// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP server

pub mod tcp;

mod dispatch;
mod service;

pub use self::{dispatch::DataService, service::Service};
