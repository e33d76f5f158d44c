// SPDX-License-Identifier: MIT OR Apache-2.0

//! Blocking TCP client connections

use std::net::SocketAddr;

use super::{ClientConfig, Context};
use crate::{error::Result, slave::Slave};

/// Connect to a directly addressed Modbus TCP device.
pub fn connect(socket_addr: SocketAddr) -> Result<Context> {
    connect_slave(socket_addr, Slave::TCP_DEVICE)
}

/// Connect to the given socket address, addressing a specific slave.
pub fn connect_slave(socket_addr: SocketAddr, slave: Slave) -> Result<Context> {
    let config = ClientConfig::new(socket_addr.ip().to_string())
        .with_port(socket_addr.port())?
        .with_slave(slave);
    connect_config(config)
}

/// Connect with full control over the connection parameters.
pub fn connect_config(config: ClientConfig) -> Result<Context> {
    let mut context = Context::new(config)?;
    context.open()?;
    Ok(context)
}
