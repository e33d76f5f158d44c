// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slave (unit) addressing

use std::fmt;

/// Slave identifier, transmitted as the MBAP *unit id*.
pub type SlaveId = u8;

/// A single byte addressing a Modbus slave device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Slave(pub SlaveId);

impl Slave {
    /// One-way messages to all slaves at once carry this address.
    pub const BROADCAST: Slave = Slave(0);

    /// Lowest address of an individual slave device.
    pub const MIN_DEVICE: Slave = Slave(1);

    /// Highest address of an individual slave device.
    pub const MAX_DEVICE: Slave = Slave(247);

    /// The reserved unit id for a Modbus/TCP device that is addressed
    /// directly, i.e. not behind a TCP/RTU gateway.
    pub const TCP_DEVICE: Slave = Slave(255);

    /// Whether this id addresses one individual device.
    #[must_use]
    pub fn is_single_device(self) -> bool {
        (Self::MIN_DEVICE..=Self::MAX_DEVICE).contains(&self)
    }
}

impl From<SlaveId> for Slave {
    fn from(id: SlaveId) -> Self {
        Slave(id)
    }
}

impl From<Slave> for SlaveId {
    fn from(slave: Slave) -> Self {
        slave.0
    }
}

impl fmt::Display for Slave {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:0>2X})", self.0, self.0)
    }
}

/// Stateful selection of the currently addressed device.
///
/// TCP devices are usually addressed with the reserved unit id
/// [`Slave::TCP_DEVICE`]; a slave behind a TCP/RTU gateway is reached by
/// setting the unit id to its serial-line address instead.
pub trait SlaveContext {
    /// Select the device addressed by all subsequent requests.
    fn set_slave(&mut self, slave: Slave);
}
