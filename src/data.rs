// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-image storage shared by all server connections.

use std::{
    fmt,
    net::SocketAddr,
    sync::{Mutex, PoisonError},
};

use crate::{
    frame::{Address, Coil, ExceptionCode, Quantity, Word},
    slave::SlaveId,
};

/// Identifies the connection on whose behalf a data access runs.
///
/// Handed to every [`DataStore`] operation and to change listeners, so that
/// access decisions and change logs can name the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionInfo {
    /// Peer address of the TCP connection.
    pub peer: SocketAddr,
    /// Unit id the request was addressed to.
    pub slave: SlaveId,
}

/// Storage backend of a Modbus server.
///
/// The six operations mirror the six data-access paths of the protocol.
/// Each either produces a payload or names the Modbus exception the server
/// should answer with. The default implementation is [`DataBank`];
/// replacements can enforce per-peer access control (return
/// [`ExceptionCode::IllegalFunction`]), synthesize values on the fly, or
/// delegate to another backend.
pub trait DataStore: Send + Sync {
    /// Read from the coils space.
    fn read_coils(
        &self,
        address: Address,
        count: Quantity,
        session: &SessionInfo,
    ) -> Result<Vec<Coil>, ExceptionCode>;

    /// Read from the discrete-inputs space.
    fn read_discrete_inputs(
        &self,
        address: Address,
        count: Quantity,
        session: &SessionInfo,
    ) -> Result<Vec<Coil>, ExceptionCode>;

    /// Read from the holding-registers space.
    fn read_holding_registers(
        &self,
        address: Address,
        count: Quantity,
        session: &SessionInfo,
    ) -> Result<Vec<Word>, ExceptionCode>;

    /// Read from the input-registers space.
    fn read_input_registers(
        &self,
        address: Address,
        count: Quantity,
        session: &SessionInfo,
    ) -> Result<Vec<Word>, ExceptionCode>;

    /// Write a range of coils.
    fn write_coils(
        &self,
        address: Address,
        values: &[Coil],
        session: &SessionInfo,
    ) -> Result<(), ExceptionCode>;

    /// Write a range of holding registers.
    fn write_holding_registers(
        &self,
        address: Address,
        values: &[Word],
        session: &SessionInfo,
    ) -> Result<(), ExceptionCode>;
}

/// Change listener invoked once per modified element after a committed
/// wire write, outside the space lock.
pub type ChangeListener<T> = Box<dyn Fn(Address, T, T, &SessionInfo) + Send + Sync>;

/// Sizing and default values of the four data spaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankConfig {
    /// Number of coils, at most `0x10000`.
    pub coils_size: usize,
    /// Initial value of every coil.
    pub coils_default: Coil,
    /// Number of discrete inputs, at most `0x10000`.
    pub discrete_inputs_size: usize,
    /// Initial value of every discrete input.
    pub discrete_inputs_default: Coil,
    /// Number of holding registers, at most `0x10000`.
    pub holding_registers_size: usize,
    /// Initial value of every holding register.
    pub holding_registers_default: Word,
    /// Number of input registers, at most `0x10000`.
    pub input_registers_size: usize,
    /// Initial value of every input register.
    pub input_registers_default: Word,
    /// Shrink all four spaces to size zero. Meant for [`DataStore`]
    /// replacements that synthesize every value and need no backing
    /// storage.
    pub virtual_mode: bool,
}

/// Full 16-bit address space.
const FULL_SPACE: usize = 0x1_0000;

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            coils_size: FULL_SPACE,
            coils_default: false,
            discrete_inputs_size: FULL_SPACE,
            discrete_inputs_default: false,
            holding_registers_size: FULL_SPACE,
            holding_registers_default: 0,
            input_registers_size: FULL_SPACE,
            input_registers_default: 0,
            virtual_mode: false,
        }
    }
}

/// Thread-safe storage for the four Modbus data spaces.
///
/// Every space sits behind its own lock, so concurrent connections
/// serialize per space, not globally. Range writes are all-or-nothing:
/// the bounds check happens under the lock before any element is touched.
///
/// The local accessors ([`DataBank::coils`], [`DataBank::set_coils`], ...)
/// are meant for the process owning the server, e.g. to feed input
/// registers from sensors; they bypass the wire-writability rules and do
/// not trigger change listeners.
pub struct DataBank {
    coils: Mutex<Vec<Coil>>,
    discrete_inputs: Mutex<Vec<Coil>>,
    holding_registers: Mutex<Vec<Word>>,
    input_registers: Mutex<Vec<Word>>,
    coils_listener: Option<ChangeListener<Coil>>,
    holding_registers_listener: Option<ChangeListener<Word>>,
}

impl Default for DataBank {
    fn default() -> Self {
        Self::with_config(BankConfig::default())
    }
}

impl fmt::Debug for DataBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataBank")
            .field("coils", &lock(&self.coils).len())
            .field("discrete_inputs", &lock(&self.discrete_inputs).len())
            .field("holding_registers", &lock(&self.holding_registers).len())
            .field("input_registers", &lock(&self.input_registers).len())
            .finish_non_exhaustive()
    }
}

impl DataBank {
    /// A data bank with four full-size spaces.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A data bank sized according to `config`.
    #[must_use]
    pub fn with_config(config: BankConfig) -> Self {
        let config = if config.virtual_mode {
            BankConfig {
                coils_size: 0,
                discrete_inputs_size: 0,
                holding_registers_size: 0,
                input_registers_size: 0,
                ..config
            }
        } else {
            config
        };
        Self {
            coils: Mutex::new(vec![config.coils_default; config.coils_size.min(FULL_SPACE)]),
            discrete_inputs: Mutex::new(vec![
                config.discrete_inputs_default;
                config.discrete_inputs_size.min(FULL_SPACE)
            ]),
            holding_registers: Mutex::new(vec![
                config.holding_registers_default;
                config.holding_registers_size.min(FULL_SPACE)
            ]),
            input_registers: Mutex::new(vec![
                config.input_registers_default;
                config.input_registers_size.min(FULL_SPACE)
            ]),
            coils_listener: None,
            holding_registers_listener: None,
        }
    }

    /// Install a listener for wire-initiated coil changes.
    ///
    /// Must be called before the bank is shared with the server.
    pub fn on_coils_change<F>(&mut self, listener: F)
    where
        F: Fn(Address, Coil, Coil, &SessionInfo) + Send + Sync + 'static,
    {
        self.coils_listener = Some(Box::new(listener));
    }

    /// Install a listener for wire-initiated holding-register changes.
    ///
    /// Must be called before the bank is shared with the server.
    pub fn on_holding_registers_change<F>(&mut self, listener: F)
    where
        F: Fn(Address, Word, Word, &SessionInfo) + Send + Sync + 'static,
    {
        self.holding_registers_listener = Some(Box::new(listener));
    }

    /// Read coils; `None` if the range exceeds the space.
    #[must_use]
    pub fn coils(&self, address: Address, count: Quantity) -> Option<Vec<Coil>> {
        read_range(&self.coils, address, count)
    }

    /// Write coils; `None` if the range exceeds the space.
    #[must_use]
    pub fn set_coils(&self, address: Address, values: &[Coil]) -> Option<()> {
        write_range(&self.coils, address, values).map(|_| ())
    }

    /// Read discrete inputs; `None` if the range exceeds the space.
    #[must_use]
    pub fn discrete_inputs(&self, address: Address, count: Quantity) -> Option<Vec<Coil>> {
        read_range(&self.discrete_inputs, address, count)
    }

    /// Write discrete inputs (local API only; this space is read-only from
    /// the wire); `None` if the range exceeds the space.
    #[must_use]
    pub fn set_discrete_inputs(&self, address: Address, values: &[Coil]) -> Option<()> {
        write_range(&self.discrete_inputs, address, values).map(|_| ())
    }

    /// Read holding registers; `None` if the range exceeds the space.
    #[must_use]
    pub fn holding_registers(&self, address: Address, count: Quantity) -> Option<Vec<Word>> {
        read_range(&self.holding_registers, address, count)
    }

    /// Write holding registers; `None` if the range exceeds the space.
    #[must_use]
    pub fn set_holding_registers(&self, address: Address, values: &[Word]) -> Option<()> {
        write_range(&self.holding_registers, address, values).map(|_| ())
    }

    /// Read input registers; `None` if the range exceeds the space.
    #[must_use]
    pub fn input_registers(&self, address: Address, count: Quantity) -> Option<Vec<Word>> {
        read_range(&self.input_registers, address, count)
    }

    /// Write input registers (local API only; this space is read-only from
    /// the wire); `None` if the range exceeds the space.
    #[must_use]
    pub fn set_input_registers(&self, address: Address, values: &[Word]) -> Option<()> {
        write_range(&self.input_registers, address, values).map(|_| ())
    }
}

impl DataStore for DataBank {
    fn read_coils(
        &self,
        address: Address,
        count: Quantity,
        _session: &SessionInfo,
    ) -> Result<Vec<Coil>, ExceptionCode> {
        self.coils(address, count)
            .ok_or(ExceptionCode::IllegalDataAddress)
    }

    fn read_discrete_inputs(
        &self,
        address: Address,
        count: Quantity,
        _session: &SessionInfo,
    ) -> Result<Vec<Coil>, ExceptionCode> {
        self.discrete_inputs(address, count)
            .ok_or(ExceptionCode::IllegalDataAddress)
    }

    fn read_holding_registers(
        &self,
        address: Address,
        count: Quantity,
        _session: &SessionInfo,
    ) -> Result<Vec<Word>, ExceptionCode> {
        self.holding_registers(address, count)
            .ok_or(ExceptionCode::IllegalDataAddress)
    }

    fn read_input_registers(
        &self,
        address: Address,
        count: Quantity,
        _session: &SessionInfo,
    ) -> Result<Vec<Word>, ExceptionCode> {
        self.input_registers(address, count)
            .ok_or(ExceptionCode::IllegalDataAddress)
    }

    fn write_coils(
        &self,
        address: Address,
        values: &[Coil],
        session: &SessionInfo,
    ) -> Result<(), ExceptionCode> {
        let changes = write_range(&self.coils, address, values)
            .ok_or(ExceptionCode::IllegalDataAddress)?;
        // the lock is released here; listeners run outside of it
        if let Some(listener) = &self.coils_listener {
            for (c_address, from, to) in changes {
                listener(c_address, from, to, session);
            }
        }
        Ok(())
    }

    fn write_holding_registers(
        &self,
        address: Address,
        values: &[Word],
        session: &SessionInfo,
    ) -> Result<(), ExceptionCode> {
        let changes = write_range(&self.holding_registers, address, values)
            .ok_or(ExceptionCode::IllegalDataAddress)?;
        if let Some(listener) = &self.holding_registers_listener {
            for (c_address, from, to) in changes {
                listener(c_address, from, to, session);
            }
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read_range<T: Copy>(space: &Mutex<Vec<T>>, address: Address, count: Quantity) -> Option<Vec<T>> {
    let data = lock(space);
    let start = usize::from(address);
    let end = start.checked_add(count.into())?;
    data.get(start..end).map(<[T]>::to_vec)
}

/// Apply a range write and collect the `(address, old, new)` triple of every
/// element that actually changed. The bounds check precedes all mutation, so
/// a failing write leaves the space untouched.
#[allow(clippy::cast_possible_truncation)]
fn write_range<T: Copy + PartialEq>(
    space: &Mutex<Vec<T>>,
    address: Address,
    values: &[T],
) -> Option<Vec<(Address, T, T)>> {
    let mut data = lock(space);
    let start = usize::from(address);
    let end = start.checked_add(values.len())?;
    let slice = data.get_mut(start..end)?;
    let mut changes = Vec::new();
    for (offset, (current, new)) in slice.iter_mut().zip(values).enumerate() {
        if *current != *new {
            changes.push((address + offset as Address, *current, *new));
            *current = *new;
        }
    }
    Some(changes)
}
