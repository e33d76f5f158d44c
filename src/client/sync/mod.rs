// SPDX-License-Identifier: MIT OR Apache-2.0

//! Blocking Modbus TCP client
//!
//! A wrapper around the asynchronous client that owns its own runtime and
//! its connection parameters. It reopens the connection on demand
//! (auto-open), optionally closes it after each successful request
//! (auto-close), bounds every operation with the configured timeout, and
//! records the outcome of the last request for later inspection.

pub mod tcp;

use std::{future::Future, io, net::SocketAddr, time::Duration};

use log::debug;

use crate::{
    client::{
        unexpected_response, Client as AsyncClient, Context as AsyncContext,
    },
    error::{Error, ErrorKind, Result},
    frame::*,
    slave::*,
};

/// Default Modbus/TCP port.
pub const MODBUS_TCP_DEFAULT_PORT: u16 = 502;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_TIMEOUT: Duration = Duration::from_secs(3600);

fn validate_port(port: u16) -> Result<()> {
    if port == 0 {
        return Err(Error::InvalidRequest("port must be nonzero"));
    }
    Ok(())
}

fn validate_timeout(timeout: Duration) -> Result<()> {
    if timeout.is_zero() || timeout > MAX_TIMEOUT {
        return Err(Error::InvalidRequest(
            "timeout must be positive and at most one hour",
        ));
    }
    Ok(())
}

/// Connection parameters of the blocking client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    host: String,
    port: u16,
    slave: Slave,
    timeout: Duration,
    auto_open: bool,
    auto_close: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: MODBUS_TCP_DEFAULT_PORT,
            slave: Slave(1),
            timeout: DEFAULT_TIMEOUT,
            auto_open: true,
            auto_close: false,
        }
    }
}

impl ClientConfig {
    /// Parameters for the given host name or IP literal, everything else
    /// at its default: port 502, slave 1, 30 s timeout, auto-open on,
    /// auto-close off.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Select the TCP port. Zero is rejected.
    pub fn with_port(mut self, port: u16) -> Result<Self> {
        validate_port(port)?;
        self.port = port;
        Ok(self)
    }

    /// Select the addressed slave (unit id).
    #[must_use]
    pub fn with_slave(mut self, slave: Slave) -> Self {
        self.slave = slave;
        self
    }

    /// Set the timeout applied to connect, send and receive. Must be
    /// positive and at most one hour.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        validate_timeout(timeout)?;
        self.timeout = timeout;
        Ok(self)
    }

    /// Open the connection implicitly before a request when necessary.
    #[must_use]
    pub fn with_auto_open(mut self, auto_open: bool) -> Self {
        self.auto_open = auto_open;
        self
    }

    /// Close the connection after every completed request.
    #[must_use]
    pub fn with_auto_close(mut self, auto_close: bool) -> Self {
        self.auto_close = auto_close;
        self
    }

    /// The configured host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The configured TCP port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// The configured slave.
    #[must_use]
    pub const fn slave(&self) -> Slave {
        self.slave
    }

    /// The configured timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

fn block_on_with_timeout<T>(
    runtime: &tokio::runtime::Runtime,
    timeout: Duration,
    task: impl Future<Output = Result<T>>,
) -> Result<T> {
    runtime.block_on(async move {
        tokio::time::timeout(timeout, task)
            .await
            .unwrap_or(Err(Error::Timeout))
    })
}

/// A transport independent blocking client trait.
pub trait Client: SlaveContext {
    /// Invoke a Modbus operation and block until its result arrives.
    fn call(&mut self, request: Request) -> Result<Response>;
}

/// A blocking Modbus reader.
pub trait Reader: Client {
    /// Read coils (0x01).
    fn read_coils(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>>;
    /// Read discrete inputs (0x02).
    fn read_discrete_inputs(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>>;
    /// Read holding registers (0x03).
    fn read_holding_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>>;
    /// Read input registers (0x04).
    fn read_input_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>>;
    /// Write then read holding registers in one transaction (0x17).
    fn read_write_multiple_registers(
        &mut self,
        read_addr: Address,
        read_cnt: Quantity,
        write_addr: Address,
        write_data: &[Word],
    ) -> Result<Vec<Word>>;
}

/// A blocking Modbus writer.
pub trait Writer: Client {
    /// Write a single coil (0x05).
    fn write_single_coil(&mut self, addr: Address, coil: Coil) -> Result<()>;
    /// Write multiple coils (0x0F).
    fn write_multiple_coils(&mut self, addr: Address, coils: &[Coil]) -> Result<()>;
    /// Write a single holding register (0x06).
    fn write_single_register(&mut self, addr: Address, word: Word) -> Result<()>;
    /// Write multiple holding registers (0x10).
    fn write_multiple_registers(&mut self, addr: Address, words: &[Word]) -> Result<()>;
}

/// A blocking Modbus client context.
#[derive(Debug)]
pub struct Context {
    runtime: tokio::runtime::Runtime,
    config: ClientConfig,
    ctx: Option<AsyncContext>,
    last_error: ErrorKind,
    last_exception: Option<ExceptionCode>,
}

impl Context {
    /// A closed context with the given parameters.
    ///
    /// No connection is attempted; with auto-open enabled (the default)
    /// the first request connects implicitly, otherwise call
    /// [`open`](Self::open) first.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(Error::Connect)?;
        Ok(Self {
            runtime,
            config,
            ctx: None,
            last_error: ErrorKind::NoError,
            last_exception: None,
        })
    }

    /// The current connection parameters.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Change the host. Closes an open connection.
    pub fn set_host(&mut self, host: impl Into<String>) {
        self.close();
        self.config.host = host.into();
    }

    /// Change the TCP port. Closes an open connection.
    pub fn set_port(&mut self, port: u16) -> Result<()> {
        validate_port(port)?;
        self.close();
        self.config.port = port;
        Ok(())
    }

    /// Change the timeout applied to connect, send and receive.
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        validate_timeout(timeout)?;
        self.config.timeout = timeout;
        Ok(())
    }

    /// Toggle implicit connect before requests.
    pub fn set_auto_open(&mut self, auto_open: bool) {
        self.config.auto_open = auto_open;
    }

    /// Toggle closing the connection after each completed request.
    pub fn set_auto_close(&mut self, auto_close: bool) {
        self.config.auto_close = auto_close;
    }

    /// Whether the connection is currently open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.ctx.is_some()
    }

    /// Outcome classification of the last request.
    ///
    /// Reset to [`ErrorKind::NoError`] at the start of every request.
    /// Argument validation failures do not count as requests and leave
    /// this untouched.
    #[must_use]
    pub const fn last_error(&self) -> ErrorKind {
        self.last_error
    }

    /// The exception code of the last request, if the server answered
    /// with a Modbus exception.
    #[must_use]
    pub const fn last_exception(&self) -> Option<ExceptionCode> {
        self.last_exception
    }

    /// Open (or reopen) the connection.
    pub fn open(&mut self) -> Result<()> {
        self.ctx = None;
        let addr = self.resolve()?;
        let timeout = self.config.timeout;
        let stream = block_on_with_timeout(&self.runtime, timeout, async move {
            tokio::net::TcpStream::connect(addr)
                .await
                .map_err(Error::Connect)
        })
        .map_err(|err| match err {
            Error::Timeout => {
                Error::Connect(io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))
            }
            err => err,
        })?;
        stream.set_nodelay(true).map_err(Error::Connect)?;
        debug!("connected to {addr}");
        self.ctx = Some(crate::client::tcp::attach_slave(stream, self.config.slave));
        Ok(())
    }

    /// Close the connection. A no-op when already closed.
    pub fn close(&mut self) {
        if self.ctx.take().is_some() {
            debug!("connection closed");
        }
    }

    /// Send a raw PDU and return the raw response PDU.
    ///
    /// A response carrying a Modbus exception is returned as
    /// [`Error::Exception`] with the code also available through
    /// [`last_exception`](Self::last_exception), never as raw bytes.
    pub fn custom_request(&mut self, pdu: &[u8]) -> Result<Vec<u8>> {
        let Some((&function, data)) = pdu.split_first() else {
            return Err(Error::InvalidRequest("empty PDU"));
        };
        let rsp = self.call(Request::Custom(function, data.to_vec()))?;
        let bytes: bytes::Bytes = rsp.into();
        Ok(bytes.to_vec())
    }

    /// Read Device Identification (0x2B / MEI type 0x0E).
    ///
    /// Continuations are not chained automatically; see
    /// [`DeviceIdentificationResponse::more_follows`].
    pub fn read_device_identification(
        &mut self,
        read_code: u8,
        object_id: u8,
    ) -> Result<DeviceIdentificationResponse> {
        match self.call(Request::ReadDeviceIdentification(read_code, object_id))? {
            Response::ReadDeviceIdentification(device_id) => Ok(device_id),
            _ => Err(unexpected_response()),
        }
    }

    fn resolve(&self) -> Result<SocketAddr> {
        use std::net::ToSocketAddrs as _;
        (self.config.host.as_str(), self.config.port)
            .to_socket_addrs()
            .map_err(Error::NameResolve)?
            .next()
            .ok_or_else(|| {
                Error::NameResolve(io::Error::new(
                    io::ErrorKind::NotFound,
                    "host name yields no address",
                ))
            })
    }

    fn call_inner(&mut self, request: Request) -> Result<Response> {
        if self.ctx.is_none() {
            if !self.config.auto_open {
                return Err(Error::SocketClosed);
            }
            self.open()?;
        }
        let timeout = self.config.timeout;
        let Some(ctx) = self.ctx.as_mut() else {
            return Err(Error::SocketClosed);
        };
        block_on_with_timeout(&self.runtime, timeout, ctx.call(request))
    }
}

impl Client for Context {
    fn call(&mut self, request: Request) -> Result<Response> {
        // argument errors are reported synchronously and do not count as
        // a request
        request.validate()?;
        self.last_error = ErrorKind::NoError;
        self.last_exception = None;

        let result = self.call_inner(request);
        match &result {
            Ok(_) => {
                if self.config.auto_close {
                    self.close();
                }
            }
            Err(err) => {
                self.last_error = err.kind();
                match err {
                    Error::Exception(rsp) => {
                        // a well-formed response; the connection stays usable
                        self.last_exception = Some(rsp.exception);
                        if self.config.auto_close {
                            self.close();
                        }
                    }
                    Error::InvalidRequest(_) | Error::NameResolve(_) | Error::Connect(_) => {}
                    Error::Send(_)
                    | Error::Recv(_)
                    | Error::FrameFormat(_)
                    | Error::Timeout
                    | Error::SocketClosed => self.close(),
                }
            }
        }
        result
    }
}

impl SlaveContext for Context {
    fn set_slave(&mut self, slave: Slave) {
        self.config.slave = slave;
        if let Some(ctx) = self.ctx.as_mut() {
            ctx.set_slave(slave);
        }
    }
}

impl Reader for Context {
    fn read_coils(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>> {
        let rsp = self.call(Request::ReadCoils(addr, cnt))?;
        let Response::ReadCoils(mut coils) = rsp else {
            return Err(unexpected_response());
        };
        coils.truncate(cnt.into());
        Ok(coils)
    }

    fn read_discrete_inputs(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>> {
        let rsp = self.call(Request::ReadDiscreteInputs(addr, cnt))?;
        let Response::ReadDiscreteInputs(mut inputs) = rsp else {
            return Err(unexpected_response());
        };
        inputs.truncate(cnt.into());
        Ok(inputs)
    }

    fn read_holding_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>> {
        let rsp = self.call(Request::ReadHoldingRegisters(addr, cnt))?;
        let Response::ReadHoldingRegisters(words) = rsp else {
            return Err(unexpected_response());
        };
        Ok(words)
    }

    fn read_input_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>> {
        let rsp = self.call(Request::ReadInputRegisters(addr, cnt))?;
        let Response::ReadInputRegisters(words) = rsp else {
            return Err(unexpected_response());
        };
        Ok(words)
    }

    fn read_write_multiple_registers(
        &mut self,
        read_addr: Address,
        read_cnt: Quantity,
        write_addr: Address,
        write_data: &[Word],
    ) -> Result<Vec<Word>> {
        let rsp = self.call(Request::ReadWriteMultipleRegisters(
            read_addr,
            read_cnt,
            write_addr,
            write_data.to_vec(),
        ))?;
        let Response::ReadWriteMultipleRegisters(words) = rsp else {
            return Err(unexpected_response());
        };
        Ok(words)
    }
}

impl Writer for Context {
    fn write_single_coil(&mut self, addr: Address, coil: Coil) -> Result<()> {
        let rsp = self.call(Request::WriteSingleCoil(addr, coil))?;
        let Response::WriteSingleCoil(_, _) = rsp else {
            return Err(unexpected_response());
        };
        Ok(())
    }

    fn write_multiple_coils(&mut self, addr: Address, coils: &[Coil]) -> Result<()> {
        let rsp = self.call(Request::WriteMultipleCoils(addr, coils.to_vec()))?;
        let Response::WriteMultipleCoils(_, _) = rsp else {
            return Err(unexpected_response());
        };
        Ok(())
    }

    fn write_single_register(&mut self, addr: Address, word: Word) -> Result<()> {
        let rsp = self.call(Request::WriteSingleRegister(addr, word))?;
        let Response::WriteSingleRegister(_, _) = rsp else {
            return Err(unexpected_response());
        };
        Ok(())
    }

    fn write_multiple_registers(&mut self, addr: Address, words: &[Word]) -> Result<()> {
        let rsp = self.call(Request::WriteMultipleRegisters(addr, words.to_vec()))?;
        let Response::WriteMultipleRegisters(_, _) = rsp else {
            return Err(unexpected_response());
        };
        Ok(())
    }
}
