// SPDX-License-Identifier: MIT OR Apache-2.0

//! TCP client connections

use std::{
    fmt, io,
    net::SocketAddr,
    sync::atomic::{AtomicU16, Ordering},
};

use async_trait::async_trait;
use futures_util::{sink::SinkExt as _, stream::StreamExt as _};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};

use crate::{
    codec::tcp::ClientCodec,
    error::{Error, Result},
    frame::{tcp::*, *},
    slave::*,
};

use super::Context;

use tokio_util::codec::Framed;

/// Establish a direct connection to a Modbus TCP device.
pub async fn connect(socket_addr: SocketAddr) -> Result<Context> {
    connect_slave(socket_addr, Slave::TCP_DEVICE).await
}

/// Connect to a physical, broadcast, or custom Modbus device, possibly
/// through a Modbus TCP gateway that forwards messages to the
/// corresponding slave device.
pub async fn connect_slave(socket_addr: SocketAddr, slave: Slave) -> Result<Context> {
    let transport = TcpStream::connect(socket_addr)
        .await
        .map_err(Error::Connect)?;
    Ok(attach_slave(transport, slave))
}

/// Attach a new client context to a direct transport connection.
pub fn attach<T>(transport: T) -> Context
where
    T: AsyncRead + AsyncWrite + Send + Unpin + fmt::Debug + 'static,
{
    attach_slave(transport, Slave::TCP_DEVICE)
}

/// Attach a new client context to a transport connection addressing the
/// given slave.
pub fn attach_slave<T>(transport: T, slave: Slave) -> Context
where
    T: AsyncRead + AsyncWrite + Send + Unpin + fmt::Debug + 'static,
{
    let client = TcpClient::new(transport, slave);
    Context::from(Box::new(client) as Box<dyn super::Client>)
}

/// Modbus TCP client
#[derive(Debug)]
pub(crate) struct TcpClient<T> {
    framed: Framed<T, ClientCodec>,
    unit_id: UnitId,
    transaction_id: AtomicU16,
}

impl<T> TcpClient<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(transport: T, slave: Slave) -> Self {
        Self {
            framed: Framed::new(transport, ClientCodec::default()),
            unit_id: slave.into(),
            transaction_id: AtomicU16::new(0),
        }
    }

    /// Wrapping per-request correlator; its only purpose is verifying the
    /// MBAP echo of the strictly in-order responses.
    fn next_transaction_id(&self) -> TransactionId {
        self.transaction_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) async fn call(&mut self, req: Request) -> Result<Response> {
        log::debug!("call {req:?}");
        req.validate()?;
        let disconnect = req == Request::Disconnect;
        let req_hdr = Header {
            transaction_id: self.next_transaction_id(),
            unit_id: self.unit_id,
        };
        let req_adu = RequestAdu {
            hdr: req_hdr,
            pdu: req.into(),
            disconnect,
        };

        self.framed.read_buffer_mut().clear();
        self.framed.send(req_adu).await.map_err(Error::Send)?;
        let ResponseAdu { hdr, pdu } = self
            .framed
            .next()
            .await
            .ok_or(Error::SocketClosed)?
            .map_err(recv_error)?;

        verify_response_header(req_hdr, hdr)?;
        pdu.0.map_err(Error::Exception)
    }
}

/// Frame-level violations are reported as such; every other receive
/// failure keeps its transport flavor.
fn recv_error(err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::InvalidData {
        Error::FrameFormat(err)
    } else {
        Error::Recv(err)
    }
}

fn verify_response_header(req_hdr: Header, rsp_hdr: Header) -> Result<()> {
    if req_hdr != rsp_hdr {
        return Err(Error::Recv(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "invalid response header: expected/request = {req_hdr:?}, actual/response = {rsp_hdr:?}"
            ),
        )));
    }
    Ok(())
}

impl<T> SlaveContext for TcpClient<T> {
    fn set_slave(&mut self, slave: Slave) {
        self.unit_id = slave.into();
    }
}

#[async_trait]
impl<T> super::Client for TcpClient<T>
where
    T: fmt::Debug + AsyncRead + AsyncWrite + Send + Unpin,
{
    async fn call(&mut self, req: Request) -> Result<Response> {
        TcpClient::call(self, req).await
    }
}
