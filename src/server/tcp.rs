// SPDX-License-Identifier: MIT OR Apache-2.0

//! TCP server skeleton

use std::{future::Future, io, net::SocketAddr};

use futures_util::{sink::SinkExt as _, stream::StreamExt as _};
use log::debug;
use socket2::{Domain, Socket, Type};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, TcpStream},
    task::JoinSet,
};
use tokio_util::codec::Framed;

use crate::{
    codec::tcp::ServerCodec,
    frame::{tcp::ResponseAdu, ExceptionResponse, SlaveRequest},
    server::Service,
};

/// How a running server came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminated {
    /// The accept loop finished on its own.
    Finished,
    /// The abort signal fired. Every connection worker has been dropped,
    /// so all clients are disconnected at this point.
    Aborted,
}

/// A multi-connection Modbus TCP server.
///
/// Accepts connections on the given listener and drives one worker task
/// per connection. Within a connection, requests are processed strictly in
/// order: each response is written before the next request is read.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
}

impl Server {
    /// Attach the server to a bound listener.
    #[must_use]
    pub fn new(listener: TcpListener) -> Self {
        Self { listener }
    }

    /// The local address the server is listening on.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept and serve connections until an accept error occurs.
    ///
    /// `on_connected` inspects every new connection and either produces the
    /// service instance driving it or rejects it by resolving to
    /// `Ok(None)`. `on_process_error` is invoked with the terminal error of
    /// a connection worker; errors never propagate across connections.
    pub async fn serve<S, T, F, OnConnected, OnProcessError>(
        &self,
        on_connected: &OnConnected,
        on_process_error: OnProcessError,
    ) -> io::Result<()>
    where
        S: Service + 'static,
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
        F: Future<Output = io::Result<Option<(S, T)>>>,
        OnConnected: Fn(TcpStream, SocketAddr) -> F,
        OnProcessError: Fn(io::Error) + Clone + Send + 'static,
    {
        let mut sessions = JoinSet::new();
        loop {
            let (stream, peer) = self.listener.accept().await?;
            let Some((service, transport)) = on_connected(stream, peer).await? else {
                debug!("connection from {peer} rejected");
                continue;
            };
            debug!("accepted connection from {peer}");
            let framed = Framed::new(transport, ServerCodec::default());
            let on_process_error = on_process_error.clone();
            sessions.spawn(async move {
                if let Err(err) = process(framed, service).await {
                    on_process_error(err);
                }
            });
            // reap workers that have already finished
            while sessions.try_join_next().is_some() {}
        }
    }

    /// Serve connections until the abort signal resolves.
    ///
    /// On abort, the accept loop and all connection workers are dropped,
    /// which closes their sockets. This is the cooperative shutdown path:
    /// no worker outlives the returned future.
    pub async fn serve_until<S, T, F, OnConnected, OnProcessError, Sd>(
        self,
        on_connected: &OnConnected,
        on_process_error: OnProcessError,
        abort_signal: Sd,
    ) -> io::Result<Terminated>
    where
        S: Service + 'static,
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
        F: Future<Output = io::Result<Option<(S, T)>>>,
        OnConnected: Fn(TcpStream, SocketAddr) -> F,
        OnProcessError: Fn(io::Error) + Clone + Send + 'static,
        Sd: Future<Output = ()> + Send + Unpin + 'static,
    {
        tokio::select! {
            res = self.serve(on_connected, on_process_error) => res.map(|()| Terminated::Finished),
            () = abort_signal => {
                debug!("shutdown signal received");
                Ok(Terminated::Aborted)
            }
        }
    }
}

/// Build the service instance for an accepted plain TCP connection.
///
/// `new_service` receives the peer address and may reject the connection by
/// returning `Ok(None)`.
pub fn accept_tcp_connection<S, NewService>(
    stream: TcpStream,
    socket_addr: SocketAddr,
    new_service: NewService,
) -> io::Result<Option<(S, TcpStream)>>
where
    S: Service + 'static,
    NewService: FnOnce(SocketAddr) -> io::Result<Option<S>>,
{
    let service = new_service(socket_addr)?;
    Ok(service.map(|service| (service, stream)))
}

/// Bind a TCP listener with the socket options a Modbus server wants.
///
/// The address family (IPv4/IPv6) follows the given address. The socket is
/// bound with `SO_REUSEADDR`, keep-alive and `TCP_NODELAY` enabled.
pub fn bind_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = match addr {
        SocketAddr::V4(_) => Socket::new(Domain::IPV4, Type::STREAM, None)?,
        SocketAddr::V6(_) => Socket::new(Domain::IPV6, Type::STREAM, None)?,
    };
    socket.set_reuse_address(true)?;
    socket.set_keepalive(true)?;
    socket.set_nodelay(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;
    socket.set_nonblocking(true)?;
    TcpListener::from_std(socket.into())
}

/// The request-response loop driving one client connection.
///
/// Runs until the client closes the connection, a frame cannot be decoded,
/// or I/O fails. Service-level errors become exception responses and do not
/// terminate the loop.
async fn process<S, T>(mut framed: Framed<T, ServerCodec>, service: S) -> io::Result<()>
where
    S: Service,
    T: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let Some(request) = framed.next().await else {
            debug!("client closed the connection");
            break;
        };

        let adu = request?;
        let hdr = adu.hdr;
        let function = adu.pdu.0.function_code();
        let rsp_pdu = match service.call(SlaveRequest::from(adu)).await {
            Ok(response) => response.into(),
            Err(exception) => ExceptionResponse {
                function,
                exception,
            }
            .into(),
        };

        framed.send(ResponseAdu { hdr, pdu: rsp_pdu }).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{ExceptionCode, Request, Response};

    use std::future;

    #[derive(Clone)]
    struct DummyService {
        response: Response,
    }

    impl Service for DummyService {
        type Future = future::Ready<Result<Response, ExceptionCode>>;

        fn call(&self, _: SlaveRequest) -> Self::Future {
            future::ready(Ok(self.response.clone()))
        }
    }

    #[tokio::test]
    async fn service_wrapper() {
        let service = DummyService {
            response: Response::ReadInputRegisters(vec![0x33]),
        };

        let request = SlaveRequest {
            slave: 1,
            request: Request::ReadInputRegisters(0, 1),
        };
        let rsp = service.call(request).await.unwrap();
        assert_eq!(rsp, service.response);
    }

    #[tokio::test]
    async fn bind_listener_on_loopback() {
        let listener = bind_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }
}
