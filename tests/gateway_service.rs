// SPDX-License-Identifier: MIT OR Apache-2.0

//! A custom engine in the style of a serial gateway: requests flow through
//! a bounded queue to a worker owning the downstream transport. Queue
//! overflow and unresponsive targets map to the two gateway exceptions.

use std::{future::Future, net::SocketAddr, pin::Pin, time::Duration};

use tokio::{
    net::TcpListener,
    sync::{mpsc, oneshot},
};

use mbtcp::{
    client,
    prelude::Reader as _,
    server::{
        tcp::{accept_tcp_connection, Server},
        Service,
    },
    Error, ExceptionCode, Request, Response, SlaveRequest,
};

struct GatewayJob {
    request: SlaveRequest,
    reply: oneshot::Sender<Result<Response, ExceptionCode>>,
}

/// Relays every request into a bounded queue and waits for the reply.
#[derive(Clone)]
struct GatewayService {
    queue: mpsc::Sender<GatewayJob>,
    reply_timeout: Duration,
}

impl Service for GatewayService {
    type Future = Pin<Box<dyn Future<Output = Result<Response, ExceptionCode>> + Send>>;

    fn call(&self, request: SlaveRequest) -> Self::Future {
        let queue = self.queue.clone();
        let reply_timeout = self.reply_timeout;
        Box::pin(async move {
            let (reply_tx, reply_rx) = oneshot::channel();
            let job = GatewayJob {
                request,
                reply: reply_tx,
            };
            if queue.try_send(job).is_err() {
                return Err(ExceptionCode::GatewayPathUnavailable);
            }
            match tokio::time::timeout(reply_timeout, reply_rx).await {
                Ok(Ok(result)) => result,
                _ => Err(ExceptionCode::GatewayTargetDevice),
            }
        })
    }
}

/// A stand-in for the downstream bus: answers register reads with a fixed
/// pattern and rejects everything else.
async fn target_device_worker(mut jobs: mpsc::Receiver<GatewayJob>) {
    while let Some(job) = jobs.recv().await {
        let result = match job.request.request {
            Request::ReadHoldingRegisters(addr, cnt) => Ok(Response::ReadHoldingRegisters(
                (0..cnt).map(|i| addr + i).collect(),
            )),
            _ => Err(ExceptionCode::IllegalFunction),
        };
        job.reply.send(result).ok();
    }
}

#[tokio::test]
async fn relays_requests_through_the_queue() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let server_addr = listener.local_addr()?;
    let server = Server::new(listener);

    let (queue, jobs) = mpsc::channel(5);
    tokio::spawn(target_device_worker(jobs));
    let gateway = GatewayService {
        queue,
        reply_timeout: Duration::from_secs(1),
    };

    let server_part = async move {
        let new_service = move |_peer: SocketAddr| Ok(Some(gateway.clone()));
        let on_connected = move |stream, peer| {
            let new_service = new_service.clone();
            async move { accept_tcp_connection(stream, peer, new_service) }
        };
        server.serve(&on_connected, |err| eprintln!("{err}")).await?;
        anyhow::Ok(())
    };

    let client_part = async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let mut ctx = client::tcp::connect(server_addr).await?;

        assert_eq!(ctx.read_holding_registers(0x40, 3).await?, [0x40, 0x41, 0x42]);

        let err = ctx.read_coils(0, 1).await.unwrap_err();
        let Error::Exception(rsp) = err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(rsp.exception, ExceptionCode::IllegalFunction);
        anyhow::Ok(())
    };

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(10_000)) => panic!("timeout - perhaps we have a lockup"),
        r = server_part => r?,
        r = client_part => r?,
    }
    Ok(())
}

#[tokio::test]
async fn unresponsive_target_and_full_queue_map_to_gateway_exceptions() {
    // nobody drains the queue
    let (queue, _jobs) = mpsc::channel(1);
    let gateway = GatewayService {
        queue,
        reply_timeout: Duration::from_millis(50),
    };

    let request = SlaveRequest {
        slave: 1,
        request: Request::ReadHoldingRegisters(0, 1),
    };

    // the first request is queued but never answered
    let err = gateway.call(request.clone()).await.unwrap_err();
    assert_eq!(err, ExceptionCode::GatewayTargetDevice);

    // the queue is still full, so the second request bounces
    let err = gateway.call(request).await.unwrap_err();
    assert_eq!(err, ExceptionCode::GatewayPathUnavailable);
}
