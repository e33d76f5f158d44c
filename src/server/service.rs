// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{future::Future, sync::Arc};

use crate::frame::{ExceptionCode, Response, SlaveRequest};

/// A Modbus server request engine.
///
/// The server hands every decoded request to the installed service and
/// frames whatever comes back: `Ok` as a regular response, `Err` as an
/// exception response carrying the request's function code.
///
/// [`DataService`](crate::server::DataService) is the default engine and
/// implements the standard function codes on top of a
/// [`DataStore`](crate::data::DataStore). Installing a different
/// implementation replaces the dispatcher entirely, which is the seam for
/// gateways that relay PDUs to another transport: such a service receives
/// unrecognized function codes as [`Request::Custom`](crate::Request::Custom)
/// and the addressed unit id in [`SlaveRequest::slave`].
pub trait Service: Send + Sync {
    /// The response future.
    type Future: Future<Output = Result<Response, ExceptionCode>> + Send;

    /// Process the request and return the response asynchronously.
    fn call(&self, req: SlaveRequest) -> Self::Future;
}

impl<S: Service + ?Sized> Service for Arc<S> {
    type Future = S::Future;

    fn call(&self, req: SlaveRequest) -> Self::Future {
        (**self).call(req)
    }
}
