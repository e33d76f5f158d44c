// SPDX-License-Identifier: MIT OR Apache-2.0

use std::future;

use mbtcp::{
    client::{Context, Reader as _, Writer as _},
    server::Service,
    Error, ExceptionCode, Request, Response, SlaveRequest,
};

/// Answers every operation with a distinct exception code.
pub struct TestService {}

impl TestService {
    fn handle(&self, req: Request) -> Result<Response, ExceptionCode> {
        use Request::*;

        match req {
            ReadCoils(_, _) => Err(ExceptionCode::Acknowledge),
            ReadDiscreteInputs(_, _) => Err(ExceptionCode::GatewayPathUnavailable),
            WriteSingleCoil(_, _) => Err(ExceptionCode::GatewayTargetDevice),
            WriteMultipleCoils(_, _) => Err(ExceptionCode::IllegalDataAddress),
            ReadInputRegisters(_, _) => Err(ExceptionCode::IllegalDataValue),
            ReadHoldingRegisters(_, _) => Err(ExceptionCode::IllegalFunction),
            WriteSingleRegister(_, _) => Err(ExceptionCode::MemoryParityError),
            WriteMultipleRegisters(_, _) => Err(ExceptionCode::ServerDeviceBusy),
            ReadWriteMultipleRegisters(_, _, _, _) => Err(ExceptionCode::ServerDeviceFailure),
            _ => Err(ExceptionCode::NegativeAcknowledge),
        }
    }
}

impl Service for TestService {
    type Future = future::Ready<Result<Response, ExceptionCode>>;

    fn call(&self, req: SlaveRequest) -> Self::Future {
        future::ready(self.handle(req.request))
    }
}

fn assert_exception(err: Error, expected: ExceptionCode) {
    match err {
        Error::Exception(rsp) => assert_eq!(rsp.exception, expected),
        other => panic!("expected a Modbus exception, got: {other}"),
    }
}

pub async fn check_client_context(mut ctx: Context) {
    assert_exception(
        ctx.read_coils(0x00, 2).await.unwrap_err(),
        ExceptionCode::Acknowledge,
    );

    assert_exception(
        ctx.read_discrete_inputs(0x00, 2).await.unwrap_err(),
        ExceptionCode::GatewayPathUnavailable,
    );

    assert_exception(
        ctx.write_single_coil(0x00, true).await.unwrap_err(),
        ExceptionCode::GatewayTargetDevice,
    );

    assert_exception(
        ctx.write_multiple_coils(0x00, &[true]).await.unwrap_err(),
        ExceptionCode::IllegalDataAddress,
    );

    assert_exception(
        ctx.read_input_registers(0x00, 2).await.unwrap_err(),
        ExceptionCode::IllegalDataValue,
    );

    assert_exception(
        ctx.read_holding_registers(0x00, 2).await.unwrap_err(),
        ExceptionCode::IllegalFunction,
    );

    assert_exception(
        ctx.write_single_register(0x00, 42).await.unwrap_err(),
        ExceptionCode::MemoryParityError,
    );

    assert_exception(
        ctx.write_multiple_registers(0x00, &[42]).await.unwrap_err(),
        ExceptionCode::ServerDeviceBusy,
    );

    assert_exception(
        ctx.read_write_multiple_registers(0x00, 1, 0x00, &[42])
            .await
            .unwrap_err(),
        ExceptionCode::ServerDeviceFailure,
    );

    assert_exception(
        ctx.custom_request(&[0x46, 0x2A]).await.unwrap_err(),
        ExceptionCode::NegativeAcknowledge,
    );
}
