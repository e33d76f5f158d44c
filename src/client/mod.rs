// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus clients

#[cfg(feature = "sync")]
pub mod sync;

pub mod tcp;

use std::{fmt, io};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    error::{Error, Result},
    frame::*,
    slave::*,
};

pub(crate) fn unexpected_response() -> Error {
    Error::Recv(io::Error::new(
        io::ErrorKind::InvalidData,
        "unexpected response",
    ))
}

fn mismatching_response() -> Error {
    Error::Recv(io::Error::new(
        io::ErrorKind::InvalidData,
        "response does not match the request",
    ))
}

/// A transport independent asynchronous client trait.
#[async_trait]
pub trait Client: SlaveContext + fmt::Debug + Send {
    /// Invoke a Modbus operation and wait for its result.
    async fn call(&mut self, request: Request) -> Result<Response>;
}

/// An asynchronous Modbus reader.
#[async_trait]
pub trait Reader: Client {
    /// Read coils (0x01).
    async fn read_coils(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>>;

    /// Read discrete inputs (0x02).
    async fn read_discrete_inputs(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>>;

    /// Read holding registers (0x03).
    async fn read_holding_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>>;

    /// Read input registers (0x04).
    async fn read_input_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>>;

    /// Write holding registers, then read back a range of them in the same
    /// transaction (0x17).
    async fn read_write_multiple_registers(
        &mut self,
        read_addr: Address,
        read_cnt: Quantity,
        write_addr: Address,
        write_data: &[Word],
    ) -> Result<Vec<Word>>;
}

/// An asynchronous Modbus writer.
#[async_trait]
pub trait Writer: Client {
    /// Write a single coil (0x05).
    async fn write_single_coil(&mut self, addr: Address, coil: Coil) -> Result<()>;

    /// Write multiple coils (0x0F).
    async fn write_multiple_coils(&mut self, addr: Address, coils: &[Coil]) -> Result<()>;

    /// Write a single holding register (0x06).
    async fn write_single_register(&mut self, addr: Address, word: Word) -> Result<()>;

    /// Write multiple holding registers (0x10).
    async fn write_multiple_registers(&mut self, addr: Address, words: &[Word]) -> Result<()>;
}

/// An asynchronous Modbus client context.
#[derive(Debug)]
pub struct Context {
    client: Box<dyn Client>,
}

impl Context {
    /// Disconnect the client by dropping the attached transport.
    pub async fn disconnect(&mut self) -> Result<()> {
        // the poison pill is answered with a NotConnected error once the
        // transport is gone
        match self.client.call(Request::Disconnect).await {
            Err(Error::Send(err))
                if matches!(
                    err.kind(),
                    io::ErrorKind::NotConnected | io::ErrorKind::BrokenPipe
                ) =>
            {
                Ok(())
            }
            Err(err) => Err(err),
            Ok(_) => unreachable!(),
        }
    }

    /// Send a raw PDU and return the raw response PDU.
    ///
    /// The first byte of `pdu` is the function code, the rest its payload.
    /// A response carrying a Modbus exception is returned as
    /// [`Error::Exception`], never as raw bytes.
    pub async fn custom_request(&mut self, pdu: &[u8]) -> Result<Vec<u8>> {
        let Some((&function, data)) = pdu.split_first() else {
            return Err(Error::InvalidRequest("empty PDU"));
        };
        let rsp = self
            .client
            .call(Request::Custom(function, data.to_vec()))
            .await?;
        let bytes: Bytes = rsp.into();
        Ok(bytes.to_vec())
    }

    /// Read Device Identification (0x2B / MEI type 0x0E).
    ///
    /// `read_code` selects basic (1), regular (2) or extended (3) stream
    /// access, or individual access (4); `object_id` is the starting (or,
    /// for individual access, the requested) object.
    ///
    /// Continuations are not chained automatically: when the result has
    /// [`more_follows`](DeviceIdentificationResponse::more_follows) set,
    /// issue another call with `object_id` set to the reported
    /// [`next_object_id`](DeviceIdentificationResponse::next_object_id).
    pub async fn read_device_identification(
        &mut self,
        read_code: u8,
        object_id: u8,
    ) -> Result<DeviceIdentificationResponse> {
        let rsp = self
            .client
            .call(Request::ReadDeviceIdentification(read_code, object_id))
            .await?;
        match rsp {
            Response::ReadDeviceIdentification(device_id) => Ok(device_id),
            _ => Err(unexpected_response()),
        }
    }
}

impl From<Box<dyn Client>> for Context {
    fn from(client: Box<dyn Client>) -> Self {
        Self { client }
    }
}

impl From<Context> for Box<dyn Client> {
    fn from(from: Context) -> Self {
        from.client
    }
}

#[async_trait]
impl Client for Context {
    async fn call(&mut self, request: Request) -> Result<Response> {
        self.client.call(request).await
    }
}

impl SlaveContext for Context {
    fn set_slave(&mut self, slave: Slave) {
        self.client.set_slave(slave);
    }
}

#[async_trait]
impl Reader for Context {
    async fn read_coils(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>> {
        let rsp = self.client.call(Request::ReadCoils(addr, cnt)).await?;
        let Response::ReadCoils(mut coils) = rsp else {
            return Err(unexpected_response());
        };
        if coils.len() < cnt.into() {
            return Err(mismatching_response());
        }
        // the response is byte-padded, only the requested bits are defined
        coils.truncate(cnt.into());
        Ok(coils)
    }

    async fn read_discrete_inputs(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Coil>> {
        let rsp = self
            .client
            .call(Request::ReadDiscreteInputs(addr, cnt))
            .await?;
        let Response::ReadDiscreteInputs(mut inputs) = rsp else {
            return Err(unexpected_response());
        };
        if inputs.len() < cnt.into() {
            return Err(mismatching_response());
        }
        inputs.truncate(cnt.into());
        Ok(inputs)
    }

    async fn read_holding_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>> {
        let rsp = self
            .client
            .call(Request::ReadHoldingRegisters(addr, cnt))
            .await?;
        let Response::ReadHoldingRegisters(words) = rsp else {
            return Err(unexpected_response());
        };
        if words.len() != usize::from(cnt) {
            return Err(mismatching_response());
        }
        Ok(words)
    }

    async fn read_input_registers(&mut self, addr: Address, cnt: Quantity) -> Result<Vec<Word>> {
        let rsp = self
            .client
            .call(Request::ReadInputRegisters(addr, cnt))
            .await?;
        let Response::ReadInputRegisters(words) = rsp else {
            return Err(unexpected_response());
        };
        if words.len() != usize::from(cnt) {
            return Err(mismatching_response());
        }
        Ok(words)
    }

    async fn read_write_multiple_registers(
        &mut self,
        read_addr: Address,
        read_cnt: Quantity,
        write_addr: Address,
        write_data: &[Word],
    ) -> Result<Vec<Word>> {
        let rsp = self
            .client
            .call(Request::ReadWriteMultipleRegisters(
                read_addr,
                read_cnt,
                write_addr,
                write_data.to_vec(),
            ))
            .await?;
        let Response::ReadWriteMultipleRegisters(words) = rsp else {
            return Err(unexpected_response());
        };
        if words.len() != usize::from(read_cnt) {
            return Err(mismatching_response());
        }
        Ok(words)
    }
}

#[async_trait]
impl Writer for Context {
    async fn write_single_coil(&mut self, addr: Address, coil: Coil) -> Result<()> {
        let rsp = self.client.call(Request::WriteSingleCoil(addr, coil)).await?;
        let Response::WriteSingleCoil(rsp_addr, rsp_coil) = rsp else {
            return Err(unexpected_response());
        };
        if rsp_addr != addr || rsp_coil != coil {
            return Err(mismatching_response());
        }
        Ok(())
    }

    async fn write_multiple_coils(&mut self, addr: Address, coils: &[Coil]) -> Result<()> {
        let cnt = coils.len();
        let rsp = self
            .client
            .call(Request::WriteMultipleCoils(addr, coils.to_vec()))
            .await?;
        let Response::WriteMultipleCoils(rsp_addr, rsp_cnt) = rsp else {
            return Err(unexpected_response());
        };
        if rsp_addr != addr || usize::from(rsp_cnt) != cnt {
            return Err(mismatching_response());
        }
        Ok(())
    }

    async fn write_single_register(&mut self, addr: Address, word: Word) -> Result<()> {
        let rsp = self
            .client
            .call(Request::WriteSingleRegister(addr, word))
            .await?;
        let Response::WriteSingleRegister(rsp_addr, rsp_word) = rsp else {
            return Err(unexpected_response());
        };
        if rsp_addr != addr || rsp_word != word {
            return Err(mismatching_response());
        }
        Ok(())
    }

    async fn write_multiple_registers(&mut self, addr: Address, words: &[Word]) -> Result<()> {
        let cnt = words.len();
        let rsp = self
            .client
            .call(Request::WriteMultipleRegisters(addr, words.to_vec()))
            .await?;
        let Response::WriteMultipleRegisters(rsp_addr, rsp_cnt) = rsp else {
            return Err(unexpected_response());
        };
        if rsp_addr != addr || usize::from(rsp_cnt) != cnt {
            return Err(mismatching_response());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;

    #[derive(Default, Debug)]
    struct ClientMock {
        slave: Option<Slave>,
        last_request: RefCell<Option<Request>>,
        next_response: Option<std::result::Result<Response, ExceptionResponse>>,
    }

    impl ClientMock {
        fn set_next_response(
            &mut self,
            next_response: std::result::Result<Response, ExceptionResponse>,
        ) {
            self.next_response = Some(next_response);
        }
    }

    #[async_trait]
    impl Client for ClientMock {
        async fn call(&mut self, request: Request) -> Result<Response> {
            self.last_request.replace(Some(request));
            match self.next_response.as_ref().unwrap() {
                Ok(response) => Ok(response.clone()),
                Err(err) => Err(Error::Exception(*err)),
            }
        }
    }

    impl SlaveContext for ClientMock {
        fn set_slave(&mut self, slave: Slave) {
            self.slave = Some(slave);
        }
    }

    #[tokio::test]
    async fn read_some_coils() {
        // The protocol always returns entire bytes, i.e. a multiple of
        // 8 coils.
        let response_coils = [true, false, false, true, false, true, false, true].to_vec();
        for num_coils in 1..8 {
            let mut client = Box::<ClientMock>::default();
            client.set_next_response(Ok(Response::ReadCoils(response_coils.clone())));
            let mut context = Context { client };
            context.set_slave(Slave(1));
            let coils = context.read_coils(1, num_coils).await.unwrap();
            assert_eq!(&response_coils[0..num_coils.into()], &coils[..]);
        }
    }

    #[tokio::test]
    async fn read_some_discrete_inputs() {
        let response_inputs = [true, false, false, true, false, true, false, true].to_vec();
        for num_inputs in 1..8 {
            let mut client = Box::<ClientMock>::default();
            client.set_next_response(Ok(Response::ReadDiscreteInputs(response_inputs.clone())));
            let mut context = Context { client };
            context.set_slave(Slave(1));
            let inputs = context.read_discrete_inputs(1, num_inputs).await.unwrap();
            assert_eq!(&response_inputs[0..num_inputs.into()], &inputs[..]);
        }
    }

    #[tokio::test]
    async fn exception_response_surfaces_as_error() {
        let mut client = Box::<ClientMock>::default();
        client.set_next_response(Err(ExceptionResponse {
            function: 0x03,
            exception: ExceptionCode::IllegalDataAddress,
        }));
        let mut context = Context { client };
        let err = context.read_holding_registers(0, 1).await.unwrap_err();
        let Error::Exception(rsp) = err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(rsp.exception, ExceptionCode::IllegalDataAddress);
    }

    #[tokio::test]
    async fn mismatching_write_echo_is_an_error() {
        let mut client = Box::<ClientMock>::default();
        client.set_next_response(Ok(Response::WriteSingleRegister(0x10, 0x1234)));
        let mut context = Context { client };
        assert!(context.write_single_register(0x10, 0x1234).await.is_ok());

        let mut client = Box::<ClientMock>::default();
        client.set_next_response(Ok(Response::WriteSingleRegister(0x10, 0x0000)));
        let mut context = Context { client };
        assert!(context.write_single_register(0x10, 0x1234).await.is_err());
    }

    #[tokio::test]
    async fn custom_request_round_trip() {
        let mut client = Box::<ClientMock>::default();
        client.set_next_response(Ok(Response::Custom(0x55, vec![0x01, 0x02])));
        let mut context = Context { client };
        let rsp = context.custom_request(&[0x55, 0xAA]).await.unwrap();
        assert_eq!(rsp, vec![0x55, 0x01, 0x02]);
    }

    #[tokio::test]
    async fn empty_custom_request_is_rejected() {
        let mut context = Context {
            client: Box::<ClientMock>::default(),
        };
        assert!(matches!(
            context.custom_request(&[]).await,
            Err(Error::InvalidRequest(_))
        ));
    }
}
