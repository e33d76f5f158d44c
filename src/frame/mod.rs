// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus protocol frames (PDU level)

pub(crate) mod tcp;

use std::{collections::BTreeMap, error, fmt};

use crate::{device_id, error::Error};

#[cfg(feature = "server")]
use crate::slave::SlaveId;

/// One-byte opcode identifying the operation carried by a PDU.
pub type FunctionCode = u8;

/// 16-bit, 0-based protocol address.
///
/// Device documentation often numbers coils and registers starting at 1;
/// such addresses have to be converted by subtracting 1.
pub type Address = u16;

/// A single-bit value: `true` travels as `0xFF00`, `false` as `0x0000`.
pub type Coil = bool;

/// A 16-bit register value, big-endian on the wire.
pub type Word = u16;

/// Number of coils or registers addressed by one operation.
pub type Quantity = u16;

/// Highest quantity of bits a single read request may ask for.
pub(crate) const MAX_READ_BITS: u16 = 2000;

/// Highest quantity of words a single read request may ask for.
pub(crate) const MAX_READ_WORDS: u16 = 125;

/// Highest quantity of coils a single write request may carry.
pub(crate) const MAX_WRITE_BITS: u16 = 1968;

/// Highest quantity of words a single write request may carry.
pub(crate) const MAX_WRITE_WORDS: u16 = 123;

/// Highest quantity of words the write part of a read/write request may carry.
pub(crate) const MAX_READ_WRITE_WORDS: u16 = 121;

/// A PDU is limited to 253 bytes (260 bytes ADU - 7 bytes MBAP).
pub(crate) const MAX_PDU_SIZE: usize = 253;

/// What a client (master) asks of a server (slave).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    ReadCoils(Address, Quantity),
    ReadDiscreteInputs(Address, Quantity),
    WriteSingleCoil(Address, Coil),
    WriteMultipleCoils(Address, Vec<Coil>),
    ReadInputRegisters(Address, Quantity),
    ReadHoldingRegisters(Address, Quantity),
    WriteSingleRegister(Address, Word),
    WriteMultipleRegisters(Address, Vec<Word>),
    ReadWriteMultipleRegisters(Address, Quantity, Address, Vec<Word>),
    /// Read Device Identification (0x2B / MEI type 0x0E) with a
    /// read-device-id code in `1..=4` and a starting object id.
    ReadDeviceIdentification(u8, u8),
    /// A raw PDU: function code plus payload, passed through unparsed.
    Custom(FunctionCode, Vec<u8>),
    /// A poison pill for stopping the client service and releasing the
    /// underlying transport.
    Disconnect,
}

impl Request {
    /// The function code of this request on the wire.
    #[must_use]
    pub fn function_code(&self) -> FunctionCode {
        use Request::*;
        match *self {
            ReadCoils(_, _) => 0x01,
            ReadDiscreteInputs(_, _) => 0x02,
            ReadHoldingRegisters(_, _) => 0x03,
            ReadInputRegisters(_, _) => 0x04,
            WriteSingleCoil(_, _) => 0x05,
            WriteSingleRegister(_, _) => 0x06,
            WriteMultipleCoils(_, _) => 0x0F,
            WriteMultipleRegisters(_, _) => 0x10,
            ReadWriteMultipleRegisters(_, _, _, _) => 0x17,
            ReadDeviceIdentification(_, _) => 0x2B,
            Custom(code, _) => code,
            Disconnect => unreachable!(),
        }
    }

    /// Check all argument ranges before any encoding or I/O happens.
    ///
    /// The limits are those of the Modbus application protocol, applied on
    /// the client side so that a request that cannot possibly succeed is
    /// never sent.
    pub(crate) fn validate(&self) -> Result<(), Error> {
        use Request::*;

        fn check_span(addr: Address, cnt: usize) -> Result<(), Error> {
            if usize::from(addr) + cnt > 0x1_0000 {
                return Err(Error::InvalidRequest(
                    "address and quantity span beyond the address space",
                ));
            }
            Ok(())
        }

        match *self {
            ReadCoils(addr, cnt) | ReadDiscreteInputs(addr, cnt) => {
                if cnt == 0 || cnt > MAX_READ_BITS {
                    return Err(Error::InvalidRequest("quantity of bits out of range"));
                }
                check_span(addr, cnt.into())
            }
            ReadHoldingRegisters(addr, cnt) | ReadInputRegisters(addr, cnt) => {
                if cnt == 0 || cnt > MAX_READ_WORDS {
                    return Err(Error::InvalidRequest("quantity of words out of range"));
                }
                check_span(addr, cnt.into())
            }
            WriteSingleCoil(_, _) | WriteSingleRegister(_, _) => Ok(()),
            WriteMultipleCoils(addr, ref coils) => {
                if coils.is_empty() || coils.len() > usize::from(MAX_WRITE_BITS) {
                    return Err(Error::InvalidRequest("number of coils out of range"));
                }
                check_span(addr, coils.len())
            }
            WriteMultipleRegisters(addr, ref words) => {
                if words.is_empty() || words.len() > usize::from(MAX_WRITE_WORDS) {
                    return Err(Error::InvalidRequest("number of words out of range"));
                }
                check_span(addr, words.len())
            }
            ReadWriteMultipleRegisters(read_addr, read_cnt, write_addr, ref words) => {
                if read_cnt == 0 || read_cnt > MAX_READ_WORDS {
                    return Err(Error::InvalidRequest("read quantity out of range"));
                }
                check_span(read_addr, read_cnt.into())?;
                if words.is_empty() || words.len() > usize::from(MAX_READ_WRITE_WORDS) {
                    return Err(Error::InvalidRequest("number of words out of range"));
                }
                check_span(write_addr, words.len())
            }
            ReadDeviceIdentification(read_code, _) => {
                if !(1..=4).contains(&read_code) {
                    return Err(Error::InvalidRequest("read device id code out of range"));
                }
                Ok(())
            }
            Custom(_, ref data) => {
                if 1 + data.len() > MAX_PDU_SIZE {
                    return Err(Error::InvalidRequest("custom PDU exceeds 253 bytes"));
                }
                Ok(())
            }
            Disconnect => Ok(()),
        }
    }
}

/// The data of a successful request.
///
/// `ReadCoils`/`ReadDiscreteInputs`: the length of the result `Vec` is
/// always a multiple of 8. Only the first bits that have actually been
/// requested are defined; the value of the padding bits is unspecified and
/// should be ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    ReadCoils(Vec<Coil>),
    ReadDiscreteInputs(Vec<Coil>),
    WriteSingleCoil(Address, Coil),
    WriteMultipleCoils(Address, Quantity),
    ReadInputRegisters(Vec<Word>),
    ReadHoldingRegisters(Vec<Word>),
    WriteSingleRegister(Address, Word),
    WriteMultipleRegisters(Address, Quantity),
    ReadWriteMultipleRegisters(Vec<Word>),
    ReadDeviceIdentification(DeviceIdentificationResponse),
    Custom(FunctionCode, Vec<u8>),
}

impl Response {
    /// The function code of this response on the wire.
    #[must_use]
    pub fn function_code(&self) -> FunctionCode {
        use Response::*;
        match *self {
            ReadCoils(_) => 0x01,
            ReadDiscreteInputs(_) => 0x02,
            ReadHoldingRegisters(_) => 0x03,
            ReadInputRegisters(_) => 0x04,
            WriteSingleCoil(_, _) => 0x05,
            WriteSingleRegister(_, _) => 0x06,
            WriteMultipleCoils(_, _) => 0x0F,
            WriteMultipleRegisters(_, _) => 0x10,
            ReadWriteMultipleRegisters(_) => 0x17,
            ReadDeviceIdentification(_) => 0x2B,
            Custom(code, _) => code,
        }
    }
}

/// Parsed payload of a Read Device Identification response.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeviceIdentificationResponse {
    /// Echo of the read-device-id code of the request.
    pub read_id_code: u8,
    /// Identification conformity level of the responding device.
    pub conformity_level: u8,
    /// `true` when the requested range did not fit into one response.
    pub more_follows: bool,
    /// First object id of the remainder when `more_follows` is set,
    /// `0` otherwise.
    pub next_object_id: u8,
    /// The returned objects, keyed by object id.
    pub objects: BTreeMap<u8, Vec<u8>>,
}

impl DeviceIdentificationResponse {
    /// Raw access to a returned object.
    #[must_use]
    pub fn object(&self, id: u8) -> Option<&[u8]> {
        self.objects.get(&id).map(Vec::as_slice)
    }

    /// VendorName (object 0x00).
    #[must_use]
    pub fn vendor_name(&self) -> Option<&[u8]> {
        self.object(device_id::VENDOR_NAME)
    }

    /// ProductCode (object 0x01).
    #[must_use]
    pub fn product_code(&self) -> Option<&[u8]> {
        self.object(device_id::PRODUCT_CODE)
    }

    /// MajorMinorRevision (object 0x02).
    #[must_use]
    pub fn major_minor_revision(&self) -> Option<&[u8]> {
        self.object(device_id::MAJOR_MINOR_REVISION)
    }

    /// VendorUrl (object 0x03).
    #[must_use]
    pub fn vendor_url(&self) -> Option<&[u8]> {
        self.object(device_id::VENDOR_URL)
    }

    /// ProductName (object 0x04).
    #[must_use]
    pub fn product_name(&self) -> Option<&[u8]> {
        self.object(device_id::PRODUCT_NAME)
    }

    /// ModelName (object 0x05).
    #[must_use]
    pub fn model_name(&self) -> Option<&[u8]> {
        self.object(device_id::MODEL_NAME)
    }

    /// UserApplicationName (object 0x06).
    #[must_use]
    pub fn user_application_name(&self) -> Option<&[u8]> {
        self.object(device_id::USER_APPLICATION_NAME)
    }
}

/// A server (slave) exception code, as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionCode {
    IllegalFunction = 0x01,
    IllegalDataAddress = 0x02,
    IllegalDataValue = 0x03,
    ServerDeviceFailure = 0x04,
    Acknowledge = 0x05,
    ServerDeviceBusy = 0x06,
    NegativeAcknowledge = 0x07,
    MemoryParityError = 0x08,
    GatewayPathUnavailable = 0x0A,
    GatewayTargetDevice = 0x0B,
}

impl ExceptionCode {
    /// The exception for an assigned code value, `None` otherwise.
    #[must_use]
    pub fn from_u8(code: u8) -> Option<Self> {
        use ExceptionCode::*;
        Some(match code {
            0x01 => IllegalFunction,
            0x02 => IllegalDataAddress,
            0x03 => IllegalDataValue,
            0x04 => ServerDeviceFailure,
            0x05 => Acknowledge,
            0x06 => ServerDeviceBusy,
            0x07 => NegativeAcknowledge,
            0x08 => MemoryParityError,
            0x0A => GatewayPathUnavailable,
            0x0B => GatewayTargetDevice,
            _ => return None,
        })
    }

    pub(crate) fn description(&self) -> &str {
        use ExceptionCode::*;

        match *self {
            IllegalFunction => "Illegal function",
            IllegalDataAddress => "Illegal data address",
            IllegalDataValue => "Illegal data value",
            ServerDeviceFailure => "Server device failure",
            Acknowledge => "Acknowledge",
            ServerDeviceBusy => "Server device busy",
            NegativeAcknowledge => "Negative acknowledge",
            MemoryParityError => "Memory parity error",
            GatewayPathUnavailable => "Gateway path unavailable",
            GatewayTargetDevice => "Gateway target device failed to respond",
        }
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl error::Error for ExceptionCode {}

/// A server (slave) exception response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionResponse {
    /// The function code of the rejected request.
    pub function: FunctionCode,
    /// The reported exception.
    pub exception: ExceptionCode,
}

impl fmt::Display for ExceptionResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Modbus function {}: {}", self.function, self.exception)
    }
}

impl error::Error for ExceptionResponse {}

/// A request PDU as carried inside an ADU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RequestPdu(pub(crate) Request);

impl From<Request> for RequestPdu {
    fn from(req: Request) -> Self {
        RequestPdu(req)
    }
}

impl From<RequestPdu> for Request {
    fn from(pdu: RequestPdu) -> Self {
        pdu.0
    }
}

/// A response PDU as carried inside an ADU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResponsePdu(pub(crate) Result<Response, ExceptionResponse>);

impl From<Response> for ResponsePdu {
    fn from(rsp: Response) -> Self {
        ResponsePdu(Ok(rsp))
    }
}

impl From<ExceptionResponse> for ResponsePdu {
    fn from(rsp: ExceptionResponse) -> Self {
        ResponsePdu(Err(rsp))
    }
}

/// A request addressed to a particular slave, as seen by a server service.
#[cfg(feature = "server")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlaveRequest {
    /// The targeted slave (unit id of the request ADU).
    pub slave: SlaveId,
    /// The request itself.
    pub request: Request,
}
