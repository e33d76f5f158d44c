// SPDX-License-Identifier: MIT OR Apache-2.0

//! PDU serialization

pub(crate) mod tcp;

use std::{collections::BTreeMap, io::Error};

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};

use crate::frame::*;

/// MEI type of the Read Device Identification transport.
pub(crate) const MEI_READ_DEVICE_ID: u8 = 0x0E;

const COIL_ON: u16 = 0xFF00;
const COIL_OFF: u16 = 0x0000;

fn frame_err(msg: impl Into<String>) -> Error {
    Error::new(std::io::ErrorKind::InvalidData, msg.into())
}

fn encode_coil(state: Coil) -> u16 {
    if state {
        COIL_ON
    } else {
        COIL_OFF
    }
}

fn decode_coil(value: u16) -> Result<Coil, Error> {
    match value {
        COIL_ON => Ok(true),
        COIL_OFF => Ok(false),
        other => Err(frame_err(format!("invalid coil value: 0x{other:04X}"))),
    }
}

/// LSB-first packing; the padding bits of the last byte stay zero.
fn bits_to_bytes(bits: &[Coil]) -> Vec<u8> {
    let mut packed = vec![0u8; bits.len().div_ceil(8)];
    for (i, bit) in bits.iter().enumerate() {
        packed[i / 8] |= u8::from(*bit) << (i % 8);
    }
    packed
}

fn bytes_to_bits(data: &[u8], count: Quantity) -> Vec<Coil> {
    (0..usize::from(count))
        .map(|i| data[i / 8] & (1 << (i % 8)) != 0)
        .collect()
}

fn words_from_be(data: &[u8]) -> Vec<Word> {
    data.chunks_exact(2).map(BigEndian::read_u16).collect()
}

fn put_words(pdu: &mut BytesMut, words: &[Word]) {
    for word in words {
        pdu.put_u16(*word);
    }
}

/// Byte-count-prefixed payload, as used by all read responses.
fn split_byte_count(data: &[u8]) -> Result<(usize, &[u8]), Error> {
    let (&count, payload) = data
        .split_first()
        .ok_or_else(|| frame_err("missing byte count"))?;
    let count = usize::from(count);
    if payload.len() < count {
        return Err(frame_err("payload shorter than its byte count"));
    }
    Ok((count, payload))
}

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn u16_len(len: usize) -> u16 {
    debug_assert!(len <= usize::from(u16::MAX));
    len as u16
}

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn u8_len(len: usize) -> u8 {
    debug_assert!(len <= usize::from(u8::MAX));
    len as u8
}

impl From<Request> for Bytes {
    fn from(req: Request) -> Bytes {
        use crate::frame::Request::*;
        let mut pdu = BytesMut::with_capacity(request_pdu_size(&req));
        pdu.put_u8(req.function_code());
        match req {
            ReadCoils(addr, cnt)
            | ReadDiscreteInputs(addr, cnt)
            | ReadHoldingRegisters(addr, cnt)
            | ReadInputRegisters(addr, cnt) => {
                pdu.put_u16(addr);
                pdu.put_u16(cnt);
            }
            WriteSingleCoil(addr, state) => {
                pdu.put_u16(addr);
                pdu.put_u16(encode_coil(state));
            }
            WriteSingleRegister(addr, word) => {
                pdu.put_u16(addr);
                pdu.put_u16(word);
            }
            WriteMultipleCoils(addr, coils) => {
                pdu.put_u16(addr);
                pdu.put_u16(u16_len(coils.len()));
                let packed = bits_to_bytes(&coils);
                pdu.put_u8(u8_len(packed.len()));
                pdu.put_slice(&packed);
            }
            WriteMultipleRegisters(addr, words) => {
                pdu.put_u16(addr);
                pdu.put_u16(u16_len(words.len()));
                pdu.put_u8(u8_len(words.len() * 2));
                put_words(&mut pdu, &words);
            }
            ReadWriteMultipleRegisters(read_addr, read_cnt, write_addr, words) => {
                pdu.put_u16(read_addr);
                pdu.put_u16(read_cnt);
                pdu.put_u16(write_addr);
                pdu.put_u16(u16_len(words.len()));
                pdu.put_u8(u8_len(words.len() * 2));
                put_words(&mut pdu, &words);
            }
            ReadDeviceIdentification(read_code, object_id) => {
                pdu.put_u8(MEI_READ_DEVICE_ID);
                pdu.put_u8(read_code);
                pdu.put_u8(object_id);
            }
            Custom(_, payload) => pdu.put_slice(&payload),
            Disconnect => unreachable!(),
        }
        pdu.freeze()
    }
}

impl From<RequestPdu> for Bytes {
    fn from(pdu: RequestPdu) -> Bytes {
        pdu.0.into()
    }
}

impl From<Response> for Bytes {
    fn from(rsp: Response) -> Bytes {
        use crate::frame::Response::*;
        let mut pdu = BytesMut::with_capacity(response_pdu_size(&rsp));
        pdu.put_u8(rsp.function_code());
        match rsp {
            ReadCoils(bits) | ReadDiscreteInputs(bits) => {
                let packed = bits_to_bytes(&bits);
                pdu.put_u8(u8_len(packed.len()));
                pdu.put_slice(&packed);
            }
            ReadHoldingRegisters(words) | ReadInputRegisters(words)
            | ReadWriteMultipleRegisters(words) => {
                pdu.put_u8(u8_len(words.len() * 2));
                put_words(&mut pdu, &words);
            }
            WriteSingleCoil(addr, state) => {
                pdu.put_u16(addr);
                pdu.put_u16(encode_coil(state));
            }
            WriteSingleRegister(addr, word) => {
                pdu.put_u16(addr);
                pdu.put_u16(word);
            }
            WriteMultipleCoils(addr, cnt) | WriteMultipleRegisters(addr, cnt) => {
                pdu.put_u16(addr);
                pdu.put_u16(cnt);
            }
            ReadDeviceIdentification(device_id) => {
                pdu.put_u8(MEI_READ_DEVICE_ID);
                pdu.put_u8(device_id.read_id_code);
                pdu.put_u8(device_id.conformity_level);
                pdu.put_u8(if device_id.more_follows { 0xFF } else { 0x00 });
                pdu.put_u8(device_id.next_object_id);
                pdu.put_u8(u8_len(device_id.objects.len()));
                for (id, value) in &device_id.objects {
                    pdu.put_u8(*id);
                    pdu.put_u8(u8_len(value.len()));
                    pdu.put_slice(value);
                }
            }
            Custom(_, payload) => pdu.put_slice(&payload),
        }
        pdu.freeze()
    }
}

impl From<ExceptionResponse> for Bytes {
    fn from(ex: ExceptionResponse) -> Bytes {
        debug_assert!(ex.function < 0x80);
        let mut pdu = BytesMut::with_capacity(2);
        pdu.put_u8(ex.function | 0x80);
        pdu.put_u8(ex.exception as u8);
        pdu.freeze()
    }
}

impl From<ResponsePdu> for Bytes {
    fn from(pdu: ResponsePdu) -> Bytes {
        pdu.0.map_or_else(Into::into, Into::into)
    }
}

impl TryFrom<Bytes> for Request {
    type Error = Error;

    fn try_from(bytes: Bytes) -> Result<Self, Self::Error> {
        use crate::frame::Request::*;
        let (&fn_code, rest) = bytes
            .split_first()
            .ok_or_else(|| frame_err("empty request PDU"))?;
        let req = match fn_code {
            // the six fixed-size functions share one layout:
            // two 16-bit fields after the function code
            0x01..=0x06 => {
                if rest.len() != 4 {
                    return Err(frame_err("unexpected request PDU size"));
                }
                let addr = BigEndian::read_u16(&rest[..2]);
                let value = BigEndian::read_u16(&rest[2..]);
                match fn_code {
                    0x01 => ReadCoils(addr, value),
                    0x02 => ReadDiscreteInputs(addr, value),
                    0x03 => ReadHoldingRegisters(addr, value),
                    0x04 => ReadInputRegisters(addr, value),
                    0x05 => WriteSingleCoil(addr, decode_coil(value)?),
                    _ => WriteSingleRegister(addr, value),
                }
            }
            0x0F | 0x10 => {
                if rest.len() < 5 {
                    return Err(frame_err("unexpected request PDU size"));
                }
                let addr = BigEndian::read_u16(&rest[..2]);
                let cnt = BigEndian::read_u16(&rest[2..4]);
                let byte_count = usize::from(rest[4]);
                let payload = &rest[5..];
                if payload.len() < byte_count {
                    return Err(frame_err("write payload shorter than its byte count"));
                }
                if fn_code == 0x0F {
                    if byte_count < usize::from(cnt).div_ceil(8) {
                        return Err(frame_err("byte count does not cover the quantity"));
                    }
                    WriteMultipleCoils(addr, bytes_to_bits(payload, cnt))
                } else {
                    if byte_count != usize::from(cnt) * 2 {
                        return Err(frame_err("byte count does not match the quantity"));
                    }
                    WriteMultipleRegisters(addr, words_from_be(&payload[..byte_count]))
                }
            }
            0x17 => {
                if rest.len() < 9 {
                    return Err(frame_err("unexpected request PDU size"));
                }
                let read_addr = BigEndian::read_u16(&rest[..2]);
                let read_cnt = BigEndian::read_u16(&rest[2..4]);
                let write_addr = BigEndian::read_u16(&rest[4..6]);
                let write_cnt = BigEndian::read_u16(&rest[6..8]);
                let byte_count = usize::from(rest[8]);
                let payload = &rest[9..];
                if byte_count != usize::from(write_cnt) * 2 {
                    return Err(frame_err("byte count does not match the write quantity"));
                }
                if payload.len() < byte_count {
                    return Err(frame_err("write payload shorter than its byte count"));
                }
                ReadWriteMultipleRegisters(
                    read_addr,
                    read_cnt,
                    write_addr,
                    words_from_be(&payload[..byte_count]),
                )
            }
            0x2B if rest.first() == Some(&MEI_READ_DEVICE_ID) => {
                if rest.len() != 3 {
                    return Err(frame_err("unexpected request PDU size"));
                }
                ReadDeviceIdentification(rest[1], rest[2])
            }
            // anything else below the exception range passes through
            // unparsed, for gateways and custom handlers to pick up
            code if code < 0x80 => Custom(code, rest.to_vec()),
            code => {
                return Err(frame_err(format!(
                    "invalid request function code: 0x{code:02X}"
                )));
            }
        };
        Ok(req)
    }
}

impl TryFrom<Bytes> for RequestPdu {
    type Error = Error;

    fn try_from(bytes: Bytes) -> Result<Self, Self::Error> {
        Ok(RequestPdu(Request::try_from(bytes)?))
    }
}

impl TryFrom<Bytes> for Response {
    type Error = Error;

    fn try_from(bytes: Bytes) -> Result<Self, Self::Error> {
        use crate::frame::Response::*;
        let (&fn_code, rest) = bytes
            .split_first()
            .ok_or_else(|| frame_err("empty response PDU"))?;
        let rsp = match fn_code {
            0x01 | 0x02 => {
                let (count, payload) = split_byte_count(rest)?;
                // the requested quantity is unknown at this layer, so all
                // bits of all returned bytes are unpacked
                let bits = bytes_to_bits(&payload[..count], u16_len(count * 8));
                if fn_code == 0x01 {
                    ReadCoils(bits)
                } else {
                    ReadDiscreteInputs(bits)
                }
            }
            0x03 | 0x04 | 0x17 => {
                let (count, payload) = split_byte_count(rest)?;
                let words = words_from_be(&payload[..count]);
                match fn_code {
                    0x03 => ReadHoldingRegisters(words),
                    0x04 => ReadInputRegisters(words),
                    _ => ReadWriteMultipleRegisters(words),
                }
            }
            0x05 | 0x06 | 0x0F | 0x10 => {
                if rest.len() != 4 {
                    return Err(frame_err("unexpected response PDU size"));
                }
                let addr = BigEndian::read_u16(&rest[..2]);
                let value = BigEndian::read_u16(&rest[2..]);
                match fn_code {
                    0x05 => WriteSingleCoil(addr, decode_coil(value)?),
                    0x06 => WriteSingleRegister(addr, value),
                    0x0F => WriteMultipleCoils(addr, value),
                    _ => WriteMultipleRegisters(addr, value),
                }
            }
            0x2B if rest.first() == Some(&MEI_READ_DEVICE_ID) => {
                ReadDeviceIdentification(decode_device_identification(&rest[1..])?)
            }
            code => Custom(code, rest.to_vec()),
        };
        Ok(rsp)
    }
}

fn decode_device_identification(data: &[u8]) -> Result<DeviceIdentificationResponse, Error> {
    let [read_id_code, conformity_level, more, next_object_id, number_of_objects, tail @ ..] =
        data
    else {
        return Err(frame_err("device identification response too short"));
    };
    let more_follows = match more {
        0x00 => false,
        0xFF => true,
        other => {
            return Err(frame_err(format!(
                "invalid more-follows value: 0x{other:02X}"
            )));
        }
    };
    let mut objects = BTreeMap::new();
    let mut remaining = tail;
    for _ in 0..*number_of_objects {
        let [id, len, value @ ..] = remaining else {
            return Err(frame_err("truncated object list"));
        };
        let len = usize::from(*len);
        let value = value
            .get(..len)
            .ok_or_else(|| frame_err("truncated object value"))?;
        objects.insert(*id, value.to_vec());
        remaining = &remaining[2 + len..];
    }
    Ok(DeviceIdentificationResponse {
        read_id_code: *read_id_code,
        conformity_level: *conformity_level,
        more_follows,
        next_object_id: *next_object_id,
        objects,
    })
}

impl TryFrom<Bytes> for ExceptionResponse {
    type Error = Error;

    fn try_from(bytes: Bytes) -> Result<Self, Self::Error> {
        if bytes.len() < 2 || bytes[0] < 0x80 {
            return Err(frame_err("invalid exception response"));
        }
        let exception = ExceptionCode::from_u8(bytes[1])
            .ok_or_else(|| frame_err(format!("invalid exception code: 0x{:02X}", bytes[1])))?;
        Ok(ExceptionResponse {
            function: bytes[0] - 0x80,
            exception,
        })
    }
}

impl TryFrom<Bytes> for ResponsePdu {
    type Error = Error;

    fn try_from(bytes: Bytes) -> Result<Self, Self::Error> {
        match bytes.first() {
            None => Err(frame_err("empty response PDU")),
            Some(&code) if code < 0x80 => Ok(Response::try_from(bytes)?.into()),
            Some(_) => Ok(ExceptionResponse::try_from(bytes)?.into()),
        }
    }
}

fn request_pdu_size(req: &Request) -> usize {
    use crate::frame::Request::*;
    match *req {
        ReadCoils(..)
        | ReadDiscreteInputs(..)
        | ReadHoldingRegisters(..)
        | ReadInputRegisters(..)
        | WriteSingleCoil(..)
        | WriteSingleRegister(..) => 5,
        WriteMultipleCoils(_, ref coils) => 6 + coils.len().div_ceil(8),
        WriteMultipleRegisters(_, ref words) => 6 + words.len() * 2,
        ReadWriteMultipleRegisters(_, _, _, ref words) => 10 + words.len() * 2,
        ReadDeviceIdentification(..) => 4,
        Custom(_, ref payload) => 1 + payload.len(),
        Disconnect => unreachable!(),
    }
}

fn response_pdu_size(rsp: &Response) -> usize {
    use crate::frame::Response::*;
    match *rsp {
        ReadCoils(ref bits) | ReadDiscreteInputs(ref bits) => 2 + bits.len().div_ceil(8),
        ReadHoldingRegisters(ref words)
        | ReadInputRegisters(ref words)
        | ReadWriteMultipleRegisters(ref words) => 2 + words.len() * 2,
        WriteSingleCoil(..)
        | WriteSingleRegister(..)
        | WriteMultipleCoils(..)
        | WriteMultipleRegisters(..) => 5,
        ReadDeviceIdentification(ref device_id) => {
            device_id
                .objects
                .values()
                .fold(7, |size, value| size + 2 + value.len())
        }
        Custom(_, ref payload) => 1 + payload.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req_from(raw: &[u8]) -> Result<Request, Error> {
        Request::try_from(Bytes::copy_from_slice(raw))
    }

    fn rsp_from(raw: &[u8]) -> Result<Response, Error> {
        Response::try_from(Bytes::copy_from_slice(raw))
    }

    #[test]
    fn coil_wire_values() {
        assert_eq!(encode_coil(true), 0xFF00);
        assert_eq!(encode_coil(false), 0x0000);
        assert!(decode_coil(0xFF00).unwrap());
        assert!(!decode_coil(0x0000).unwrap());
        // only the two canonical encodings are accepted
        assert!(decode_coil(0x0001).is_err());
        assert!(decode_coil(0xFF01).is_err());
    }

    #[test]
    fn bit_packing() {
        assert_eq!(bits_to_bytes(&[]), [0u8; 0]);
        assert_eq!(bits_to_bytes(&[true]), [0b1]);
        assert_eq!(bits_to_bytes(&[false, true]), [0b10]);
        assert_eq!(bits_to_bytes(&[true, false, true]), [0b101]);
        assert_eq!(bits_to_bytes(&[true; 9]), [0xFF, 0b1]);
        assert_eq!(bytes_to_bits(&[], 0), [false; 0]);
        assert_eq!(bytes_to_bits(&[0b101], 3), [true, false, true]);
        assert_eq!(bytes_to_bits(&[0xFF, 0b11], 10), [true; 10]);
    }

    #[test]
    fn encode_read_requests() {
        let pdu: Bytes = Request::ReadCoils(0x12, 4).into();
        assert_eq!(&pdu[..], [0x01, 0x00, 0x12, 0x00, 0x04]);
        let pdu: Bytes = Request::ReadDiscreteInputs(0x03, 19).into();
        assert_eq!(&pdu[..], [0x02, 0x00, 0x03, 0x00, 0x13]);
        let pdu: Bytes = Request::ReadHoldingRegisters(0x082B, 2).into();
        assert_eq!(&pdu[..], [0x03, 0x08, 0x2B, 0x00, 0x02]);
        let pdu: Bytes = Request::ReadInputRegisters(0x09, 77).into();
        assert_eq!(&pdu[..], [0x04, 0x00, 0x09, 0x00, 0x4D]);
    }

    #[test]
    fn encode_write_requests() {
        let pdu: Bytes = Request::WriteSingleCoil(0x1234, true).into();
        assert_eq!(&pdu[..], [0x05, 0x12, 0x34, 0xFF, 0x00]);
        let pdu: Bytes = Request::WriteSingleRegister(0x07, 0xABCD).into();
        assert_eq!(&pdu[..], [0x06, 0x00, 0x07, 0xAB, 0xCD]);
        let pdu: Bytes =
            Request::WriteMultipleCoils(0x3311, vec![true, false, true, true]).into();
        assert_eq!(&pdu[..], [0x0F, 0x33, 0x11, 0x00, 0x04, 0x01, 0b1101]);
        let pdu: Bytes = Request::WriteMultipleRegisters(0x06, vec![0xABCD, 0xEF12]).into();
        assert_eq!(
            &pdu[..],
            [0x10, 0x00, 0x06, 0x00, 0x02, 0x04, 0xAB, 0xCD, 0xEF, 0x12]
        );
        let pdu: Bytes =
            Request::ReadWriteMultipleRegisters(0x05, 51, 0x03, vec![0xABCD, 0xEF12]).into();
        assert_eq!(
            &pdu[..],
            [0x17, 0x00, 0x05, 0x00, 0x33, 0x00, 0x03, 0x00, 0x02, 0x04, 0xAB, 0xCD, 0xEF, 0x12]
        );
    }

    #[test]
    fn encode_special_requests() {
        let pdu: Bytes = Request::ReadDeviceIdentification(0x04, 0x00).into();
        assert_eq!(&pdu[..], [0x2B, 0x0E, 0x04, 0x00]);
        let pdu: Bytes = Request::Custom(0x55, vec![0xCC, 0x88]).into();
        assert_eq!(&pdu[..], [0x55, 0xCC, 0x88]);
    }

    #[test]
    fn decode_read_requests() {
        assert_eq!(
            req_from(&[0x01, 0x00, 0x12, 0x00, 0x04]).unwrap(),
            Request::ReadCoils(0x12, 4)
        );
        assert_eq!(
            req_from(&[0x02, 0x00, 0x03, 0x00, 0x13]).unwrap(),
            Request::ReadDiscreteInputs(0x03, 19)
        );
        assert_eq!(
            req_from(&[0x03, 0x00, 0x09, 0x00, 0x4D]).unwrap(),
            Request::ReadHoldingRegisters(0x09, 77)
        );
        assert_eq!(
            req_from(&[0x04, 0x00, 0x09, 0x00, 0x4D]).unwrap(),
            Request::ReadInputRegisters(0x09, 77)
        );
        // truncated and oversized PDUs are framing errors
        assert!(req_from(&[]).is_err());
        assert!(req_from(&[0x01]).is_err());
        assert!(req_from(&[0x01, 0x00, 0x00, 0x22]).is_err());
        assert!(req_from(&[0x01, 0x00, 0x00, 0x00, 0x22, 0x00]).is_err());
    }

    #[test]
    fn decode_write_requests() {
        assert_eq!(
            req_from(&[0x05, 0x12, 0x34, 0xFF, 0x00]).unwrap(),
            Request::WriteSingleCoil(0x1234, true)
        );
        assert_eq!(
            req_from(&[0x06, 0x00, 0x07, 0xAB, 0xCD]).unwrap(),
            Request::WriteSingleRegister(0x07, 0xABCD)
        );
        assert_eq!(
            req_from(&[0x0F, 0x33, 0x11, 0x00, 0x04, 0x01, 0b1101]).unwrap(),
            Request::WriteMultipleCoils(0x3311, vec![true, false, true, true])
        );
        assert_eq!(
            req_from(&[0x10, 0x00, 0x06, 0x00, 0x02, 0x04, 0xAB, 0xCD, 0xEF, 0x12]).unwrap(),
            Request::WriteMultipleRegisters(0x06, vec![0xABCD, 0xEF12])
        );
        assert_eq!(
            req_from(&[
                0x17, 0x00, 0x05, 0x00, 0x33, 0x00, 0x03, 0x00, 0x02, 0x04, 0xAB, 0xCD, 0xEF, 0x12
            ])
            .unwrap(),
            Request::ReadWriteMultipleRegisters(0x05, 51, 0x03, vec![0xABCD, 0xEF12])
        );
    }

    #[test]
    fn reject_malformed_write_requests() {
        // a coil value other than 0xFF00/0x0000
        assert!(req_from(&[0x05, 0x12, 0x34, 0x00, 0x01]).is_err());
        // byte count smaller than the quantity requires
        assert!(req_from(&[0x0F, 0x33, 0x11, 0x00, 0x0A, 0x01, 0b1101]).is_err());
        // payload shorter than the byte count
        assert!(req_from(&[0x0F, 0x33, 0x11, 0x00, 0x04, 0x02, 0b1101]).is_err());
        // byte count disagreeing with the register quantity
        assert!(req_from(&[0x10, 0x00, 0x06, 0x00, 0x02, 0x05, 0xAB, 0xCD, 0xEF, 0x12]).is_err());
        assert!(req_from(&[
            0x17, 0x00, 0x05, 0x00, 0x33, 0x00, 0x03, 0x00, 0x02, 0x05, 0xAB, 0xCD, 0xEF, 0x12
        ])
        .is_err());
    }

    #[test]
    fn decode_special_requests() {
        assert_eq!(
            req_from(&[0x2B, 0x0E, 0x01, 0x00]).unwrap(),
            Request::ReadDeviceIdentification(0x01, 0x00)
        );
        // a trailing byte is a framing error
        assert!(req_from(&[0x2B, 0x0E, 0x01, 0x00, 0x00]).is_err());
        // other MEI transports pass through as raw PDUs
        assert_eq!(
            req_from(&[0x2B, 0x0D, 0x01]).unwrap(),
            Request::Custom(0x2B, vec![0x0D, 0x01])
        );
        assert_eq!(
            req_from(&[0x55, 0xCC, 0x88]).unwrap(),
            Request::Custom(0x55, vec![0xCC, 0x88])
        );
        // exception-range function codes never appear in requests
        assert!(req_from(&[0x81, 0x01]).is_err());
    }

    #[test]
    fn encode_responses() {
        let pdu: Bytes = Response::ReadCoils(vec![true, false, false, true, false]).into();
        assert_eq!(&pdu[..], [0x01, 0x01, 0b1001]);
        let pdu: Bytes = Response::ReadDiscreteInputs(vec![true, false, true, true]).into();
        assert_eq!(&pdu[..], [0x02, 0x01, 0b1101]);
        let pdu: Bytes = Response::ReadHoldingRegisters(vec![0xAA00, 0x1111]).into();
        assert_eq!(&pdu[..], [0x03, 0x04, 0xAA, 0x00, 0x11, 0x11]);
        let pdu: Bytes = Response::ReadInputRegisters(vec![0xAA00, 0xCCBB, 0xEEDD]).into();
        assert_eq!(&pdu[..], [0x04, 0x06, 0xAA, 0x00, 0xCC, 0xBB, 0xEE, 0xDD]);
        let pdu: Bytes = Response::WriteSingleCoil(0x33, true).into();
        assert_eq!(&pdu[..], [0x05, 0x00, 0x33, 0xFF, 0x00]);
        let pdu: Bytes = Response::WriteSingleRegister(0x07, 0xABCD).into();
        assert_eq!(&pdu[..], [0x06, 0x00, 0x07, 0xAB, 0xCD]);
        let pdu: Bytes = Response::WriteMultipleCoils(0x3311, 5).into();
        assert_eq!(&pdu[..], [0x0F, 0x33, 0x11, 0x00, 0x05]);
        let pdu: Bytes = Response::WriteMultipleRegisters(0x06, 2).into();
        assert_eq!(&pdu[..], [0x10, 0x00, 0x06, 0x00, 0x02]);
        let pdu: Bytes = Response::ReadWriteMultipleRegisters(vec![0x1234]).into();
        assert_eq!(&pdu[..], [0x17, 0x02, 0x12, 0x34]);
    }

    #[test]
    fn encode_device_identification_response() {
        let device_id = DeviceIdentificationResponse {
            read_id_code: 0x04,
            conformity_level: 0x83,
            more_follows: false,
            next_object_id: 0,
            objects: [(0x00, b"me".to_vec())].into_iter().collect(),
        };
        let pdu: Bytes = Response::ReadDeviceIdentification(device_id).into();
        assert_eq!(
            &pdu[..],
            [0x2B, 0x0E, 0x04, 0x83, 0x00, 0x00, 0x01, 0x00, 0x02, 0x6D, 0x65]
        );
    }

    #[test]
    fn decode_responses() {
        assert_eq!(
            rsp_from(&[0x01, 0x01, 0b1001]).unwrap(),
            Response::ReadCoils(vec![true, false, false, true, false, false, false, false])
        );
        assert_eq!(
            rsp_from(&[0x02, 0x01, 0b1001]).unwrap(),
            Response::ReadDiscreteInputs(vec![
                true, false, false, true, false, false, false, false
            ])
        );
        assert_eq!(
            rsp_from(&[0x03, 0x04, 0xAA, 0x00, 0x11, 0x11]).unwrap(),
            Response::ReadHoldingRegisters(vec![0xAA00, 0x1111])
        );
        assert_eq!(
            rsp_from(&[0x04, 0x06, 0xAA, 0x00, 0xCC, 0xBB, 0xEE, 0xDD]).unwrap(),
            Response::ReadInputRegisters(vec![0xAA00, 0xCCBB, 0xEEDD])
        );
        assert_eq!(
            rsp_from(&[0x05, 0x00, 0x33, 0xFF, 0x00]).unwrap(),
            Response::WriteSingleCoil(0x33, true)
        );
        assert_eq!(
            rsp_from(&[0x06, 0x00, 0x07, 0xAB, 0xCD]).unwrap(),
            Response::WriteSingleRegister(0x07, 0xABCD)
        );
        assert_eq!(
            rsp_from(&[0x0F, 0x33, 0x11, 0x00, 0x05]).unwrap(),
            Response::WriteMultipleCoils(0x3311, 5)
        );
        assert_eq!(
            rsp_from(&[0x10, 0x00, 0x06, 0x00, 0x02]).unwrap(),
            Response::WriteMultipleRegisters(0x06, 2)
        );
        assert_eq!(
            rsp_from(&[0x17, 0x02, 0x12, 0x34]).unwrap(),
            Response::ReadWriteMultipleRegisters(vec![0x1234])
        );
        assert_eq!(
            rsp_from(&[0x55, 0xCC, 0x88]).unwrap(),
            Response::Custom(0x55, vec![0xCC, 0x88])
        );
        // a byte count pointing past the payload is a framing error
        assert!(rsp_from(&[0x01, 0x02, 0b1001]).is_err());
        assert!(rsp_from(&[0x03, 0x04, 0xAA, 0x00]).is_err());
    }

    #[test]
    fn decode_device_identification_response() {
        let rsp = rsp_from(&[
            0x2B, 0x0E, 0x01, 0x81, 0xFF, 0x02, 0x02, 0x00, 0x02, 0x6D, 0x65, 0x01, 0x01, 0x58,
        ])
        .unwrap();
        let Response::ReadDeviceIdentification(device_id) = rsp else {
            panic!("unexpected response");
        };
        assert_eq!(device_id.read_id_code, 0x01);
        assert_eq!(device_id.conformity_level, 0x81);
        assert!(device_id.more_follows);
        assert_eq!(device_id.next_object_id, 0x02);
        assert_eq!(device_id.vendor_name(), Some(&b"me"[..]));
        assert_eq!(device_id.product_code(), Some(&b"X"[..]));

        // truncated object payload
        assert!(rsp_from(&[0x2B, 0x0E, 0x01, 0x81, 0x00, 0x00, 0x01, 0x00, 0x05]).is_err());
        // object count pointing past the object list
        assert!(rsp_from(&[0x2B, 0x0E, 0x01, 0x81, 0x00, 0x00, 0x02, 0x00, 0x01, 0x58]).is_err());
    }

    #[test]
    fn exception_responses() {
        let pdu: Bytes = ExceptionResponse {
            function: 0x03,
            exception: ExceptionCode::IllegalDataAddress,
        }
        .into();
        assert_eq!(&pdu[..], [0x83, 0x02]);

        let rsp = ExceptionResponse::try_from(Bytes::copy_from_slice(&[0x83, 0x02])).unwrap();
        assert_eq!(rsp.function, 0x03);
        assert_eq!(rsp.exception, ExceptionCode::IllegalDataAddress);

        // not an exception function code
        assert!(ExceptionResponse::try_from(Bytes::copy_from_slice(&[0x79, 0x02])).is_err());
        // 0x09 is not an assigned exception code
        assert!(ExceptionResponse::try_from(Bytes::copy_from_slice(&[0x81, 0x09])).is_err());
    }

    #[test]
    fn every_assigned_exception_code_round_trips() {
        for code in [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x0A, 0x0B] {
            let exception = ExceptionCode::from_u8(code).unwrap();
            assert_eq!(exception as u8, code);
        }
        assert!(ExceptionCode::from_u8(0x00).is_none());
        assert!(ExceptionCode::from_u8(0x09).is_none());
        assert!(ExceptionCode::from_u8(0x0C).is_none());
    }
}
