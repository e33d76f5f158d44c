// SPDX-License-Identifier: MIT OR Apache-2.0

//! MBAP framing

use std::io::{Error, Result};

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};
use log::trace;
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::tcp::{Header, RequestAdu, ResponseAdu};

use super::{frame_err, u16_len};

/// Transaction id (2), protocol id (2), length (2), unit id (1).
const HEADER_LEN: usize = 7;

/// Always zero for Modbus/TCP.
const PROTOCOL_ID: u16 = 0x0000;

/// Splits MBAP-framed messages out of the receive buffer.
///
/// The length field counts the unit id plus the PDU, so anything outside
/// the open interval (2, 256) cannot belong to a valid frame and poisons
/// the connection.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct FrameDecoder;

impl FrameDecoder {
    fn split_frame(&self, buf: &mut BytesMut) -> Result<Option<(Header, Bytes)>> {
        if buf.len() < HEADER_LEN {
            return Ok(None);
        }

        let protocol_id = BigEndian::read_u16(&buf[2..4]);
        if protocol_id != PROTOCOL_ID {
            return Err(frame_err(format!(
                "invalid protocol identifier: {protocol_id}"
            )));
        }
        let len = BigEndian::read_u16(&buf[4..6]);
        if !(3..=255).contains(&len) {
            return Err(frame_err(format!("invalid header length: {len}")));
        }
        let pdu_len = usize::from(len) - 1;
        if buf.len() < HEADER_LEN + pdu_len {
            // wait for the rest of the frame
            return Ok(None);
        }

        let header = buf.split_to(HEADER_LEN);
        let hdr = Header {
            transaction_id: BigEndian::read_u16(&header[..2]),
            unit_id: header[6],
        };
        let pdu = buf.split_to(pdu_len).freeze();
        trace!("rx frame: [{:02X?}] {:02X?}", &header[..], &pdu[..]);

        Ok(Some((hdr, pdu)))
    }
}

fn put_frame(buf: &mut BytesMut, hdr: Header, pdu: &Bytes) {
    buf.reserve(HEADER_LEN + pdu.len());
    buf.put_u16(hdr.transaction_id);
    buf.put_u16(PROTOCOL_ID);
    buf.put_u16(u16_len(1 + pdu.len()));
    buf.put_u8(hdr.unit_id);
    buf.put_slice(pdu);
    if log::log_enabled!(log::Level::Trace) {
        let frame = &buf[buf.len() - HEADER_LEN - pdu.len()..];
        trace!(
            "tx frame: [{:02X?}] {:02X?}",
            &frame[..HEADER_LEN],
            &frame[HEADER_LEN..]
        );
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ClientCodec {
    decoder: FrameDecoder,
}

impl Decoder for ClientCodec {
    type Item = ResponseAdu;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<ResponseAdu>> {
        let Some((hdr, pdu)) = self.decoder.split_frame(buf)? else {
            return Ok(None);
        };
        Ok(Some(ResponseAdu {
            hdr,
            pdu: pdu.try_into()?,
        }))
    }
}

impl Encoder<RequestAdu> for ClientCodec {
    type Error = Error;

    fn encode(&mut self, adu: RequestAdu, buf: &mut BytesMut) -> Result<()> {
        if adu.disconnect {
            // The disconnect happens implicitly after letting this request
            // fail, which drops the attached transport and thereby
            // terminates the connection.
            return Err(Error::new(
                std::io::ErrorKind::NotConnected,
                "disconnecting (not an error)",
            ));
        }
        let pdu: Bytes = adu.pdu.into();
        put_frame(buf, adu.hdr, &pdu);
        Ok(())
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ServerCodec {
    decoder: FrameDecoder,
}

impl Decoder for ServerCodec {
    type Item = RequestAdu;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<RequestAdu>> {
        let Some((hdr, pdu)) = self.decoder.split_frame(buf)? else {
            return Ok(None);
        };
        Ok(Some(RequestAdu {
            hdr,
            pdu: pdu.try_into()?,
            disconnect: false,
        }))
    }
}

impl Encoder<ResponseAdu> for ServerCodec {
    type Error = Error;

    fn encode(&mut self, adu: ResponseAdu, buf: &mut BytesMut) -> Result<()> {
        let pdu: Bytes = adu.pdu.into();
        put_frame(buf, adu.hdr, &pdu);
        Ok(())
    }
}
