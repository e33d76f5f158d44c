// SPDX-License-Identifier: MIT OR Apache-2.0

//! ADU-level framing types for Modbus/TCP.
//!
//! Only the two variable MBAP fields live here. The protocol id is fixed
//! at zero and the length field is derived from the PDU; the codec checks
//! and computes both.

use super::*;

pub(crate) type TransactionId = u16;
pub(crate) type UnitId = u8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Header {
    pub(crate) transaction_id: TransactionId,
    pub(crate) unit_id: UnitId,
}

/// MBAP header plus request PDU. The `disconnect` flag marks the poison
/// pill that tears down a client transport instead of being transmitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RequestAdu {
    pub(crate) hdr: Header,
    pub(crate) pdu: RequestPdu,
    pub(crate) disconnect: bool,
}

/// MBAP header plus response PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResponseAdu {
    pub(crate) hdr: Header,
    pub(crate) pdu: ResponsePdu,
}

#[cfg(feature = "server")]
impl From<RequestAdu> for SlaveRequest {
    fn from(adu: RequestAdu) -> Self {
        Self {
            slave: adu.hdr.unit_id,
            request: adu.pdu.into(),
        }
    }
}
