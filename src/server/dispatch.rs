// SPDX-License-Identifier: MIT OR Apache-2.0

//! Default function-code dispatcher

use std::{fmt, future, net::SocketAddr, sync::Arc};

use crate::{
    codec::u16_len,
    data::{DataBank, DataStore, SessionInfo},
    device_id::{DeviceIdentification, FIRST_PRIVATE_OBJECT},
    frame::{
        DeviceIdentificationResponse, ExceptionCode, Quantity, Request, Response, SlaveRequest,
        MAX_PDU_SIZE, MAX_READ_BITS, MAX_READ_WORDS, MAX_READ_WRITE_WORDS, MAX_WRITE_BITS,
        MAX_WRITE_WORDS,
    },
    server::Service,
};

/// Identification conformity level: extended identification, both stream
/// and individual access supported.
const CONFORMITY_LEVEL: u8 = 0x83;

/// Fixed part of a Read Device Identification response PDU: function code,
/// MEI type, read code, conformity level, more-follows, next object id and
/// object count.
const DEVICE_ID_FIXED_LEN: usize = 7;

/// The builtin request engine: implements the standard data-access
/// function codes on top of a [`DataStore`] and answers Read Device
/// Identification from an optional [`DeviceIdentification`] block.
///
/// One instance serves one connection; the peer address is baked in at
/// accept time and reaches the store with every call as part of the
/// [`SessionInfo`].
pub struct DataService {
    peer: SocketAddr,
    store: Arc<dyn DataStore>,
    device_id: Option<Arc<DeviceIdentification>>,
}

impl fmt::Debug for DataService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataService")
            .field("peer", &self.peer)
            .field("device_id", &self.device_id)
            .finish_non_exhaustive()
    }
}

impl DataService {
    /// A service backed by a shared [`DataBank`].
    #[must_use]
    pub fn new(peer: SocketAddr, bank: Arc<DataBank>) -> Self {
        Self {
            peer,
            store: bank,
            device_id: None,
        }
    }

    /// A service backed by a custom store.
    #[must_use]
    pub fn with_store(peer: SocketAddr, store: Arc<dyn DataStore>) -> Self {
        Self {
            peer,
            store,
            device_id: None,
        }
    }

    /// Attach a device identification block.
    ///
    /// Without one, Read Device Identification requests are answered with
    /// [`ExceptionCode::IllegalDataAddress`].
    #[must_use]
    pub fn with_device_identification(mut self, device_id: Arc<DeviceIdentification>) -> Self {
        self.device_id = Some(device_id);
        self
    }

    fn handle(&self, req: SlaveRequest) -> Result<Response, ExceptionCode> {
        let session = SessionInfo {
            peer: self.peer,
            slave: req.slave,
        };
        match req.request {
            Request::ReadCoils(address, quantity) => {
                check_quantity(quantity, MAX_READ_BITS)?;
                let coils = self.store.read_coils(address, quantity, &session)?;
                Ok(Response::ReadCoils(coils))
            }
            Request::ReadDiscreteInputs(address, quantity) => {
                check_quantity(quantity, MAX_READ_BITS)?;
                let inputs = self.store.read_discrete_inputs(address, quantity, &session)?;
                Ok(Response::ReadDiscreteInputs(inputs))
            }
            Request::ReadHoldingRegisters(address, quantity) => {
                check_quantity(quantity, MAX_READ_WORDS)?;
                let words = self
                    .store
                    .read_holding_registers(address, quantity, &session)?;
                Ok(Response::ReadHoldingRegisters(words))
            }
            Request::ReadInputRegisters(address, quantity) => {
                check_quantity(quantity, MAX_READ_WORDS)?;
                let words = self.store.read_input_registers(address, quantity, &session)?;
                Ok(Response::ReadInputRegisters(words))
            }
            Request::WriteSingleCoil(address, coil) => {
                self.store.write_coils(address, &[coil], &session)?;
                Ok(Response::WriteSingleCoil(address, coil))
            }
            Request::WriteSingleRegister(address, word) => {
                self.store.write_holding_registers(address, &[word], &session)?;
                Ok(Response::WriteSingleRegister(address, word))
            }
            Request::WriteMultipleCoils(address, coils) => {
                check_quantity(u16_len(coils.len()), MAX_WRITE_BITS)?;
                self.store.write_coils(address, &coils, &session)?;
                Ok(Response::WriteMultipleCoils(address, u16_len(coils.len())))
            }
            Request::WriteMultipleRegisters(address, words) => {
                check_quantity(u16_len(words.len()), MAX_WRITE_WORDS)?;
                self.store.write_holding_registers(address, &words, &session)?;
                Ok(Response::WriteMultipleRegisters(
                    address,
                    u16_len(words.len()),
                ))
            }
            Request::ReadWriteMultipleRegisters(read_address, read_quantity, write_address, words) => {
                check_quantity(read_quantity, MAX_READ_WORDS)?;
                check_quantity(u16_len(words.len()), MAX_READ_WRITE_WORDS)?;
                // write first; a write exception suppresses the read
                self.store
                    .write_holding_registers(write_address, &words, &session)?;
                let words = self
                    .store
                    .read_holding_registers(read_address, read_quantity, &session)?;
                Ok(Response::ReadWriteMultipleRegisters(words))
            }
            Request::ReadDeviceIdentification(read_code, object_id) => {
                self.read_device_identification(read_code, object_id)
            }
            Request::Custom(_, _) | Request::Disconnect => Err(ExceptionCode::IllegalFunction),
        }
    }

    fn read_device_identification(
        &self,
        read_code: u8,
        object_id: u8,
    ) -> Result<Response, ExceptionCode> {
        let device_id = self
            .device_id
            .as_ref()
            .ok_or(ExceptionCode::IllegalDataAddress)?;
        let range = match read_code {
            1 => 0x00..=MAJOR_MINOR_REVISION_MAX,
            2 => object_id.max(0x03)..=0x7F,
            3 => object_id.max(FIRST_PRIVATE_OBJECT)..=0xFF,
            4 => object_id..=object_id,
            _ => return Err(ExceptionCode::IllegalDataValue),
        };
        let candidates = device_id.objects_in(range);
        if read_code == 4 && candidates.is_empty() {
            return Err(ExceptionCode::IllegalDataAddress);
        }

        let mut size = DEVICE_ID_FIXED_LEN;
        let mut more_follows = false;
        let mut next_object_id = 0;
        let mut objects = std::collections::BTreeMap::new();
        for (id, value) in candidates {
            if size + 2 + value.len() > MAX_PDU_SIZE {
                more_follows = true;
                next_object_id = id;
                break;
            }
            size += 2 + value.len();
            objects.insert(id, value);
        }

        Ok(Response::ReadDeviceIdentification(
            DeviceIdentificationResponse {
                read_id_code: read_code,
                conformity_level: CONFORMITY_LEVEL,
                more_follows,
                next_object_id,
                objects,
            },
        ))
    }
}

/// Basic identification ends at MajorMinorRevision.
const MAJOR_MINOR_REVISION_MAX: u8 = 0x02;

fn check_quantity(quantity: Quantity, max: Quantity) -> Result<(), ExceptionCode> {
    if quantity == 0 || quantity > max {
        return Err(ExceptionCode::IllegalDataValue);
    }
    Ok(())
}

impl Service for DataService {
    type Future = future::Ready<Result<Response, ExceptionCode>>;

    fn call(&self, req: SlaveRequest) -> Self::Future {
        future::ready(self.handle(req))
    }
}
