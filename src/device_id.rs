// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device identification object store (function 0x2B / MEI type 0x0E).

use std::{
    collections::BTreeMap,
    ops::RangeInclusive,
    sync::{Mutex, PoisonError},
};

/// VendorName object id.
pub const VENDOR_NAME: u8 = 0x00;
/// ProductCode object id.
pub const PRODUCT_CODE: u8 = 0x01;
/// MajorMinorRevision object id.
pub const MAJOR_MINOR_REVISION: u8 = 0x02;
/// VendorUrl object id.
pub const VENDOR_URL: u8 = 0x03;
/// ProductName object id.
pub const PRODUCT_NAME: u8 = 0x04;
/// ModelName object id.
pub const MODEL_NAME: u8 = 0x05;
/// UserApplicationName object id.
pub const USER_APPLICATION_NAME: u8 = 0x06;

/// First object id of the extended (private) range.
pub const FIRST_PRIVATE_OBJECT: u8 = 0x80;

/// An object value may occupy at most this many bytes, so that any single
/// object fits into one 253-byte response PDU next to the fixed fields.
const MAX_OBJECT_LEN: usize = 244;

/// Identification objects served for Read Device Identification requests.
///
/// A map from object id to an opaque byte string. Objects `0x00..=0x06` are
/// the standard ones with named accessors below, `0x07..=0x7F` are reserved
/// regular objects and `0x80..=0xFF` private ones. All access is guarded by
/// a lock, so a shared reference can be mutated concurrently with a running
/// server.
#[derive(Debug, Default)]
pub struct DeviceIdentification {
    objects: Mutex<BTreeMap<u8, Vec<u8>>>,
}

impl DeviceIdentification {
    /// An empty identification block.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The value of an object, if present.
    #[must_use]
    pub fn object(&self, id: u8) -> Option<Vec<u8>> {
        self.lock().get(&id).cloned()
    }

    /// Set the value of an object.
    ///
    /// Values longer than 244 bytes are truncated so that every object can
    /// be transported within a single response PDU.
    pub fn set_object(&self, id: u8, value: impl Into<Vec<u8>>) {
        let mut value = value.into();
        value.truncate(MAX_OBJECT_LEN);
        self.lock().insert(id, value);
    }

    /// All objects with ids inside `range`, in ascending id order.
    #[must_use]
    pub(crate) fn objects_in(&self, range: RangeInclusive<u8>) -> Vec<(u8, Vec<u8>)> {
        self.lock()
            .range(range)
            .map(|(id, value)| (*id, value.clone()))
            .collect()
    }

    /// VendorName (object 0x00).
    #[must_use]
    pub fn vendor_name(&self) -> Option<Vec<u8>> {
        self.object(VENDOR_NAME)
    }

    /// Set VendorName (object 0x00).
    pub fn set_vendor_name(&self, value: impl Into<Vec<u8>>) {
        self.set_object(VENDOR_NAME, value);
    }

    /// ProductCode (object 0x01).
    #[must_use]
    pub fn product_code(&self) -> Option<Vec<u8>> {
        self.object(PRODUCT_CODE)
    }

    /// Set ProductCode (object 0x01).
    pub fn set_product_code(&self, value: impl Into<Vec<u8>>) {
        self.set_object(PRODUCT_CODE, value);
    }

    /// MajorMinorRevision (object 0x02).
    #[must_use]
    pub fn major_minor_revision(&self) -> Option<Vec<u8>> {
        self.object(MAJOR_MINOR_REVISION)
    }

    /// Set MajorMinorRevision (object 0x02).
    pub fn set_major_minor_revision(&self, value: impl Into<Vec<u8>>) {
        self.set_object(MAJOR_MINOR_REVISION, value);
    }

    /// VendorUrl (object 0x03).
    #[must_use]
    pub fn vendor_url(&self) -> Option<Vec<u8>> {
        self.object(VENDOR_URL)
    }

    /// Set VendorUrl (object 0x03).
    pub fn set_vendor_url(&self, value: impl Into<Vec<u8>>) {
        self.set_object(VENDOR_URL, value);
    }

    /// ProductName (object 0x04).
    #[must_use]
    pub fn product_name(&self) -> Option<Vec<u8>> {
        self.object(PRODUCT_NAME)
    }

    /// Set ProductName (object 0x04).
    pub fn set_product_name(&self, value: impl Into<Vec<u8>>) {
        self.set_object(PRODUCT_NAME, value);
    }

    /// ModelName (object 0x05).
    #[must_use]
    pub fn model_name(&self) -> Option<Vec<u8>> {
        self.object(MODEL_NAME)
    }

    /// Set ModelName (object 0x05).
    pub fn set_model_name(&self, value: impl Into<Vec<u8>>) {
        self.set_object(MODEL_NAME, value);
    }

    /// UserApplicationName (object 0x06).
    #[must_use]
    pub fn user_application_name(&self) -> Option<Vec<u8>> {
        self.object(USER_APPLICATION_NAME)
    }

    /// Set UserApplicationName (object 0x06).
    pub fn set_user_application_name(&self, value: impl Into<Vec<u8>>) {
        self.set_object(USER_APPLICATION_NAME, value);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<u8, Vec<u8>>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
