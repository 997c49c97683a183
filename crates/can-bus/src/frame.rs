//! Captured CAN Frame

use crate::error::CanError;
use crate::id::STANDARD_ID_MASK;
use crate::MAX_DATA_LENGTH;
use embedded_can::{Id, StandardId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classic CAN data frame with a standard identifier.
///
/// Only the first `dlc` bytes of `data` are meaningful; the remainder is
/// always zero so that two frames with equal visible content compare equal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanFrame {
    identifier: u16,
    dlc: u8,
    data: [u8; MAX_DATA_LENGTH],
}

impl CanFrame {
    /// Create a frame, rejecting out-of-range identifiers and payloads
    pub fn new(identifier: u32, payload: &[u8]) -> Result<Self, CanError> {
        if identifier > STANDARD_ID_MASK {
            return Err(CanError::InvalidIdentifier(identifier));
        }
        if payload.len() > MAX_DATA_LENGTH {
            return Err(CanError::InvalidDataLength(payload.len()));
        }
        Ok(Self::from_raw(identifier, payload.len() as u8, payload))
    }

    /// Build a frame from controller-reported fields.
    ///
    /// Never fails: the identifier is masked to 11 bits, the length is
    /// clamped to 8 and only the first `dlc` bytes of `bytes` are copied.
    pub fn from_raw(identifier: u32, dlc: u8, bytes: &[u8]) -> Self {
        let dlc = dlc.min(MAX_DATA_LENGTH as u8);
        let len = (dlc as usize).min(bytes.len());
        let mut data = [0u8; MAX_DATA_LENGTH];
        data[..len].copy_from_slice(&bytes[..len]);
        Self {
            identifier: (identifier & STANDARD_ID_MASK) as u16,
            dlc,
            data,
        }
    }

    /// Raw 11-bit identifier
    pub fn identifier(&self) -> u32 {
        self.identifier as u32
    }

    /// Number of payload bytes
    pub fn data_length(&self) -> usize {
        self.dlc as usize
    }

    /// Meaningful payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.dlc as usize]
    }
}

/// Renders the report line without its terminator:
/// `ID: 0x123, DLC: 3, Data: AA BB CC`
impl fmt::Display for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ID: 0x{:03X}, DLC: {}, Data:", self.identifier, self.dlc)?;
        for byte in self.payload() {
            write!(f, " {:02X}", byte)?;
        }
        Ok(())
    }
}

impl embedded_can::Frame for CanFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        match id.into() {
            Id::Standard(id) => CanFrame::new(id.as_raw() as u32, data).ok(),
            Id::Extended(_) => None,
        }
    }

    fn new_remote(_id: impl Into<Id>, _dlc: usize) -> Option<Self> {
        None
    }

    fn is_extended(&self) -> bool {
        false
    }

    fn is_remote_frame(&self) -> bool {
        false
    }

    fn id(&self) -> Id {
        // identifier is masked to 11 bits on every construction path
        Id::Standard(StandardId::new(self.identifier).unwrap_or(StandardId::ZERO))
    }

    fn dlc(&self) -> usize {
        self.dlc as usize
    }

    fn data(&self) -> &[u8] {
        self.payload()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_can::{ExtendedId, Frame};
    use proptest::prelude::*;

    #[test]
    fn test_report_line_format() {
        let frame = CanFrame::new(0x123, &[0xAA, 0xBB, 0xCC]).unwrap();
        assert_eq!(frame.to_string(), "ID: 0x123, DLC: 3, Data: AA BB CC");
    }

    #[test]
    fn test_report_line_pads_identifier() {
        let frame = CanFrame::new(0x7, &[]).unwrap();
        assert_eq!(frame.to_string(), "ID: 0x007, DLC: 0, Data:");
    }

    #[test]
    fn test_new_rejects_extended_range() {
        assert_eq!(
            CanFrame::new(0x800, &[]),
            Err(CanError::InvalidIdentifier(0x800))
        );
        assert_eq!(
            CanFrame::new(0x100, &[0; 9]),
            Err(CanError::InvalidDataLength(9))
        );
    }

    #[test]
    fn test_from_raw_clamps_length() {
        let bytes = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10];
        let frame = CanFrame::from_raw(0x1FFF, 15, &bytes);
        assert_eq!(frame.identifier(), 0x7FF);
        assert_eq!(frame.data_length(), 8);
        assert_eq!(frame.payload(), &bytes[..8]);
    }

    #[test]
    fn test_from_raw_ignores_bytes_past_dlc() {
        let frame = CanFrame::from_raw(0x10, 2, &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(frame.payload(), &[0xDE, 0xAD]);
        assert_eq!(frame, CanFrame::new(0x10, &[0xDE, 0xAD]).unwrap());
    }

    #[test]
    fn test_embedded_can_frame() {
        let id = StandardId::new(0x321).unwrap();
        let frame = <CanFrame as Frame>::new(id, &[1, 2]).unwrap();
        assert_eq!(frame.id(), Id::Standard(id));
        assert_eq!(frame.dlc(), 2);
        assert!(!frame.is_extended());

        let ext = ExtendedId::new(0x1234_5678).unwrap();
        assert!(<CanFrame as Frame>::new(ext, &[]).is_none());
        assert!(<CanFrame as Frame>::new_remote(id, 0).is_none());
    }

    proptest! {
        #[test]
        fn prop_from_raw_stays_in_range(id in any::<u32>(), dlc in any::<u8>()) {
            let frame = CanFrame::from_raw(id, dlc, &[0xFF; 8]);
            prop_assert!(frame.identifier() <= 0x7FF);
            prop_assert!(frame.data_length() <= 8);
            prop_assert_eq!(frame.identifier(), id & 0x7FF);
        }
    }
}
