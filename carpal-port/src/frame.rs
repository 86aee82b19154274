//! Transport frame object

use carpal_core::InvalidValue;

/// 11-bit arbitration id
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameId(u16);

impl FrameId {
    const MAX_VALUE: u16 = 0x7ff;
    pub const MAX: FrameId = FrameId(Self::MAX_VALUE);

    pub const fn new(value: u16) -> Option<Self> {
        if value <= Self::MAX_VALUE {
            Some(Self::from_u16_truncating(value))
        } else {
            None
        }
    }

    pub const fn from_u16_truncating(value: u16) -> Self {
        Self(value & Self::MAX_VALUE)
    }

    pub const fn into_u16(self) -> u16 {
        self.0
    }
}

impl From<FrameId> for u16 {
    fn from(value: FrameId) -> Self {
        value.into_u16()
    }
}

impl From<FrameId> for u32 {
    fn from(value: FrameId) -> Self {
        value.into_u16().into()
    }
}

impl TryFrom<u16> for FrameId {
    type Error = InvalidValue;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidValue)
    }
}

impl From<embedded_can::StandardId> for FrameId {
    fn from(value: embedded_can::StandardId) -> Self {
        Self::from_u16_truncating(value.as_raw())
    }
}

impl From<FrameId> for embedded_can::StandardId {
    fn from(value: FrameId) -> Self {
        // An 11-bit FrameId is a valid standard CAN id by construction
        match embedded_can::StandardId::new(value.into_u16()) {
            Some(id) => id,
            None => unreachable!(),
        }
    }
}

/// Payload data vector
///
/// Holds up to 8 bytes with an explicit length. The payload is addressable both
/// as bytes and as a little-endian 64-bit scalar; the two views observe the same
/// bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Data {
    length: u8,
    bytes: [u8; 8],
}

impl Data {
    pub const MAX_LENGTH: usize = 8;

    /// Creates a new vector from a slice of compatible length.
    pub fn new(data: &[u8]) -> Result<Self, InvalidValue> {
        if data.len() > Self::MAX_LENGTH {
            return Err(InvalidValue);
        }
        let mut bytes = [0; 8];
        bytes[..data.len()].copy_from_slice(data);

        Ok(Self {
            length: data.len() as u8,
            bytes,
        })
    }

    pub const fn new_zeros(length: u8) -> Self {
        let length = if length > Self::MAX_LENGTH as u8 {
            Self::MAX_LENGTH as u8
        } else {
            length
        };
        Self {
            length,
            bytes: [0; 8],
        }
    }

    /// Full-length payload from a little-endian scalar.
    pub const fn from_u64(bits: u64) -> Self {
        Self {
            length: Self::MAX_LENGTH as u8,
            bytes: bits.to_le_bytes(),
        }
    }

    /// The payload bits as a little-endian scalar.
    ///
    /// Bytes beyond `length` read as zero.
    pub const fn as_u64(&self) -> u64 {
        u64::from_le_bytes(self.bytes)
    }

    pub const fn length(&self) -> u8 {
        self.length
    }
}

impl core::ops::Deref for Data {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.bytes[..usize::from(self.length)]
    }
}

impl core::ops::DerefMut for Data {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.bytes[..usize::from(self.length)]
    }
}

/// Transport frame: an arbitration id and up to 8 payload bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    pub id: FrameId,
    pub data: Data,
}

impl Frame {
    pub const fn new(id: FrameId, data: Data) -> Self {
        Self { id, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_id_bounds() {
        assert!(FrameId::new(0x7ff).is_some());
        assert!(FrameId::new(0x800).is_none());
        assert_eq!(FrameId::from_u16_truncating(0x800).into_u16(), 0);
    }

    #[test]
    fn test_standard_id_round_trip() {
        let id = FrameId::new(0x10a).unwrap();
        let std_id = embedded_can::StandardId::from(id);
        assert_eq!(FrameId::from(std_id), id);
    }

    #[test]
    fn test_data_views_agree() {
        let data = Data::new(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]).unwrap();
        assert_eq!(data.as_u64(), 0x0807_0605_0403_0201);

        let data = Data::from_u64(0x0807_0605_0403_0201);
        assert_eq!(&data[..], &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
    }

    #[test]
    fn test_data_length() {
        assert!(Data::new(&[0; 9]).is_err());

        let data = Data::new(&[0xff; 3]).unwrap();
        assert_eq!(data.length(), 3);
        assert_eq!(data.len(), 3);
        // bytes beyond the length read as zero through the scalar view
        assert_eq!(data.as_u64(), 0x00ff_ffff);
    }
}
