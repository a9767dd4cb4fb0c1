//! Module containing functionality related to BSON ObjectIds.
//! For more information, see the documentation for the [`ObjectId`] type.

use std::{
    fmt,
    str::FromStr,
    sync::{
        LazyLock,
        atomic::{AtomicU32, Ordering},
    },
    time::SystemTime,
};

use crate::error::{Error, ErrorKind, Result};

const TIMESTAMP_SIZE: usize = 4;
const PROCESS_ID_SIZE: usize = 5;
const COUNTER_SIZE: usize = 3;

const TIMESTAMP_OFFSET: usize = 0;
const PROCESS_ID_OFFSET: usize = TIMESTAMP_OFFSET + TIMESTAMP_SIZE;
const COUNTER_OFFSET: usize = PROCESS_ID_OFFSET + PROCESS_ID_SIZE;

const MAX_U24: u32 = 0xFF_FFFF;

static OID_COUNTER: LazyLock<AtomicU32> =
    LazyLock::new(|| AtomicU32::new(rand::random::<u32>() & MAX_U24));

static PROCESS_UNIQUE: LazyLock<[u8; PROCESS_ID_SIZE]> = LazyLock::new(rand::random);

/// A wrapper around a raw 12-byte ObjectId.
///
/// ## Byte layout
///
/// | bytes | meaning                                   |
/// |-------|-------------------------------------------|
/// | 0..4  | seconds since the Unix epoch, big-endian  |
/// | 4..9  | per-process random value                  |
/// | 9..12 | counter, big-endian                       |
///
/// Because the fields are laid out most-significant first, comparing the raw bytes orders
/// ObjectIds by timestamp, then process value, then counter.
///
/// ## `serde` integration
/// When serialized through this crate's serializer, an `ObjectId` is written as a native BSON
/// ObjectId; other formats see its 24-character hex string if they are human-readable and its
/// 12 bytes otherwise.
#[derive(Clone, Copy, PartialEq, PartialOrd, Eq, Ord, Hash)]
pub struct ObjectId {
    id: [u8; 12],
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_str(s)
    }
}

impl From<[u8; 12]> for ObjectId {
    fn from(bytes: [u8; 12]) -> Self {
        Self { id: bytes }
    }
}

impl ObjectId {
    /// Generates a new [`ObjectId`], represented in bytes.
    /// See the [docs](http://www.mongodb.com/docs/manual/reference/object-id/)
    /// for more information.
    pub fn new() -> ObjectId {
        let timestamp = ObjectId::gen_timestamp();
        let process_id = *PROCESS_UNIQUE;
        let counter = ObjectId::gen_count();

        Self::from_parts(timestamp, process_id, counter)
    }

    /// Constructs a new ObjectId wrapper around the raw byte representation.
    pub const fn from_bytes(bytes: [u8; 12]) -> ObjectId {
        ObjectId { id: bytes }
    }

    /// Construct an `ObjectId` from its parts.
    /// See the [docs](http://www.mongodb.com/docs/manual/reference/object-id/)
    /// for more information.
    pub fn from_parts(seconds_since_epoch: u32, process_id: [u8; 5], counter: [u8; 3]) -> Self {
        let mut bytes = [0; 12];

        bytes[TIMESTAMP_OFFSET..(TIMESTAMP_OFFSET + TIMESTAMP_SIZE)]
            .copy_from_slice(&seconds_since_epoch.to_be_bytes());
        bytes[PROCESS_ID_OFFSET..(PROCESS_ID_OFFSET + PROCESS_ID_SIZE)]
            .copy_from_slice(&process_id);
        bytes[COUNTER_OFFSET..(COUNTER_OFFSET + COUNTER_SIZE)].copy_from_slice(&counter);

        Self::from_bytes(bytes)
    }

    /// Creates an ObjectID using a 12-byte (24-char) hexadecimal string.
    pub fn parse_str(s: impl AsRef<str>) -> Result<ObjectId> {
        let s = s.as_ref();

        let bytes: Vec<u8> = hex::decode(s.as_bytes()).map_err(|e| ErrorKind::InvalidObjectId {
            message: format!("{s:?} is not valid hex: {e}"),
        })?;
        let id: [u8; 12] = bytes.try_into().map_err(|_| ErrorKind::InvalidObjectId {
            message: format!("{s:?} does not encode exactly 12 bytes"),
        })?;
        Ok(ObjectId::from_bytes(id))
    }

    /// Retrieves the timestamp (seconds since epoch) from an [`ObjectId`].
    pub fn timestamp(&self) -> u32 {
        let mut buf = [0; 4];
        buf.copy_from_slice(&self.id[TIMESTAMP_OFFSET..(TIMESTAMP_OFFSET + TIMESTAMP_SIZE)]);
        u32::from_be_bytes(buf)
    }

    /// Retrieves the per-process unique value from an [`ObjectId`].
    pub fn process_id(&self) -> [u8; 5] {
        let mut buf = [0; 5];
        buf.copy_from_slice(&self.id[PROCESS_ID_OFFSET..(PROCESS_ID_OFFSET + PROCESS_ID_SIZE)]);
        buf
    }

    /// Retrieves the counter from an [`ObjectId`].
    pub fn counter(&self) -> u32 {
        let mut buf = [0; 4];
        buf[1..].copy_from_slice(&self.id[COUNTER_OFFSET..(COUNTER_OFFSET + COUNTER_SIZE)]);
        u32::from_be_bytes(buf)
    }

    /// Returns the raw byte representation of an ObjectId.
    pub const fn bytes(&self) -> [u8; 12] {
        self.id
    }

    /// Convert this [`ObjectId`] to its hex string representation.
    pub fn to_hex(self) -> String {
        hex::encode(self.id)
    }

    /// Generates a new timestamp representing the current seconds since epoch.
    fn gen_timestamp() -> u32 {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0)
    }

    /// Gets an incremental 3-byte count, represented in big endian.
    fn gen_count() -> [u8; 3] {
        let u_counter = OID_COUNTER.fetch_add(1, Ordering::SeqCst);

        // Mod result instead of OID_COUNTER to prevent threading issues.
        let u = u_counter % (MAX_U24 + 1);

        let buf = u.to_be_bytes();
        [buf[1], buf[2], buf[3]]
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("ObjectId").field(&self.to_hex()).finish()
    }
}

#[cfg(test)]
mod test {
    use super::ObjectId;

    #[test]
    fn count_generated_is_big_endian() {
        let oid = ObjectId::from_parts(0, [0; 5], [0x11, 0x22, 0x33]);
        assert_eq!(0x11u8, oid.bytes()[super::COUNTER_OFFSET]);
        assert_eq!(0x22u8, oid.bytes()[super::COUNTER_OFFSET + 1]);
        assert_eq!(0x33u8, oid.bytes()[super::COUNTER_OFFSET + 2]);
        assert_eq!(oid.counter(), 0x112233);
    }

    #[test]
    fn counter_orders_otherwise_equal_ids() {
        let process_id = [4, 5, 6, 7, 8];
        let lower = ObjectId::from_parts(1_700_000_000, process_id, [0x00, 0x00, 0x01]);
        let higher = ObjectId::from_parts(1_700_000_000, process_id, [0x00, 0x01, 0x00]);
        assert!(lower < higher);
        assert_eq!(lower.timestamp(), higher.timestamp());
        assert_eq!(lower.process_id(), higher.process_id());
    }

    #[test]
    fn timestamp_dominates_counter() {
        let earlier = ObjectId::from_parts(10, [9; 5], [0xFF, 0xFF, 0xFF]);
        let later = ObjectId::from_parts(11, [0; 5], [0, 0, 0]);
        assert!(earlier < later);
    }

    #[test]
    fn parts_round_trip() {
        let oid = ObjectId::from_parts(123, [4, 5, 6, 7, 8], [9, 10, 11]);
        assert_eq!(oid.timestamp(), 123);
        assert_eq!(oid.process_id(), [4, 5, 6, 7, 8]);
        assert_eq!(oid.counter(), 0x090a0b);
    }

    #[test]
    fn hex_round_trip() {
        let s = "541b1a00e8a23afa832b218e";
        let oid = ObjectId::parse_str(s).unwrap();
        assert_eq!(oid.to_string(), s);
        assert_eq!(s.parse::<ObjectId>().unwrap(), oid);
    }

    #[test]
    fn rejects_bad_hex() {
        assert!(ObjectId::parse_str("not hex at all").is_err());
        assert!(ObjectId::parse_str("541b1a00").is_err());
    }

    #[test]
    fn generated_ids_increase() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a, b);
        assert_eq!(a.process_id(), b.process_id());
    }
}
