//! Binary keys for the LMDB store.
//!
//! Sol records are keyed `rover 0xFF sol(u32 BE)`. Big-endian sols keep LMDB's
//! lexicographic order identical to numeric order within a rover, and the
//! separator keeps one rover's prefix from matching another's.
//!
//! The NEO date index is keyed `YYYY-MM-DD 0xFF id`, so a date range is a
//! single key range ordered by date, then id.

use apogee_core::{PeriodKey, Rover};
use chrono::NaiveDate;

/// Separator byte between the rover name and the sol.
const SEPARATOR: u8 = 0xFF;

/// Key of a per-sol manifest record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeriodStoreKey {
    rover: Rover,
    period_key: PeriodKey,
}

impl PeriodStoreKey {
    pub fn new(rover: Rover, period_key: PeriodKey) -> Self {
        Self { rover, period_key }
    }

    pub fn rover(&self) -> Rover {
        self.rover
    }

    pub fn period_key(&self) -> PeriodKey {
        self.period_key
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = rover_prefix(self.rover);
        buf.extend_from_slice(&self.period_key.to_be_bytes());
        buf
    }

    /// Decode a key produced by [`encode`](Self::encode).
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let split = bytes.iter().position(|b| *b == SEPARATOR)?;
        let (name, rest) = bytes.split_at(split);
        let sol: [u8; 4] = rest.get(1..)?.try_into().ok()?;
        let rover = std::str::from_utf8(name).ok()?.parse().ok()?;
        Some(Self::new(rover, u32::from_be_bytes(sol)))
    }
}

/// Prefix shared by every sol key of `rover`.
pub fn rover_prefix(rover: Rover) -> Vec<u8> {
    let name = rover.as_str().as_bytes();
    let mut buf = Vec::with_capacity(name.len() + 5);
    buf.extend_from_slice(name);
    buf.push(SEPARATOR);
    buf
}

/// ISO date key; sorts lexicographically in date order.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Date index key for NEO `id` approaching on `date`.
pub fn neo_date_key(date: NaiveDate, id: &str) -> Vec<u8> {
    let mut buf = date_key(date).into_bytes();
    buf.push(SEPARATOR);
    buf.extend_from_slice(id.as_bytes());
    buf
}

/// NEO id carried by a [`neo_date_key`].
pub fn neo_id_from_date_key(bytes: &[u8]) -> Option<&[u8]> {
    let split = bytes.iter().position(|b| *b == SEPARATOR)?;
    bytes.get(split + 1..).filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let key = PeriodStoreKey::new(Rover::Perseverance, 1042);
        assert_eq!(PeriodStoreKey::decode(&key.encode()), Some(key));
    }

    #[test]
    fn test_prefix_isolates_rovers() {
        let key = PeriodStoreKey::new(Rover::Spirit, 7).encode();
        assert!(key.starts_with(&rover_prefix(Rover::Spirit)));
        assert!(!key.starts_with(&rover_prefix(Rover::Curiosity)));
    }

    #[test]
    fn test_byte_order_matches_sol_order() {
        let low = PeriodStoreKey::new(Rover::Curiosity, 255).encode();
        let high = PeriodStoreKey::new(Rover::Curiosity, 256).encode();
        assert!(low < high);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(PeriodStoreKey::decode(b"curiosity"), None);
        assert_eq!(PeriodStoreKey::decode(&[b'x', SEPARATOR, 0, 0, 0, 1]), None);
        assert_eq!(PeriodStoreKey::decode(&[b's', SEPARATOR, 0]), None);
    }

    #[test]
    fn test_neo_date_keys_order_by_date_then_id() {
        let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).expect("valid date");
        let a = neo_date_key(day(3), "3542519");
        let b = neo_date_key(day(3), "54016476");
        let next = neo_date_key(day(4), "1");
        assert!(a < b);
        assert!(b < next);
        assert!(b.as_slice() < date_key(day(4)).as_bytes());
        assert_eq!(neo_id_from_date_key(&b), Some(&b"54016476"[..]));
        assert_eq!(neo_id_from_date_key(b"2024-01-03"), None);
    }
}
