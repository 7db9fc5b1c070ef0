use std::cmp::Ordering;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::CoreError;

/// Returns the current wall-clock time as milliseconds since Unix epoch.
pub fn physical_now() -> Result<u64, CoreError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .map_err(|_| CoreError::InvalidData("system clock before epoch".into()))
}

/// Revision timestamp: wall-clock milliseconds plus a logical counter that
/// breaks ties and absorbs backwards clock steps. Encoded as 12 bytes
/// (big-endian u64 wall_ms, big-endian u32 counter) so byte order is time order.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct Hlc {
    wall_ms: u64,
    counter: u32,
}

impl Hlc {
    pub fn new(wall_ms: u64, counter: u32) -> Self {
        Self { wall_ms, counter }
    }

    pub fn wall_ms(&self) -> u64 {
        self.wall_ms
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn to_bytes(&self) -> [u8; 12] {
        let mut buf = [0u8; 12];
        buf[..8].copy_from_slice(&self.wall_ms.to_be_bytes());
        buf[8..].copy_from_slice(&self.counter.to_be_bytes());
        buf
    }

    pub fn from_bytes(bytes: &[u8; 12]) -> Self {
        let mut wall = [0u8; 8];
        let mut counter = [0u8; 4];
        wall.copy_from_slice(&bytes[..8]);
        counter.copy_from_slice(&bytes[8..]);
        Self {
            wall_ms: u64::from_be_bytes(wall),
            counter: u32::from_be_bytes(counter),
        }
    }
}

impl Ord for Hlc {
    fn cmp(&self, other: &Self) -> Ordering {
        self.wall_ms
            .cmp(&other.wall_ms)
            .then(self.counter.cmp(&other.counter))
    }
}

impl PartialOrd for Hlc {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Hlc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.wall_ms, self.counter)
    }
}

/// Hands out strictly increasing revision timestamps.
pub struct HlcClock {
    last: Hlc,
}

impl HlcClock {
    pub fn new() -> Self {
        Self { last: Hlc::new(0, 0) }
    }

    /// Start after a timestamp already persisted, e.g. when reopening a store.
    pub fn resume_after(last: Hlc) -> Self {
        Self { last }
    }

    pub fn tick(&mut self) -> Result<Hlc, CoreError> {
        let now = physical_now()?;
        let next = if now > self.last.wall_ms {
            Hlc::new(now, 0)
        } else {
            Hlc::new(self.last.wall_ms, self.last.counter + 1)
        };
        self.last = next;
        Ok(next)
    }
}

impl Default for HlcClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_monotonicity() {
        let mut clock = HlcClock::new();
        let mut prev = clock.tick().unwrap();
        for _ in 0..100 {
            let next = clock.tick().unwrap();
            assert!(next > prev, "expected {next:?} > {prev:?}");
            prev = next;
        }
    }

    #[test]
    fn clock_behind_persisted_time_counts_up() {
        let future_ms = physical_now().unwrap() + 100_000;
        let mut clock = HlcClock::resume_after(Hlc::new(future_ms, 4));

        let t1 = clock.tick().unwrap();
        assert_eq!(t1, Hlc::new(future_ms, 5));
        let t2 = clock.tick().unwrap();
        assert_eq!(t2, Hlc::new(future_ms, 6));
    }

    #[test]
    fn byte_order_is_time_order() {
        let pairs = [
            (Hlc::new(100, 0), Hlc::new(200, 0)),
            (Hlc::new(100, 0), Hlc::new(100, 1)),
            (Hlc::new(100, 999), Hlc::new(101, 0)),
        ];
        for (a, b) in &pairs {
            assert!(a < b);
            assert!(a.to_bytes() < b.to_bytes());
            assert_eq!(Hlc::from_bytes(&a.to_bytes()), *a);
        }
    }
}
