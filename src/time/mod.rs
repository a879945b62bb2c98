pub use std::time::Duration;

pub const MICROSECONDS_PER_SECOND: u64 = 1_000_000;
pub const NANOSECONDS_PER_MICROSECOND: u64 = 1_000;

#[inline]
pub fn as_micros(duration: Duration) -> u64 {
    duration.as_micros().min(u64::MAX as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn micros_saturate() {
        assert_eq!(as_micros(Duration::from_millis(3)), 3_000);
        assert_eq!(as_micros(Duration::MAX), u64::MAX);
    }
}
