use std::time::{Duration, SystemTime, UNIX_EPOCH};

// ========================================================================= //

/// Converts a CFB file timestamp (the number of 100-nanosecond intervals
/// since January 1, 1601 UTC) to a `SystemTime`.
pub fn system_time_from_timestamp(timestamp: u64) -> SystemTime {
    let delta = Duration::new(
        timestamp / 10_000_000,
        (timestamp % 10_000_000) as u32 * 100,
    );
    epoch() + delta
}

/// Converts a CFB file timestamp to a `SystemTime`, treating zero as absent.
pub fn optional_system_time(timestamp: u64) -> Option<SystemTime> {
    if timestamp == 0 {
        None
    } else {
        Some(system_time_from_timestamp(timestamp))
    }
}

fn epoch() -> SystemTime {
    // The epoch used by CFB files is Jan 1, 1601 UTC, which we can calculate
    // from the Unix epoch constant, which is Jan 1, 1970 UTC.
    UNIX_EPOCH - Duration::from_secs(11644473600)
}

// ========================================================================= //

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use super::{optional_system_time, system_time_from_timestamp};

    #[test]
    fn system_time() {
        let sat_18_mar_2017_at_18_46_36_gmt =
            UNIX_EPOCH + Duration::from_secs(1489862796);
        assert_eq!(
            system_time_from_timestamp(131343363960000000),
            sat_18_mar_2017_at_18_46_36_gmt
        );
    }

    #[test]
    fn zero_timestamp_is_absent() {
        assert_eq!(optional_system_time(0), None);
        assert!(optional_system_time(131343363960000000).is_some());
    }
}

// ========================================================================= //
