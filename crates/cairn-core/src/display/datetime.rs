//! Timestamp formatting in the local time zone.

use std::fmt;

use jiff::{tz::TimeZone, Timestamp};

/// Formats a [`Timestamp`] as `YYYY-MM-DD HH:MM:SS TZ` in the system time
/// zone.
pub struct LocalDateTime<'a>(pub &'a Timestamp);

impl fmt::Display for LocalDateTime<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.0
                .to_zoned(TimeZone::system())
                .strftime("%Y-%m-%d %H:%M:%S %Z")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_date_time_shape() {
        let ts = Timestamp::from_second(1_700_000_000).unwrap();
        let rendered = LocalDateTime(&ts).to_string();
        // Date and time parts are fixed width; the zone suffix varies.
        assert_eq!(&rendered[4..5], "-");
        assert_eq!(&rendered[13..14], ":");
        assert!(rendered.len() > "2023-11-14 22:13:20".len());
    }
}
