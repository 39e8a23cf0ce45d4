//! Longitude-based hour alignment
//!
//! The weather provider returns hourly points relative to "now". To label them
//! with the viewer's wall-clock hour we approximate the viewer's UTC offset as
//! one hour per 15° of longitude. This is a solar-time approximation, not a
//! political timezone lookup: all of China is UTC+8, yet Ürümqi (87.6°E)
//! resolves to UTC+6 here. Callers accept that disagreement.

use chrono::{DateTime, FixedOffset, Offset, Timelike, Utc};

/// Degrees of longitude per hour of offset
const DEGREES_PER_HOUR: f64 = 15.0;

/// Rounds half values up, matching the provider-side arithmetic
/// (`-7.5` becomes `-7`, `2.5` becomes `3`)
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Returns the approximate UTC offset in whole hours for a longitude
///
/// `round(longitude / 15)`, in [-12, 12] for valid longitudes.
pub fn offset_hours(longitude: f64) -> i32 {
    round_half_up(longitude / DEGREES_PER_HOUR) as i32
}

/// Returns the viewer's approximate local time for `now`
pub fn local_now(longitude: f64, now: DateTime<Utc>) -> DateTime<FixedOffset> {
    // offset_hours is bounded by ±12, well inside FixedOffset's ±24h range
    let offset = FixedOffset::east_opt(offset_hours(longitude) * 3600).unwrap_or_else(|| Utc.fix());
    now.with_timezone(&offset)
}

/// Returns the viewer's approximate local hour (0-23) for `now`
pub fn local_current_hour(longitude: f64, now: DateTime<Utc>) -> u8 {
    local_now(longitude, now).hour() as u8
}

/// Returns local hours for `count` consecutive hourly points
///
/// Point `i` is `(local_current_hour + i) mod 24`.
pub fn align_hours(count: usize, longitude: f64, now: DateTime<Utc>) -> Vec<u8> {
    let start = local_current_hour(longitude, now) as usize;
    (0..count).map(|i| ((start + i) % 24) as u8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 15, hour, 30, 0).unwrap()
    }

    #[test]
    fn test_offset_from_longitude() {
        assert_eq!(offset_hours(120.0), 8);
        assert_eq!(offset_hours(0.0), 0);
        assert_eq!(offset_hours(-123.1), -8);
        assert_eq!(offset_hours(7.4), 0);
        assert_eq!(offset_hours(7.5), 1);
    }

    #[test]
    fn test_offset_rounds_negative_halves_up() {
        assert_eq!(offset_hours(-112.5), -7);
        assert_eq!(offset_hours(-7.5), 0);
    }

    #[test]
    fn test_antimeridian_offsets() {
        assert_eq!(offset_hours(180.0), 12);
        assert_eq!(offset_hours(-180.0), -12);
        assert_eq!(offset_hours(179.9), 12);
        assert_eq!(local_current_hour(180.0, utc(10)), 22);
        assert_eq!(local_current_hour(-180.0, utc(10)), 22);
    }

    #[test]
    fn test_approximation_differs_from_political_timezone() {
        // Ürümqi observes UTC+8 but sits at 87.6°E
        assert_eq!(offset_hours(87.6), 6);
    }

    #[test]
    fn test_local_current_hour() {
        assert_eq!(local_current_hour(120.0, utc(10)), 18);
        assert_eq!(local_current_hour(-123.1, utc(3)), 19);
    }

    #[test]
    fn test_hours_start_at_local_hour_and_wrap() {
        let hours = align_hours(24, 120.0, utc(10));
        assert_eq!(hours.len(), 24);
        assert_eq!(hours[0], 18);
        assert_eq!(hours[5], 23);
        assert_eq!(hours[6], 0);
        assert_eq!(hours[23], 17);
    }

    #[test]
    fn test_align_empty_series() {
        assert!(align_hours(0, 120.0, utc(10)).is_empty());
    }

    #[test]
    fn test_local_now_carries_offset() {
        let local = local_now(120.0, utc(20));
        assert_eq!(local.offset().local_minus_utc(), 8 * 3600);
        assert_eq!(local.hour(), 4);
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(-2.5), -2.0);
        assert_eq!(round_half_up(-2.6), -3.0);
        assert_eq!(round_half_up(1013.25), 1013.0);
    }
}
