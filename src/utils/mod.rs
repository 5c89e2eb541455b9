use std::time::Duration;

use chrono::{DateTime, Utc};

fn fit_with_remainder(dividend: u64, divisor: u64) -> (u64, u64) {
    let fit = dividend / divisor;
    let remainder = dividend % divisor;
    (fit, remainder)
}

/// Given a duration, format like "00:00:00"
pub fn format_elapsed_time(elapsed: Duration) -> String {
    let elapsed = elapsed.as_secs();
    let (hours, remainder) = fit_with_remainder(elapsed, 3600);
    let (minutes, seconds) = fit_with_remainder(remainder, 60);
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Given a timestamp, get the elapsed time and return formatted string
pub fn format_time_as_elapsed(time: DateTime<Utc>) -> String {
    let elapsed = Utc::now().signed_duration_since(time);
    // Future timestamps show as zero
    format_elapsed_time(elapsed.to_std().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed_time() {
        assert_eq!(&format_elapsed_time(Duration::from_secs(0)), "00:00:00");
        assert_eq!(&format_elapsed_time(Duration::from_secs(3723)), "01:02:03");
        assert_eq!(
            &format_elapsed_time(Duration::from_secs(100 * 3600 + 59)),
            "100:00:59"
        );
    }

    #[test]
    fn test_format_time_as_elapsed() {
        let time = Utc::now() - chrono::Duration::seconds(125);
        let formatted = format_time_as_elapsed(time);
        assert!(formatted == "00:02:05" || formatted == "00:02:06");
        assert_eq!(
            &format_time_as_elapsed(Utc::now() + chrono::Duration::seconds(60)),
            "00:00:00"
        );
    }
}
