//! Time formatting for the progress display.

use crate::model::EntitySnapshot;

const ONE_HOUR: u64 = 3600;

/// Formats whole seconds as `mm:ss`, or `hh:mm:ss` from one hour up.
///
/// # Examples
/// ```
/// # use pmoremote::time_utils::format_time;
/// assert_eq!(format_time(65), "01:05");
/// assert_eq!(format_time(3661), "01:01:01");
/// ```
pub fn format_time(seconds: u64) -> String {
    let hours = seconds / ONE_HOUR;
    let minutes = (seconds % ONE_HOUR) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Seconds left in the track, never negative.
///
/// Values are whole seconds, so the result is at least 1 while
/// `position < duration`.
pub fn remaining_seconds(position: u64, duration: u64) -> u64 {
    duration.saturating_sub(position)
}

/// What the progress bar of a player shows.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressView {
    /// Filled part of the bar, 0 to 100. Always 0 for live streams.
    pub percent: f64,
    /// `pos` for live streams, `pos | duration | -remaining` otherwise.
    pub title: String,
}

impl ProgressView {
    pub fn new(position: u64, duration: u64) -> Self {
        if duration == 0 {
            return Self {
                percent: 0.0,
                title: format_time(position),
            };
        }

        let position = position.min(duration);
        Self {
            percent: 100.0 * position as f64 / duration as f64,
            title: format!(
                "{} | {} | -{}",
                format_time(position),
                format_time(duration),
                format_time(remaining_seconds(position, duration))
            ),
        }
    }

    pub fn from_snapshot(snapshot: &EntitySnapshot) -> Self {
        Self::new(snapshot.position, snapshot.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(59), "00:59");
        assert_eq!(format_time(65), "01:05");
        assert_eq!(format_time(3599), "59:59");
        assert_eq!(format_time(3600), "01:00:00");
        assert_eq!(format_time(3661), "01:01:01");
        // no wrap after a day
        assert_eq!(format_time(90061), "25:01:01");
    }

    #[test]
    fn test_remaining_seconds() {
        assert_eq!(remaining_seconds(10, 100), 90);
        assert_eq!(remaining_seconds(99, 100), 1);
        assert_eq!(remaining_seconds(100, 100), 0);
        assert_eq!(remaining_seconds(150, 100), 0);
    }

    #[test]
    fn test_progress_never_shows_zero_remaining_before_end() {
        for position in 0..180 {
            let view = ProgressView::new(position, 180);
            assert!(!view.title.ends_with("-00:00"), "{}", view.title);
        }
        assert!(ProgressView::new(180, 180).title.ends_with("-00:00"));
    }

    #[test]
    fn test_progress_view() {
        let view = ProgressView::new(45, 180);
        assert_eq!(view.title, "00:45 | 03:00 | -02:15");
        assert!((view.percent - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_progress_view_live_stream() {
        let view = ProgressView::new(3725, 0);
        assert_eq!(view.title, "01:02:05");
        assert_eq!(view.percent, 0.0);
    }
}
