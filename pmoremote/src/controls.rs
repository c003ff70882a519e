//! Translation of pointer gestures on the player widgets into command values.

/// Volume matching a click at `x` pixels on a volume bar `width` pixels wide.
///
/// Returns `None` for a degenerate bar.
pub fn volume_from_click(x: f64, width: f64) -> Option<u8> {
    if width.is_nan() || width <= 0.0 || !x.is_finite() {
        return None;
    }
    let volume = (100.0 * x / width).clamp(0.0, 100.0);
    Some(volume.floor() as u8)
}

/// Track position matching a click on the progress bar.
///
/// Seeking needs a known duration: live streams (duration 0) return `None`.
pub fn seek_from_click(x: f64, width: f64, duration: u64) -> Option<u64> {
    if duration == 0 || width.is_nan() || width <= 0.0 || !x.is_finite() {
        return None;
    }
    let fraction = (x / width).clamp(0.0, 1.0);
    Some((duration as f64 * fraction).floor() as u64)
}

/// Volume after one press of the volume up/down button.
pub fn volume_step(current: u8, step: u8, up: bool) -> u8 {
    if up {
        current.saturating_add(step).min(100)
    } else {
        current.saturating_sub(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_from_click() {
        assert_eq!(volume_from_click(50.0, 200.0), Some(25));
        assert_eq!(volume_from_click(0.0, 200.0), Some(0));
        assert_eq!(volume_from_click(250.0, 200.0), Some(100));
        assert_eq!(volume_from_click(-3.0, 200.0), Some(0));
        assert_eq!(volume_from_click(10.0, 0.0), None);
    }

    #[test]
    fn test_seek_from_click() {
        assert_eq!(seek_from_click(100.0, 400.0, 241), Some(60));
        assert_eq!(seek_from_click(400.0, 400.0, 241), Some(241));
        assert_eq!(seek_from_click(100.0, 400.0, 0), None);
        assert_eq!(seek_from_click(f64::NAN, 400.0, 100), None);
    }

    #[test]
    fn test_volume_step() {
        assert_eq!(volume_step(40, 5, true), 45);
        assert_eq!(volume_step(98, 5, true), 100);
        assert_eq!(volume_step(3, 5, false), 0);
    }
}
