//! Certificate eligibility, derived from the completed-lecture ratio.
//!
//! Eligibility is necessary but not sufficient for download: the course must
//! also be fully completed. The two gates are distinct product policy and are
//! kept separate on purpose.

/// Completed-lecture percentage at or above which a learner is eligible.
pub const CERTIFICATE_THRESHOLD_PERCENT: u8 = 90;

/// Rounded completed/total percentage; 0 when the course has no lectures.
#[must_use]
pub fn certificate_progress_percent(completed_lectures: u32, total_lectures: u32) -> u8 {
    if total_lectures == 0 {
        return 0;
    }
    let pct =
        (f64::from(completed_lectures.min(total_lectures)) / f64::from(total_lectures) * 100.0)
            .round();
    pct.clamp(0.0, 100.0) as u8
}

/// Eligibility gate. Always false for a course with zero lectures.
#[must_use]
pub fn is_certificate_eligible(completed_lectures: u32, total_lectures: u32) -> bool {
    total_lectures > 0
        && certificate_progress_percent(completed_lectures, total_lectures)
            >= CERTIFICATE_THRESHOLD_PERCENT
}

/// The download gate stacks full course completion on top of eligibility.
#[must_use]
pub fn can_download_certificate(eligible: bool, course_completed: bool) -> bool {
    eligible && course_completed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nine_of_ten_is_exactly_eligible() {
        assert_eq!(certificate_progress_percent(9, 10), 90);
        assert!(is_certificate_eligible(9, 10));
    }

    #[test]
    fn below_threshold_is_not_eligible() {
        assert_eq!(certificate_progress_percent(8, 10), 80);
        assert!(!is_certificate_eligible(8, 10));
    }

    #[test]
    fn rounding_can_tip_the_gate() {
        // 17/19 = 89.47 -> 89, 18/19 = 94.7 -> 95
        assert!(!is_certificate_eligible(17, 19));
        assert!(is_certificate_eligible(18, 19));
    }

    #[test]
    fn zero_lectures_is_never_eligible() {
        assert_eq!(certificate_progress_percent(0, 0), 0);
        assert!(!is_certificate_eligible(0, 0));
    }

    #[test]
    fn download_needs_both_gates() {
        assert!(!can_download_certificate(true, false));
        assert!(!can_download_certificate(false, true));
        assert!(can_download_certificate(true, true));
    }
}
