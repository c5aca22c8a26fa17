use std::time::Duration;

const HOUR_LABELS: [&str; 12] = [
    "一", "两", "三", "四", "五", "六", "七", "八", "九", "十", "十一", "十二",
];

/// Hours of `window` as shown in chat replies.
///
/// Whole hours from one to twelve use the Chinese numeral; anything else
/// (12.5 hours, 13 hours, sub-hour windows) falls back to the decimal value.
#[must_use]
pub fn hours_label(window: Duration) -> String {
    let secs = window.as_secs();
    if window.subsec_nanos() == 0 && secs % 3600 == 0 {
        let hours = secs / 3600;
        if (1..=12).contains(&hours) {
            return HOUR_LABELS[(hours - 1) as usize].to_string();
        }
    }
    format!("{}", window.as_secs_f64() / 3600.0)
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case(3600, "一")]
    #[case(7200, "两")]
    #[case(36000, "十")]
    #[case(43200, "十二")]
    #[case(45000, "12.5")]
    #[case(46800, "13")]
    #[case(5400, "1.5")]
    #[case(0, "0")]
    fn label_for_window(#[case] secs: u64, #[case] expected: &str) {
        assert_eq!(hours_label(Duration::from_secs(secs)), expected);
    }
}
