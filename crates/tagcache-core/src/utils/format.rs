use chrono::Duration;

/// Format an integer with thousands separators, e.g. `12,345`.
pub fn format_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn plural(count: i64, word: &str) -> String {
    if count == 1 {
        format!("{} {}", count, word)
    } else {
        format!("{} {}s", count, word)
    }
}

/// Spell out an age, e.g. `2 days 3 hours 1 minute 5 seconds ago`.
/// Days are omitted when zero.
pub fn format_age_verbose(age: Duration) -> String {
    let total = age.num_seconds().max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    let mut parts = Vec::with_capacity(4);
    if days > 0 {
        parts.push(plural(days, "day"));
    }
    parts.push(plural(hours, "hour"));
    parts.push(plural(minutes, "minute"));
    parts.push(plural(seconds, "second"));
    format!("{} ago", parts.join(" "))
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1000), "1,000");
        assert_eq!(format_thousands(4821330), "4,821,330");
        assert_eq!(format_thousands(-12345), "-12,345");
    }

    #[test]
    fn test_format_age_verbose() {
        assert_eq!(
            format_age_verbose(Duration::seconds(61)),
            "0 hours 1 minute 1 second ago"
        );
        assert_eq!(
            format_age_verbose(Duration::seconds(2 * 86_400 + 3 * 3600 + 5)),
            "2 days 3 hours 0 minutes 5 seconds ago"
        );
        assert_eq!(
            format_age_verbose(Duration::seconds(-30)),
            "0 hours 0 minutes 0 seconds ago"
        );
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
        assert_eq!(truncate_string("Ⓐ - Delta", 5), "Ⓐ ...");
    }
}
