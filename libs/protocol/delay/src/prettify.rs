/// Turns a second count into a human sentence for log lines, e.g.
/// `3 days, 23 hours, 9 minutes and 3 seconds`. Used only for
/// `tracing::info!` messages when the controller is about to sleep.
pub fn prettify_seconds(seconds: i64) -> String {
    if seconds < 0 {
        return format!("{seconds} seconds");
    }
    let days = seconds / 86_400;
    let rem = seconds % 86_400;
    let hours = rem / 3_600;
    let rem = rem % 3_600;
    let minutes = rem / 60;
    let secs = rem % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(unit(days, "day", "days"));
    }
    if hours > 0 {
        parts.push(unit(hours, "hour", "hours"));
    }
    if minutes > 0 {
        parts.push(unit(minutes, "minute", "minutes"));
    }
    if secs > 0 || parts.is_empty() {
        parts.push(unit(secs, "second", "seconds"));
    }

    match parts.len() {
        0 => "0 seconds".to_string(),
        1 => parts.remove(0),
        _ => {
            let last = parts.pop().unwrap();
            format!("{} and {}", parts.join(", "), last)
        }
    }
}

fn unit(value: i64, singular: &str, plural: &str) -> String {
    if value == 1 || value == -1 {
        format!("{value} {singular}")
    } else {
        format!("{value} {plural}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_multiple_units() {
        assert_eq!(prettify_seconds(342_543), "3 days, 23 hours, 9 minutes and 3 seconds");
    }

    #[test]
    fn formats_single_unit() {
        assert_eq!(prettify_seconds(1), "1 second");
    }

    #[test]
    fn formats_zero() {
        assert_eq!(prettify_seconds(0), "0 seconds");
    }
}
