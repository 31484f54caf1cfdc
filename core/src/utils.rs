//! Utility functions and helpers

/// String utilities for server line fields
pub mod string {
    /// Split on whitespace runs at most `max_splits` times. The last piece keeps the
    /// remainder of the string, internal spacing included.
    pub fn split_words(s: &str, max_splits: usize) -> Vec<&str> {
        let mut words = Vec::new();
        let mut rest = s.trim_start();
        while !rest.is_empty() {
            if words.len() == max_splits {
                words.push(rest);
                break;
            }
            match rest.find(char::is_whitespace) {
                Some(end) => {
                    words.push(&rest[..end]);
                    rest = rest[end..].trim_start();
                }
                None => {
                    words.push(rest);
                    break;
                }
            }
        }
        words
    }

    /// Drop a single leading colon
    pub fn strip_colon(s: &str) -> &str {
        s.strip_prefix(':').unwrap_or(s)
    }

    /// Remove the colon marking the first trailing parameter, i.e. the first `:` that
    /// starts a token and is followed by something
    pub fn remove_trailing_marker(data: &str) -> String {
        let bytes = data.as_bytes();
        let marker = bytes.iter().enumerate().position(|(i, b)| {
            *b == b':' && (i == 0 || bytes[i - 1] == b' ') && i + 1 < bytes.len()
        });
        match marker {
            Some(i) => format!("{}{}", &data[..i], &data[i + 1..]),
            None => data.to_string(),
        }
    }

    /// `count` followed by `word`, pluralised with a trailing `s` unless the count is one
    pub fn pluralize(count: u64, word: &str) -> String {
        if count == 1 {
            format!("{} {}", count, word)
        } else {
            format!("{} {}s", count, word)
        }
    }
}

/// Time utilities
pub mod time {
    use super::string::pluralize;
    use chrono::{DateTime, Local, Utc};
    use std::time::Duration;

    /// Get current timestamp as Unix timestamp
    pub fn current_unix_timestamp() -> i64 {
        Utc::now().timestamp()
    }

    /// C `asctime` rendering, e.g. `Sun Oct 19 14:03:09 2026`
    pub fn asctime(at: &DateTime<Local>) -> String {
        at.format("%a %b %e %H:%M:%S %Y").to_string()
    }

    /// Idle time as `H hours, M minutes, and S seconds`, leaving out zero hours and minutes
    pub fn format_idle(idle: Duration) -> String {
        let total = idle.as_secs();
        let hours = total / 3600;
        let minutes = (total % 3600) / 60;
        let seconds = total % 60;

        let mut parts = Vec::new();
        if hours > 0 {
            parts.push(pluralize(hours, "hour"));
        }
        if minutes > 0 {
            parts.push(pluralize(minutes, "minute"));
        }
        let seconds = pluralize(seconds, "second");
        if parts.is_empty() {
            seconds
        } else {
            format!("{}, and {}", parts.join(", "), seconds)
        }
    }
}

/// Network utilities
pub mod network {
    use regex::Regex;
    use std::net::Ipv4Addr;

    lazy_static::lazy_static! {
        static ref DOTTED_QUAD: Regex =
            Regex::new(r"(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})").unwrap();
    }

    /// First IPv4 address written out in `text`, if every octet is in range
    pub fn extract_dotted_quad(text: &str) -> Option<Ipv4Addr> {
        let caps = DOTTED_QUAD.captures(text)?;
        let mut octets = [0u8; 4];
        for (i, octet) in octets.iter_mut().enumerate() {
            *octet = caps[i + 1].parse::<u8>().ok()?;
        }
        Some(Ipv4Addr::from(octets))
    }
}

#[cfg(test)]
mod tests {
    use super::network::extract_dotted_quad;
    use super::string::*;
    use super::time::format_idle;
    use std::time::Duration;

    #[test]
    fn test_split_words() {
        assert_eq!(split_words("  a b   c d ", 2), vec!["a", "b", "c d "]);
        assert_eq!(split_words("a", 3), vec!["a"]);
        assert!(split_words("   ", 1).is_empty());
        assert_eq!(split_words("#chan topic text", 1), vec!["#chan", "topic text"]);
    }

    #[test]
    fn test_remove_trailing_marker() {
        assert_eq!(remove_trailing_marker("nick :is away"), "nick is away");
        assert_eq!(remove_trailing_marker(":Welcome to IRC"), "Welcome to IRC");
        assert_eq!(remove_trailing_marker("a:b c :d :e"), "a:b c d :e");
        assert_eq!(remove_trailing_marker("nothing here"), "nothing here");
        assert_eq!(remove_trailing_marker("ends with :"), "ends with :");
    }

    #[test]
    fn test_format_idle() {
        assert_eq!(format_idle(Duration::from_secs(1)), "1 second");
        assert_eq!(format_idle(Duration::from_secs(0)), "0 seconds");
        assert_eq!(format_idle(Duration::from_secs(61)), "1 minute, and 1 second");
        assert_eq!(
            format_idle(Duration::from_secs(2 * 3600 + 5 * 60 + 9)),
            "2 hours, 5 minutes, and 9 seconds"
        );
        assert_eq!(format_idle(Duration::from_secs(3600)), "1 hour, and 0 seconds");
    }

    #[test]
    fn test_extract_dotted_quad() {
        assert_eq!(
            extract_dotted_quad("is connecting from *@host 192.168.1.20").map(|ip| ip.to_string()),
            Some("192.168.1.20".to_string())
        );
        assert_eq!(extract_dotted_quad("from 300.1.1.1"), None);
        assert_eq!(extract_dotted_quad("no address"), None);
    }
}
