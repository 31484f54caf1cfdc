//! CTCP request handling
//!
//! CTCP payloads ride inside PRIVMSG (requests) and NOTICE (replies) between `\x01`
//! delimiters. The [`CtcpResponder`] answers requests from the user's own rules first and
//! then from a small built-in table. PING is answered by the dispatcher itself.

use crate::config::{ClientSettings, CtcpConfig, CtcpResponseRule};
use crate::utils::time::{asctime, format_idle};
use chrono::{DateTime, Datelike, Local, Timelike};
use std::time::Duration;

/// CTCP delimiter
pub const CTCP_DELIMITER: char = '\x01';

const BUILT_IN: [&str; 6] = ["CLIENTINFO", "FINGER", "SOURCE", "TIME", "USERINFO", "VERSION"];

/// Split a CTCP payload into its upper-cased kind and optional argument
pub fn split_ctcp(payload: &str) -> Option<(String, Option<String>)> {
    let stripped: String = payload.chars().filter(|c| *c != CTCP_DELIMITER).collect();
    let mut parts = stripped.trim_start().splitn(2, char::is_whitespace);
    let kind = parts.next().filter(|k| !k.is_empty())?.to_uppercase();
    let data = parts.next().map(str::to_string);
    Some((kind, data))
}

/// Wrap a payload in CTCP delimiters
pub fn quote(payload: &str) -> String {
    format!("{}{}{}", CTCP_DELIMITER, payload, CTCP_DELIMITER)
}

/// Local identity that templates and built-in replies draw from
#[derive(Debug, Clone)]
pub struct CtcpIdentity {
    pub nickname: String,
    pub ident: String,
    pub realname: String,
    pub local_ip: String,
    pub idle: Duration,
}

/// Replies produced for one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CtcpAnswer {
    /// Payloads (without delimiters) to send back as NOTICEs, in order
    pub replies: Vec<String>,
    pub handled: bool,
}

#[derive(Debug, Clone)]
pub struct CtcpResponder {
    client: ClientSettings,
    rules: Vec<CtcpResponseRule>,
}

impl CtcpResponder {
    pub fn new(client: &ClientSettings, ctcp: &CtcpConfig) -> Self {
        Self {
            client: client.clone(),
            rules: ctcp.responses.clone(),
        }
    }

    /// Every request kind that gets an answer, sorted
    pub fn supported(&self) -> Vec<String> {
        let mut kinds: Vec<String> = BUILT_IN.iter().map(|k| k.to_string()).collect();
        for rule in &self.rules {
            let kind = rule.request.to_uppercase();
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        kinds.push("PING".to_string());
        kinds.sort();
        kinds
    }

    /// Answer a request of `kind` from `requester`
    pub fn respond(&self, kind: &str, requester: &str, identity: &CtcpIdentity) -> CtcpAnswer {
        self.respond_at(kind, requester, identity, &Local::now())
    }

    pub(crate) fn respond_at(
        &self,
        kind: &str,
        requester: &str,
        identity: &CtcpIdentity,
        now: &DateTime<Local>,
    ) -> CtcpAnswer {
        let mut answer = CtcpAnswer::default();

        for rule in self.rules.iter().filter(|r| r.request.eq_ignore_ascii_case(kind)) {
            let text = expand_template(&rule.response, requester, identity, now);
            answer.replies.push(format!("{} {}", kind, text));
            answer.handled = true;
            if rule.r#final {
                return answer;
            }
        }

        let built_in = match kind {
            "VERSION" => Some(format!(
                "{} {} running on {}",
                self.client.name,
                self.client.version,
                std::env::consts::OS
            )),
            "SOURCE" => Some(self.client.source_url.clone()),
            "FINGER" => Some(format!(
                "{} has been idle for {}",
                identity.realname,
                format_idle(identity.idle)
            )),
            "TIME" => Some(asctime(now)),
            "USERINFO" => Some(self.client.userinfo.clone()),
            "CLIENTINFO" => Some(self.supported().join(" ")),
            _ => None,
        };
        if let Some(text) = built_in {
            answer.replies.push(format!("{} {}", kind, text));
            answer.handled = true;
        }

        answer
    }
}

/// Substitute `%`-tokens in a reply template.
///
/// | token | value |
/// |-------|-------|
/// | `%%` | a literal `%` |
/// | `%c` | nickname of the requester |
/// | `%n` | the session's nickname |
/// | `%u` | ident |
/// | `%r` | real name |
/// | `%p` | local IP |
/// | `%i` | idle time |
/// | `%d` `%t` `%y` | day, month, year |
/// | `%h` `%m` `%s` | hour, minute, second (minutes and seconds zero-padded) |
///
/// Unknown tokens are left as they are.
pub fn expand_template(
    template: &str,
    requester: &str,
    identity: &CtcpIdentity,
    now: &DateTime<Local>,
) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let Some(token) = chars.next() else {
            out.push('%');
            break;
        };
        match token {
            '%' => out.push('%'),
            'c' => out.push_str(requester),
            'n' => out.push_str(&identity.nickname),
            'u' => out.push_str(&identity.ident),
            'r' => out.push_str(&identity.realname),
            'p' => out.push_str(&identity.local_ip),
            'i' => out.push_str(&format_idle(identity.idle)),
            'd' => out.push_str(&now.day().to_string()),
            't' => out.push_str(&now.month().to_string()),
            'y' => out.push_str(&now.year().to_string()),
            'h' => out.push_str(&now.hour().to_string()),
            'm' => out.push_str(&format!("{:02}", now.minute())),
            's' => out.push_str(&format!("{:02}", now.second())),
            other => {
                out.push('%');
                out.push(other);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn identity() -> CtcpIdentity {
        CtcpIdentity {
            nickname: "rusty".to_string(),
            ident: "rust".to_string(),
            realname: "Rusty Client".to_string(),
            local_ip: "10.0.0.5".to_string(),
            idle: Duration::from_secs(65),
        }
    }

    fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 7, 12, 4, 9).unwrap()
    }

    fn responder(rules: Vec<CtcpResponseRule>) -> CtcpResponder {
        let mut client = ClientSettings::default();
        client.name = "rustirc".to_string();
        client.version = "0.1.0".to_string();
        CtcpResponder::new(&client, &CtcpConfig { responses: rules })
    }

    fn rule(request: &str, response: &str, r#final: bool) -> CtcpResponseRule {
        CtcpResponseRule {
            request: request.to_string(),
            response: response.to_string(),
            r#final,
        }
    }

    #[test]
    fn test_split_ctcp() {
        assert_eq!(split_ctcp("\x01version\x01"), Some(("VERSION".to_string(), None)));
        assert_eq!(
            split_ctcp("\x01PING 12345\x01"),
            Some(("PING".to_string(), Some("12345".to_string())))
        );
        assert_eq!(split_ctcp("\x01\x01"), None);
    }

    #[test]
    fn test_template_tokens() {
        let text = expand_template(
            "%c asked %n (%u/%r @ %p) at %h:%m:%s on %d/%t/%y, idle %i, 100%%",
            "alice",
            &identity(),
            &noon(),
        );
        assert_eq!(
            text,
            "alice asked rusty (rust/Rusty Client @ 10.0.0.5) at 12:04:09 on 7/3/2026, \
             idle 1 minute, and 5 seconds, 100%"
        );
        assert_eq!(expand_template("%x%", "a", &identity(), &noon()), "%x%");
    }

    #[test]
    fn test_built_in_version() {
        let answer = responder(Vec::new()).respond_at("VERSION", "alice", &identity(), &noon());
        assert!(answer.handled);
        assert_eq!(answer.replies.len(), 1);
        assert!(answer.replies[0].starts_with("VERSION rustirc 0.1.0 running on "));
    }

    #[test]
    fn test_rules_run_before_built_ins() {
        let answer = responder(vec![rule("version", "ask %c later", false)])
            .respond_at("VERSION", "bob", &identity(), &noon());
        assert_eq!(answer.replies.len(), 2);
        assert_eq!(answer.replies[0], "VERSION ask bob later");

        let answer = responder(vec![rule("VERSION", "secret", true), rule("VERSION", "never", false)])
            .respond_at("VERSION", "bob", &identity(), &noon());
        assert_eq!(answer.replies, vec!["VERSION secret"]);
    }

    #[test]
    fn test_unknown_request_unhandled() {
        let answer = responder(Vec::new()).respond_at("DCC", "bob", &identity(), &noon());
        assert!(!answer.handled);
        assert!(answer.replies.is_empty());
    }

    #[test]
    fn test_clientinfo_lists_rules_and_ping() {
        let r = responder(vec![rule("weather", "sunny", false)]);
        assert_eq!(
            r.supported(),
            vec!["CLIENTINFO", "FINGER", "PING", "SOURCE", "TIME", "USERINFO", "VERSION", "WEATHER"]
        );
        let answer = r.respond_at("FINGER", "bob", &identity(), &noon());
        assert_eq!(answer.replies, vec!["FINGER Rusty Client has been idle for 1 minute, and 5 seconds"]);
    }
}
