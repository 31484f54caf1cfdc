//! Mode string parsing and rank tables
//!
//! IRC declares flag changes left to right but aligns the parameter list to the right:
//! in `+sk-o key nick` the last parameter belongs to the last flag. [`parse_modes`]
//! reproduces that pairing.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Channel-user ranks in order of precedence, highest first
pub const RANK_ORDER: [char; 7] = ['O', '!', 'q', 'a', 'o', 'h', 'v'];

/// Prefix symbols matching [`RANK_ORDER`] position for position
pub const RANK_PREFIX: [char; 7] = ['*', '^', '~', '&', '@', '%', '+'];

/// List modes managed entirely by the server; never tracked on a channel
pub const IGNORED_MODES: [char; 4] = ['b', 'd', 'e', 'I'];

/// Characters that start a channel name
pub const CHANNEL_PREFIX: [char; 3] = ['#', '+', '!'];

/// One flag change from a mode string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeChange {
    pub flag: char,
    pub param: Option<String>,
    /// True when the flag is being set, false when removed
    pub granted: bool,
}

impl ModeChange {
    pub fn new(flag: char, param: Option<&str>, granted: bool) -> Self {
        Self {
            flag,
            param: param.map(str::to_string),
            granted,
        }
    }

    /// Whether this flag is a channel-user rank rather than a channel mode
    pub fn is_rank(&self) -> bool {
        is_rank(self.flag)
    }
}

impl fmt::Display for ModeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.granted { '+' } else { '-' };
        match &self.param {
            Some(param) => write!(f, "{}{} {}", sign, self.flag, param),
            None => write!(f, "{}{}", sign, self.flag),
        }
    }
}

/// A mode held by a channel or by the session's user: a bare flag or a flag with its parameter
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModeEntry {
    pub flag: char,
    pub param: Option<String>,
}

impl ModeEntry {
    pub fn flag(flag: char) -> Self {
        Self { flag, param: None }
    }

    pub fn with_param(flag: char, param: impl Into<String>) -> Self {
        Self {
            flag,
            param: Some(param.into()),
        }
    }
}

/// Split a raw mode string into its flag changes.
///
/// Unparameterised changes come first in declaration order, followed by the changes that
/// took a parameter. A string with more parameters than flags is a protocol violation.
pub fn parse_modes(raw: &str) -> Result<Vec<ModeChange>> {
    let mut tokens: Vec<&str> = raw.split_whitespace().collect();
    if tokens.is_empty() {
        return Ok(Vec::new());
    }

    let mut changes = Vec::new();
    let mut granted = true;
    for c in tokens.remove(0).chars() {
        match c {
            '+' => granted = true,
            '-' => granted = false,
            flag => changes.push(ModeChange::new(flag, None, granted)),
        }
    }

    if tokens.len() > changes.len() {
        return Err(Error::Protocol(format!(
            "More parameters than modes in '{}'; the IRC protocol has been violated.",
            raw
        )));
    }

    let mut paired = Vec::with_capacity(tokens.len());
    while let Some(param) = tokens.pop() {
        // Non-empty: checked against the flag count above
        if let Some(mut change) = changes.pop() {
            change.param = Some(param.to_string());
            paired.push(change);
        }
    }
    paired.reverse();
    changes.extend(paired);
    Ok(changes)
}

/// Whether `flag` is a channel-user rank
pub fn is_rank(flag: char) -> bool {
    RANK_ORDER.contains(&flag)
}

/// Whether `flag` is a list mode the client does not track
pub fn is_ignored(flag: char) -> bool {
    IGNORED_MODES.contains(&flag)
}

/// Whether `name` looks like a channel
pub fn is_channel_name(name: &str) -> bool {
    name.chars().next().map_or(false, |c| CHANNEL_PREFIX.contains(&c))
}

/// Prefix symbol for a rank flag
pub fn rank_symbol(flag: char) -> Option<char> {
    RANK_ORDER
        .iter()
        .position(|r| *r == flag)
        .map(|i| RANK_PREFIX[i])
}

/// Rank flag for a prefix symbol
pub fn rank_flag(symbol: char) -> Option<char> {
    RANK_PREFIX
        .iter()
        .position(|p| *p == symbol)
        .map(|i| RANK_ORDER[i])
}

/// Precedence of a rank flag; lower is more powerful
pub fn rank_precedence(flag: char) -> Option<usize> {
    RANK_ORDER.iter().position(|r| *r == flag)
}

/// Render a set of mode entries as `+flags params`
pub fn render_modes(modes: &[ModeEntry]) -> String {
    if modes.is_empty() {
        return String::new();
    }
    let flags: String = modes.iter().map(|m| m.flag).collect();
    let params: Vec<&str> = modes.iter().filter_map(|m| m.param.as_deref()).collect();
    if params.is_empty() {
        format!("+{}", flags)
    } else {
        format!("+{} {}", flags, params.join(" "))
    }
}

/// Render a list of changes as a compact mode string, e.g. `+o-v nick other`
pub fn render_changes(changes: &[ModeChange]) -> String {
    let mut flags = String::new();
    let mut params = Vec::new();
    let mut sign = None;
    for change in changes {
        if sign != Some(change.granted) {
            flags.push(if change.granted { '+' } else { '-' });
            sign = Some(change.granted);
        }
        flags.push(change.flag);
        if let Some(param) = &change.param {
            params.push(param.as_str());
        }
    }
    if params.is_empty() {
        flags
    } else {
        format!("{} {}", flags, params.join(" "))
    }
}
