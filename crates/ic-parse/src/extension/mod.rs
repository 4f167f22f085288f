//! Match and target extensions.
//!
//! Every handler consumes only the options it knows, starting at the cursor,
//! and leaves the cursor on the first token it did not take. What it returns
//! is the canonical argument list of the fragment, headed by the extension
//! name as the dump tool prints it.

mod comment;
mod conntrack;
mod ct;
mod icmp;
mod iprange;
mod limit;
mod log;
mod mac;
mod multiport;
mod ports;
mod recent;
mod reject;
mod tcp;

use crate::error::ParseError;
use ic_core::Family;
use std::collections::HashMap;

pub trait Extension: Send + Sync {
    fn name(&self) -> &'static str;

    fn parse(
        &self,
        family: Family,
        tokens: &[String],
        cursor: &mut usize,
    ) -> Result<Vec<String>, ParseError>;
}

/// Name-keyed tables of match and target handlers.
pub struct Registry {
    matches: HashMap<&'static str, Box<dyn Extension>>,
    targets: HashMap<&'static str, Box<dyn Extension>>,
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            matches: HashMap::new(),
            targets: HashMap::new(),
        }
    }

    /// Every extension this crate ships.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register_match(Box::new(tcp::Tcp));
        registry.register_match(Box::new(tcp::Udp));
        registry.register_match(Box::new(icmp::Icmp));
        registry.register_match(Box::new(icmp::Icmp6));
        registry.register_match(Box::new(multiport::Multiport));
        registry.register_match(Box::new(conntrack::State));
        registry.register_match(Box::new(conntrack::Conntrack));
        registry.register_match(Box::new(limit::Limit));
        registry.register_match(Box::new(limit::Hashlimit));
        registry.register_match(Box::new(recent::Recent));
        registry.register_match(Box::new(comment::Comment));
        registry.register_match(Box::new(mac::Mac));
        registry.register_match(Box::new(iprange::IpRange));

        registry.register_target(Box::new(log::Log));
        registry.register_target(Box::new(reject::Reject));
        registry.register_target(Box::new(ct::Ct));
        registry.register_target(Box::new(ct::NoTrack));
        registry
    }

    pub fn register_match(&mut self, extension: Box<dyn Extension>) {
        self.matches.insert(extension.name(), extension);
    }

    pub fn register_target(&mut self, extension: Box<dyn Extension>) {
        self.targets.insert(extension.name(), extension);
    }

    pub fn find_match(&self, name: &str) -> Option<&dyn Extension> {
        self.matches.get(name).map(|ext| ext.as_ref())
    }

    pub fn find_target(&self, name: &str) -> Option<&dyn Extension> {
        self.targets.get(name).map(|ext| ext.as_ref())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Cursor over one extension's option span.
pub(crate) struct Options<'t> {
    tokens: &'t [String],
    pos: usize,
    seen: Vec<&'t str>,
}

impl<'t> Options<'t> {
    pub(crate) fn new(tokens: &'t [String], cursor: usize) -> Self {
        Self {
            tokens,
            pos: cursor,
            seen: Vec::new(),
        }
    }

    /// Take the next option if it is one of `known` (names without dashes),
    /// together with a `!` in front of it.
    pub(crate) fn next(&mut self, known: &[&str]) -> Option<(bool, &'t str)> {
        let token = self.tokens.get(self.pos)?;
        let (negated, at) = if token == "!" {
            (true, self.pos + 1)
        } else {
            (false, self.pos)
        };
        let name = self.tokens.get(at)?.strip_prefix("--")?;
        if !known.contains(&name) {
            return None;
        }
        self.pos = at + 1;
        Some((negated, name))
    }

    pub(crate) fn value(&mut self, option: &str) -> Result<&'t str, ParseError> {
        let value = self
            .tokens
            .get(self.pos)
            .ok_or_else(|| ParseError::MissingArgument(format!("--{option}")))?;
        self.pos += 1;
        Ok(value)
    }

    /// Record an option under its canonical name; repeats are rejected.
    pub(crate) fn once(&mut self, canonical: &'t str) -> Result<(), ParseError> {
        if self.seen.contains(&canonical) {
            return Err(ParseError::DuplicateParameter(format!("--{canonical}")));
        }
        self.seen.push(canonical);
        Ok(())
    }

    pub(crate) fn finish(self, cursor: &mut usize) {
        *cursor = self.pos;
    }
}

pub(crate) fn not_negatable(negated: bool, option: &str) -> Result<(), ParseError> {
    if negated {
        return Err(ParseError::NegationNotAllowed(format!("--{option}")));
    }
    Ok(())
}

/// Append `[!] --option [value]` to an argument list.
pub(crate) fn emit(out: &mut Vec<String>, negated: bool, option: &str, value: Option<&str>) {
    if negated {
        out.push("!".to_string());
    }
    out.push(format!("--{option}"));
    if let Some(value) = value {
        out.push(value.to_string());
    }
}

/// Double-quote a free-text value, escaping `"` and `\`.
pub(crate) fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for c in text.chars() {
        if matches!(c, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

pub(crate) fn parse_number<T: std::str::FromStr>(option: &str, raw: &str) -> Result<T, ParseError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::invalid(option, raw, "expected a non-negative integer"));
    }
    raw.parse()
        .map_err(|_| ParseError::invalid(option, raw, "number out of range"))
}
