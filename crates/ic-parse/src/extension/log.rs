use super::{Extension, Options, emit, not_negatable, quote};
use crate::error::ParseError;
use ic_core::Family;

const LOG_OPTIONS: &[&str] = &[
    "log-prefix",
    "log-level",
    "log-tcp-sequence",
    "log-tcp-options",
    "log-ip-options",
    "log-uid",
];

/// Flag options in output order.
const LOG_FLAGS: &[&str] = &["log-tcp-sequence", "log-tcp-options", "log-ip-options", "log-uid"];

const LEVELS: &[(&str, u8)] = &[
    ("emerg", 0),
    ("alert", 1),
    ("crit", 2),
    ("error", 3),
    ("err", 3),
    ("warning", 4),
    ("warn", 4),
    ("notice", 5),
    ("info", 6),
    ("debug", 7),
];

const DEFAULT_LEVEL: u8 = 4;
const MAX_PREFIX: usize = 29;

pub(crate) struct Log;

impl Extension for Log {
    fn name(&self) -> &'static str {
        "LOG"
    }

    fn parse(&self, _family: Family, tokens: &[String], cursor: &mut usize) -> Result<Vec<String>, ParseError> {
        let mut opts = Options::new(tokens, *cursor);
        let mut prefix = None;
        let mut level = DEFAULT_LEVEL;
        let mut flags = Vec::new();

        while let Some((negated, name)) = opts.next(LOG_OPTIONS) {
            not_negatable(negated, name)?;
            opts.once(name)?;
            match name {
                "log-prefix" => {
                    let raw = opts.value(name)?;
                    if raw.chars().count() > MAX_PREFIX {
                        return Err(ParseError::invalid(
                            "--log-prefix",
                            raw,
                            format!("longer than {MAX_PREFIX} characters"),
                        ));
                    }
                    if !raw.is_empty() {
                        prefix = Some(raw);
                    }
                }
                "log-level" => level = parse_level(opts.value(name)?)?,
                flag => flags.push(flag),
            }
        }
        opts.finish(cursor);

        let mut out = vec!["LOG".to_string()];
        if let Some(prefix) = prefix {
            emit(&mut out, false, "log-prefix", Some(&quote(prefix)));
        }
        if level != DEFAULT_LEVEL {
            emit(&mut out, false, "log-level", Some(&level.to_string()));
        }
        for flag in LOG_FLAGS.iter().filter(|flag| flags.contains(*flag)) {
            emit(&mut out, false, flag, None);
        }
        Ok(out)
    }
}

fn parse_level(raw: &str) -> Result<u8, ParseError> {
    if let Some((_, level)) = LEVELS.iter().find(|(name, _)| name.eq_ignore_ascii_case(raw)) {
        return Ok(*level);
    }
    match raw.parse::<u8>() {
        Ok(level) if level <= 7 => Ok(level),
        _ => Err(ParseError::invalid("--log-level", raw, "expected 0-7 or a syslog level name")),
    }
}
