use super::{Extension, Options, emit, parse_number};
use crate::error::ParseError;
use ic_core::Family;

/// ICMP type names, as `type` or `type/code`.
const ICMP_TYPES: &[(&str, &str)] = &[
    ("any", "any"),
    ("echo-reply", "0"),
    ("pong", "0"),
    ("destination-unreachable", "3"),
    ("network-unreachable", "3/0"),
    ("host-unreachable", "3/1"),
    ("protocol-unreachable", "3/2"),
    ("port-unreachable", "3/3"),
    ("fragmentation-needed", "3/4"),
    ("source-route-failed", "3/5"),
    ("network-unknown", "3/6"),
    ("host-unknown", "3/7"),
    ("network-prohibited", "3/9"),
    ("host-prohibited", "3/10"),
    ("tos-network-unreachable", "3/11"),
    ("tos-host-unreachable", "3/12"),
    ("communication-prohibited", "3/13"),
    ("host-precedence-violation", "3/14"),
    ("precedence-cutoff", "3/15"),
    ("source-quench", "4"),
    ("redirect", "5"),
    ("network-redirect", "5/0"),
    ("host-redirect", "5/1"),
    ("tos-network-redirect", "5/2"),
    ("tos-host-redirect", "5/3"),
    ("echo-request", "8"),
    ("ping", "8"),
    ("router-advertisement", "9"),
    ("router-solicitation", "10"),
    ("time-exceeded", "11"),
    ("ttl-exceeded", "11"),
    ("ttl-zero-during-transit", "11/0"),
    ("ttl-zero-during-reassembly", "11/1"),
    ("parameter-problem", "12"),
    ("ip-header-bad", "12/0"),
    ("required-option-missing", "12/1"),
    ("timestamp-request", "13"),
    ("timestamp-reply", "14"),
    ("address-mask-request", "17"),
    ("address-mask-reply", "18"),
];

pub(crate) struct Icmp;
pub(crate) struct Icmp6;

impl Extension for Icmp {
    fn name(&self) -> &'static str {
        "icmp"
    }

    fn parse(&self, family: Family, tokens: &[String], cursor: &mut usize) -> Result<Vec<String>, ParseError> {
        if family != Family::Ipv4 {
            return Err(ParseError::WrongFamily {
                option: "-m icmp".to_string(),
                family,
            });
        }

        let mut opts = Options::new(tokens, *cursor);
        let mut kind = (false, "any".to_string());
        while let Some((negated, name)) = opts.next(&["icmp-type"]) {
            opts.once("icmp-type")?;
            kind = (negated, icmp_type(opts.value(name)?)?);
        }
        opts.finish(cursor);

        let mut out = vec!["icmp".to_string()];
        emit(&mut out, kind.0, "icmp-type", Some(&kind.1));
        Ok(out)
    }
}

impl Extension for Icmp6 {
    fn name(&self) -> &'static str {
        "icmp6"
    }

    fn parse(&self, family: Family, tokens: &[String], cursor: &mut usize) -> Result<Vec<String>, ParseError> {
        if family != Family::Ipv6 {
            return Err(ParseError::WrongFamily {
                option: "-m icmp6".to_string(),
                family,
            });
        }

        let mut opts = Options::new(tokens, *cursor);
        let mut kind = None;
        while let Some((negated, name)) = opts.next(&["icmpv6-type"]) {
            opts.once("icmpv6-type")?;
            let raw = opts.value(name)?;
            if !raw.starts_with(|c: char| c.is_ascii_digit()) {
                return Err(ParseError::Unimplemented(format!(
                    "ICMPv6 type name '{raw}' (use the numeric type)"
                )));
            }
            kind = Some((negated, numeric_type("--icmpv6-type", raw)?));
        }
        opts.finish(cursor);

        let mut out = vec!["icmp6".to_string()];
        if let Some((negated, kind)) = kind {
            emit(&mut out, negated, "icmpv6-type", Some(&kind));
        }
        Ok(out)
    }
}

fn icmp_type(raw: &str) -> Result<String, ParseError> {
    if let Some((_, kind)) = ICMP_TYPES.iter().find(|(name, _)| name.eq_ignore_ascii_case(raw)) {
        return Ok(kind.to_string());
    }
    numeric_type("--icmp-type", raw)
}

/// `type` or `type/code`, each 0..=255.
fn numeric_type(option: &str, raw: &str) -> Result<String, ParseError> {
    match raw.split_once('/') {
        Some((kind, code)) => {
            let kind: u8 = parse_number(option, kind)?;
            let code: u8 = parse_number(option, code)?;
            Ok(format!("{kind}/{code}"))
        }
        None => {
            let kind: u8 = parse_number(option, raw)?;
            Ok(kind.to_string())
        }
    }
}
