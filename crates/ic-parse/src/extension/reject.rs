use super::{Extension, Options, emit, not_negatable};
use crate::error::ParseError;
use ic_core::Family;

/// Accepted spellings and the name the dump tool prints.
const REJECT_V4: &[(&str, &str)] = &[
    ("icmp-net-unreachable", "icmp-net-unreachable"),
    ("net-unreach", "icmp-net-unreachable"),
    ("icmp-host-unreachable", "icmp-host-unreachable"),
    ("host-unreach", "icmp-host-unreachable"),
    ("icmp-proto-unreachable", "icmp-proto-unreachable"),
    ("proto-unreach", "icmp-proto-unreachable"),
    ("icmp-port-unreachable", "icmp-port-unreachable"),
    ("port-unreach", "icmp-port-unreachable"),
    ("icmp-net-prohibited", "icmp-net-prohibited"),
    ("net-prohib", "icmp-net-prohibited"),
    ("icmp-host-prohibited", "icmp-host-prohibited"),
    ("host-prohib", "icmp-host-prohibited"),
    ("icmp-admin-prohibited", "icmp-admin-prohibited"),
    ("admin-prohib", "icmp-admin-prohibited"),
    ("tcp-reset", "tcp-reset"),
    ("tcp-rst", "tcp-reset"),
];

const REJECT_V6: &[(&str, &str)] = &[
    ("icmp6-no-route", "icmp6-no-route"),
    ("no-route", "icmp6-no-route"),
    ("icmp6-adm-prohibited", "icmp6-adm-prohibited"),
    ("adm-prohibited", "icmp6-adm-prohibited"),
    ("icmp6-addr-unreachable", "icmp6-addr-unreachable"),
    ("addr-unreach", "icmp6-addr-unreachable"),
    ("icmp6-port-unreachable", "icmp6-port-unreachable"),
    ("port-unreach", "icmp6-port-unreachable"),
    ("icmp6-policy-fail", "icmp6-policy-fail"),
    ("policy-fail", "icmp6-policy-fail"),
    ("icmp6-reject-route", "icmp6-reject-route"),
    ("reject-route", "icmp6-reject-route"),
    ("tcp-reset", "tcp-reset"),
    ("tcp-rst", "tcp-reset"),
];

pub(crate) struct Reject;

impl Extension for Reject {
    fn name(&self) -> &'static str {
        "REJECT"
    }

    fn parse(&self, family: Family, tokens: &[String], cursor: &mut usize) -> Result<Vec<String>, ParseError> {
        let (table, default) = match family {
            Family::Ipv4 => (REJECT_V4, "icmp-port-unreachable"),
            Family::Ipv6 => (REJECT_V6, "icmp6-port-unreachable"),
        };

        let mut opts = Options::new(tokens, *cursor);
        let mut reason = default;
        while let Some((negated, name)) = opts.next(&["reject-with"]) {
            not_negatable(negated, name)?;
            opts.once(name)?;
            let raw = opts.value(name)?;
            reason = table
                .iter()
                .find(|(alias, _)| alias.eq_ignore_ascii_case(raw))
                .map(|(_, canonical)| *canonical)
                .ok_or_else(|| ParseError::invalid("--reject-with", raw, format!("unknown {family} reject type")))?;
        }
        opts.finish(cursor);

        let mut out = vec!["REJECT".to_string()];
        emit(&mut out, false, "reject-with", Some(reason));
        Ok(out)
    }
}
