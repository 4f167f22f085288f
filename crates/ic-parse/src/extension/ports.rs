use crate::error::ParseError;

/// Service names the dump tool would have printed numerically.
const SERVICES: &[(&str, u16)] = &[
    ("ftp-data", 20),
    ("ftp", 21),
    ("ssh", 22),
    ("telnet", 23),
    ("smtp", 25),
    ("domain", 53),
    ("bootps", 67),
    ("bootpc", 68),
    ("tftp", 69),
    ("http", 80),
    ("www", 80),
    ("pop3", 110),
    ("ntp", 123),
    ("imap", 143),
    ("imap2", 143),
    ("snmp", 161),
    ("ldap", 389),
    ("https", 443),
    ("syslog", 514),
    ("submission", 587),
    ("ldaps", 636),
    ("imaps", 993),
    ("pop3s", 995),
    ("openvpn", 1194),
    ("mysql", 3306),
    ("postgresql", 5432),
];

pub(crate) fn parse_port(option: &str, raw: &str) -> Result<u16, ParseError> {
    if let Some((_, port)) = SERVICES.iter().find(|(name, _)| name.eq_ignore_ascii_case(raw)) {
        return Ok(*port);
    }
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::invalid(option, raw, "unknown port or service name"));
    }
    raw.parse()
        .map_err(|_| ParseError::invalid(option, raw, "port out of range"))
}

/// Canonical `port` or `low:high`; a missing bound means 0 or 65535.
///
/// Returns `None` for the full range, which the dump tool leaves out.
pub(crate) fn port_range(option: &str, raw: &str) -> Result<Option<String>, ParseError> {
    let (low, high) = match raw.split_once(':') {
        Some((low, high)) => {
            let low = if low.is_empty() { 0 } else { parse_port(option, low)? };
            let high = if high.is_empty() { u16::MAX } else { parse_port(option, high)? };
            (low, high)
        }
        None => {
            let port = parse_port(option, raw)?;
            (port, port)
        }
    };

    if low > high {
        return Err(ParseError::invalid(option, raw, "port range minimum exceeds maximum"));
    }
    Ok(match (low, high) {
        (0, u16::MAX) => None,
        (low, high) if low == high => Some(low.to_string()),
        (low, high) => Some(format!("{low}:{high}")),
    })
}
