use crate::error::ParseError;

/// Protocol numbers the dump tool prints by name.
const NAMED_PROTOCOLS: &[(u8, &str)] = &[
    (1, "icmp"),
    (6, "tcp"),
    (17, "udp"),
    (33, "dccp"),
    (47, "gre"),
    (50, "esp"),
    (51, "ah"),
    (58, "ipv6-icmp"),
    (132, "sctp"),
    (135, "mh"),
    (136, "udplite"),
];

/// A normalized `-p` operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protocol {
    /// Name to emit; `None` for "all", which the dump tool leaves out.
    pub name: Option<String>,
    /// Match extension implied by options following the protocol.
    pub extension: Option<String>,
}

pub fn normalize(raw: &str) -> Result<Protocol, ParseError> {
    let lowered = raw.to_ascii_lowercase();
    if lowered.is_empty() {
        return Err(ParseError::invalid("-p", raw, "empty protocol"));
    }

    let name = if lowered.bytes().all(|b| b.is_ascii_digit()) {
        let number: u8 = lowered
            .parse()
            .map_err(|_| ParseError::invalid("-p", raw, "protocol number out of range"))?;
        NAMED_PROTOCOLS
            .iter()
            .find(|(n, _)| *n == number)
            .map(|(_, name)| name.to_string())
            .unwrap_or_else(|| number.to_string())
    } else {
        lowered
    };

    Ok(match name.as_str() {
        "0" | "all" => Protocol {
            name: None,
            extension: None,
        },
        "icmpv6" | "icmp6" | "ipv6-icmp" => Protocol {
            name: Some("ipv6-icmp".to_string()),
            extension: Some("icmp6".to_string()),
        },
        _ => Protocol {
            extension: Some(name.clone()),
            name: Some(name),
        },
    })
}
