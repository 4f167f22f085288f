use crate::error::AddrError;
use ic_core::Family;
use ipnet::IpNet;
use std::net::{IpAddr, Ipv4Addr};

/// Structural class of an address token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrClass {
    Ipv4,
    Ipv6,
    Neither,
}

impl AddrClass {
    pub fn family(self) -> Option<Family> {
        match self {
            AddrClass::Ipv4 => Some(Family::Ipv4),
            AddrClass::Ipv6 => Some(Family::Ipv6),
            AddrClass::Neither => None,
        }
    }
}

/// Classify `addr[/prefix]` without touching the network.
///
/// An IPv4 prefix must be 0-32 (or a contiguous dotted netmask), an IPv6
/// prefix 0-128. Anything else, host names included, is `Neither`.
pub fn classify(token: &str) -> AddrClass {
    match parse_literal(token) {
        Ok(Some(IpNet::V4(_))) => AddrClass::Ipv4,
        Ok(Some(IpNet::V6(_))) => AddrClass::Ipv6,
        _ => AddrClass::Neither,
    }
}

/// Parse a literal `addr[/prefix]`.
///
/// Returns `Ok(None)` when the address part is not an IP literal at all
/// (a host name), and an error when it is a literal with a bad prefix.
pub fn parse_literal(token: &str) -> Result<Option<IpNet>, AddrError> {
    let (host, prefix) = split_prefix(token);
    let Ok(addr) = host.parse::<IpAddr>() else {
        return Ok(None);
    };

    let family = family_of(&addr);
    let len = match prefix {
        None => family.max_prefix(),
        Some(prefix) => parse_prefix(prefix, family)
            .ok_or_else(|| AddrError::InvalidPrefix(token.to_string()))?,
    };

    IpNet::new(addr, len)
        .map(Some)
        .map_err(|_| AddrError::InvalidPrefix(token.to_string()))
}

/// Split `host/prefix` into its parts.
pub fn split_prefix(token: &str) -> (&str, Option<&str>) {
    match token.split_once('/') {
        Some((host, prefix)) => (host, Some(prefix)),
        None => (token, None),
    }
}

pub fn family_of(addr: &IpAddr) -> Family {
    match addr {
        IpAddr::V4(_) => Family::Ipv4,
        IpAddr::V6(_) => Family::Ipv6,
    }
}

/// Parse a prefix length, accepting a dotted netmask for IPv4.
pub(crate) fn parse_prefix(prefix: &str, family: Family) -> Option<u8> {
    if !prefix.is_empty() && prefix.bytes().all(|b| b.is_ascii_digit()) {
        let len: u8 = prefix.parse().ok()?;
        return (len <= family.max_prefix()).then_some(len);
    }

    if family == Family::Ipv4 {
        let mask = u32::from(prefix.parse::<Ipv4Addr>().ok()?);
        if mask.leading_ones() + mask.trailing_zeros() == 32 {
            return Some(mask.leading_ones() as u8);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_plain_literals() {
        assert_eq!(classify("10.0.0.1"), AddrClass::Ipv4);
        assert_eq!(classify("2001:db8::1"), AddrClass::Ipv6);
        assert_eq!(classify("::"), AddrClass::Ipv6);
        assert_eq!(classify("www.example.com"), AddrClass::Neither);
        assert_eq!(classify(""), AddrClass::Neither);
    }

    #[test]
    fn prefix_ranges_are_family_specific() {
        assert_eq!(classify("10.0.0.0/0"), AddrClass::Ipv4);
        assert_eq!(classify("10.0.0.0/32"), AddrClass::Ipv4);
        assert_eq!(classify("10.0.0.0/33"), AddrClass::Neither);
        assert_eq!(classify("10.0.0.0/"), AddrClass::Neither);
        assert_eq!(classify("2001:db8::/64"), AddrClass::Ipv6);
        assert_eq!(classify("2001:db8::/129"), AddrClass::Neither);
    }

    #[test]
    fn accepts_contiguous_netmasks_only() {
        let net = parse_literal("192.168.1.0/255.255.255.0").unwrap().unwrap();
        assert_eq!(net.prefix_len(), 24);
        assert_eq!(classify("192.168.1.0/255.0.255.0"), AddrClass::Neither);
        assert!(parse_literal("2001:db8::/ffff::").is_err());
    }

    #[test]
    fn host_names_are_not_literals() {
        assert!(parse_literal("gw.example.net").unwrap().is_none());
        assert!(parse_literal("gw.example.net/24").unwrap().is_none());
        assert!(matches!(
            parse_literal("10.1.1.1/40"),
            Err(AddrError::InvalidPrefix(_))
        ));
    }
}
