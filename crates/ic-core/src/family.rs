use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// IP address family a rule set is built for.
///
/// Every family-dependent default (reject reason, recent mask, protocol
/// aliasing) is derived from an explicit `Family` handed down the call chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Ipv4,
    Ipv6,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown address family '{0}' (expected ipv4 or ipv6)")]
pub struct UnknownFamily(pub String);

impl Family {
    /// Both families, in processing order.
    pub const ALL: [Family; 2] = [Family::Ipv4, Family::Ipv6];

    /// Name of the packet-filter tool that owns this family.
    pub fn tool(self) -> &'static str {
        match self {
            Family::Ipv4 => "iptables",
            Family::Ipv6 => "ip6tables",
        }
    }

    /// Map a tool name back to its family.
    pub fn from_tool(name: &str) -> Option<Self> {
        match name {
            "iptables" => Some(Family::Ipv4),
            "ip6tables" => Some(Family::Ipv6),
            _ => None,
        }
    }

    /// Longest prefix length for an address of this family.
    pub fn max_prefix(self) -> u8 {
        match self {
            Family::Ipv4 => 32,
            Family::Ipv6 => 128,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Family::Ipv4 => "IPv4",
            Family::Ipv6 => "IPv6",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Family {
    type Err = UnknownFamily;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "4" | "ipv4" | "inet" | "iptables" => Ok(Family::Ipv4),
            "6" | "ipv6" | "inet6" | "ip6tables" => Ok(Family::Ipv6),
            _ => Err(UnknownFamily(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_names_round_trip() {
        for family in Family::ALL {
            assert_eq!(Family::from_tool(family.tool()), Some(family));
        }
        assert_eq!(Family::from_tool("ebtables"), None);
    }

    #[test]
    fn parses_cli_spellings() {
        assert_eq!("4".parse::<Family>().unwrap(), Family::Ipv4);
        assert_eq!("IPv6".parse::<Family>().unwrap(), Family::Ipv6);
        assert!("ipx".parse::<Family>().is_err());
    }
}
