use crate::error::ParseError;
use crate::tokenize::tokenize;
use ic_addr::AddressResolver;
use ic_core::Family;
use thiserror::Error;
use tracing::debug;

/// Flags whose operand is a comma-separated address list.
const ADDRESS_FLAGS: &[&str] = &["-s", "--source", "--src", "-d", "--destination", "--dst"];

#[derive(Debug, Error)]
#[error("line {number}: {line}: {source}")]
pub struct ExpandError {
    pub number: usize,
    pub line: String,
    #[source]
    pub source: ParseError,
}

/// Per-family command lines, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expansion {
    pub ipv4: Vec<String>,
    pub ipv6: Vec<String>,
}

impl Expansion {
    pub fn lines(&self, family: Family) -> &[String] {
        match family {
            Family::Ipv4 => &self.ipv4,
            Family::Ipv6 => &self.ipv6,
        }
    }

    fn push(&mut self, family: Family, line: String) {
        match family {
            Family::Ipv4 => self.ipv4.push(line),
            Family::Ipv6 => self.ipv6.push(line),
        }
    }
}

/// Turns macro lines into per-family command lines.
pub struct Expander<'r> {
    resolver: &'r AddressResolver,
}

impl<'r> Expander<'r> {
    pub fn new(resolver: &'r AddressResolver) -> Self {
        Self { resolver }
    }

    /// Expand every line; the first failure aborts the whole expansion.
    pub fn expand<S: AsRef<str>>(&self, lines: &[S]) -> Result<Expansion, ExpandError> {
        let mut expansion = Expansion::default();
        for (index, line) in lines.iter().enumerate() {
            let line = line.as_ref();
            let emitted = self.expand_line(line).map_err(|source| ExpandError {
                number: index + 1,
                line: line.to_string(),
                source,
            })?;
            for (family, text) in emitted {
                expansion.push(family, text);
            }
        }
        debug!(
            ipv4 = expansion.ipv4.len(),
            ipv6 = expansion.ipv6.len(),
            "expanded macro lines"
        );
        Ok(expansion)
    }

    pub fn expand_line(&self, line: &str) -> Result<Vec<(Family, String)>, ParseError> {
        let tokens = tokenize(line)?;
        let head = tokens.first().ok_or(ParseError::Empty)?;
        let args = &tokens[1..];

        match head.as_str() {
            "iptables" => Ok(vec![(Family::Ipv4, line.trim().to_string())]),
            "ip6tables" => Ok(vec![(Family::Ipv6, line.trim().to_string())]),
            "ip46tables" => self.dual_stack(args),
            "chain" | "chain4" | "chain6" => {
                let (name, table) = match args {
                    [name] => (name, None),
                    [name, table] => (name, Some(table)),
                    _ => return Err(macro_arity(head, "NAME [TABLE]")),
                };
                Ok(families_of(head)
                    .iter()
                    .map(|&family| (family, command(family, table, &format!("-N {}", quote_word(name)))))
                    .collect())
            }
            "policy" | "policy4" | "policy6" => {
                let (chain, target, table) = match args {
                    [chain, target] => (chain, target, None),
                    [chain, target, table] => (chain, target, Some(table)),
                    _ => return Err(macro_arity(head, "CHAIN TARGET [TABLE]")),
                };
                let rest = format!("-P {} {}", quote_word(chain), quote_word(target));
                Ok(families_of(head)
                    .iter()
                    .map(|&family| (family, command(family, table, &rest)))
                    .collect())
            }
            other => Err(ParseError::UnknownMacro(other.to_string())),
        }
    }

    /// Route an `ip46tables` line to every family one of its address
    /// tokens belongs to, or to both when it names no address.
    fn dual_stack(&self, args: &[String]) -> Result<Vec<(Family, String)>, ParseError> {
        let mut found = Vec::new();
        let mut has_addresses = false;
        let mut index = 0;
        while index < args.len() {
            if ADDRESS_FLAGS.contains(&args[index].as_str()) {
                if let Some(list) = args.get(index + 1) {
                    has_addresses = true;
                    for token in list.split(',') {
                        found.extend(self.token_families(token)?);
                    }
                    index += 1;
                }
            }
            index += 1;
        }

        // Copies carry the address lists verbatim; a token of the other
        // family is left for the applier to reject.
        let words: Vec<String> = args.iter().map(|arg| quote_word(arg)).collect();
        let mut emitted = Vec::new();
        for family in Family::ALL {
            if has_addresses && !found.contains(&family) {
                continue;
            }
            debug!(%family, "dual-stack line applies");
            emitted.push((family, format!("{} {}", family.tool(), words.join(" ")).trim_end().to_string()));
        }
        Ok(emitted)
    }

    /// Literals are classified structurally; anything else is resolved.
    fn token_families(&self, token: &str) -> Result<Vec<Family>, ParseError> {
        match self.resolver.classify(token).family() {
            Some(family) => Ok(vec![family]),
            None => Ok(self.resolver.families(token)?),
        }
    }
}

fn families_of(head: &str) -> &'static [Family] {
    if head.ends_with('4') {
        &[Family::Ipv4]
    } else if head.ends_with('6') {
        &[Family::Ipv6]
    } else {
        &Family::ALL
    }
}

fn command(family: Family, table: Option<&String>, rest: &str) -> String {
    match table {
        Some(table) => format!("{} -t {} {rest}", family.tool(), quote_word(table)),
        None => format!("{} {rest}", family.tool()),
    }
}

fn macro_arity(name: &str, expected: &'static str) -> ParseError {
    ParseError::MacroArity {
        name: name.to_string(),
        expected,
    }
}

/// Quote a word so [`tokenize`] reads it back unchanged.
fn quote_word(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:,=+@%^!*[]".contains(c));
    if plain {
        return word.to_string();
    }

    let mut quoted = String::with_capacity(word.len() + 2);
    quoted.push('"');
    for c in word.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use ic_addr::{AddrError, StaticLookup};
    use pretty_assertions::assert_eq;

    fn resolver() -> AddressResolver {
        let mut hosts = StaticLookup::default();
        hosts.insert("dual.example", vec!["192.0.2.1".parse().unwrap(), "2001:db8::1".parse().unwrap()]);
        hosts.insert("v6.example", vec!["2001:db8::2".parse().unwrap()]);
        AddressResolver::offline(hosts)
    }

    fn expand(lines: &[&str]) -> Result<Expansion, ExpandError> {
        let resolver = resolver();
        Expander::new(&resolver).expand(lines)
    }

    #[test]
    fn single_family_lines_pass_through() {
        let out = expand(&["iptables -A INPUT -j ACCEPT", "ip6tables -A INPUT -j DROP"]).unwrap();
        assert_eq!(out.ipv4, vec!["iptables -A INPUT -j ACCEPT"]);
        assert_eq!(out.ipv6, vec!["ip6tables -A INPUT -j DROP"]);
    }

    #[test]
    fn dual_stack_without_addresses_goes_to_both() {
        let out = expand(&["ip46tables -A INPUT -m comment --comment 'allow all' -j ACCEPT"]).unwrap();
        assert_eq!(
            out.ipv4,
            vec![r#"iptables -A INPUT -m comment --comment "allow all" -j ACCEPT"#]
        );
        assert_eq!(
            out.ipv6,
            vec![r#"ip6tables -A INPUT -m comment --comment "allow all" -j ACCEPT"#]
        );
    }

    #[test]
    fn dual_stack_routes_by_address_family() {
        let out = expand(&[
            "ip46tables -A INPUT -s 10.0.0.0/8 -j ACCEPT",
            "ip46tables -A INPUT --dst v6.example -j ACCEPT",
            "ip46tables -A INPUT -s dual.example -j ACCEPT",
        ])
        .unwrap();
        assert_eq!(
            out.ipv4,
            vec![
                "iptables -A INPUT -s 10.0.0.0/8 -j ACCEPT",
                "iptables -A INPUT -s dual.example -j ACCEPT",
            ]
        );
        assert_eq!(
            out.ipv6,
            vec![
                "ip6tables -A INPUT --dst v6.example -j ACCEPT",
                "ip6tables -A INPUT -s dual.example -j ACCEPT",
            ]
        );
    }

    #[test]
    fn mixed_lists_are_copied_verbatim() {
        let out = expand(&["ip46tables -A INPUT -s 10.0.0.1,2001:db8::1 -j ACCEPT"]).unwrap();
        assert_eq!(out.ipv4, vec!["iptables -A INPUT -s 10.0.0.1,2001:db8::1 -j ACCEPT"]);
        assert_eq!(out.ipv6, vec!["ip6tables -A INPUT -s 10.0.0.1,2001:db8::1 -j ACCEPT"]);

        let out = expand(&["ip46tables -A INPUT -s 10.0.0.1,v6.example -j ACCEPT"]).unwrap();
        assert_eq!(out.ipv4, vec!["iptables -A INPUT -s 10.0.0.1,v6.example -j ACCEPT"]);
        assert_eq!(out.ipv6, vec!["ip6tables -A INPUT -s 10.0.0.1,v6.example -j ACCEPT"]);
    }

    #[test]
    fn chain_and_policy_macros() {
        let out = expand(&[
            "chain LOGDROP",
            "chain4 RAWCHAIN raw",
            "policy6 FORWARD DROP",
            "policy OUTPUT ACCEPT filter",
        ])
        .unwrap();
        assert_eq!(
            out.ipv4,
            vec![
                "iptables -N LOGDROP",
                "iptables -t raw -N RAWCHAIN",
                "iptables -t filter -P OUTPUT ACCEPT",
            ]
        );
        assert_eq!(
            out.ipv6,
            vec![
                "ip6tables -N LOGDROP",
                "ip6tables -P FORWARD DROP",
                "ip6tables -t filter -P OUTPUT ACCEPT",
            ]
        );
    }

    #[test]
    fn failures_abort_with_line_numbers() {
        let err = expand(&["chain A", "policy INPUT"]).unwrap_err();
        assert_eq!(err.number, 2);
        assert!(matches!(err.source, ParseError::MacroArity { .. }));

        let err = expand(&["iptables -A INPUT", "nft add table"]).unwrap_err();
        assert!(matches!(err.source, ParseError::UnknownMacro(m) if m == "nft"));

        let err = expand(&["ip46tables -A INPUT -s nowhere.example -j ACCEPT"]).unwrap_err();
        assert!(matches!(err.source, ParseError::Address(AddrError::Offline(_))));
    }
}
