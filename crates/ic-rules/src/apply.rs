use crate::error::ApplyError;
use crate::model::{Policy, Rule, RuleSet, Table, TableKind};
use ic_addr::AddressResolver;
use ic_core::Family;
use ic_parse::flags;
use ic_parse::{Fragment, ParamMap, ParsedCommand};
use tracing::debug;

/// Folds parsed command lines into a rule set.
pub struct Applier<'r> {
    resolver: &'r AddressResolver,
}

impl<'r> Applier<'r> {
    pub fn new(resolver: &'r AddressResolver) -> Self {
        Self { resolver }
    }

    /// Apply one command.
    ///
    /// Addresses, chain and position are all checked before the first clone
    /// of a fanned-out line is stored, so a failing line leaves the rule set
    /// as it was.
    pub fn apply(&self, ruleset: &mut RuleSet, command: ParsedCommand) -> Result<(), ApplyError> {
        let family = ruleset.family();
        if command.family != family {
            return Err(ApplyError::FamilyMismatch {
                line: command.family,
                ruleset: family,
            });
        }

        let key = match command.commands().as_slice() {
            [] => return Err(ApplyError::NoCommand),
            [key] => *key,
            keys => {
                return Err(ApplyError::MultipleCommands(
                    keys.iter().map(|key| short_flag(key).to_string()).collect(),
                ));
            }
        };

        let mut params = command.params;
        let kind = match params.remove("table") {
            Some(fragments) => {
                let name = fragments.first().and_then(|f| f.arg(0)).unwrap_or_default();
                TableKind::from_name(name).ok_or_else(|| ApplyError::UnknownTable(name.to_string()))?
            }
            None => TableKind::Filter,
        };
        let fragment = params
            .first(key)
            .cloned()
            .ok_or(ApplyError::NoCommand)?;

        match key {
            "append" | "insert" => self.apply_rule(ruleset, kind, key, &fragment, params),
            "flush" | "new-chain" | "delete-chain" | "policy" => {
                reject_rule_options(key, &params)?;
                apply_chain_command(ruleset.table_mut(kind), key, &fragment)
            }
            other => Err(ApplyError::Unimplemented(format!(
                "{} (--{other})",
                short_flag(other)
            ))),
        }
    }

    fn apply_rule(
        &self,
        ruleset: &mut RuleSet,
        kind: TableKind,
        key: &str,
        fragment: &Fragment,
        params: ParamMap,
    ) -> Result<(), ApplyError> {
        let family = ruleset.family();
        let chain = fragment.arg(0).unwrap_or_default().to_string();
        let position = match (key, fragment.arg(1)) {
            ("insert", Some(raw)) => Some(parse_position(&chain, raw)?),
            ("insert", None) => Some(1),
            _ => None,
        };

        let sources = self.addresses(&params, "source", family)?;
        let destinations = self.addresses(&params, "destination", family)?;

        let mut template = params;
        template.remove("insert");
        template.set("append", Fragment::new("-A", vec![chain.clone()]));

        let table = ruleset.table_mut(kind);
        let mut added = 0;
        for source in &sources {
            for destination in &destinations {
                let mut rule = template.clone();
                place(&mut rule, "source", source);
                place(&mut rule, "destination", destination);
                match position {
                    Some(position) => table.insert(&chain, position, rule)?,
                    None => table.append(&chain, rule)?,
                }
                added += 1;
            }
        }

        debug!(%family, table = %kind, chain = %chain, rules = added, "applied rule");
        Ok(())
    }

    /// One entry per CIDR the address flag expands to; `None` stands for an
    /// absent flag or an omitted match-everything network.
    fn addresses(&self, params: &ParamMap, key: &str, family: Family) -> Result<Vec<Option<Fragment>>, ApplyError> {
        let Some(fragment) = params.first(key) else {
            return Ok(vec![None]);
        };
        let list = fragment.arg(0).unwrap_or_default();
        let nets = self.resolver.expand_list(list, family)?;
        if fragment.negated && nets.len() > 1 {
            return Err(ApplyError::NegatedList(list.to_string()));
        }

        Ok(nets
            .into_iter()
            .map(|net| {
                if net.prefix_len() == 0 && !fragment.negated {
                    None
                } else {
                    Some(Fragment::new(fragment.flag.clone(), vec![net.to_string()]).negated(fragment.negated))
                }
            })
            .collect())
    }
}

fn place(rule: &mut Rule, key: &str, fragment: &Option<Fragment>) {
    match fragment {
        Some(fragment) => rule.set(key, fragment.clone()),
        None => {
            rule.remove(key);
        }
    }
}

fn parse_position(chain: &str, raw: &str) -> Result<usize, ApplyError> {
    let invalid = || ApplyError::InvalidPosition {
        chain: chain.to_string(),
        position: raw.to_string(),
        len: 0,
    };
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    raw.parse().map_err(|_| invalid())
}

/// Chain-management commands take no rule-matching options.
fn reject_rule_options(key: &str, params: &ParamMap) -> Result<(), ApplyError> {
    match params.keys().find(|other| *other != key) {
        Some(option) => Err(ApplyError::IllegalOption {
            command: short_flag(key).to_string(),
            option: short_flag(option).to_string(),
        }),
        None => Ok(()),
    }
}

fn apply_chain_command(table: &mut Table, key: &str, fragment: &Fragment) -> Result<(), ApplyError> {
    let first = fragment.arg(0);
    match key {
        "flush" => table.flush(first),
        "new-chain" => table.new_chain(first.unwrap_or_default()),
        "delete-chain" => match first {
            Some(chain) => table.delete_chain(chain),
            None => table.delete_user_chains(),
        },
        _ => {
            let chain = first.unwrap_or_default();
            let target = fragment.arg(1).unwrap_or_default();
            let policy = Policy::from_name(target).ok_or_else(|| ApplyError::InvalidPolicy(target.to_string()))?;
            table.set_policy(chain, policy)
        }
    }
}

fn short_flag(key: &str) -> &str {
    match key {
        "match" => "-m",
        _ => flags::spec(key).map(|spec| spec.short).unwrap_or(key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::render_rule;
    use ic_addr::StaticLookup;
    use ic_parse::Parser;
    use pretty_assertions::assert_eq;

    struct Harness {
        parser: Parser,
        resolver: AddressResolver,
    }

    impl Harness {
        fn new() -> Self {
            let mut hosts = StaticLookup::default();
            hosts.insert(
                "web.example",
                vec!["192.0.2.10".parse().unwrap(), "192.0.2.11".parse().unwrap()],
            );
            Self {
                parser: Parser::default(),
                resolver: AddressResolver::offline(hosts),
            }
        }

        fn apply(&self, ruleset: &mut RuleSet, line: &str) -> Result<(), ApplyError> {
            let command = self.parser.parse(line)?;
            Applier::new(&self.resolver).apply(ruleset, command)
        }

        fn run(&self, family: Family, lines: &[&str]) -> Result<RuleSet, ApplyError> {
            let mut ruleset = RuleSet::new(family);
            for line in lines {
                self.apply(&mut ruleset, line)?;
            }
            Ok(ruleset)
        }
    }

    fn chain_rules(ruleset: &RuleSet, kind: TableKind, chain: &str) -> Vec<String> {
        ruleset
            .table(kind)
            .map(|table| table.rules(chain).iter().map(render_rule).collect())
            .unwrap_or_default()
    }

    #[test]
    fn fan_out_is_source_times_destination() {
        let h = Harness::new();
        let rules = h
            .run(
                Family::Ipv4,
                &["iptables -A FORWARD -s 10.0.0.1,10.0.0.2,10.0.0.3 -d web.example -j ACCEPT"],
            )
            .unwrap();
        let rendered = chain_rules(&rules, TableKind::Filter, "FORWARD");
        assert_eq!(rendered.len(), 6);
        assert_eq!(rendered[0], "-A FORWARD -s 10.0.0.1/32 -d 192.0.2.10/32 -j ACCEPT");
        assert_eq!(rendered[5], "-A FORWARD -s 10.0.0.3/32 -d 192.0.2.11/32 -j ACCEPT");
    }

    #[test]
    fn match_everything_network_is_dropped_unless_negated() {
        let h = Harness::new();
        let rules = h
            .run(
                Family::Ipv4,
                &[
                    "iptables -A INPUT -s 0.0.0.0/0 -j ACCEPT",
                    "iptables -A INPUT ! -d 0.0.0.0/0 -j DROP",
                ],
            )
            .unwrap();
        assert_eq!(
            chain_rules(&rules, TableKind::Filter, "INPUT"),
            vec!["-A INPUT -j ACCEPT", "-A INPUT ! -d 0.0.0.0/0 -j DROP"]
        );
    }

    #[test]
    fn negated_lists_are_rejected() {
        let h = Harness::new();
        assert!(matches!(
            h.run(Family::Ipv4, &["iptables -A INPUT ! -s 10.0.0.1,10.0.0.2 -j DROP"]),
            Err(ApplyError::NegatedList(_))
        ));
        assert!(matches!(
            h.run(Family::Ipv4, &["iptables -A INPUT ! -s web.example -j DROP"]),
            Err(ApplyError::NegatedList(_))
        ));
    }

    #[test]
    fn insert_is_rewritten_as_append() {
        let h = Harness::new();
        let rules = h
            .run(
                Family::Ipv4,
                &[
                    "iptables -A INPUT -j DROP",
                    "iptables -I INPUT -i lo -j ACCEPT",
                    "iptables -I INPUT 2 -s 10.0.0.1,10.0.0.2 -j ACCEPT",
                ],
            )
            .unwrap();
        assert_eq!(
            chain_rules(&rules, TableKind::Filter, "INPUT"),
            vec![
                "-A INPUT -i lo -j ACCEPT",
                "-A INPUT -s 10.0.0.2/32 -j ACCEPT",
                "-A INPUT -s 10.0.0.1/32 -j ACCEPT",
                "-A INPUT -j DROP",
            ]
        );
    }

    #[test]
    fn insert_position_bounds() {
        let h = Harness::new();
        assert!(matches!(
            h.run(Family::Ipv4, &["iptables -I INPUT 2 -j ACCEPT"]),
            Err(ApplyError::InvalidPosition { .. })
        ));
        assert!(matches!(
            h.run(Family::Ipv4, &["iptables -I INPUT 0 -j ACCEPT"]),
            Err(ApplyError::InvalidPosition { .. })
        ));
        assert!(matches!(
            h.run(Family::Ipv4, &["iptables -I INPUT x -j ACCEPT"]),
            Err(ApplyError::InvalidPosition { .. })
        ));
    }

    #[test]
    fn signed_positions_are_rejected() {
        let h = Harness::new();
        assert!(matches!(
            h.run(Family::Ipv4, &["iptables -I INPUT +1 -j ACCEPT"]),
            Err(ApplyError::InvalidPosition { .. })
        ));
        assert!(h.run(Family::Ipv4, &["iptables -I INPUT 1 -j ACCEPT"]).is_ok());
    }

    #[test]
    fn table_selection() {
        let h = Harness::new();
        let rules = h
            .run(Family::Ipv6, &["ip6tables -t raw -A PREROUTING -p udp --dport 53 -j CT --notrack"])
            .unwrap();
        assert_eq!(
            chain_rules(&rules, TableKind::Raw, "PREROUTING"),
            vec!["-A PREROUTING -p udp -m udp --dport 53 -j CT --notrack"]
        );
        assert!(rules.table(TableKind::Filter).is_none());

        assert!(matches!(
            h.run(Family::Ipv4, &["iptables -t nat -A POSTROUTING -j ACCEPT"]),
            Err(ApplyError::UnknownTable(t)) if t == "nat"
        ));
        assert!(matches!(
            h.run(Family::Ipv4, &["iptables -t raw -A INPUT -j ACCEPT"]),
            Err(ApplyError::UnknownChain { .. })
        ));
    }

    #[test]
    fn command_count_is_checked() {
        let h = Harness::new();
        assert!(matches!(
            h.run(Family::Ipv4, &["iptables -s 10.0.0.1 -j ACCEPT"]),
            Err(ApplyError::NoCommand)
        ));
        assert!(matches!(
            h.run(Family::Ipv4, &["iptables -A INPUT -F INPUT"]),
            Err(ApplyError::MultipleCommands(keys)) if keys == vec!["-A", "-F"]
        ));
    }

    #[test]
    fn unimplemented_commands_fail() {
        let h = Harness::new();
        for line in [
            "iptables -C INPUT -j ACCEPT",
            "iptables -D INPUT 1",
            "iptables -R INPUT 1 -j ACCEPT",
            "iptables -E OLD NEW",
            "iptables -Z",
        ] {
            assert!(
                matches!(h.run(Family::Ipv4, &[line]), Err(ApplyError::Unimplemented(_))),
                "{line}"
            );
        }
    }

    #[test]
    fn chain_commands_reject_rule_options() {
        let h = Harness::new();
        assert!(matches!(
            h.run(Family::Ipv4, &["iptables -F INPUT -s 10.0.0.1"]),
            Err(ApplyError::IllegalOption { option, .. }) if option == "-s"
        ));
        assert!(matches!(
            h.run(Family::Ipv4, &["iptables -P INPUT DROP -j ACCEPT"]),
            Err(ApplyError::IllegalOption { .. })
        ));
    }

    #[test]
    fn chain_lifecycle() {
        let h = Harness::new();
        let rules = h
            .run(
                Family::Ipv4,
                &[
                    "iptables -N LOGDROP",
                    "iptables -A LOGDROP -j LOG",
                    "iptables -A LOGDROP -j DROP",
                    "iptables -A INPUT -j LOGDROP",
                    "iptables -F LOGDROP",
                    "iptables -X LOGDROP",
                ],
            )
            .unwrap();
        let table = rules.table(TableKind::Filter).unwrap();
        assert!(!table.has_chain("LOGDROP"));
        assert_eq!(table.rules("INPUT").len(), 1);

        assert!(matches!(
            h.run(
                Family::Ipv4,
                &["iptables -N LOGDROP", "iptables -A LOGDROP -j DROP", "iptables -X LOGDROP"]
            ),
            Err(ApplyError::ChainNotEmpty { .. })
        ));
        assert!(matches!(
            h.run(Family::Ipv4, &["iptables -N A", "iptables -N A"]),
            Err(ApplyError::ChainExists { .. })
        ));
    }

    #[test]
    fn policies() {
        let h = Harness::new();
        let rules = h.run(Family::Ipv4, &["iptables -P FORWARD DROP"]).unwrap();
        assert_eq!(
            rules.table(TableKind::Filter).unwrap().policy("FORWARD"),
            Some(Policy::Drop)
        );
        assert!(matches!(
            h.run(Family::Ipv4, &["iptables -N USER", "iptables -P USER DROP"]),
            Err(ApplyError::NotBuiltinChain { .. })
        ));
        assert!(matches!(
            h.run(Family::Ipv4, &["iptables -P INPUT REJECT"]),
            Err(ApplyError::InvalidPolicy(_))
        ));
    }

    #[test]
    fn address_errors_surface_before_any_clone_is_added() {
        let h = Harness::new();
        let mut ruleset = RuleSet::new(Family::Ipv4);
        h.apply(&mut ruleset, "iptables -A INPUT -j ACCEPT").unwrap();
        let err = h.apply(&mut ruleset, "iptables -A INPUT -s 10.0.0.1 -d 10.0.0.9,2001:db8::1 -j DROP");
        assert!(matches!(err, Err(ApplyError::Address(_))));
        assert_eq!(chain_rules(&ruleset, TableKind::Filter, "INPUT").len(), 1);
    }

    #[test]
    fn family_of_line_must_match() {
        let h = Harness::new();
        assert!(matches!(
            h.run(Family::Ipv6, &["iptables -A INPUT -j ACCEPT"]),
            Err(ApplyError::FamilyMismatch { .. })
        ));
    }
}
