use crate::model::{Rule, RuleSet};

/// Precedence of rule keys in output; keys not listed follow in
/// alphabetical order.
const KEY_ORDER: &[&str] = &[
    "append",
    "check",
    "delete",
    "insert",
    "replace",
    "flush",
    "zero",
    "new-chain",
    "delete-chain",
    "rename-chain",
    "policy",
    "source",
    "destination",
    "in-interface",
    "out-interface",
    "protocol",
    "fragment",
    "match",
    "jump",
    "goto",
];

/// Render one rule as a dump line, without the trailing newline.
pub fn render_rule(rule: &Rule) -> String {
    let known = KEY_ORDER.iter().filter_map(|key| rule.get(key));
    let rest = rule
        .iter()
        .filter(|(key, _)| !KEY_ORDER.contains(key))
        .map(|(_, fragments)| fragments);

    known
        .chain(rest)
        .flatten()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a rule set as dump stanzas, one per touched table.
pub fn render(ruleset: &RuleSet) -> String {
    let mut lines = Vec::new();
    for table in ruleset.tables() {
        lines.push(format!("*{}", table.kind()));
        for (chain, policy) in table.policies() {
            lines.push(format!(":{chain} {policy} [0:0]"));
        }
        for chain in table.user_chains() {
            lines.push(format!(":{chain} - [0:0]"));
        }
        for chain in table.chain_names() {
            lines.extend(table.rules(chain).iter().map(render_rule));
        }
        lines.push("COMMIT".to_string());
    }

    let mut out = lines.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}
