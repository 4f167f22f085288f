use crate::error::ApplyError;
use ic_core::Family;
use ic_parse::{ParamMap, TERMINAL_TARGETS};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// A rule is the canonical parameter map of the line that created it.
pub type Rule = ParamMap;

/// Longest chain name the kernel accepts.
const MAX_CHAIN_NAME: usize = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TableKind {
    Raw,
    Filter,
}

impl TableKind {
    /// Order tables are dumped in, whatever order they were touched in.
    pub const OUTPUT_ORDER: [TableKind; 2] = [TableKind::Raw, TableKind::Filter];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "raw" => Some(TableKind::Raw),
            "filter" => Some(TableKind::Filter),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TableKind::Raw => "raw",
            TableKind::Filter => "filter",
        }
    }

    pub fn default_chains(self) -> &'static [&'static str] {
        match self {
            TableKind::Raw => &["PREROUTING", "OUTPUT"],
            TableKind::Filter => &["INPUT", "FORWARD", "OUTPUT"],
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Accept,
    Drop,
    Queue,
    Return,
}

impl Policy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ACCEPT" => Some(Policy::Accept),
            "DROP" => Some(Policy::Drop),
            "QUEUE" => Some(Policy::Queue),
            "RETURN" => Some(Policy::Return),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Policy::Accept => "ACCEPT",
            Policy::Drop => "DROP",
            Policy::Queue => "QUEUE",
            Policy::Return => "RETURN",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    kind: TableKind,
    policies: Vec<(&'static str, Policy)>,
    user_chains: BTreeSet<String>,
    rules: HashMap<String, Vec<Rule>>,
}

impl Table {
    pub fn new(kind: TableKind) -> Self {
        let chains = kind.default_chains();
        Self {
            kind,
            policies: chains.iter().map(|chain| (*chain, Policy::Accept)).collect(),
            user_chains: BTreeSet::new(),
            rules: chains.iter().map(|chain| (chain.to_string(), Vec::new())).collect(),
        }
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn is_builtin(&self, chain: &str) -> bool {
        self.kind.default_chains().contains(&chain)
    }

    pub fn has_chain(&self, chain: &str) -> bool {
        self.rules.contains_key(chain)
    }

    /// Built-in chains with their policies, in fixed order.
    pub fn policies(&self) -> &[(&'static str, Policy)] {
        &self.policies
    }

    pub fn policy(&self, chain: &str) -> Option<Policy> {
        self.policies
            .iter()
            .find(|(name, _)| *name == chain)
            .map(|(_, policy)| *policy)
    }

    /// User chains in lexicographic order.
    pub fn user_chains(&self) -> impl Iterator<Item = &str> {
        self.user_chains.iter().map(String::as_str)
    }

    /// Every chain in dump order: built-in first, then user chains.
    pub fn chain_names(&self) -> impl Iterator<Item = &str> {
        self.kind
            .default_chains()
            .iter()
            .copied()
            .chain(self.user_chains())
    }

    pub fn rules(&self, chain: &str) -> &[Rule] {
        self.rules.get(chain).map(Vec::as_slice).unwrap_or_default()
    }

    fn rules_mut(&mut self, chain: &str) -> Result<&mut Vec<Rule>, ApplyError> {
        let table = self.kind;
        self.rules.get_mut(chain).ok_or_else(|| ApplyError::UnknownChain {
            table: table.to_string(),
            chain: chain.to_string(),
        })
    }

    pub fn append(&mut self, chain: &str, rule: Rule) -> Result<(), ApplyError> {
        self.rules_mut(chain)?.push(rule);
        Ok(())
    }

    /// Insert at a 1-based position; `len + 1` appends.
    pub fn insert(&mut self, chain: &str, position: usize, rule: Rule) -> Result<(), ApplyError> {
        let rules = self.rules_mut(chain)?;
        if position == 0 || position > rules.len() + 1 {
            return Err(ApplyError::InvalidPosition {
                chain: chain.to_string(),
                position: position.to_string(),
                len: rules.len(),
            });
        }
        rules.insert(position - 1, rule);
        Ok(())
    }

    /// Empty one chain, or every chain of the table.
    pub fn flush(&mut self, chain: Option<&str>) -> Result<(), ApplyError> {
        match chain {
            Some(chain) => self.rules_mut(chain)?.clear(),
            None => self.rules.values_mut().for_each(Vec::clear),
        }
        Ok(())
    }

    pub fn new_chain(&mut self, name: &str) -> Result<(), ApplyError> {
        let invalid = |reason: &str| ApplyError::InvalidChainName {
            name: name.to_string(),
            reason: reason.to_string(),
        };
        if name.is_empty() || name.len() > MAX_CHAIN_NAME {
            return Err(invalid("must be 1 to 28 characters"));
        }
        if name.starts_with('-') || name == "!" {
            return Err(invalid("looks like an option"));
        }
        if TERMINAL_TARGETS.contains(&name) {
            return Err(invalid("clashes with a built-in target"));
        }
        if self.has_chain(name) {
            return Err(ApplyError::ChainExists {
                table: self.kind.to_string(),
                chain: name.to_string(),
            });
        }

        self.user_chains.insert(name.to_string());
        self.rules.insert(name.to_string(), Vec::new());
        Ok(())
    }

    pub fn delete_chain(&mut self, name: &str) -> Result<(), ApplyError> {
        if self.is_builtin(name) {
            return Err(ApplyError::CannotDeleteBuiltin(name.to_string()));
        }
        if !self.rules(name).is_empty() {
            return Err(ApplyError::ChainNotEmpty {
                table: self.kind.to_string(),
                chain: name.to_string(),
            });
        }
        if !self.user_chains.remove(name) {
            return Err(ApplyError::UnknownChain {
                table: self.kind.to_string(),
                chain: name.to_string(),
            });
        }
        self.rules.remove(name);
        Ok(())
    }

    /// Delete every user chain; nothing is deleted unless all are empty.
    pub fn delete_user_chains(&mut self) -> Result<(), ApplyError> {
        if let Some(busy) = self.user_chains().find(|chain| !self.rules(chain).is_empty()) {
            return Err(ApplyError::ChainNotEmpty {
                table: self.kind.to_string(),
                chain: busy.to_string(),
            });
        }
        for chain in std::mem::take(&mut self.user_chains) {
            self.rules.remove(&chain);
        }
        Ok(())
    }

    pub fn set_policy(&mut self, chain: &str, policy: Policy) -> Result<(), ApplyError> {
        if let Some(slot) = self.policies.iter_mut().find(|(name, _)| *name == chain) {
            slot.1 = policy;
            return Ok(());
        }
        if self.user_chains.contains(chain) {
            return Err(ApplyError::NotBuiltinChain {
                table: self.kind.to_string(),
                chain: chain.to_string(),
            });
        }
        Err(ApplyError::UnknownChain {
            table: self.kind.to_string(),
            chain: chain.to_string(),
        })
    }
}

/// All tables of one family for one run.
#[derive(Debug, Clone)]
pub struct RuleSet {
    family: Family,
    tables: BTreeMap<TableKind, Table>,
}

impl RuleSet {
    pub fn new(family: Family) -> Self {
        Self {
            family,
            tables: BTreeMap::new(),
        }
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn table(&self, kind: TableKind) -> Option<&Table> {
        self.tables.get(&kind)
    }

    /// The table of `kind`, created with default chains on first use.
    pub fn table_mut(&mut self, kind: TableKind) -> &mut Table {
        self.tables.entry(kind).or_insert_with(|| Table::new(kind))
    }

    /// Touched tables in dump order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        TableKind::OUTPUT_ORDER
            .into_iter()
            .filter_map(|kind| self.tables.get(&kind))
    }
}
