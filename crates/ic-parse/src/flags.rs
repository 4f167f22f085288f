use ic_core::Family;

/// How the parser treats a flag's following tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKind {
    Command,
    Table,
    Address,
    Interface,
    Protocol,
    Fragment,
    Match,
    Jump,
    Goto,
}

/// One recognized core flag.
#[derive(Debug)]
pub struct FlagSpec {
    /// Canonical long name without dashes; also the parameter-map key.
    pub long: &'static str,
    /// Short spelling, preferred in output like the dump tool does.
    pub short: &'static str,
    pub aliases: &'static [&'static str],
    pub kind: FlagKind,
    pub min_args: usize,
    pub max_args: usize,
    pub negatable: bool,
    pub family: Option<Family>,
}

impl FlagSpec {
    pub fn is_command(&self) -> bool {
        self.kind == FlagKind::Command
    }

    pub fn available_in(&self, family: Family) -> bool {
        self.family.is_none_or(|only| only == family)
    }

    pub fn arity_text(&self) -> String {
        if self.min_args == self.max_args {
            self.min_args.to_string()
        } else {
            format!("{}-{}", self.min_args, self.max_args)
        }
    }
}

const fn command(long: &'static str, short: &'static str, min_args: usize, max_args: usize) -> FlagSpec {
    FlagSpec {
        long,
        short,
        aliases: &[],
        kind: FlagKind::Command,
        min_args,
        max_args,
        negatable: false,
        family: None,
    }
}

const fn param(
    long: &'static str,
    short: &'static str,
    aliases: &'static [&'static str],
    kind: FlagKind,
    args: usize,
    negatable: bool,
) -> FlagSpec {
    FlagSpec {
        long,
        short,
        aliases,
        kind,
        min_args: args,
        max_args: args,
        negatable,
        family: None,
    }
}

pub static FLAGS: &[FlagSpec] = &[
    command("append", "-A", 1, 1),
    command("check", "-C", 1, 1),
    command("delete", "-D", 1, 2),
    command("insert", "-I", 1, 2),
    command("replace", "-R", 2, 2),
    command("flush", "-F", 0, 1),
    command("zero", "-Z", 0, 2),
    command("new-chain", "-N", 1, 1),
    command("delete-chain", "-X", 0, 1),
    command("rename-chain", "-E", 2, 2),
    command("policy", "-P", 2, 2),
    param("table", "-t", &[], FlagKind::Table, 1, false),
    param("source", "-s", &["src"], FlagKind::Address, 1, true),
    param("destination", "-d", &["dst"], FlagKind::Address, 1, true),
    param("in-interface", "-i", &[], FlagKind::Interface, 1, true),
    param("out-interface", "-o", &[], FlagKind::Interface, 1, true),
    param("protocol", "-p", &[], FlagKind::Protocol, 1, true),
    FlagSpec {
        long: "fragment",
        short: "-f",
        aliases: &[],
        kind: FlagKind::Fragment,
        min_args: 0,
        max_args: 0,
        negatable: true,
        family: Some(Family::Ipv4),
    },
    param("match", "-m", &[], FlagKind::Match, 1, false),
    param("jump", "-j", &[], FlagKind::Jump, 1, false),
    param("goto", "-g", &[], FlagKind::Goto, 1, false),
];

/// Find the flag a token spells, in short (`-A`) or long (`--append`) form.
pub fn lookup(token: &str) -> Option<&'static FlagSpec> {
    if let Some(long) = token.strip_prefix("--") {
        return FLAGS
            .iter()
            .find(|spec| spec.long == long || spec.aliases.contains(&long));
    }
    FLAGS.iter().find(|spec| spec.short == token)
}

/// Find a flag by its canonical long name.
pub fn spec(long: &str) -> Option<&'static FlagSpec> {
    FLAGS.iter().find(|spec| spec.long == long)
}

/// Canonical long names of every command flag.
pub fn command_keys() -> impl Iterator<Item = &'static str> {
    FLAGS.iter().filter(|spec| spec.is_command()).map(|spec| spec.long)
}
