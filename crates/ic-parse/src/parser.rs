use crate::error::ParseError;
use crate::extension::Registry;
use crate::flags::{self, FlagKind, FlagSpec};
use crate::params::{Fragment, ParamMap};
use crate::protocol;
use crate::tokenize::tokenize;
use ic_core::Family;
use std::collections::HashSet;
use tracing::trace;

/// Jump targets that take no options and never name a chain.
pub const TERMINAL_TARGETS: &[&str] = &["ACCEPT", "DROP", "QUEUE", "RETURN"];

/// One command line reduced to canonical parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub family: Family,
    pub params: ParamMap,
}

impl ParsedCommand {
    /// Command keys present on the line, in flag-table order.
    pub fn commands(&self) -> Vec<&'static str> {
        flags::command_keys()
            .filter(|key| self.params.contains(key))
            .collect()
    }
}

pub struct Parser {
    registry: Registry,
}

impl Parser {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn parse(&self, line: &str) -> Result<ParsedCommand, ParseError> {
        let tokens = tokenize(line)?;
        self.parse_tokens(&tokens)
    }

    pub fn parse_tokens(&self, tokens: &[String]) -> Result<ParsedCommand, ParseError> {
        let tool = tokens.first().ok_or(ParseError::Empty)?;
        let family = Family::from_tool(tool).ok_or_else(|| ParseError::UnknownCommand(tool.clone()))?;

        let params = LineParser {
            registry: &self.registry,
            family,
            tokens,
            pos: 1,
            params: ParamMap::new(),
            seen: HashSet::new(),
        }
        .run()?;

        trace!(%family, keys = params.len(), "parsed command line");
        Ok(ParsedCommand { family, params })
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new(Registry::builtin())
    }
}

struct LineParser<'a> {
    registry: &'a Registry,
    family: Family,
    tokens: &'a [String],
    pos: usize,
    params: ParamMap,
    seen: HashSet<&'static str>,
}

impl<'a> LineParser<'a> {
    fn run(mut self) -> Result<ParamMap, ParseError> {
        let tokens = self.tokens;
        let mut negated = false;
        while let Some(token) = tokens.get(self.pos) {
            self.pos += 1;
            if token == "!" {
                if negated {
                    return Err(ParseError::DoubleNegation);
                }
                negated = true;
                continue;
            }

            let spec = flags::lookup(token).ok_or_else(|| ParseError::UnknownParameter(token.clone()))?;
            if !spec.available_in(self.family) {
                return Err(ParseError::WrongFamily {
                    option: token.clone(),
                    family: self.family,
                });
            }
            if negated && !spec.negatable {
                return Err(ParseError::NegationNotAllowed(token.clone()));
            }
            if spec.kind != FlagKind::Match && !self.seen.insert(spec.long) {
                return Err(ParseError::DuplicateParameter(token.clone()));
            }

            self.flag(spec, token, std::mem::take(&mut negated))?;
        }

        if negated {
            return Err(ParseError::TrailingNegation);
        }
        Ok(self.params)
    }

    fn flag(&mut self, spec: &'static FlagSpec, token: &str, negated: bool) -> Result<(), ParseError> {
        match spec.kind {
            FlagKind::Match => {
                let name = self.argument(token)?;
                let extension = self
                    .registry
                    .find_match(name)
                    .ok_or_else(|| ParseError::UnknownExtension(name.to_string()))?;
                let args = extension.parse(self.family, self.tokens, &mut self.pos)?;
                self.params.push("match", Fragment::new("-m", args));
            }
            FlagKind::Jump => {
                let target = self.argument(token)?;
                let args = self.target(target)?;
                self.params.push(spec.long, Fragment::new(spec.short, args));
            }
            FlagKind::Goto => {
                let chain = self.argument(token)?;
                self.params
                    .push(spec.long, Fragment::new(spec.short, vec![chain.to_string()]));
            }
            FlagKind::Protocol => {
                let raw = self.argument(token)?;
                let proto = protocol::normalize(raw)?;
                if let Some(name) = proto.name {
                    self.params
                        .push(spec.long, Fragment::new(spec.short, vec![name]).negated(negated));
                }
                if let Some(extension) = proto.extension {
                    if !self.at_flag() {
                        self.implicit_match(&extension)?;
                    }
                }
            }
            _ => {
                let payload = self.payload();
                if payload.len() < spec.min_args || payload.len() > spec.max_args {
                    return Err(ParseError::Arity {
                        flag: token.to_string(),
                        expected: spec.arity_text(),
                        found: payload.len(),
                    });
                }
                self.params
                    .push(spec.long, Fragment::new(spec.short, payload).negated(negated));
            }
        }
        Ok(())
    }

    /// The single operand of a match, jump, goto or protocol flag.
    fn argument(&mut self, flag: &str) -> Result<&'a str, ParseError> {
        let tokens = self.tokens;
        match tokens.get(self.pos) {
            Some(value) if value != "!" && flags::lookup(value).is_none() => {
                self.pos += 1;
                Ok(value)
            }
            _ => Err(ParseError::MissingArgument(flag.to_string())),
        }
    }

    /// Tokens up to the next flag or `!`.
    fn payload(&mut self) -> Vec<String> {
        let start = self.pos;
        while let Some(token) = self.tokens.get(self.pos) {
            if token == "!" || looks_like_option(token) {
                break;
            }
            self.pos += 1;
        }
        self.tokens[start..self.pos].to_vec()
    }

    fn target(&mut self, target: &str) -> Result<Vec<String>, ParseError> {
        if TERMINAL_TARGETS.contains(&target) {
            return Ok(vec![target.to_string()]);
        }
        if let Some(extension) = self.registry.find_target(target) {
            return extension.parse(self.family, self.tokens, &mut self.pos);
        }

        // Either a chain defined later or a target extension we lack; an
        // option right after it can only belong to the latter.
        if let Some(next) = self.tokens.get(self.pos) {
            if looks_like_option(next) && flags::lookup(next).is_none() {
                return Err(ParseError::MissingExtension {
                    target: target.to_string(),
                    option: next.clone(),
                });
            }
        }
        Ok(vec![target.to_string()])
    }

    /// Whether the cursor sits on a core flag, a negated core flag, or the
    /// end of the line.
    fn at_flag(&self) -> bool {
        match self.tokens.get(self.pos) {
            None => true,
            Some(token) if token == "!" => self
                .tokens
                .get(self.pos + 1)
                .is_none_or(|next| flags::lookup(next).is_some()),
            Some(token) => flags::lookup(token).is_some(),
        }
    }

    /// Options following `-p NAME` load the protocol's match extension.
    fn implicit_match(&mut self, name: &str) -> Result<(), ParseError> {
        let start = self.pos;
        let token = self.tokens.get(start).cloned().unwrap_or_default();
        let extension = self
            .registry
            .find_match(name)
            .ok_or_else(|| ParseError::UnknownParameter(token.clone()))?;
        let args = extension.parse(self.family, self.tokens, &mut self.pos)?;
        if self.pos == start {
            return Err(ParseError::UnknownParameter(token));
        }
        self.params.push("match", Fragment::new("-m", args));
        Ok(())
    }
}

fn looks_like_option(token: &str) -> bool {
    token.len() > 1 && token.starts_with('-') && !token[1..].bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(line: &str) -> Result<ParsedCommand, ParseError> {
        Parser::default().parse(line)
    }

    fn rendered(cmd: &ParsedCommand, key: &str) -> Vec<String> {
        cmd.params
            .get(key)
            .unwrap_or_default()
            .iter()
            .map(|frag| frag.to_string())
            .collect()
    }

    #[test]
    fn long_and_short_flags_normalize_to_short_output() {
        let cmd = parse("iptables --append INPUT --source 10.0.0.1 --jump ACCEPT").unwrap();
        assert_eq!(cmd.family, Family::Ipv4);
        assert_eq!(rendered(&cmd, "append"), vec!["-A INPUT"]);
        assert_eq!(rendered(&cmd, "source"), vec!["-s 10.0.0.1"]);
        assert_eq!(rendered(&cmd, "jump"), vec!["-j ACCEPT"]);
        assert_eq!(cmd.commands(), vec!["append"]);
    }

    #[test]
    fn protocol_options_load_an_implicit_match() {
        let cmd = parse("iptables -A INPUT -p TCP --dport 22 -j ACCEPT").unwrap();
        assert_eq!(rendered(&cmd, "protocol"), vec!["-p tcp"]);
        assert_eq!(rendered(&cmd, "match"), vec!["-m tcp --dport 22"]);
    }

    #[test]
    fn implicit_match_accepts_negated_options() {
        let cmd = parse("ip6tables -A INPUT -p icmpv6 ! --icmpv6-type 128").unwrap();
        assert_eq!(rendered(&cmd, "protocol"), vec!["-p ipv6-icmp"]);
        assert_eq!(rendered(&cmd, "match"), vec!["-m icmp6 ! --icmpv6-type 128"]);
    }

    #[test]
    fn protocol_without_options_adds_no_match() {
        let cmd = parse("iptables -A INPUT ! -p udp -j DROP").unwrap();
        assert_eq!(rendered(&cmd, "protocol"), vec!["! -p udp"]);
        assert!(!cmd.params.contains("match"));

        let cmd = parse("iptables -A INPUT -p all -j DROP").unwrap();
        assert!(!cmd.params.contains("protocol"));
    }

    #[test]
    fn matches_keep_input_order() {
        let cmd = parse(
            "iptables -A INPUT -m state --state ESTABLISHED -p tcp --dport 80 -m comment --comment web",
        )
        .unwrap();
        assert_eq!(
            rendered(&cmd, "match"),
            vec![
                "-m state --state ESTABLISHED",
                "-m tcp --dport 80",
                "-m comment --comment \"web\"",
            ]
        );
    }

    #[test]
    fn unknown_command_and_parameter() {
        assert!(matches!(parse("nft add rule"), Err(ParseError::UnknownCommand(_))));
        assert!(matches!(parse(""), Err(ParseError::Empty)));
        assert!(matches!(
            parse("iptables -A INPUT --frobnicate"),
            Err(ParseError::UnknownParameter(p)) if p == "--frobnicate"
        ));
        assert!(matches!(
            parse("iptables -A INPUT -p gre --key 1"),
            Err(ParseError::UnknownParameter(p)) if p == "--key"
        ));
        assert!(matches!(
            parse("iptables -A INPUT -p tcp --icmp-type 8"),
            Err(ParseError::UnknownParameter(p)) if p == "--icmp-type"
        ));
    }

    #[test]
    fn unknown_match_extension() {
        assert!(matches!(
            parse("iptables -A INPUT -m string --string foo"),
            Err(ParseError::UnknownExtension(e)) if e == "string"
        ));
    }

    #[test]
    fn jump_targets() {
        let cmd = parse("iptables -A INPUT -j LOG --log-prefix x").unwrap();
        assert_eq!(rendered(&cmd, "jump"), vec!["-j LOG --log-prefix \"x\""]);

        let cmd = parse("iptables -A INPUT -j LATER -s 10.0.0.1").unwrap();
        assert_eq!(rendered(&cmd, "jump"), vec!["-j LATER"]);

        let cmd = parse("iptables -t raw -A PREROUTING -j NOTRACK").unwrap();
        assert_eq!(rendered(&cmd, "jump"), vec!["-j CT --notrack"]);
    }

    #[test]
    fn unregistered_target_with_options_is_missing_extension() {
        assert!(matches!(
            parse("iptables -A INPUT -j MASQUERADE --random"),
            Err(ParseError::MissingExtension { target, option })
                if target == "MASQUERADE" && option == "--random"
        ));
    }

    #[test]
    fn terminal_targets_take_no_options() {
        assert!(matches!(
            parse("iptables -A INPUT -j ACCEPT --log-prefix x"),
            Err(ParseError::UnknownParameter(_))
        ));
    }

    #[test]
    fn negation_rules() {
        let cmd = parse("iptables -A INPUT ! -s 10.0.0.0/8 ! -i eth0 ! -f").unwrap();
        assert_eq!(rendered(&cmd, "source"), vec!["! -s 10.0.0.0/8"]);
        assert_eq!(rendered(&cmd, "in-interface"), vec!["! -i eth0"]);
        assert_eq!(rendered(&cmd, "fragment"), vec!["! -f"]);

        assert!(matches!(parse("iptables ! -A INPUT"), Err(ParseError::NegationNotAllowed(_))));
        assert!(matches!(parse("iptables -A INPUT ! ! -s x"), Err(ParseError::DoubleNegation)));
        assert!(matches!(parse("iptables -A INPUT !"), Err(ParseError::TrailingNegation)));
    }

    #[test]
    fn duplicates_and_arity() {
        assert!(matches!(
            parse("iptables -A INPUT -s 10.0.0.1 --src 10.0.0.2"),
            Err(ParseError::DuplicateParameter(_))
        ));
        assert!(matches!(
            parse("iptables -A INPUT OUTPUT"),
            Err(ParseError::Arity { found: 2, .. })
        ));
        assert!(matches!(parse("iptables -P INPUT"), Err(ParseError::Arity { .. })));
        assert!(matches!(parse("iptables -A INPUT -j"), Err(ParseError::MissingArgument(_))));

        let cmd = parse("iptables -F").unwrap();
        assert_eq!(rendered(&cmd, "flush"), vec!["-F"]);
        let cmd = parse("iptables -I INPUT 3").unwrap();
        assert_eq!(rendered(&cmd, "insert"), vec!["-I INPUT 3"]);
    }

    #[test]
    fn fragment_flag_is_ipv4_only() {
        assert!(matches!(
            parse("ip6tables -A INPUT -f"),
            Err(ParseError::WrongFamily { .. })
        ));
    }

    #[test]
    fn several_commands_are_left_for_the_applier() {
        let cmd = parse("iptables -A INPUT -F").unwrap();
        assert_eq!(cmd.commands(), vec!["append", "flush"]);
    }
}
