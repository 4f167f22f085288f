use crate::apply::Applier;
use crate::error::{ApplyError, PipelineError};
use crate::model::RuleSet;
use crate::render::render;
use ic_addr::AddressResolver;
use ic_core::Family;
use ic_parse::{Expander, Expansion, Parser};
use tracing::{debug, info};

/// Canonical dump text for both families.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub ipv4: String,
    pub ipv6: String,
}

impl Rendered {
    pub fn get(&self, family: Family) -> &str {
        match family {
            Family::Ipv4 => &self.ipv4,
            Family::Ipv6 => &self.ipv6,
        }
    }
}

/// Expander, parser and applier wired to one resolver for one run.
pub struct Pipeline {
    parser: Parser,
    resolver: AddressResolver,
}

impl Pipeline {
    pub fn new(resolver: AddressResolver) -> Self {
        Self::with_parser(Parser::default(), resolver)
    }

    pub fn with_parser(parser: Parser, resolver: AddressResolver) -> Self {
        Self { parser, resolver }
    }

    pub fn expand<S: AsRef<str>>(&self, lines: &[S]) -> Result<Expansion, PipelineError> {
        Ok(Expander::new(&self.resolver).expand(lines)?)
    }

    /// Fold one family's command lines into a fresh rule set.
    pub fn build<S: AsRef<str>>(&self, family: Family, lines: &[S]) -> Result<RuleSet, PipelineError> {
        let applier = Applier::new(&self.resolver);
        let mut ruleset = RuleSet::new(family);

        for (index, line) in lines.iter().enumerate() {
            let line = line.as_ref();
            let result = self
                .parser
                .parse(line)
                .map_err(ApplyError::from)
                .and_then(|command| applier.apply(&mut ruleset, command));
            if let Err(source) = result {
                return Err(PipelineError::Line {
                    family,
                    number: index + 1,
                    line: line.to_string(),
                    source,
                });
            }
        }

        debug!(%family, lines = lines.len(), "built rule set");
        Ok(ruleset)
    }

    /// Canonical text of one family's command lines.
    pub fn render_family<S: AsRef<str>>(&self, family: Family, lines: &[S]) -> Result<String, PipelineError> {
        Ok(render(&self.build(family, lines)?))
    }

    /// Expand macro lines and render both families; nothing is returned
    /// unless both succeed.
    pub fn run<S: AsRef<str>>(&self, lines: &[S]) -> Result<Rendered, PipelineError> {
        let expansion = self.expand(lines)?;
        let ipv4 = self.render_family(Family::Ipv4, expansion.lines(Family::Ipv4))?;
        let ipv6 = self.render_family(Family::Ipv6, expansion.lines(Family::Ipv6))?;
        info!(
            ipv4_lines = expansion.ipv4.len(),
            ipv6_lines = expansion.ipv6.len(),
            "rendered rule sets"
        );
        Ok(Rendered { ipv4, ipv6 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ic_addr::StaticLookup;

    fn pipeline() -> Pipeline {
        Pipeline::new(AddressResolver::offline(StaticLookup::default()))
    }

    #[test]
    fn errors_carry_family_and_line() {
        let err = pipeline()
            .run(&["iptables -A INPUT -j ACCEPT", "ip6tables -A INPUT -j ACCEPT", "ip6tables -A NOPE -j DROP"])
            .unwrap_err();
        match err {
            PipelineError::Line {
                family,
                number,
                line,
                source,
            } => {
                assert_eq!(family, Family::Ipv6);
                assert_eq!(number, 2);
                assert_eq!(line, "ip6tables -A NOPE -j DROP");
                assert!(matches!(source, ApplyError::UnknownChain { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn expansion_errors_abort_the_run() {
        assert!(matches!(
            pipeline().run(&["bogus line"]),
            Err(PipelineError::Expand(_))
        ));
    }

    #[test]
    fn parse_errors_are_line_errors() {
        assert!(matches!(
            pipeline().run(&["iptables -A INPUT --bogus"]),
            Err(PipelineError::Line {
                source: ApplyError::Parse(_),
                ..
            })
        ));
    }
}
