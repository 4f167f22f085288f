use super::{Extension, Options, emit};
use crate::error::ParseError;
use ic_core::Family;

const STATE_ORDER: &[&str] = &["INVALID", "NEW", "RELATED", "ESTABLISHED", "UNTRACKED"];
const CTSTATE_ORDER: &[&str] = &[
    "INVALID",
    "NEW",
    "RELATED",
    "ESTABLISHED",
    "UNTRACKED",
    "SNAT",
    "DNAT",
];

pub(crate) struct State;
pub(crate) struct Conntrack;

impl Extension for State {
    fn name(&self) -> &'static str {
        "state"
    }

    fn parse(&self, _family: Family, tokens: &[String], cursor: &mut usize) -> Result<Vec<String>, ParseError> {
        state_list(tokens, cursor, "state", "state", STATE_ORDER)
    }
}

impl Extension for Conntrack {
    fn name(&self) -> &'static str {
        "conntrack"
    }

    fn parse(&self, _family: Family, tokens: &[String], cursor: &mut usize) -> Result<Vec<String>, ParseError> {
        state_list(tokens, cursor, "conntrack", "ctstate", CTSTATE_ORDER)
    }
}

fn state_list(
    tokens: &[String],
    cursor: &mut usize,
    extension: &str,
    option: &'static str,
    order: &[&str],
) -> Result<Vec<String>, ParseError> {
    let mut opts = Options::new(tokens, *cursor);
    let mut states = None;
    while let Some((negated, name)) = opts.next(&[option]) {
        opts.once(option)?;
        states = Some((negated, sort_states(option, opts.value(name)?, order)?));
    }
    opts.finish(cursor);

    let (negated, states) = states.ok_or_else(|| ParseError::MissingArgument(format!("--{option}")))?;
    let mut out = vec![extension.to_string()];
    emit(&mut out, negated, option, Some(&states));
    Ok(out)
}

fn sort_states(option: &str, raw: &str, order: &[&str]) -> Result<String, ParseError> {
    let mut indices = Vec::new();
    for state in raw.split(',') {
        let upper = state.to_ascii_uppercase();
        let index = order
            .iter()
            .position(|known| *known == upper)
            .ok_or_else(|| ParseError::invalid(&format!("--{option}"), raw, format!("unknown state '{state}'")))?;
        if !indices.contains(&index) {
            indices.push(index);
        }
    }
    indices.sort_unstable();
    Ok(indices.iter().map(|&i| order[i]).collect::<Vec<_>>().join(","))
}
