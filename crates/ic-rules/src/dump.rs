use crate::error::DumpError;
use ic_core::Family;

/// Turn dump stanzas back into command lines for `family`.
///
/// Chain headers become `-N` (user chains) or `-P` (built-in chains) lines,
/// rule lines keep their text behind `<tool> -t <table>`. Packet counters,
/// comments and blank lines are dropped.
pub fn dump_to_commands(family: Family, text: &str) -> Result<Vec<String>, DumpError> {
    let tool = family.tool();
    let mut table: Option<&str> = None;
    let mut commands = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let number = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(name) = line.strip_prefix('*') {
            if let Some(open) = table {
                return Err(DumpError::new(number, line, format!("table {open} was not committed")));
            }
            if name.is_empty() {
                return Err(DumpError::new(number, line, "missing table name"));
            }
            table = Some(name);
            continue;
        }

        if line == "COMMIT" {
            if table.take().is_none() {
                return Err(DumpError::new(number, line, "COMMIT outside a table"));
            }
            continue;
        }

        let Some(current) = table else {
            return Err(DumpError::new(number, line, "line outside a table"));
        };

        if let Some(header) = line.strip_prefix(':') {
            let mut parts = header.split_whitespace();
            let (Some(chain), Some(policy)) = (parts.next(), parts.next()) else {
                return Err(DumpError::new(number, line, "malformed chain header"));
            };
            commands.push(match policy {
                "-" => format!("{tool} -t {current} -N {chain}"),
                policy => format!("{tool} -t {current} -P {chain} {policy}"),
            });
            continue;
        }

        let rule = strip_counters(line);
        if !rule.starts_with("-A ") {
            return Err(DumpError::new(number, line, "expected a chain header or an -A rule"));
        }
        commands.push(format!("{tool} -t {current} {rule}"));
    }

    if let Some(open) = table {
        return Err(DumpError::new(
            text.lines().count(),
            open,
            "missing COMMIT at end of dump",
        ));
    }
    Ok(commands)
}

/// Drop a leading `[packets:bytes]` counter from a rule line.
pub(crate) fn strip_counters(line: &str) -> &str {
    if line.starts_with('[') {
        if let Some((_, rest)) = line.split_once(']') {
            return rest.trim_start();
        }
    }
    line
}
