use std::collections::BTreeMap;
use std::fmt;

/// One fully expanded flag occurrence, e.g. `! -s 10.0.0.0/8` or
/// `-m tcp --dport 22`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub negated: bool,
    pub flag: String,
    pub args: Vec<String>,
}

impl Fragment {
    pub fn new(flag: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            negated: false,
            flag: flag.into(),
            args,
        }
    }

    pub fn negated(mut self, negated: bool) -> Self {
        self.negated = negated;
        self
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            f.write_str("! ")?;
        }
        f.write_str(&self.flag)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Canonical long option name to its ordered fragments.
///
/// Most keys hold a single fragment; `match` collects one per extension
/// occurrence, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamMap {
    entries: BTreeMap<String, Vec<Fragment>>,
}

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: &str, fragment: Fragment) {
        self.entries.entry(key.to_string()).or_default().push(fragment);
    }

    /// Replace every fragment under `key` with `fragment`.
    pub fn set(&mut self, key: &str, fragment: Fragment) {
        self.entries.insert(key.to_string(), vec![fragment]);
    }

    pub fn get(&self, key: &str) -> Option<&[Fragment]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn first(&self, key: &str) -> Option<&Fragment> {
        self.entries.get(key).and_then(|fragments| fragments.first())
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<Fragment>> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Fragment])> {
        self.entries
            .iter()
            .map(|(key, fragments)| (key.as_str(), fragments.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragments_render_with_negation() {
        let frag = Fragment::new("-s", vec!["10.0.0.0/8".into()]).negated(true);
        assert_eq!(frag.to_string(), "! -s 10.0.0.0/8");
        assert_eq!(Fragment::new("-f", vec![]).to_string(), "-f");
    }

    #[test]
    fn repeated_keys_keep_insertion_order() {
        let mut params = ParamMap::new();
        params.push("match", Fragment::new("-m", vec!["state".into()]));
        params.push("match", Fragment::new("-m", vec!["comment".into()]));
        let names: Vec<_> = params
            .get("match")
            .unwrap()
            .iter()
            .map(|f| f.arg(0).unwrap())
            .collect();
        assert_eq!(names, vec!["state", "comment"]);

        params.set("match", Fragment::new("-m", vec!["tcp".into()]));
        assert_eq!(params.get("match").unwrap().len(), 1);
    }
}
