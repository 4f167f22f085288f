use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::Path;

/// Run settings, loaded from an optional YAML file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub dns: DnsSettings,
    /// Static name table consulted before any DNS query.
    #[serde(default)]
    pub hosts: BTreeMap<String, Vec<IpAddr>>,
    #[serde(default)]
    pub diagnostics: DiagnosticSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DnsSettings {
    #[serde(default = "default_attempts")]
    pub attempts: usize,
    /// Remember answers for the rest of the run.
    #[serde(default)]
    pub cache: bool,
    /// Never query DNS; names must appear in `hosts`.
    #[serde(default)]
    pub offline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiagnosticSettings {
    #[serde(default = "default_true")]
    pub warn_round_robin: bool,
    #[serde(default = "default_true")]
    pub warn_host_bits: bool,
}

impl Default for DnsSettings {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            cache: false,
            offline: false,
        }
    }
}

impl Default for DiagnosticSettings {
    fn default() -> Self {
        Self {
            warn_round_robin: true,
            warn_host_bits: true,
        }
    }
}

fn default_attempts() -> usize {
    2
}

fn default_true() -> bool {
    true
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let settings: Settings =
            serde_yaml::from_str(yaml).context("Failed to parse settings YAML")?;
        if settings.dns.attempts == 0 {
            anyhow::bail!("dns.attempts must be at least 1");
        }
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read settings from {:?}", path))?;
        Self::from_yaml(&content)
    }

    /// Load settings from `path`, or fall back to defaults when none is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let settings = Settings::from_yaml("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.dns.attempts, 2);
        assert!(!settings.dns.cache);
        assert!(settings.diagnostics.warn_host_bits);
    }

    #[test]
    fn parses_hosts_table() {
        let yaml = r#"
dns:
  offline: true
hosts:
  gw.example.net: [192.0.2.1, "2001:db8::1"]
diagnostics:
  warn_round_robin: false
"#;
        let settings = Settings::from_yaml(yaml).unwrap();
        assert!(settings.dns.offline);
        assert!(!settings.diagnostics.warn_round_robin);
        let addrs = &settings.hosts["gw.example.net"];
        assert_eq!(addrs.len(), 2);
        assert!(addrs[0].is_ipv4());
        assert!(addrs[1].is_ipv6());
    }

    #[test]
    fn rejects_zero_attempts_and_unknown_keys() {
        assert!(Settings::from_yaml("dns:\n  attempts: 0\n").is_err());
        assert!(Settings::from_yaml("dsn: {}\n").is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "dns:\n  cache: true").unwrap();
        let settings = Settings::load(Some(file.path())).unwrap();
        assert!(settings.dns.cache);
        assert_eq!(Settings::load(None).unwrap(), Settings::default());
    }
}
