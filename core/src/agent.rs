//! The agent's own installation: its settings and version.
//!
//! On Linux the agent keeps `key = value` settings in
//! `/etc/glpi-agent/agent.cfg` plus `conf.d/*.cfg`. On Windows its installer
//! writes them as values under `HKLM\SOFTWARE\GLPI-Agent`, read here through
//! `reg.exe`.

use std::fs;
use std::io;
use std::path::Path;

use log::{debug, info, warn};

use crate::process::quiet_command;

pub const CONFIG_DIR: &str = "/etc/glpi-agent";
const REGISTRY_KEYS: [&str; 2] = [
    r"HKLM\SOFTWARE\GLPI-Agent",
    r"HKLM\SOFTWARE\WOW6432Node\GLPI-Agent",
];

/// Settings the monitor borrows from the agent. Unset values stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentSettings {
    /// Whether an agent installation was found at all.
    pub installed: bool,
    pub version: Option<String>,
    pub httpd_port: Option<u16>,
    pub server: Option<String>,
    pub logfile: Option<String>,
}

impl AgentSettings {
    /// Fold one `name = value` pair in. Later pairs win.
    fn set(&mut self, name: &str, value: &str) {
        let value = unquote(value);
        match name {
            "httpd-port" => match parse_port(value) {
                Some(port) => self.httpd_port = Some(port),
                None => warn!("Ignoring agent httpd-port '{value}'"),
            },
            "server" => self.server = non_empty(value),
            "logfile" => self.logfile = non_empty(value),
            _ => {}
        }
    }

    /// Apply an `agent.cfg`-style file.
    pub fn apply_cfg(&mut self, text: &str) {
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((name, value)) = line.split_once('=') {
                self.set(name.trim(), value);
            }
        }
    }

    /// Apply the values listed by `reg query <key>`.
    pub fn apply_reg_query(&mut self, output: &str) {
        for (name, value) in reg_values(output) {
            self.set(name, value);
        }
    }
}

/// Settings of the agent installed on this machine.
pub fn system_settings() -> AgentSettings {
    let settings = if cfg!(target_os = "windows") {
        registry_settings()
    } else {
        match cfg_settings(Path::new(CONFIG_DIR)) {
            Ok(mut settings) => {
                settings.version = command_version("glpi-agent");
                settings
            }
            Err(e) => {
                warn!("Cannot read agent configuration in {CONFIG_DIR}: {e}");
                AgentSettings::default()
            }
        }
    };

    if settings.installed {
        info!(
            "Agent {} found (httpd-port {:?})",
            settings.version.as_deref().unwrap_or("(unknown version)"),
            settings.httpd_port
        );
    } else {
        warn!("No agent installation found");
    }
    settings
}

/// Read `agent.cfg` and the `conf.d/*.cfg` files below `dir`, in name order.
///
/// A missing `agent.cfg` is not an error; the result is then not installed.
pub fn cfg_settings(dir: &Path) -> io::Result<AgentSettings> {
    let mut settings = AgentSettings::default();

    let main = dir.join("agent.cfg");
    match fs::read_to_string(&main) {
        Ok(text) => {
            settings.installed = true;
            settings.apply_cfg(&text);
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(settings),
        Err(e) => return Err(e),
    }

    let mut extra: Vec<_> = match fs::read_dir(dir.join("conf.d")) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "cfg"))
            .collect(),
        Err(_) => Vec::new(),
    };
    extra.sort();
    for path in extra {
        debug!("Reading agent configuration {:?}", path);
        settings.apply_cfg(&fs::read_to_string(&path)?);
    }
    Ok(settings)
}

fn registry_settings() -> AgentSettings {
    let mut settings = AgentSettings::default();
    let Some((key, output)) = REGISTRY_KEYS
        .into_iter()
        .find_map(|key| reg_query(&[key]).map(|output| (key, output)))
    else {
        return settings;
    };

    settings.installed = true;
    settings.apply_reg_query(&output);
    let installer = format!(r"{key}\Installer");
    settings.version = reg_query(&[installer.as_str(), "/v", "Version"])
        .and_then(|output| {
            reg_values(&output)
                .find(|(name, _)| *name == "Version")
                .and_then(|(_, value)| non_empty(value))
        });
    settings
}

/// Run `reg.exe query`; `None` when the key or value does not exist.
fn reg_query(args: &[&str]) -> Option<String> {
    let output = quiet_command("reg.exe")
        .arg("query")
        .args(args)
        .arg("/reg:64")
        .output()
        .inspect_err(|e| debug!("reg.exe query failed: {e}"))
        .ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).into_owned())
}

fn command_version(program: &str) -> Option<String> {
    let output = quiet_command(program).arg("--version").output().ok()?;
    parse_version(&String::from_utf8_lossy(&output.stdout))
}

/// First dotted number in `--version` output, e.g. `GLPI Agent (1.7.1)`.
pub fn parse_version(output: &str) -> Option<String> {
    output
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '.' || c == '-'))
        .find(|word| word.starts_with(|c: char| c.is_ascii_digit()) && word.contains('.'))
        .map(|word| word.trim_end_matches('.').to_string())
}

/// `(name, value)` pairs from `reg query` output lines such as
/// `    httpd-port    REG_SZ    62354`.
fn reg_values(output: &str) -> impl Iterator<Item = (&str, &str)> {
    output.lines().filter_map(|line| {
        let at = line.find("    REG_")?;
        let name = line[..at].trim();
        let rest = line[at..].trim_start();
        let value = rest
            .split_once(char::is_whitespace)
            .map_or("", |(_, value)| value.trim());
        (!name.is_empty()).then_some((name, value))
    })
}

fn parse_port(value: &str) -> Option<u16> {
    match value.strip_prefix("0x") {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value)
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
