//! systemd backend: `systemctl show` property dump.

use log::debug;

use super::{ServiceQuery, ServiceState, StartType};
use crate::error::ServiceError;
use crate::process::quiet_command;

const PROPERTIES: &str = "--property=LoadState,ActiveState,SubState,FreezerState";

/// Queries a unit of the system manager through `systemctl`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemdQuery;

impl ServiceQuery for SystemdQuery {
    fn query(&self, service_name: &str) -> Result<ServiceState, ServiceError> {
        let stdout = show(service_name, PROPERTIES)?;
        parse_show(service_name, &stdout)
    }

    fn start_type(&self, service_name: &str) -> Result<StartType, ServiceError> {
        let stdout = show(service_name, "--property=LoadState,UnitFileState")?;
        if property(&stdout, "LoadState") == Some("not-found") {
            return Err(ServiceError::NotInstalled(service_name.to_string()));
        }
        Ok(parse_unit_file_state(
            property(&stdout, "UnitFileState").unwrap_or_default(),
        ))
    }
}

fn show(service_name: &str, properties: &str) -> Result<String, ServiceError> {
    let output = quiet_command("systemctl")
        .args(["show", service_name, properties])
        .output()?;

    if !output.status.success() {
        return Err(ServiceError::Unparseable(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    debug!("systemctl show {service_name}: {}", stdout.trim().replace('\n', " "));
    Ok(stdout)
}

/// Map a unit's `UnitFileState` to the start type it implies.
pub(crate) fn parse_unit_file_state(state: &str) -> StartType {
    match state {
        "enabled" | "enabled-runtime" | "alias" => StartType::Auto,
        "disabled" | "static" | "indirect" | "generated" | "transient" | "linked"
        | "linked-runtime" => StartType::Manual,
        "masked" | "masked-runtime" => StartType::Disabled,
        _ => StartType::Unknown,
    }
}

/// Map `Key=Value` lines from `systemctl show` to a service state.
pub(crate) fn parse_show(service_name: &str, output: &str) -> Result<ServiceState, ServiceError> {
    let load = property(output, "LoadState")
        .ok_or_else(|| ServiceError::Unparseable(format!("no LoadState for {service_name}")))?;
    if load == "not-found" {
        return Err(ServiceError::NotInstalled(service_name.to_string()));
    }

    match property(output, "FreezerState").unwrap_or_default() {
        "frozen" => return Ok(ServiceState::Paused),
        "freezing" => return Ok(ServiceState::PausePending),
        "thawing" => return Ok(ServiceState::ContinuePending),
        _ => {}
    }

    let active = property(output, "ActiveState").unwrap_or_default();
    let sub = property(output, "SubState").unwrap_or_default();
    Ok(match (active, sub) {
        ("active", "exited") => ServiceState::Stopped,
        ("active" | "reloading" | "refreshing", _) => ServiceState::Running,
        ("activating", _) => ServiceState::StartPending,
        ("deactivating", _) => ServiceState::StopPending,
        ("inactive" | "failed", _) => ServiceState::Stopped,
        _ => ServiceState::Unknown,
    })
}

fn property<'a>(output: &'a str, key: &str) -> Option<&'a str> {
    output.lines().find_map(|line| {
        line.strip_prefix(key)
            .and_then(|rest| rest.strip_prefix('='))
            .map(str::trim)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dump(active: &str, sub: &str, freezer: &str) -> String {
        format!("LoadState=loaded\nActiveState={active}\nSubState={sub}\nFreezerState={freezer}\n")
    }

    #[test]
    fn active_running_unit() {
        let state = parse_show("glpi-agent", &dump("active", "running", "running")).unwrap();
        assert_eq!(state, ServiceState::Running);
    }

    #[test]
    fn transitional_states() {
        let cases = [
            (dump("activating", "start", "running"), ServiceState::StartPending),
            (dump("deactivating", "stop-sigterm", "running"), ServiceState::StopPending),
            (dump("inactive", "dead", "running"), ServiceState::Stopped),
            (dump("failed", "failed", "running"), ServiceState::Stopped),
            (dump("active", "exited", "running"), ServiceState::Stopped),
            (dump("maintenance", "", "running"), ServiceState::Unknown),
        ];
        for (output, expected) in cases {
            assert_eq!(parse_show("glpi-agent", &output).unwrap(), expected, "{output}");
        }
    }

    #[test]
    fn freezer_maps_to_pause_states() {
        assert_eq!(
            parse_show("a", &dump("active", "running", "frozen")).unwrap(),
            ServiceState::Paused
        );
        assert_eq!(
            parse_show("a", &dump("active", "running", "freezing")).unwrap(),
            ServiceState::PausePending
        );
        assert_eq!(
            parse_show("a", &dump("active", "running", "thawing")).unwrap(),
            ServiceState::ContinuePending
        );
    }

    #[test]
    fn missing_unit_is_not_installed() {
        let output = "LoadState=not-found\nActiveState=inactive\nSubState=dead\n";
        assert!(matches!(
            parse_show("glpi-agent", output),
            Err(ServiceError::NotInstalled(name)) if name == "glpi-agent"
        ));
    }

    #[test]
    fn garbage_is_unparseable() {
        assert!(matches!(
            parse_show("glpi-agent", "Failed to connect to bus"),
            Err(ServiceError::Unparseable(_))
        ));
    }

    #[test]
    fn unit_file_state_to_start_type() {
        assert_eq!(parse_unit_file_state("enabled"), StartType::Auto);
        assert_eq!(parse_unit_file_state("disabled"), StartType::Manual);
        assert_eq!(parse_unit_file_state("static"), StartType::Manual);
        assert_eq!(parse_unit_file_state("masked"), StartType::Disabled);
        assert_eq!(parse_unit_file_state(""), StartType::Unknown);
    }
}
