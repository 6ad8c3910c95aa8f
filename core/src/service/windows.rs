//! Windows service control manager backend: `sc.exe query` and `sc.exe qc`.

use log::debug;

use super::{ServiceQuery, ServiceState, StartType};
use crate::error::ServiceError;
use crate::process::quiet_command;

/// `ERROR_SERVICE_DOES_NOT_EXIST`
const SERVICE_DOES_NOT_EXIST: i32 = 1060;

#[derive(Debug, Clone, Copy, Default)]
pub struct ScQuery;

impl ServiceQuery for ScQuery {
    fn query(&self, service_name: &str) -> Result<ServiceState, ServiceError> {
        let stdout = sc(&["query", service_name])?;
        parse_query(service_name, &stdout)
    }

    fn start_type(&self, service_name: &str) -> Result<StartType, ServiceError> {
        let stdout = sc(&["qc", service_name])?;
        parse_qc(service_name, &stdout)
    }
}

fn sc(args: &[&str]) -> Result<String, ServiceError> {
    let output = quiet_command("sc.exe").args(args).output()?;
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if output.status.code() == Some(SERVICE_DOES_NOT_EXIST) {
        return Err(ServiceError::NotInstalled(args[1].to_string()));
    }
    debug!("sc {}: exit {:?}", args.join(" "), output.status.code());
    Ok(stdout)
}

/// Extract the `START_TYPE` line from `sc qc` output.
pub(crate) fn parse_qc(service_name: &str, output: &str) -> Result<StartType, ServiceError> {
    if output.contains("FAILED 1060") {
        return Err(ServiceError::NotInstalled(service_name.to_string()));
    }

    let value = field(output, "START_TYPE")
        .ok_or_else(|| ServiceError::Unparseable(output.trim().to_string()))?;
    let delayed = value.contains("(DELAYED)");
    Ok(match value.split_whitespace().next() {
        Some("0") => StartType::Boot,
        Some("1") => StartType::System,
        Some("2") if delayed => StartType::DelayedAuto,
        Some("2") => StartType::Auto,
        Some("3") => StartType::Manual,
        Some("4") => StartType::Disabled,
        _ => StartType::Unknown,
    })
}

/// Value after the colon of the `NAME : value` line.
fn field<'a>(output: &'a str, name: &str) -> Option<&'a str> {
    output
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with(name))
        .and_then(|line| line.split_once(':'))
        .map(|(_, value)| value.trim())
}

/// Extract the `STATE` line from `sc query` output.
pub(crate) fn parse_query(service_name: &str, output: &str) -> Result<ServiceState, ServiceError> {
    if output.contains("FAILED 1060") {
        return Err(ServiceError::NotInstalled(service_name.to_string()));
    }

    let code = field(output, "STATE")
        .and_then(|value| value.split_whitespace().next())
        .and_then(|n| n.parse::<u32>().ok())
        .ok_or_else(|| ServiceError::Unparseable(output.trim().to_string()))?;

    Ok(match code {
        1 => ServiceState::Stopped,
        2 => ServiceState::StartPending,
        3 => ServiceState::StopPending,
        4 => ServiceState::Running,
        5 => ServiceState::ContinuePending,
        6 => ServiceState::PausePending,
        7 => ServiceState::Paused,
        _ => ServiceState::Unknown,
    })
}
