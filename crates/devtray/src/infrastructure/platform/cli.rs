//! Platform adapter over the `qvm-ls` and `qvm-device` command-line tools.
//!
//! | Operation      | Command                                                  |
//! |----------------|----------------------------------------------------------|
//! | `list_domains` | `qvm-ls --raw-data --fields NAME,STATE,LABEL`            |
//! | `list_devices` | `qvm-device <class> list`, once per recognised class     |
//! | `attach`       | `qvm-device <class> attach <target> <backend>:<ident>`   |
//! | `detach`       | `qvm-device <class> detach <target> <backend>:<ident>`   |
//!
//! A tool that cannot be spawned maps to [`PlatformError::Unavailable`]; a
//! non-zero exit maps to [`PlatformError::Rejected`] carrying the tool's
//! stderr, which is what the user sees in the failure alert.

use async_trait::async_trait;
use devtray_core::{Assignment, Category, DeviceInfo, Domain, DomainId, DomainState};
use tokio::process::Command;
use tracing::{debug, trace};

use crate::application::ports::{PlatformApi, PlatformError};
use crate::infrastructure::storage::config::PlatformConfig;

/// Runs the platform's command-line tools.
pub struct QubesCliPlatform {
    device_command: String,
    list_command: String,
}

impl QubesCliPlatform {
    pub fn new(config: &PlatformConfig) -> Self {
        Self {
            device_command: config.device_command.clone(),
            list_command: config.list_command.clone(),
        }
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<String, PlatformError> {
        debug!(program, ?args, "running platform tool");
        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| PlatformError::Unavailable(format!("{program}: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(PlatformError::Rejected(if stderr.is_empty() {
                format!("{program} exited with {}", output.status)
            } else {
                stderr
            }));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| PlatformError::Malformed(format!("{program} output is not UTF-8: {e}")))
    }

    async fn assign(&self, verb: &str, assignment: &Assignment) -> Result<(), PlatformError> {
        let device = format!("{}:{}", assignment.backend, assignment.ident);
        self.run(
            &self.device_command,
            &[
                assignment.category.as_str(),
                verb,
                assignment.target.as_str(),
                &device,
            ],
        )
        .await
        .map(|_| ())
    }
}

#[async_trait]
impl PlatformApi for QubesCliPlatform {
    async fn list_domains(&self) -> Result<Vec<Domain>, PlatformError> {
        let out = self
            .run(
                &self.list_command,
                &["--raw-data", "--fields", "NAME,STATE,LABEL"],
            )
            .await?;
        parse_domain_listing(&out)
    }

    async fn list_devices(&self) -> Result<Vec<DeviceInfo>, PlatformError> {
        let mut devices = Vec::new();
        for category in Category::ALL {
            let out = self
                .run(&self.device_command, &[category.as_str(), "list"])
                .await?;
            devices.extend(parse_device_listing(category, &out)?);
        }
        Ok(devices)
    }

    async fn attach(&self, assignment: &Assignment) -> Result<(), PlatformError> {
        self.assign("attach", assignment).await
    }

    async fn detach(&self, assignment: &Assignment) -> Result<(), PlatformError> {
        self.assign("detach", assignment).await
    }
}

// ── Output parsing ────────────────────────────────────────────────────────────

/// Maps a `qvm-ls` power state to a lifecycle state.
pub fn parse_power_state(state: &str) -> DomainState {
    match state {
        "Running" => DomainState::Started,
        "Transient" => DomainState::Starting,
        "Halted" => DomainState::Halted,
        "Crashed" => DomainState::Failed,
        _ => DomainState::Unknown,
    }
}

/// Parses `qvm-ls --raw-data --fields NAME,STATE,LABEL` output.
///
/// One domain per line, fields separated by `|`.  Blank lines are skipped.
pub fn parse_domain_listing(out: &str) -> Result<Vec<Domain>, PlatformError> {
    let mut domains = Vec::new();
    for line in out.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let fields: Vec<&str> = line.split('|').collect();
        let [name, state, label] = fields.as_slice() else {
            return Err(PlatformError::Malformed(format!("domain line: {line}")));
        };
        domains.push(Domain {
            id: DomainId::new(*name),
            name: name.to_string(),
            state: parse_power_state(state),
            label: label.to_string(),
        });
    }
    Ok(domains)
}

/// Parses `qvm-device <class> list` output.
///
/// Columns are separated by runs of two or more spaces:
///
/// ```text
/// sys-usb:2-1   Logitech_USB_Receiver   work (read-only=no)
/// sys-usb:2-2   Kingston_DataTraveler
/// ```
///
/// The first column is `backend:ident`, the optional second a description,
/// and the optional third names the domain the device is attached to.
pub fn parse_device_listing(category: Category, out: &str) -> Result<Vec<DeviceInfo>, PlatformError> {
    let mut devices = Vec::new();
    for line in out.lines().filter(|l| !l.trim().is_empty()) {
        let columns = split_columns(line);
        let Some(id) = columns.first() else {
            continue;
        };
        let Some((backend, ident)) = id.split_once(':') else {
            return Err(PlatformError::Malformed(format!("device line: {line}")));
        };
        let frontend = columns
            .get(2)
            .and_then(|used_by| used_by.split_whitespace().next())
            .map(DomainId::new);
        trace!(device = *id, ?frontend, "parsed device");
        devices.push(DeviceInfo {
            backend: DomainId::new(backend),
            ident: ident.to_string(),
            category: category.as_str().to_string(),
            display_name: columns.get(1).map(|d| d.to_string()).unwrap_or_default(),
            frontend,
        });
    }
    Ok(devices)
}

fn split_columns(line: &str) -> Vec<&str> {
    line.trim()
        .split("  ")
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect()
}
