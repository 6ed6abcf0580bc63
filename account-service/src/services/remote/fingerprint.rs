//! Installation identity sent along remote account checks.

use sha2::{Digest, Sha256};
use std::path::Path;

const MACHINE_ID_PATHS: [&str; 2] = ["/etc/machine-id", "/var/lib/dbus/machine-id"];
const DISK_ID_DIR: &str = "/dev/disk/by-id";
const NET_CLASS_DIR: &str = "/sys/class/net";

pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Hashed combination of machine id, first disk id and first MAC address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareFingerprint(String);

impl HardwareFingerprint {
    /// Fingerprint of the current host. Missing sources contribute nothing.
    pub fn detect() -> Self {
        let machine = MACHINE_ID_PATHS
            .iter()
            .find_map(|p| read_trimmed(Path::new(p)))
            .unwrap_or_default();
        let disk = first_disk_id().unwrap_or_default();
        let mac = first_mac_address().unwrap_or_default();

        tracing::debug!(
            has_machine_id = !machine.is_empty(),
            has_disk_id = !disk.is_empty(),
            has_mac = !mac.is_empty(),
            "Hardware fingerprint sources"
        );
        Self(sha256_hex(&format!("{machine}{disk}{mac}")))
    }

    /// Use a configured id verbatim.
    pub fn from_override(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn resolve(configured: Option<&str>) -> Self {
        match configured {
            Some(id) if !id.trim().is_empty() => Self::from_override(id.trim()),
            _ => Self::detect(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    let value = std::fs::read_to_string(path).ok()?;
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn sorted_entries(dir: &str) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

fn first_disk_id() -> Option<String> {
    sorted_entries(DISK_ID_DIR)
        .into_iter()
        .find(|name| !name.contains("-part"))
}

fn first_mac_address() -> Option<String> {
    sorted_entries(NET_CLASS_DIR)
        .into_iter()
        .filter(|iface| iface != "lo")
        .filter_map(|iface| read_trimmed(&Path::new(NET_CLASS_DIR).join(iface).join("address")))
        .find(|mac| mac != "00:00:00:00:00:00")
}

/// Diagnostics string reported to the admin server.
pub fn local_info(port: u16, datasource: Option<&str>) -> String {
    let user_dir = std::env::current_dir()
        .map(|d| d.display().to_string())
        .unwrap_or_default();
    format!(
        "User Dir:{},OS:{},Port:{},Datasource:{}",
        user_dir,
        std::env::consts::OS,
        port,
        datasource.unwrap_or("")
    )
}
