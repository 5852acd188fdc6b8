//! Network state adapter and policy gate
//!
//! [`SysfsNetworkState`] implements [`INetworkState`] by reading
//! `/sys/class/net`. [`NetworkPolicyGate`] answers the two questions the
//! orchestrator asks before uploading: is Wi-Fi connected, and is a VPN
//! active.
//!
//! ## Classification
//!
//! - **Wi-Fi**: the interface has a `wireless` directory or a `phy80211` link
//! - **VPN**: a `tun_flags` attribute exists, the ARP hardware type is
//!   `NONE` (WireGuard) or `PPP`, or `IFF_POINTOPOINT` is set
//! - **not-VPN**: the interface is backed by a hardware `device`
//! - **up**: `IFF_UP` is set and `operstate` is `up` or `unknown`

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use blobsync_core::ports::network_state::{INetworkState, NetworkInterface};
use tracing::{debug, warn};

/// Default sysfs directory listing network interfaces
pub const SYSFS_NET_ROOT: &str = "/sys/class/net";

/// ARP hardware type for interfaces without a link layer (WireGuard, tun)
const ARPHRD_NONE: u32 = 0xFFFE;

/// ARP hardware type for PPP links
const ARPHRD_PPP: u32 = 512;

// ============================================================================
// SysfsNetworkState
// ============================================================================

/// Reads interface state from the Linux sysfs network class
#[derive(Debug, Clone)]
pub struct SysfsNetworkState {
    root: PathBuf,
}

impl SysfsNetworkState {
    /// Creates an adapter over `/sys/class/net`
    pub fn new() -> Self {
        Self::with_root(SYSFS_NET_ROOT)
    }

    /// Creates an adapter over a custom directory (useful for testing)
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read_interface(dir: &Path, name: String) -> NetworkInterface {
        let flags = read_trimmed(&dir.join("flags"))
            .and_then(|raw| u32::from_str_radix(raw.trim_start_matches("0x"), 16).ok())
            .unwrap_or(0);
        let operstate = read_trimmed(&dir.join("operstate")).unwrap_or_default();
        let arp_type = read_trimmed(&dir.join("type")).and_then(|raw| raw.parse::<u32>().ok());

        let has_flag = |flag: libc::c_int| flags & flag as u32 != 0;

        let is_up = has_flag(libc::IFF_UP) && matches!(operstate.as_str(), "up" | "unknown");
        let is_wifi = dir.join("wireless").is_dir() || dir.join("phy80211").exists();
        let is_vpn = dir.join("tun_flags").exists()
            || matches!(arp_type, Some(ARPHRD_NONE) | Some(ARPHRD_PPP))
            || has_flag(libc::IFF_POINTOPOINT);

        NetworkInterface {
            name,
            is_up,
            is_wifi,
            is_vpn,
            is_not_vpn: dir.join("device").exists(),
            is_loopback: has_flag(libc::IFF_LOOPBACK),
        }
    }
}

impl Default for SysfsNetworkState {
    fn default() -> Self {
        Self::new()
    }
}

impl INetworkState for SysfsNetworkState {
    fn interfaces(&self) -> Result<Vec<NetworkInterface>> {
        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("Failed to read {}", self.root.display()))?;

        let mut interfaces = Vec::new();
        for entry in entries {
            let entry = entry.context("Failed to read interface entry")?;
            let name = entry.file_name().to_string_lossy().into_owned();
            interfaces.push(Self::read_interface(&entry.path(), name));
        }
        interfaces.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(interfaces)
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

// ============================================================================
// NetworkPolicyGate
// ============================================================================

/// Answers the Wi-Fi-only and VPN-only policy questions
///
/// Every call takes a fresh snapshot. If the snapshot fails, both questions
/// answer `false`.
#[derive(Clone)]
pub struct NetworkPolicyGate {
    state: Arc<dyn INetworkState>,
}

impl NetworkPolicyGate {
    pub fn new(state: Arc<dyn INetworkState>) -> Self {
        Self { state }
    }

    /// True if any non-loopback Wi-Fi interface is connected
    pub fn is_wifi_connected(&self) -> bool {
        self.any(NetworkInterface::is_connected_wifi)
    }

    /// True if any interface is an active VPN and not flagged not-VPN
    pub fn is_vpn_active(&self) -> bool {
        self.any(NetworkInterface::is_active_vpn)
    }

    fn any(&self, pred: impl Fn(&NetworkInterface) -> bool) -> bool {
        match self.state.interfaces() {
            Ok(interfaces) => {
                let found = interfaces
                    .iter()
                    .filter(|iface| !iface.is_loopback)
                    .find(|iface| pred(iface));
                if let Some(iface) = found {
                    debug!(interface = %iface.name, "Network policy matched");
                }
                found.is_some()
            }
            Err(e) => {
                warn!(error = %e, "Network state unavailable, treating as disconnected");
                false
            }
        }
    }
}
