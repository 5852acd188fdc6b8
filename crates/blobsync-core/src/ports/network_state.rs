//! Network state port (driven/secondary port)
//!
//! Exposes a read-only snapshot of the host's network interfaces so the
//! policy gate can answer "is Wi-Fi connected" and "is a VPN active".
//! Snapshots are taken on demand and never cached.

use serde::{Deserialize, Serialize};

/// One network interface as seen at snapshot time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    /// Kernel interface name (e.g. `wlan0`, `wg0`)
    pub name: String,
    /// Administratively up and carrier present
    pub is_up: bool,
    /// Backed by an 802.11 radio
    pub is_wifi: bool,
    /// Tunnel or point-to-point transport
    pub is_vpn: bool,
    /// Explicitly not a VPN even if it looks like one (e.g. backed by hardware)
    pub is_not_vpn: bool,
    /// Loopback interface
    pub is_loopback: bool,
}

impl NetworkInterface {
    /// True if this interface is an active VPN under the policy rules:
    /// up, flagged VPN, and not simultaneously flagged not-VPN.
    pub fn is_active_vpn(&self) -> bool {
        self.is_up && self.is_vpn && !self.is_not_vpn
    }

    /// True if this interface is a connected Wi-Fi link.
    pub fn is_connected_wifi(&self) -> bool {
        self.is_up && self.is_wifi
    }
}

/// Port trait for querying network interfaces
pub trait INetworkState: Send + Sync {
    /// Returns the current interface list
    ///
    /// # Errors
    /// Returns an error if the network subsystem cannot be queried. Callers
    /// treat that as "no Wi-Fi, no VPN".
    fn interfaces(&self) -> anyhow::Result<Vec<NetworkInterface>>;
}
