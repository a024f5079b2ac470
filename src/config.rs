// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stack-wide configuration — single source of truth for every tunable that
//! is a device setting rather than a fixed protocol constant.
//!
//! Grouped by concern, each with PROFINET-mandated defaults: one `Default`
//! impl per concern rather than one flat struct of a hundred fields.

use crate::alarm::AlarmTiming;
use crate::types::Mac;

/// DCP-related knobs.
#[derive(Debug, Clone, Copy)]
pub struct DcpConfig {
    pub sam_timeout_us: u64,
    /// Upper bound `IdentifyAll` may request via `ResponseDelayFactor`
    /// (units of 10ms); beyond this the response is sent immediately.
    pub max_response_delay_factor: u16,
}

impl Default for DcpConfig {
    fn default() -> Self {
        Self {
            sam_timeout_us: crate::dcp::sam::SAM_TIMEOUT_US,
            max_response_delay_factor: 6400,
        }
    }
}

/// LLDP-related knobs.
#[derive(Debug, Clone, Copy)]
pub struct LldpConfig {
    pub tx_interval_s: u16,
    pub hold_time_s: u16,
}

impl Default for LldpConfig {
    fn default() -> Self {
        Self {
            tx_interval_s: crate::lldp::DEFAULT_TX_INTERVAL_S,
            hold_time_s: crate::lldp::DEFAULT_HOLD_TIME_S,
        }
    }
}

/// Cyclic (PPM/CPM) resource limits.
#[derive(Debug, Clone, Copy)]
pub struct CyclicConfig {
    pub max_iocrs: usize,
    /// PROFINET's base send clock unit, 31.25us, expressed as a fixed-point
    /// scale factor (x100) to keep [`crate::model::Iocr`]'s timing math in
    /// integer microseconds.
    pub base_send_clock_us_x100: u64,
}

impl Default for CyclicConfig {
    fn default() -> Self {
        Self {
            max_iocrs: 64,
            base_send_clock_us_x100: 3125,
        }
    }
}

/// Alarm engine knobs.
#[derive(Debug, Clone, Copy)]
pub struct AlarmConfig {
    pub timing: AlarmTiming,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            timing: AlarmTiming::default(),
        }
    }
}

/// IP suite set via DCP `Set(IP, IPParameter)`, or persisted across restarts.
/// All-zero means "unset" (device relies on DHCP/other configuration at the
/// application layer).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IpParameter {
    pub ip_address: [u8; 4],
    pub netmask: [u8; 4],
    pub gateway: [u8; 4],
}

impl IpParameter {
    pub fn to_bytes(&self) -> [u8; 12] {
        let mut out = [0u8; 12];
        out[0..4].copy_from_slice(&self.ip_address);
        out[4..8].copy_from_slice(&self.netmask);
        out[8..12].copy_from_slice(&self.gateway);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 12 {
            return None;
        }
        Some(Self {
            ip_address: bytes[0..4].try_into().ok()?,
            netmask: bytes[4..8].try_into().ok()?,
            gateway: bytes[8..12].try_into().ok()?,
        })
    }
}

/// Resource limits shared across the connection manager and RPC engine
///.
#[derive(Debug, Clone, Copy)]
pub struct ResourceLimits {
    pub max_ars: usize,
    pub max_sessions: usize,
    pub max_diag_items_per_subslot: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_ars: 4,
            max_sessions: 4,
            max_diag_items_per_subslot: 16,
        }
    }
}

/// Top-level stack configuration.
#[derive(Debug, Clone)]
pub struct StackConfig {
    pub station_name: String,
    pub vendor_id: u16,
    pub device_id: u16,
    pub instance_id: (u8, u8),
    pub mac: Mac,
    pub ip: IpParameter,
    pub dcp: DcpConfig,
    pub lldp: LldpConfig,
    pub cyclic: CyclicConfig,
    pub alarm: AlarmConfig,
    pub resources: ResourceLimits,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            station_name: String::new(),
            vendor_id: 0,
            device_id: 0,
            instance_id: (0, 1),
            mac: [0; 6],
            ip: IpParameter::default(),
            dcp: DcpConfig::default(),
            lldp: LldpConfig::default(),
            cyclic: CyclicConfig::default(),
            alarm: AlarmConfig::default(),
            resources: ResourceLimits::default(),
        }
    }
}

impl StackConfig {
    pub fn with_identity(mut self, mac: Mac, vendor_id: u16, device_id: u16) -> Self {
        self.mac = mac;
        self.vendor_id = vendor_id;
        self.device_id = device_id;
        self
    }

    pub fn with_station_name(mut self, name: impl Into<String>) -> Self {
        self.station_name = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_profinet_mandated_values() {
        let cfg = StackConfig::default();
        assert_eq!(cfg.lldp.hold_time_s, 20);
        assert_eq!(cfg.lldp.tx_interval_s, 5);
        assert_eq!(cfg.dcp.sam_timeout_us, 3_000_000);
        assert_eq!(cfg.alarm.timing.max_retries, 3);
    }

    #[test]
    fn ip_parameter_round_trips_through_bytes() {
        let ip = IpParameter {
            ip_address: [192, 168, 0, 10],
            netmask: [255, 255, 255, 0],
            gateway: [192, 168, 0, 1],
        };
        let bytes = ip.to_bytes();
        assert_eq!(IpParameter::from_bytes(&bytes), Some(ip));
    }

    #[test]
    fn builder_overrides_identity_fields() {
        let cfg = StackConfig::default()
            .with_identity([1, 2, 3, 4, 5, 6], 0x002A, 0x0101)
            .with_station_name("cell-3-plc");
        assert_eq!(cfg.mac, [1, 2, 3, 4, 5, 6]);
        assert_eq!(cfg.vendor_id, 0x002A);
        assert_eq!(cfg.station_name, "cell-3-plc");
    }
}
