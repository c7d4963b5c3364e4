/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! CSCHED (control-plane) primitive parameters.

use super::{Lcid, Rnti};

// ── Cell ──────────────────────────────────────────────────────────────────────

/// `CSCHED_CELL_CONFIG_REQ`.  Bandwidths are in resource blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CschedCellConfigReqParameters {
    pub dl_bandwidth: u16,
    pub ul_bandwidth: u16,
    pub antenna_ports_count: u8,
}

impl Default for CschedCellConfigReqParameters {
    fn default() -> Self {
        Self {
            dl_bandwidth: 25,
            ul_bandwidth: 25,
            antenna_ports_count: 1,
        }
    }
}

/// `CSCHED_CELL_CONFIG_CNF`, echoing the derived DL resource grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CschedCellConfigCnfParameters {
    pub rbg_size: u16,
    pub dl_rbg_count: u16,
}

// ── UE ────────────────────────────────────────────────────────────────────────

/// Downlink transmission mode (TS 36.213 7.1), indexed from 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransmissionMode {
    #[default]
    Siso,
    TransmitDiversity,
    OpenLoopSpatialMux,
    ClosedLoopSpatialMux,
    MultiUserMimo,
    ClosedLoopRank1,
    SingleAntennaPort5,
}

impl TransmissionMode {
    /// Map the 0-based index used on the wire.  Unknown values are `None`.
    pub fn from_index(index: u8) -> Option<Self> {
        Some(match index {
            0 => Self::Siso,
            1 => Self::TransmitDiversity,
            2 => Self::OpenLoopSpatialMux,
            3 => Self::ClosedLoopSpatialMux,
            4 => Self::MultiUserMimo,
            5 => Self::ClosedLoopRank1,
            6 => Self::SingleAntennaPort5,
            _ => return None,
        })
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    /// Number of spatial layers (codewords) a DCI carries in this mode.
    pub fn layers(self) -> usize {
        match self {
            Self::OpenLoopSpatialMux | Self::ClosedLoopSpatialMux | Self::MultiUserMimo => 2,
            _ => 1,
        }
    }
}

/// `CSCHED_UE_CONFIG_REQ`.
///
/// With `reconfigure_flag` set only `transmission_mode` is applied to the
/// already configured UE.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CschedUeConfigReqParameters {
    pub rnti: Rnti,
    pub reconfigure_flag: bool,
    pub transmission_mode: TransmissionMode,
    /// UE-AMBR, bit/s.
    pub ue_aggregated_maximum_bitrate_dl: u64,
    pub ue_aggregated_maximum_bitrate_ul: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CschedUeConfigCnfParameters {
    pub rnti: Rnti,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CschedUeConfigUpdateIndParameters {
    pub rnti: Rnti,
    pub transmission_mode: TransmissionMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CschedUeReleaseReqParameters {
    pub rnti: Rnti,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CschedUeReleaseCnfParameters {
    pub rnti: Rnti,
}

// ── Logical channels ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LcDirection {
    Dl,
    Ul,
    #[default]
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QosBearerType {
    #[default]
    NonGbr,
    Gbr,
}

/// One entry of `CSCHED_LC_CONFIG_REQ`.  Bitrates are in bit/s.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogicalChannelConfigListElement {
    pub logical_channel_identity: Lcid,
    pub logical_channel_group: u8,
    pub direction: LcDirection,
    pub qos_bearer_type: QosBearerType,
    pub qci: u8,
    pub e_rab_maximum_bitrate_ul: u64,
    pub e_rab_maximum_bitrate_dl: u64,
    pub e_rab_guaranteed_bitrate_ul: u64,
    pub e_rab_guaranteed_bitrate_dl: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CschedLcConfigReqParameters {
    pub rnti: Rnti,
    pub reconfigure_flag: bool,
    pub logical_channel_config_list: Vec<LogicalChannelConfigListElement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CschedLcConfigCnfParameters {
    pub rnti: Rnti,
    pub logical_channel_identity: Vec<Lcid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CschedLcReleaseReqParameters {
    pub rnti: Rnti,
    pub logical_channel_identity: Vec<Lcid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CschedLcReleaseCnfParameters {
    pub rnti: Rnti,
    pub logical_channel_identity: Vec<Lcid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spatial_multiplexing_modes_use_two_layers() {
        let layers: Vec<usize> = (0..7)
            .filter_map(TransmissionMode::from_index)
            .map(TransmissionMode::layers)
            .collect();
        assert_eq!(layers, vec![1, 1, 2, 2, 2, 1, 1]);
    }

    #[test]
    fn unknown_transmission_mode_index_is_rejected() {
        assert_eq!(TransmissionMode::from_index(7), None);
        assert_eq!(
            TransmissionMode::from_index(2).map(TransmissionMode::index),
            Some(2)
        );
    }
}
