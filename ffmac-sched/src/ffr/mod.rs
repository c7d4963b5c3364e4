/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Fractional frequency reuse (FFR) SAP.
//!
//! An FFR policy restricts which DL resource block groups and UL resource
//! blocks the scheduler may hand out, cell-wide and per UE.  The scheduler
//! consults it on every trigger and forwards every CQI report so the policy
//! can classify UEs into reuse zones.
//!
//! Availability vectors use `true` = usable.  DL vectors are indexed by RBG,
//! UL vectors by resource block.
//!
//! | Policy | Cell-wide DL/UL set | Per-UE restriction |
//! |---|---|---|
//! | [`NoOpFfr`] | everything | none |
//! | [`HardFfr`] | one sub-band | none |
//! | [`SoftFfr`] | everything | centre UEs: centre part, edge UEs: edge part |
//! | [`EnhancedFfr`] | primary + secondary segment | secondary needs good CQI |
//! | [`DistributedFfr`] | everything | edge UEs avoid neighbour RNTP |

pub mod distributed;
pub mod enhanced;
pub mod hard;
pub mod soft;

pub use distributed::DistributedFfr;
pub use enhanced::EnhancedFfr;
pub use hard::HardFfr;
pub use soft::SoftFfr;

use std::collections::BTreeMap;

use crate::sap::sched::SchedDlCqiInfoReqParameters;
use crate::sap::Rnti;

/// TPC command for 0 dB in accumulated mode.
pub const TPC_NEUTRAL: u8 = 1;

/// TPC command for +1 dB in accumulated mode.
pub const TPC_BOOST: u8 = 2;

pub trait FfrSapProvider: Send {
    /// Short policy name, for logs.
    fn name(&self) -> &'static str;

    fn get_available_dl_rbg(&self) -> Vec<bool>;

    fn is_dl_rbg_available_for_ue(&self, rbg: usize, rnti: Rnti) -> bool;

    fn get_available_ul_rbg(&self) -> Vec<bool>;

    fn is_ul_rbg_available_for_ue(&self, rb: usize, rnti: Rnti) -> bool;

    fn report_dl_cqi_info(&mut self, params: &SchedDlCqiInfoReqParameters);

    /// Per-RB UL SINR (dB) of every UE with a valid report.
    fn report_ul_cqi_info(&mut self, ul_cqi: &BTreeMap<Rnti, Vec<f64>>);

    fn get_tpc(&self, rnti: Rnti) -> u8;

    /// Narrowest contiguous UL allocation (RBs) the policy can honour.
    fn get_min_continuous_ul_bandwidth(&self) -> u16;

    /// Forgets everything learned about `rnti`.
    fn remove_ue(&mut self, rnti: Rnti);
}

// ── Shared helpers ────────────────────────────────────────────────────────────

/// `len` flags, `true` inside `[offset, offset + width)`.
pub(crate) fn band_mask(len: usize, offset: usize, width: usize) -> Vec<bool> {
    (0..len)
        .map(|i| i >= offset && i < offset.saturating_add(width))
        .collect()
}

/// Longest run of `true` flags.
pub(crate) fn longest_run(mask: &[bool]) -> usize {
    let mut best = 0;
    let mut run = 0;
    for &available in mask {
        run = if available { run + 1 } else { 0 };
        best = best.max(run);
    }
    best
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UeZone {
    Centre,
    Edge,
}

/// Classifies UEs by their latest wideband CQI.
///
/// Unclassified UEs are centre UEs.
#[derive(Debug, Clone, Default)]
pub struct CqiZoneClassifier {
    edge_cqi_threshold: u8,
    zones: BTreeMap<Rnti, UeZone>,
}

impl CqiZoneClassifier {
    pub fn new(edge_cqi_threshold: u8) -> Self {
        Self {
            edge_cqi_threshold,
            zones: BTreeMap::new(),
        }
    }

    pub fn update(&mut self, params: &SchedDlCqiInfoReqParameters) {
        for report in &params.cqi_list {
            let Some(&wb) = report.wb_cqi.first() else {
                continue;
            };
            let zone = if wb < self.edge_cqi_threshold {
                UeZone::Edge
            } else {
                UeZone::Centre
            };
            self.zones.insert(report.rnti, zone);
        }
    }

    pub fn zone(&self, rnti: Rnti) -> UeZone {
        self.zones.get(&rnti).copied().unwrap_or(UeZone::Centre)
    }

    pub fn remove(&mut self, rnti: Rnti) {
        self.zones.remove(&rnti);
    }
}

// ── NoOpFfr ───────────────────────────────────────────────────────────────────

/// Reuse-1: every RBG and RB is usable by every UE.
#[derive(Debug, Clone)]
pub struct NoOpFfr {
    dl_rbg_count: usize,
    ul_bandwidth: u16,
}

impl NoOpFfr {
    pub fn new(dl_rbg_count: usize, ul_bandwidth: u16) -> Self {
        Self {
            dl_rbg_count,
            ul_bandwidth,
        }
    }
}

impl FfrSapProvider for NoOpFfr {
    fn name(&self) -> &'static str {
        "none"
    }

    fn get_available_dl_rbg(&self) -> Vec<bool> {
        vec![true; self.dl_rbg_count]
    }

    fn is_dl_rbg_available_for_ue(&self, _rbg: usize, _rnti: Rnti) -> bool {
        true
    }

    fn get_available_ul_rbg(&self) -> Vec<bool> {
        vec![true; self.ul_bandwidth as usize]
    }

    fn is_ul_rbg_available_for_ue(&self, _rb: usize, _rnti: Rnti) -> bool {
        true
    }

    fn report_dl_cqi_info(&mut self, _params: &SchedDlCqiInfoReqParameters) {}

    fn report_ul_cqi_info(&mut self, _ul_cqi: &BTreeMap<Rnti, Vec<f64>>) {}

    fn get_tpc(&self, _rnti: Rnti) -> u8 {
        TPC_NEUTRAL
    }

    fn get_min_continuous_ul_bandwidth(&self) -> u16 {
        self.ul_bandwidth
    }

    fn remove_ue(&mut self, _rnti: Rnti) {}
}
