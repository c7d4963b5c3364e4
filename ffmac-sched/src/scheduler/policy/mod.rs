/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Downlink allocation policies.
//!
//! The shared skeleton ([`MacScheduler`](super::MacScheduler)) handles HARQ,
//! CQI ageing, RACH, paging and DCI construction.  A policy only decides
//! which new-data candidate gets which free RBG:
//!
//! | Policy | Per-flow state | Metric |
//! |---|---|---|
//! | [`CqaPolicy`] | stats + GBR target + two past averages | HOL-delay groups, then `sb/wb` or `sb/avg` with GBR boost |
//! | [`FdBetPolicy`] | [`FlowStats`] | per RBG, `1 / estimated average` |
//! | [`TdBetPolicy`] | [`FlowStats`] | one UE per TTI, `1 / average` |
//! | [`TtaPolicy`] | none | per RBG, `sb rate / wb rate` |
//!
//! Ties always go to the candidate that comes first in round-robin order.

pub mod cqa;
pub mod fdbet;
pub mod tdbet;
pub mod tta;

pub use cqa::{CqaFlowPerf, CqaPolicy};
pub use fdbet::FdBetPolicy;
pub use tdbet::TdBetPolicy;
pub use tta::TtaPolicy;

use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::amc::Amc;
use crate::ffr::FfrSapProvider;
use crate::sap::csched::{LogicalChannelConfigListElement, TransmissionMode};
use crate::sap::sched::SchedDlRlcBufferReqParameters;
use crate::sap::{FlowId, Rnti};

use super::cqi::DlCqiTables;
use super::SchedulerConfig;

/// Subframe duration, seconds.
pub const TTI_SECONDS: f64 = 0.001;

/// CQI assumed for a UE that has no valid report.
pub const DEFAULT_CQI: u8 = 1;

// ── Flow statistics ───────────────────────────────────────────────────────────

/// Throughput accounting of one UE in one direction.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowStats {
    pub flow_start_tti: u64,
    pub total_bytes: u64,
    pub last_tti_bytes: u32,
    /// Exponentially weighted average, bytes/s.
    pub avg_throughput: f64,
}

impl FlowStats {
    pub fn new(tti: u64) -> Self {
        Self {
            flow_start_tti: tti,
            total_bytes: 0,
            last_tti_bytes: 0,
            avg_throughput: 1.0,
        }
    }

    /// Fold one TTI worth of transmitted bytes into the average.
    pub fn record(&mut self, bytes: u32, time_window: f64) {
        self.last_tti_bytes = bytes;
        self.total_bytes += bytes as u64;
        self.avg_throughput = ewma(self.avg_throughput, bytes as f64 / TTI_SECONDS, time_window);
    }
}

pub fn ewma(avg: f64, sample: f64, time_window: f64) -> f64 {
    (1.0 - 1.0 / time_window) * avg + (1.0 / time_window) * sample
}

// ── Allocation context ────────────────────────────────────────────────────────

/// Read-only view of the cell handed to a policy for one DL trigger.
pub struct DlAllocationContext<'a> {
    pub tti: u64,
    pub rbg_size: u16,
    pub time_window: f64,
    /// `true` = not yet taken and usable cell-wide this subframe.
    pub rbg_free: &'a [bool],
    pub amc: &'a dyn Amc,
    pub ffr: &'a dyn FfrSapProvider,
    pub cqi: &'a DlCqiTables,
    pub tx_modes: &'a BTreeMap<Rnti, TransmissionMode>,
    pub rlc_buffers: &'a BTreeMap<FlowId, SchedDlRlcBufferReqParameters>,
}

impl DlAllocationContext<'_> {
    pub fn rbg_count(&self) -> usize {
        self.rbg_free.len()
    }

    /// Free cell-wide and allowed for this UE by the FFR policy.
    pub fn is_allowed(&self, rbg: usize, rnti: Rnti) -> bool {
        self.rbg_free.get(rbg).copied().unwrap_or(false)
            && self.ffr.is_dl_rbg_available_for_ue(rbg, rnti)
    }

    pub fn allowed_rbgs(&self, rnti: Rnti) -> Vec<u16> {
        (0..self.rbg_count())
            .filter(|&rbg| self.is_allowed(rbg, rnti))
            .map(|rbg| rbg as u16)
            .collect()
    }

    pub fn layers(&self, rnti: Rnti) -> usize {
        self.tx_modes.get(&rnti).map_or(1, |m| m.layers())
    }

    pub fn wideband_cqi(&self, rnti: Rnti) -> u8 {
        self.cqi.wideband(rnti).unwrap_or(DEFAULT_CQI)
    }

    /// Subband CQI of one RBG on one layer, falling back to wideband.
    pub fn subband_cqi(&self, rnti: Rnti, rbg: usize, layer: usize) -> u8 {
        self.cqi
            .subband(rnti, rbg, layer)
            .unwrap_or_else(|| self.wideband_cqi(rnti))
    }

    fn rate(&self, rnti: Rnti, cqi_of_layer: impl Fn(usize) -> u8) -> f64 {
        (0..self.layers(rnti))
            .map(|layer| {
                let mcs = self.amc.mcs_from_cqi(cqi_of_layer(layer));
                self.amc.dl_tb_size_bits(mcs, self.rbg_size) as f64 / 8.0 / TTI_SECONDS
            })
            .sum()
    }

    /// Achievable rate (bytes/s) on one RBG using its subband CQI.
    pub fn subband_rate(&self, rnti: Rnti, rbg: usize) -> f64 {
        self.rate(rnti, |layer| self.subband_cqi(rnti, rbg, layer))
    }

    /// Achievable rate (bytes/s) of one RBG at the wideband CQI.
    pub fn wideband_rate(&self, rnti: Rnti) -> f64 {
        self.rate(rnti, |_| self.wideband_cqi(rnti))
    }

    fn flows<'s>(
        &'s self,
        rnti: Rnti,
    ) -> impl Iterator<Item = &'s SchedDlRlcBufferReqParameters> + 's {
        self.rlc_buffers
            .range(FlowId::new(rnti, 0)..=FlowId::new(rnti, u8::MAX))
            .map(|(_, b)| b)
    }

    /// STATUS + retransmission + transmission queue bytes of all LCs.
    pub fn buffered_bytes(&self, rnti: Rnti) -> u64 {
        self.flows(rnti)
            .map(|b| {
                b.rlc_status_pdu_size as u64
                    + b.rlc_retransmission_queue_size as u64
                    + b.rlc_transmission_queue_size as u64
            })
            .sum()
    }

    /// Largest head-of-line delay (ms) over the UE's queues.
    pub fn hol_delay(&self, rnti: Rnti) -> u16 {
        self.flows(rnti)
            .flat_map(|b| [b.rlc_transmission_queue_hol_delay, b.rlc_retransmission_hol_delay])
            .max()
            .unwrap_or(0)
    }
}

// ── Policy trait ──────────────────────────────────────────────────────────────

pub trait SchedulingPolicy: Send + 'static {
    /// Per-UE DL performance record this policy ranks on.
    type FlowPerf: Clone + Debug + Send;

    /// Algorithm name as accepted by the scheduler factory.
    const NAME: &'static str;

    fn new(config: &SchedulerConfig) -> Self;

    fn new_flow(&self, tti: u64) -> Self::FlowPerf;

    /// Called with the full LC set of a UE whenever it changes.
    fn on_lc_config(&self, _perf: &mut Self::FlowPerf, _lcs: &[&LogicalChannelConfigListElement]) {
    }

    /// Assign free RBGs to `candidates` (round-robin order).  RBGs that are
    /// not allowed for a UE are discarded by the caller.
    fn allocate_dl(
        &mut self,
        ctx: &DlAllocationContext<'_>,
        candidates: &[Rnti],
        perf: &BTreeMap<Rnti, Self::FlowPerf>,
    ) -> BTreeMap<Rnti, Vec<u16>>;

    /// Account the bytes sent to one UE this TTI (0 if not served).
    fn record_tti(&self, perf: &mut Self::FlowPerf, bytes: u32, time_window: f64);
}

/// First maximum in iteration order, so earlier candidates win ties.
pub(crate) fn first_max<T: Copy>(items: impl IntoIterator<Item = (T, f64)>) -> Option<T> {
    let mut best: Option<(T, f64)> = None;
    for (item, metric) in items {
        match best {
            Some((_, m)) if metric <= m => {}
            _ => best = Some((item, metric)),
        }
    }
    best.map(|(item, _)| item)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ewma_moves_towards_the_sample() {
        let mut stats = FlowStats::new(0);
        stats.record(100, 100.0);
        // 0.99 * 1 + 0.01 * 100_000
        assert!((stats.avg_throughput - 1000.99).abs() < 1e-9);
        stats.record(0, 100.0);
        assert!(stats.avg_throughput < 1000.99);
        assert_eq!(stats.total_bytes, 100);
        assert_eq!(stats.last_tti_bytes, 0);
    }

    #[test]
    fn first_max_prefers_earlier_candidates_on_ties() {
        assert_eq!(first_max([(1u16, 2.0), (2, 3.0), (3, 3.0)]), Some(2));
        assert_eq!(first_max(Vec::<(u16, f64)>::new()), None);
    }
}
