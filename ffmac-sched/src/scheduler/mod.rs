/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! FF MAC scheduler for one LTE cell.
//!
//! [`MacScheduler`] is the shared skeleton of every variant: it owns all
//! per-RNTI state (HARQ, CQI, RLC buffers, BSR, flow statistics), implements
//! the CSCHED lifecycle and the SCHED report primitives, and runs the DL/UL
//! trigger algorithms.  The only variant-specific part is the
//! [`SchedulingPolicy`] that ranks new-data candidates, so timer and eviction
//! semantics cannot diverge between variants.
//!
//! # Design decisions
//!
//! | Topic | Choice |
//! |---|---|
//! | SAP wiring | `Box<dyn …SapUser>` injected with `set_*`; provider traits implemented directly |
//! | Contract violations | typed [`SchedulerError`], scheduler state left unchanged |
//! | Map iteration order | `BTreeMap` everywhere, so allocations are deterministic |
//! | DL HARQ storage | one arena indexed by RNTI ([`harq::DlHarqTable`]) |
//! | UL HARQ | synchronous, one cursor per UE |
//! | Tie-breaks | round-robin cursor per direction, moved past the round head every trigger |
//!
//! # Example
//! ```rust,ignore
//! let mut sched = build_scheduler("tdbet", SchedulerConfig::default())?;
//! sched.set_sched_sap_user(Box::new(mac_sched_user));
//! sched.set_csched_sap_user(Box::new(mac_csched_user));
//! sched.csched_cell_config_req(&cell_params)?;
//! ```

pub mod cqi;
mod downlink;
pub mod error;
pub mod harq;
pub mod policy;
#[cfg(test)]
pub(crate) mod testing;
mod uplink;

pub use error::SchedulerError;
pub use policy::cqa::CqaMetric;
pub use policy::{
    CqaPolicy, FdBetPolicy, FlowStats, SchedulingPolicy, TdBetPolicy, TtaPolicy,
};

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::{debug, info, warn};

use crate::amc::{Amc, DefaultAmc};
use crate::carrier::{rbg_count, rbg_size, validate_bandwidth};
use crate::ffr::{FfrSapProvider, NoOpFfr};
use crate::sap::csched::{
    CschedCellConfigCnfParameters, CschedCellConfigReqParameters, CschedLcConfigCnfParameters,
    CschedLcConfigReqParameters, CschedLcReleaseCnfParameters, CschedLcReleaseReqParameters,
    CschedUeConfigCnfParameters, CschedUeConfigReqParameters, CschedUeConfigUpdateIndParameters,
    CschedUeReleaseCnfParameters, CschedUeReleaseReqParameters, LogicalChannelConfigListElement,
    TransmissionMode,
};
use crate::sap::sched::{
    bsr_id_to_buffer_size, fp_s11_3_to_f64, CeBitmap, CqiType, DlInfoListElement, MacCeValue,
    PagingInfoListElement, RachListElement, SchedDlCqiInfoReqParameters,
    SchedDlMacBufferReqParameters, SchedDlPagingBufferReqParameters,
    SchedDlRachInfoReqParameters, SchedDlRlcBufferReqParameters, SchedDlTriggerReqParameters,
    SchedUlCqiInfoReqParameters, SchedUlMacCtrlInfoReqParameters,
    SchedUlNoiseInterferenceReqParameters, SchedUlSrInfoReqParameters,
    SchedUlTriggerReqParameters,
};
use crate::sap::{
    CschedSapProvider, CschedSapUser, FlowId, Lcid, Rnti, SchedSapProvider, SchedSapUser, SfnSf,
};

use cqi::{DlCqiTables, UlCqiTable};
use harq::{DlHarqTable, UlHarqEntity, HARQ_PROC_NUM};

// ── Constants ─────────────────────────────────────────────────────────────────

/// UL allocation maps kept for PUSCH CQI attribution.
const ALLOCATION_MAP_DEPTH: usize = 16;

// ── Configuration ─────────────────────────────────────────────────────────────

/// Which UL CQI source updates the per-RB SINR table.
///
/// Reports of the other type are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UlCqiFilter {
    #[default]
    SrsUlCqi,
    PuschUlCqi,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Subframes a CQI report stays valid.
    pub cqi_timers_threshold: u32,
    pub harq_enabled: bool,
    pub ul_cqi_filter: UlCqiFilter,
    /// EWMA window of the throughput averages, in TTIs.
    pub time_window: f64,
    /// MCS of RAR (Msg3) grants.
    pub ul_grant_mcs: u8,
    pub cqa_metric: CqaMetric,
    pub cqa_delay_group_ms: u16,
    /// UL bytes assumed for a UE that sent an SR without a BSR.
    pub sr_grant_bytes: u32,
    pub rank_adaptation: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cqi_timers_threshold: 1000,
            harq_enabled: true,
            ul_cqi_filter: UlCqiFilter::SrsUlCqi,
            time_window: 99.0,
            ul_grant_mcs: 0,
            cqa_metric: CqaMetric::Ff,
            cqa_delay_group_ms: 25,
            sr_grant_bytes: 16,
            rank_adaptation: false,
        }
    }
}

// ── FfMacScheduler ────────────────────────────────────────────────────────────

/// A MAC scheduler as seen by the MAC: both provider SAPs plus the wiring
/// points for the user SAPs and the FFR policy.
pub trait FfMacScheduler: CschedSapProvider + SchedSapProvider + Send {
    fn algorithm(&self) -> &'static str;

    fn set_csched_sap_user(&mut self, user: Box<dyn CschedSapUser>);

    fn set_sched_sap_user(&mut self, user: Box<dyn SchedSapUser>);

    /// Install an FFR policy.  After cell configuration its vectors must
    /// match the cell's grid.
    fn set_ffr_sap_provider(
        &mut self,
        ffr: Box<dyn FfrSapProvider>,
    ) -> Result<(), SchedulerError>;

    fn csched_sap_provider(&mut self) -> &mut dyn CschedSapProvider;

    fn sched_sap_provider(&mut self) -> &mut dyn SchedSapProvider;

    fn table_sizes(&self) -> TableSizes;
}

pub type CqaFfMacScheduler = MacScheduler<CqaPolicy>;
pub type FdBetFfMacScheduler = MacScheduler<FdBetPolicy>;
pub type TdBetFfMacScheduler = MacScheduler<TdBetPolicy>;
pub type TtaFfMacScheduler = MacScheduler<TtaPolicy>;

/// Build one of the four variants by name (`cqa`, `fdbet`, `tdbet`, `tta`).
pub fn build_scheduler(
    algorithm: &str,
    config: SchedulerConfig,
) -> Result<Box<dyn FfMacScheduler>, SchedulerError> {
    let scheduler: Box<dyn FfMacScheduler> = match algorithm {
        a if a == CqaPolicy::NAME => Box::new(CqaFfMacScheduler::new(config)),
        a if a == FdBetPolicy::NAME => Box::new(FdBetFfMacScheduler::new(config)),
        a if a == TdBetPolicy::NAME => Box::new(TdBetFfMacScheduler::new(config)),
        a if a == TtaPolicy::NAME => Box::new(TtaFfMacScheduler::new(config)),
        other => return Err(SchedulerError::UnknownAlgorithm(other.to_string())),
    };
    Ok(scheduler)
}

// ── Internal state types ──────────────────────────────────────────────────────

/// Resource grid fixed at cell configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CellGrid {
    dl_bandwidth: u16,
    ul_bandwidth: u16,
    rbg_size: u16,
    rbg_count: usize,
}

/// Entry counts of every per-RNTI table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableSizes {
    pub ues: usize,
    pub logical_channels: usize,
    pub rlc_buffers: usize,
    pub dl_harq: usize,
    pub ul_harq: usize,
    pub dl_cqi: usize,
    pub ul_cqi: usize,
    pub dl_flows: usize,
    pub ul_flows: usize,
    pub ul_buffers: usize,
    pub sr_pending: usize,
    pub ce_pending: usize,
    pub dl_info_buffered: usize,
    pub rach_pending: usize,
    /// RBs held in the RACH allocation map.
    pub rach_allocations: usize,
    /// RBs attributed to a UE across the stored UL allocation maps.
    pub ul_allocations: usize,
}

// ── MacScheduler ──────────────────────────────────────────────────────────────

pub struct MacScheduler<P: SchedulingPolicy> {
    config: SchedulerConfig,
    policy: P,
    amc: Box<dyn Amc>,
    ffr: Box<dyn FfrSapProvider>,
    ffr_installed: bool,
    csched_user: Option<Box<dyn CschedSapUser>>,
    sched_user: Option<Box<dyn SchedSapUser>>,
    cell: Option<CellGrid>,
    tti: u64,

    ues: BTreeMap<Rnti, TransmissionMode>,
    lc_configs: BTreeMap<FlowId, LogicalChannelConfigListElement>,
    rlc_buffers: BTreeMap<FlowId, SchedDlRlcBufferReqParameters>,
    ce_pending: BTreeMap<Rnti, CeBitmap>,
    paging_queue: Vec<PagingInfoListElement>,
    rach_list: Vec<RachListElement>,
    /// UL RB → RNTI granted through a RAR, consumed by the next UL trigger.
    rach_allocation_map: Vec<Rnti>,

    dl_cqi: DlCqiTables,
    ul_cqi: UlCqiTable,
    dl_harq: DlHarqTable,
    ul_harq: BTreeMap<Rnti, UlHarqEntity>,
    /// DL HARQ feedback not yet acted upon.
    dl_info_buffered: Vec<DlInfoListElement>,

    /// Estimated UL buffer (bytes) from the latest BSR.
    ul_buffers: BTreeMap<Rnti, u32>,
    sr_pending: BTreeSet<Rnti>,
    /// UL RB → RNTI per decided subframe, newest last.
    allocation_maps: VecDeque<(SfnSf, Vec<Rnti>)>,

    dl_flows: BTreeMap<Rnti, P::FlowPerf>,
    ul_flows: BTreeMap<Rnti, FlowStats>,
    next_rnti_dl: Rnti,
    next_rnti_ul: Rnti,
}

impl<P: SchedulingPolicy> MacScheduler<P> {
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_amc(config, Box::new(DefaultAmc::new()))
    }

    pub fn with_amc(config: SchedulerConfig, amc: Box<dyn Amc>) -> Self {
        Self {
            policy: P::new(&config),
            amc,
            ffr: Box::new(NoOpFfr::new(0, 0)),
            ffr_installed: false,
            csched_user: None,
            sched_user: None,
            cell: None,
            tti: 0,
            ues: BTreeMap::new(),
            lc_configs: BTreeMap::new(),
            rlc_buffers: BTreeMap::new(),
            ce_pending: BTreeMap::new(),
            paging_queue: Vec::new(),
            rach_list: Vec::new(),
            rach_allocation_map: Vec::new(),
            dl_cqi: DlCqiTables::new(config.cqi_timers_threshold),
            ul_cqi: UlCqiTable::new(config.cqi_timers_threshold),
            dl_harq: DlHarqTable::new(),
            ul_harq: BTreeMap::new(),
            dl_info_buffered: Vec::new(),
            ul_buffers: BTreeMap::new(),
            sr_pending: BTreeSet::new(),
            allocation_maps: VecDeque::new(),
            dl_flows: BTreeMap::new(),
            ul_flows: BTreeMap::new(),
            next_rnti_dl: 0,
            next_rnti_ul: 0,
            config,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// DL triggers processed so far.
    pub fn tti(&self) -> u64 {
        self.tti
    }

    pub fn next_rnti_dl(&self) -> Rnti {
        self.next_rnti_dl
    }

    pub fn next_rnti_ul(&self) -> Rnti {
        self.next_rnti_ul
    }

    pub fn transmission_mode(&self, rnti: Rnti) -> Option<TransmissionMode> {
        self.ues.get(&rnti).copied()
    }

    pub fn dl_flow(&self, rnti: Rnti) -> Option<&P::FlowPerf> {
        self.dl_flows.get(&rnti)
    }

    pub fn ul_flow(&self, rnti: Rnti) -> Option<&FlowStats> {
        self.ul_flows.get(&rnti)
    }

    pub fn dl_buffer(&self, rnti: Rnti, lcid: Lcid) -> Option<&SchedDlRlcBufferReqParameters> {
        self.rlc_buffers.get(&FlowId::new(rnti, lcid))
    }

    pub fn ul_buffer(&self, rnti: Rnti) -> u32 {
        self.ul_buffers.get(&rnti).copied().unwrap_or(0)
    }

    pub fn table_sizes(&self) -> TableSizes {
        TableSizes {
            ues: self.ues.len(),
            logical_channels: self.lc_configs.len(),
            rlc_buffers: self.rlc_buffers.len(),
            dl_harq: self.dl_harq.len(),
            ul_harq: self.ul_harq.len(),
            dl_cqi: self.dl_cqi.len(),
            ul_cqi: self.ul_cqi.len(),
            dl_flows: self.dl_flows.len(),
            ul_flows: self.ul_flows.len(),
            ul_buffers: self.ul_buffers.len(),
            sr_pending: self.sr_pending.len(),
            ce_pending: self.ce_pending.len(),
            dl_info_buffered: self.dl_info_buffered.len(),
            rach_pending: self.rach_list.len(),
            rach_allocations: self.rach_allocation_map.iter().filter(|r| **r != 0).count(),
            ul_allocations: self
                .allocation_maps
                .iter()
                .map(|(_, map)| map.iter().filter(|r| **r != 0).count())
                .sum(),
        }
    }

    // ── Preconditions ─────────────────────────────────────────────────────────

    fn cell(&self) -> Result<CellGrid, SchedulerError> {
        self.cell.ok_or(SchedulerError::CellNotConfigured)
    }

    fn ensure_ue(&self, rnti: Rnti) -> Result<(), SchedulerError> {
        if self.ues.contains_key(&rnti) {
            Ok(())
        } else {
            Err(SchedulerError::UnknownRnti { rnti })
        }
    }

    fn ensure_csched_user(&self) -> Result<(), SchedulerError> {
        match self.csched_user {
            Some(_) => Ok(()),
            None => Err(SchedulerError::SapNotConnected { sap: "CSCHED" }),
        }
    }

    fn ensure_sched_user(&self) -> Result<(), SchedulerError> {
        match self.sched_user {
            Some(_) => Ok(()),
            None => Err(SchedulerError::SapNotConnected { sap: "SCHED" }),
        }
    }

    fn validate_ffr(ffr: &dyn FfrSapProvider, cell: &CellGrid) -> Result<(), SchedulerError> {
        let dl = ffr.get_available_dl_rbg().len();
        if dl != cell.rbg_count {
            return Err(SchedulerError::FfrBandwidthMismatch {
                direction: "DL",
                expected: cell.rbg_count,
                actual: dl,
            });
        }
        let ul = ffr.get_available_ul_rbg().len();
        if ul != cell.ul_bandwidth as usize {
            return Err(SchedulerError::FfrBandwidthMismatch {
                direction: "UL",
                expected: cell.ul_bandwidth as usize,
                actual: ul,
            });
        }
        Ok(())
    }

    // ── Shared helpers ────────────────────────────────────────────────────────

    /// Sorted RNTIs starting from the first one `>= cursor`, wrapping.
    fn rotation(rntis: impl Iterator<Item = Rnti>, cursor: Rnti) -> Vec<Rnti> {
        let sorted: Vec<Rnti> = rntis.collect();
        let split = sorted.partition_point(|&r| r < cursor);
        let mut order = sorted[split..].to_vec();
        order.extend_from_slice(&sorted[..split]);
        order
    }

    fn flow_range(rnti: Rnti) -> std::ops::RangeInclusive<FlowId> {
        FlowId::new(rnti, 0)..=FlowId::new(rnti, Lcid::MAX)
    }

    /// Re-derive the policy's per-UE state from the UE's current LC set.
    fn refresh_lc_perf(&mut self, rnti: Rnti) {
        let lcs: Vec<&LogicalChannelConfigListElement> = self
            .lc_configs
            .range(Self::flow_range(rnti))
            .map(|(_, lc)| lc)
            .collect();
        if let Some(perf) = self.dl_flows.get_mut(&rnti) {
            self.policy.on_lc_config(perf, &lcs);
        }
    }

    fn refresh_dl_cqi_maps(&mut self) {
        for rnti in self.dl_cqi.refresh() {
            debug!(rnti, "DL CQI report expired");
        }
    }

    fn refresh_ul_cqi_maps(&mut self) {
        for rnti in self.ul_cqi.refresh() {
            debug!(rnti, "UL CQI report expired");
        }
    }

    fn refresh_harq_processes(&mut self) {
        for (rnti, harq_process) in self.dl_harq.refresh() {
            self.dl_info_buffered
                .retain(|info| info.rnti != rnti || info.harq_process_id != harq_process);
            debug!(rnti, harq_process, "DL HARQ process timed out, freed");
        }
    }

    /// Remove every trace of `rnti`.
    fn purge_ue(&mut self, rnti: Rnti) {
        self.ues.remove(&rnti);
        self.lc_configs.retain(|flow, _| flow.rnti != rnti);
        self.rlc_buffers.retain(|flow, _| flow.rnti != rnti);
        self.ce_pending.remove(&rnti);
        self.rach_list.retain(|r| r.rnti != rnti);
        for slot in self.rach_allocation_map.iter_mut().filter(|r| **r == rnti) {
            *slot = 0;
        }
        self.dl_cqi.remove(rnti);
        self.ul_cqi.remove(rnti);
        self.dl_harq.remove(rnti);
        self.ul_harq.remove(&rnti);
        self.dl_info_buffered.retain(|info| info.rnti != rnti);
        self.ul_buffers.remove(&rnti);
        self.sr_pending.remove(&rnti);
        for (_, map) in self.allocation_maps.iter_mut() {
            for slot in map.iter_mut().filter(|r| **r == rnti) {
                *slot = 0;
            }
        }
        self.dl_flows.remove(&rnti);
        self.ul_flows.remove(&rnti);
        self.ffr.remove_ue(rnti);
        if self.next_rnti_dl == rnti {
            self.next_rnti_dl = 0;
        }
        if self.next_rnti_ul == rnti {
            self.next_rnti_ul = 0;
        }
    }

    fn apply_rank_adaptation(&mut self, params: &SchedDlCqiInfoReqParameters) {
        for report in &params.cqi_list {
            let Some(mode) = self.ues.get_mut(&report.rnti) else {
                continue;
            };
            let switched = match (*mode, report.ri) {
                (TransmissionMode::TransmitDiversity, ri) if ri >= 2 => {
                    TransmissionMode::OpenLoopSpatialMux
                }
                (TransmissionMode::OpenLoopSpatialMux, 1) => TransmissionMode::TransmitDiversity,
                _ => continue,
            };
            *mode = switched;
            info!(
                rnti = report.rnti,
                ri = report.ri,
                tx_mode = switched.index(),
                "Rank adaptation changed transmission mode"
            );
            match self.csched_user.as_mut() {
                Some(user) => user.csched_ue_config_update_ind(CschedUeConfigUpdateIndParameters {
                    rnti: report.rnti,
                    transmission_mode: switched,
                }),
                None => warn!(rnti = report.rnti, "CSCHED user missing, update not indicated"),
            }
        }
    }
}

// ── CSCHED SAP ────────────────────────────────────────────────────────────────

impl<P: SchedulingPolicy> CschedSapProvider for MacScheduler<P> {
    fn csched_cell_config_req(
        &mut self,
        params: &CschedCellConfigReqParameters,
    ) -> Result<(), SchedulerError> {
        if self.cell.is_some() {
            warn!("CSCHED_CELL_CONFIG_REQ on a configured cell rejected");
            return Err(SchedulerError::CellAlreadyConfigured);
        }
        self.ensure_csched_user()?;
        let dl_bandwidth = validate_bandwidth(params.dl_bandwidth)?;
        let ul_bandwidth = validate_bandwidth(params.ul_bandwidth)?;
        let grid = CellGrid {
            dl_bandwidth,
            ul_bandwidth,
            rbg_size: rbg_size(dl_bandwidth),
            rbg_count: rbg_count(dl_bandwidth) as usize,
        };
        if self.ffr_installed {
            Self::validate_ffr(self.ffr.as_ref(), &grid)?;
        } else {
            self.ffr = Box::new(NoOpFfr::new(grid.rbg_count, ul_bandwidth));
        }

        self.rach_allocation_map = vec![0; ul_bandwidth as usize];
        self.ul_cqi.set_bandwidth(ul_bandwidth);
        self.cell = Some(grid);

        info!(
            algorithm = P::NAME,
            dl_bandwidth,
            ul_bandwidth,
            rbg_size = grid.rbg_size,
            rbg_count = grid.rbg_count,
            ffr = self.ffr.name(),
            "Cell configured"
        );

        if let Some(user) = self.csched_user.as_mut() {
            user.csched_cell_config_cnf(CschedCellConfigCnfParameters {
                rbg_size: grid.rbg_size,
                dl_rbg_count: grid.rbg_count as u16,
            });
        }
        Ok(())
    }

    fn csched_ue_config_req(
        &mut self,
        params: &CschedUeConfigReqParameters,
    ) -> Result<(), SchedulerError> {
        self.cell()?;
        self.ensure_csched_user()?;
        let rnti = params.rnti;

        if params.reconfigure_flag {
            let mode = self
                .ues
                .get_mut(&rnti)
                .ok_or(SchedulerError::UnknownRnti { rnti })?;
            *mode = params.transmission_mode;
            info!(rnti, tx_mode = mode.index(), "UE reconfigured");
        } else {
            if self.ues.contains_key(&rnti) {
                return Err(SchedulerError::UeAlreadyConfigured { rnti });
            }
            self.ues.insert(rnti, params.transmission_mode);
            self.dl_harq.insert(rnti);
            self.ul_harq.insert(rnti, UlHarqEntity::new());
            self.dl_flows.insert(rnti, self.policy.new_flow(self.tti));
            self.ul_flows.insert(rnti, FlowStats::new(self.tti));
            info!(
                rnti,
                tx_mode = params.transmission_mode.index(),
                harq_processes = HARQ_PROC_NUM,
                "UE configured"
            );
        }

        if let Some(user) = self.csched_user.as_mut() {
            user.csched_ue_config_cnf(CschedUeConfigCnfParameters { rnti });
        }
        Ok(())
    }

    fn csched_lc_config_req(
        &mut self,
        params: &CschedLcConfigReqParameters,
    ) -> Result<(), SchedulerError> {
        self.ensure_ue(params.rnti)?;
        self.ensure_csched_user()?;
        if params.reconfigure_flag {
            return Err(SchedulerError::NotImplemented {
                operation: "logical channel reconfiguration",
            });
        }
        let rnti = params.rnti;

        let mut configured = Vec::new();
        for lc in &params.logical_channel_config_list {
            let lcid = lc.logical_channel_identity;
            if lcid == 0 {
                // CCCH is implicitly configured
                debug!(rnti, "LCID 0 skipped");
                continue;
            }
            self.lc_configs.insert(FlowId::new(rnti, lcid), lc.clone());
            configured.push(lcid);
            info!(
                rnti,
                lcid,
                qci = lc.qci,
                gbr = lc.qos_bearer_type == crate::sap::csched::QosBearerType::Gbr,
                "Logical channel configured"
            );
        }
        self.refresh_lc_perf(rnti);

        if let Some(user) = self.csched_user.as_mut() {
            user.csched_lc_config_cnf(CschedLcConfigCnfParameters {
                rnti,
                logical_channel_identity: configured,
            });
        }
        Ok(())
    }

    fn csched_lc_release_req(
        &mut self,
        params: &CschedLcReleaseReqParameters,
    ) -> Result<(), SchedulerError> {
        let rnti = params.rnti;
        self.ensure_ue(rnti)?;
        self.ensure_csched_user()?;
        if let Some(&lcid) = params
            .logical_channel_identity
            .iter()
            .find(|&&lcid| !self.lc_configs.contains_key(&FlowId::new(rnti, lcid)))
        {
            return Err(SchedulerError::UnknownLogicalChannel { rnti, lcid });
        }

        for &lcid in &params.logical_channel_identity {
            let flow = FlowId::new(rnti, lcid);
            self.lc_configs.remove(&flow);
            self.rlc_buffers.remove(&flow);
            info!(rnti, lcid, "Logical channel released");
        }
        self.refresh_lc_perf(rnti);

        if let Some(user) = self.csched_user.as_mut() {
            user.csched_lc_release_cnf(CschedLcReleaseCnfParameters {
                rnti,
                logical_channel_identity: params.logical_channel_identity.clone(),
            });
        }
        Ok(())
    }

    fn csched_ue_release_req(
        &mut self,
        params: &CschedUeReleaseReqParameters,
    ) -> Result<(), SchedulerError> {
        let rnti = params.rnti;
        self.ensure_ue(rnti)?;
        self.ensure_csched_user()?;
        self.purge_ue(rnti);
        info!(rnti, "UE released");

        if let Some(user) = self.csched_user.as_mut() {
            user.csched_ue_release_cnf(CschedUeReleaseCnfParameters { rnti });
        }
        Ok(())
    }
}

// ── SCHED SAP ─────────────────────────────────────────────────────────────────

impl<P: SchedulingPolicy> SchedSapProvider for MacScheduler<P> {
    fn sched_dl_rlc_buffer_req(
        &mut self,
        params: &SchedDlRlcBufferReqParameters,
    ) -> Result<(), SchedulerError> {
        let (rnti, lcid) = (params.rnti, params.logical_channel_identity);
        self.ensure_ue(rnti)?;
        let flow = FlowId::new(rnti, lcid);
        if lcid != 0 && !self.lc_configs.contains_key(&flow) {
            return Err(SchedulerError::UnknownLogicalChannel { rnti, lcid });
        }
        self.rlc_buffers.insert(flow, params.clone());
        debug!(
            rnti,
            lcid,
            tx = params.rlc_transmission_queue_size,
            retx = params.rlc_retransmission_queue_size,
            status = params.rlc_status_pdu_size,
            "DL RLC buffer report"
        );
        Ok(())
    }

    fn sched_dl_paging_buffer_req(
        &mut self,
        params: &SchedDlPagingBufferReqParameters,
    ) -> Result<(), SchedulerError> {
        self.cell()?;
        self.paging_queue
            .extend(params.paging_info_list.iter().cloned());
        debug!(queued = self.paging_queue.len(), "Paging messages queued");
        Ok(())
    }

    fn sched_dl_mac_buffer_req(
        &mut self,
        params: &SchedDlMacBufferReqParameters,
    ) -> Result<(), SchedulerError> {
        self.ensure_ue(params.rnti)?;
        let pending = self.ce_pending.entry(params.rnti).or_default();
        *pending = pending.union(params.ce_bitmap);
        debug!(rnti = params.rnti, ce = pending.bits(), "MAC CE pending");
        Ok(())
    }

    fn sched_dl_trigger_req(
        &mut self,
        params: &SchedDlTriggerReqParameters,
    ) -> Result<(), SchedulerError> {
        self.ensure_sched_user()?;
        let ind = self.schedule_dl(params)?;
        if let Some(user) = self.sched_user.as_mut() {
            user.sched_dl_config_ind(ind);
        }
        Ok(())
    }

    fn sched_dl_rach_info_req(
        &mut self,
        params: &SchedDlRachInfoReqParameters,
    ) -> Result<(), SchedulerError> {
        self.cell()?;
        self.rach_list.extend(params.rach_list.iter().cloned());
        debug!(
            sfn_sf = %params.sfn_sf,
            preambles = params.rach_list.len(),
            "RACH preambles received"
        );
        Ok(())
    }

    fn sched_dl_cqi_info_req(
        &mut self,
        params: &SchedDlCqiInfoReqParameters,
    ) -> Result<(), SchedulerError> {
        self.cell()?;
        for report in &params.cqi_list {
            self.ensure_ue(report.rnti)?;
        }
        for report in &params.cqi_list {
            match report.cqi_type {
                CqiType::P10 => {
                    if let Some(&wb) = report.wb_cqi.first() {
                        self.dl_cqi.update_wideband(report.rnti, wb);
                    }
                }
                CqiType::A30 => self
                    .dl_cqi
                    .update_subband(report.rnti, report.sb_cqi.clone()),
            }
        }
        if self.config.rank_adaptation {
            self.apply_rank_adaptation(params);
        }
        self.ffr.report_dl_cqi_info(params);
        Ok(())
    }

    fn sched_ul_trigger_req(
        &mut self,
        params: &SchedUlTriggerReqParameters,
    ) -> Result<(), SchedulerError> {
        self.ensure_sched_user()?;
        let ind = self.schedule_ul(params)?;
        if let Some(user) = self.sched_user.as_mut() {
            user.sched_ul_config_ind(ind);
        }
        Ok(())
    }

    fn sched_ul_noise_interference_req(
        &mut self,
        params: &SchedUlNoiseInterferenceReqParameters,
    ) -> Result<(), SchedulerError> {
        self.cell()?;
        debug!(
            sfn_sf = %params.sfn_sf,
            rip_dbm = fp_s11_3_to_f64(params.rip),
            tnp_dbm = fp_s11_3_to_f64(params.tnp),
            "UL noise/interference report"
        );
        Ok(())
    }

    fn sched_ul_sr_info_req(
        &mut self,
        params: &SchedUlSrInfoReqParameters,
    ) -> Result<(), SchedulerError> {
        for &rnti in &params.sr_list {
            self.ensure_ue(rnti)?;
        }
        for &rnti in &params.sr_list {
            self.sr_pending.insert(rnti);
            debug!(rnti, "Scheduling request");
        }
        Ok(())
    }

    fn sched_ul_mac_ctrl_info_req(
        &mut self,
        params: &SchedUlMacCtrlInfoReqParameters,
    ) -> Result<(), SchedulerError> {
        for ce in &params.mac_ce_list {
            self.ensure_ue(ce.rnti)?;
        }
        for ce in &params.mac_ce_list {
            match &ce.value {
                MacCeValue::Bsr { buffer_status } => {
                    let bytes: u32 = buffer_status
                        .iter()
                        .take(4)
                        .map(|&id| bsr_id_to_buffer_size(id))
                        .sum();
                    self.ul_buffers.insert(ce.rnti, bytes);
                    debug!(rnti = ce.rnti, bytes, "BSR received");
                }
                MacCeValue::Phr { phr } => debug!(rnti = ce.rnti, phr, "PHR ignored"),
                MacCeValue::Crnti { crnti } => debug!(rnti = ce.rnti, crnti, "C-RNTI CE ignored"),
            }
        }
        Ok(())
    }

    fn sched_ul_cqi_info_req(
        &mut self,
        params: &SchedUlCqiInfoReqParameters,
    ) -> Result<(), SchedulerError> {
        self.receive_ul_cqi(params)
    }
}

// ── FfMacScheduler ────────────────────────────────────────────────────────────

impl<P: SchedulingPolicy> FfMacScheduler for MacScheduler<P> {
    fn algorithm(&self) -> &'static str {
        P::NAME
    }

    fn set_csched_sap_user(&mut self, user: Box<dyn CschedSapUser>) {
        self.csched_user = Some(user);
    }

    fn set_sched_sap_user(&mut self, user: Box<dyn SchedSapUser>) {
        self.sched_user = Some(user);
    }

    fn set_ffr_sap_provider(
        &mut self,
        ffr: Box<dyn FfrSapProvider>,
    ) -> Result<(), SchedulerError> {
        if let Some(cell) = self.cell {
            Self::validate_ffr(ffr.as_ref(), &cell)?;
        }
        info!(ffr = ffr.name(), "FFR policy installed");
        self.ffr = ffr;
        self.ffr_installed = true;
        Ok(())
    }

    fn csched_sap_provider(&mut self) -> &mut dyn CschedSapProvider {
        self
    }

    fn sched_sap_provider(&mut self) -> &mut dyn SchedSapProvider {
        self
    }

    fn table_sizes(&self) -> TableSizes {
        MacScheduler::table_sizes(self)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
