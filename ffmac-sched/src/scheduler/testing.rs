/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Fixtures shared by the scheduler and policy tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::cqi::DlCqiTables;
use super::policy::DlAllocationContext;
use super::{FfMacScheduler, MacScheduler, SchedulerConfig, SchedulingPolicy};
use crate::amc::DefaultAmc;
use crate::ffr::NoOpFfr;
use crate::sap::csched::{
    CschedCellConfigCnfParameters, CschedCellConfigReqParameters, CschedLcConfigCnfParameters,
    CschedLcConfigReqParameters, CschedLcReleaseCnfParameters, CschedUeConfigReqParameters,
    CschedUeConfigUpdateIndParameters, CschedUeReleaseCnfParameters,
    LogicalChannelConfigListElement, TransmissionMode,
};
use crate::sap::sched::{
    buffer_size_to_bsr_id, DlInfoListElement, MacCeListElement, MacCeValue,
    SchedDlConfigIndParameters, SchedDlRlcBufferReqParameters, SchedDlTriggerReqParameters,
    SchedUlConfigIndParameters, SchedUlMacCtrlInfoReqParameters, SchedUlTriggerReqParameters,
    UlInfoListElement,
};
use crate::sap::{
    CschedSapProvider, CschedSapUser, FlowId, Lcid, Rnti, SchedSapProvider, SchedSapUser, SfnSf,
};

pub use crate::ffr::test_support::wideband_report;

/// Data radio bearer used by every fixture UE.
pub const DRB_LCID: Lcid = 3;

// ── Recording SAP users ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum CschedEvent {
    CellConfigCnf(CschedCellConfigCnfParameters),
    UeConfigCnf(Rnti),
    LcConfigCnf(CschedLcConfigCnfParameters),
    LcReleaseCnf(CschedLcReleaseCnfParameters),
    UeReleaseCnf(CschedUeReleaseCnfParameters),
    UeConfigUpdateInd(CschedUeConfigUpdateIndParameters),
}

/// Collects everything the scheduler sends to the MAC.  Clones share the
/// same buffers, so one clone can be wired as both SAP users.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    dl: Arc<Mutex<Vec<SchedDlConfigIndParameters>>>,
    ul: Arc<Mutex<Vec<SchedUlConfigIndParameters>>>,
    csched: Arc<Mutex<Vec<CschedEvent>>>,
}

impl Recorder {
    pub fn last_dl(&self) -> SchedDlConfigIndParameters {
        self.dl.lock().unwrap().last().cloned().expect("no DL indication")
    }

    pub fn last_ul(&self) -> SchedUlConfigIndParameters {
        self.ul.lock().unwrap().last().cloned().expect("no UL indication")
    }

    pub fn csched_events(&self) -> Vec<CschedEvent> {
        self.csched.lock().unwrap().clone()
    }

    fn push_csched(&self, event: CschedEvent) {
        self.csched.lock().unwrap().push(event);
    }
}

impl SchedSapUser for Recorder {
    fn sched_dl_config_ind(&mut self, params: SchedDlConfigIndParameters) {
        self.dl.lock().unwrap().push(params);
    }

    fn sched_ul_config_ind(&mut self, params: SchedUlConfigIndParameters) {
        self.ul.lock().unwrap().push(params);
    }
}

impl CschedSapUser for Recorder {
    fn csched_cell_config_cnf(&mut self, params: CschedCellConfigCnfParameters) {
        self.push_csched(CschedEvent::CellConfigCnf(params));
    }

    fn csched_ue_config_cnf(&mut self, params: crate::sap::csched::CschedUeConfigCnfParameters) {
        self.push_csched(CschedEvent::UeConfigCnf(params.rnti));
    }

    fn csched_lc_config_cnf(&mut self, params: CschedLcConfigCnfParameters) {
        self.push_csched(CschedEvent::LcConfigCnf(params));
    }

    fn csched_lc_release_cnf(&mut self, params: CschedLcReleaseCnfParameters) {
        self.push_csched(CschedEvent::LcReleaseCnf(params));
    }

    fn csched_ue_release_cnf(&mut self, params: CschedUeReleaseCnfParameters) {
        self.push_csched(CschedEvent::UeReleaseCnf(params));
    }

    fn csched_ue_config_update_ind(&mut self, params: CschedUeConfigUpdateIndParameters) {
        self.push_csched(CschedEvent::UeConfigUpdateInd(params));
    }
}

// ── Scheduler fixtures ────────────────────────────────────────────────────────

pub fn wired<P: SchedulingPolicy>(config: SchedulerConfig) -> (MacScheduler<P>, Recorder) {
    let mut sched = MacScheduler::<P>::new(config);
    let rec = Recorder::default();
    sched.set_csched_sap_user(Box::new(rec.clone()));
    sched.set_sched_sap_user(Box::new(rec.clone()));
    (sched, rec)
}

pub fn configured_cell_with<P: SchedulingPolicy>(
    bandwidth: u16,
    config: SchedulerConfig,
) -> (MacScheduler<P>, Recorder) {
    let (mut sched, rec) = wired::<P>(config);
    sched
        .csched_cell_config_req(&CschedCellConfigReqParameters {
            dl_bandwidth: bandwidth,
            ul_bandwidth: bandwidth,
            antenna_ports_count: 1,
        })
        .expect("cell config");
    (sched, rec)
}

pub fn configured_cell<P: SchedulingPolicy>(bandwidth: u16) -> (MacScheduler<P>, Recorder) {
    configured_cell_with(bandwidth, SchedulerConfig::default())
}

/// Configure a UE with one non-GBR bearer on [`DRB_LCID`].
pub fn add_ue<P: SchedulingPolicy>(sched: &mut MacScheduler<P>, rnti: Rnti, mode: TransmissionMode) {
    sched
        .csched_ue_config_req(&CschedUeConfigReqParameters {
            rnti,
            transmission_mode: mode,
            ..Default::default()
        })
        .expect("ue config");
    sched
        .csched_lc_config_req(&CschedLcConfigReqParameters {
            rnti,
            reconfigure_flag: false,
            logical_channel_config_list: vec![LogicalChannelConfigListElement {
                logical_channel_identity: DRB_LCID,
                logical_channel_group: 1,
                qci: 9,
                ..Default::default()
            }],
        })
        .expect("lc config");
}

pub fn dl_buffer<P: SchedulingPolicy>(sched: &mut MacScheduler<P>, rnti: Rnti, bytes: u32) {
    sched
        .sched_dl_rlc_buffer_req(&SchedDlRlcBufferReqParameters {
            rnti,
            logical_channel_identity: DRB_LCID,
            rlc_transmission_queue_size: bytes,
            ..Default::default()
        })
        .expect("rlc buffer");
}

pub fn wideband_cqi<P: SchedulingPolicy>(sched: &mut MacScheduler<P>, rnti: Rnti, cqi: u8) {
    sched
        .sched_dl_cqi_info_req(&wideband_report(rnti, cqi))
        .expect("dl cqi");
}

/// Report `bytes` of UL data in logical channel group 1.
pub fn bsr<P: SchedulingPolicy>(sched: &mut MacScheduler<P>, rnti: Rnti, bytes: u32) {
    sched
        .sched_ul_mac_ctrl_info_req(&SchedUlMacCtrlInfoReqParameters {
            sfn_sf: SfnSf::default(),
            mac_ce_list: vec![MacCeListElement {
                rnti,
                value: MacCeValue::Bsr {
                    buffer_status: vec![0, buffer_size_to_bsr_id(bytes), 0, 0],
                },
            }],
        })
        .expect("bsr");
}

pub fn dl_trigger<P: SchedulingPolicy>(
    sched: &mut MacScheduler<P>,
    rec: &Recorder,
    sfn_sf: SfnSf,
    dl_info_list: Vec<DlInfoListElement>,
) -> SchedDlConfigIndParameters {
    sched
        .sched_dl_trigger_req(&SchedDlTriggerReqParameters {
            sfn_sf,
            dl_info_list,
        })
        .expect("dl trigger");
    rec.last_dl()
}

pub fn ul_trigger<P: SchedulingPolicy>(
    sched: &mut MacScheduler<P>,
    rec: &Recorder,
    sfn_sf: SfnSf,
    ul_info_list: Vec<UlInfoListElement>,
) -> SchedUlConfigIndParameters {
    sched
        .sched_ul_trigger_req(&SchedUlTriggerReqParameters {
            sfn_sf,
            ul_info_list,
        })
        .expect("ul trigger");
    rec.last_ul()
}

// ── Policy fixture ────────────────────────────────────────────────────────────

/// A bare cell view for exercising a [`SchedulingPolicy`] directly.
pub struct PolicyFixture {
    pub cqi: DlCqiTables,
    pub rbg_free: Vec<bool>,
    amc: DefaultAmc,
    ffr: NoOpFfr,
    tx_modes: BTreeMap<Rnti, TransmissionMode>,
    rlc_buffers: BTreeMap<FlowId, SchedDlRlcBufferReqParameters>,
}

impl PolicyFixture {
    pub fn new(rbg_count: usize) -> Self {
        Self {
            cqi: DlCqiTables::new(1000),
            rbg_free: vec![true; rbg_count],
            amc: DefaultAmc::new(),
            ffr: NoOpFfr::new(rbg_count, 25),
            tx_modes: BTreeMap::new(),
            rlc_buffers: BTreeMap::new(),
        }
    }

    /// Add a SISO UE with a wideband CQI and `bytes` queued on [`DRB_LCID`].
    pub fn ue(&mut self, rnti: Rnti, wb_cqi: u8, bytes: u32) -> &mut Self {
        self.tx_modes.insert(rnti, TransmissionMode::Siso);
        self.cqi.update_wideband(rnti, wb_cqi);
        self.rlc_buffers.insert(
            FlowId::new(rnti, DRB_LCID),
            SchedDlRlcBufferReqParameters {
                rnti,
                logical_channel_identity: DRB_LCID,
                rlc_transmission_queue_size: bytes,
                ..Default::default()
            },
        );
        self
    }

    /// Set the head-of-line delay of the UE's bearer.
    pub fn hol(&mut self, rnti: Rnti, delay_ms: u16) -> &mut Self {
        if let Some(buffer) = self.rlc_buffers.get_mut(&FlowId::new(rnti, DRB_LCID)) {
            buffer.rlc_transmission_queue_hol_delay = delay_ms;
        }
        self
    }

    pub fn ctx(&self) -> DlAllocationContext<'_> {
        DlAllocationContext {
            tti: 1,
            rbg_size: 2,
            time_window: 100.0,
            rbg_free: &self.rbg_free,
            amc: &self.amc,
            ffr: &self.ffr,
            cqi: &self.cqi,
            tx_modes: &self.tx_modes,
            rlc_buffers: &self.rlc_buffers,
        }
    }
}
