/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Service access points of the Femto Forum LTE MAC Scheduler Interface
//! (v1.11).
//!
//! The scheduler *provides* the CSCHED (control plane) and SCHED (data plane)
//! SAPs – the entry points the MAC calls – and *uses* their `User`
//! counterparts to hand confirmations and per-subframe decisions back:
//!
//! ```text
//!  MAC ──CschedSapProvider / SchedSapProvider──►  scheduler
//!  MAC ◄──CschedSapUser / SchedSapUser─────────── scheduler
//! ```
//!
//! Instead of per-owner forwarding templates, the MAC hands the scheduler a
//! boxed trait object for each `User` SAP and calls the `Provider` traits on
//! the scheduler directly.
//!
//! Provider calls return `Result` so that a caller violating the
//! CSCHED/SCHED ordering contract (unknown RNTI, reconfigured cell, …) gets a
//! typed [`SchedulerError`] instead of a silent no-op.

pub mod csched;
pub mod sched;

use std::fmt;

use crate::scheduler::SchedulerError;

use csched::{
    CschedCellConfigCnfParameters, CschedCellConfigReqParameters, CschedLcConfigCnfParameters,
    CschedLcConfigReqParameters, CschedLcReleaseCnfParameters, CschedLcReleaseReqParameters,
    CschedUeConfigCnfParameters, CschedUeConfigReqParameters, CschedUeConfigUpdateIndParameters,
    CschedUeReleaseCnfParameters, CschedUeReleaseReqParameters,
};
use sched::{
    SchedDlConfigIndParameters, SchedDlCqiInfoReqParameters, SchedDlMacBufferReqParameters,
    SchedDlPagingBufferReqParameters, SchedDlRachInfoReqParameters,
    SchedDlRlcBufferReqParameters, SchedDlTriggerReqParameters, SchedUlConfigIndParameters,
    SchedUlCqiInfoReqParameters, SchedUlMacCtrlInfoReqParameters,
    SchedUlNoiseInterferenceReqParameters, SchedUlSrInfoReqParameters,
    SchedUlTriggerReqParameters,
};

// ── Identifiers ───────────────────────────────────────────────────────────────

/// Radio Network Temporary Identifier – per-cell UE identifier.
pub type Rnti = u16;

/// Logical channel identifier (0 = CCCH, 1 = SRB1, 2 = SRB2, 3.. = DRBs).
pub type Lcid = u8;

/// One RLC flow: a logical channel of one UE.
///
/// Ordered by RNTI first, so a `BTreeMap<FlowId, _>` keeps all flows of a UE
/// adjacent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlowId {
    pub rnti: Rnti,
    pub lcid: Lcid,
}

impl FlowId {
    pub fn new(rnti: Rnti, lcid: Lcid) -> Self {
        Self { rnti, lcid }
    }
}

/// System frame number + subframe index, packed as
/// `(frame & 0x3FF) << 4 | (subframe & 0xF)`.
///
/// Treated as opaque by the allocation algorithms; the uplink uses it as the
/// key of the allocation maps that attribute PUSCH CQI reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SfnSf(u16);

impl SfnSf {
    /// Subframes per radio frame.
    pub const SUBFRAMES_PER_FRAME: u8 = 10;

    /// Frame numbers wrap at 1024.
    pub const FRAMES: u16 = 1024;

    pub fn new(frame: u16, subframe: u8) -> Self {
        Self(((frame & 0x3FF) << 4) | (subframe as u16 & 0xF))
    }

    pub fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u16 {
        self.0
    }

    pub fn frame(self) -> u16 {
        self.0 >> 4
    }

    pub fn subframe(self) -> u8 {
        (self.0 & 0xF) as u8
    }

    /// The following subframe, wrapping the frame number at 1024.
    pub fn next(self) -> Self {
        let sf = self.subframe() + 1;
        if sf >= Self::SUBFRAMES_PER_FRAME {
            Self::new((self.frame() + 1) % Self::FRAMES, 0)
        } else {
            Self::new(self.frame(), sf)
        }
    }
}

impl fmt::Display for SfnSf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.frame(), self.subframe())
    }
}

// ── CSCHED SAP ────────────────────────────────────────────────────────────────

/// Control-plane entry points offered by the scheduler to the MAC.
pub trait CschedSapProvider {
    fn csched_cell_config_req(
        &mut self,
        params: &CschedCellConfigReqParameters,
    ) -> Result<(), SchedulerError>;

    fn csched_ue_config_req(
        &mut self,
        params: &CschedUeConfigReqParameters,
    ) -> Result<(), SchedulerError>;

    fn csched_lc_config_req(
        &mut self,
        params: &CschedLcConfigReqParameters,
    ) -> Result<(), SchedulerError>;

    fn csched_lc_release_req(
        &mut self,
        params: &CschedLcReleaseReqParameters,
    ) -> Result<(), SchedulerError>;

    fn csched_ue_release_req(
        &mut self,
        params: &CschedUeReleaseReqParameters,
    ) -> Result<(), SchedulerError>;
}

/// Control-plane callbacks the scheduler invokes on the MAC.
pub trait CschedSapUser: Send {
    fn csched_cell_config_cnf(&mut self, params: CschedCellConfigCnfParameters);

    fn csched_ue_config_cnf(&mut self, params: CschedUeConfigCnfParameters);

    fn csched_lc_config_cnf(&mut self, params: CschedLcConfigCnfParameters);

    fn csched_lc_release_cnf(&mut self, params: CschedLcReleaseCnfParameters);

    fn csched_ue_release_cnf(&mut self, params: CschedUeReleaseCnfParameters);

    /// Sent unprompted when the scheduler itself changes a UE's
    /// transmission mode.
    fn csched_ue_config_update_ind(&mut self, params: CschedUeConfigUpdateIndParameters);
}

// ── SCHED SAP ─────────────────────────────────────────────────────────────────

/// Data-plane entry points offered by the scheduler to the MAC.
///
/// Report primitives (`*_buffer_req`, `*_info_req`) only update scheduler
/// state. The two trigger primitives run the allocation for one subframe and
/// always deliver exactly one indication to the [`SchedSapUser`].
pub trait SchedSapProvider {
    fn sched_dl_rlc_buffer_req(
        &mut self,
        params: &SchedDlRlcBufferReqParameters,
    ) -> Result<(), SchedulerError>;

    fn sched_dl_paging_buffer_req(
        &mut self,
        params: &SchedDlPagingBufferReqParameters,
    ) -> Result<(), SchedulerError>;

    fn sched_dl_mac_buffer_req(
        &mut self,
        params: &SchedDlMacBufferReqParameters,
    ) -> Result<(), SchedulerError>;

    fn sched_dl_trigger_req(
        &mut self,
        params: &SchedDlTriggerReqParameters,
    ) -> Result<(), SchedulerError>;

    fn sched_dl_rach_info_req(
        &mut self,
        params: &SchedDlRachInfoReqParameters,
    ) -> Result<(), SchedulerError>;

    fn sched_dl_cqi_info_req(
        &mut self,
        params: &SchedDlCqiInfoReqParameters,
    ) -> Result<(), SchedulerError>;

    fn sched_ul_trigger_req(
        &mut self,
        params: &SchedUlTriggerReqParameters,
    ) -> Result<(), SchedulerError>;

    fn sched_ul_noise_interference_req(
        &mut self,
        params: &SchedUlNoiseInterferenceReqParameters,
    ) -> Result<(), SchedulerError>;

    fn sched_ul_sr_info_req(
        &mut self,
        params: &SchedUlSrInfoReqParameters,
    ) -> Result<(), SchedulerError>;

    fn sched_ul_mac_ctrl_info_req(
        &mut self,
        params: &SchedUlMacCtrlInfoReqParameters,
    ) -> Result<(), SchedulerError>;

    fn sched_ul_cqi_info_req(
        &mut self,
        params: &SchedUlCqiInfoReqParameters,
    ) -> Result<(), SchedulerError>;
}

/// Data-plane callbacks the scheduler invokes on the MAC, once per trigger.
pub trait SchedSapUser: Send {
    fn sched_dl_config_ind(&mut self, params: SchedDlConfigIndParameters);

    fn sched_ul_config_ind(&mut self, params: SchedUlConfigIndParameters);
}

// ── Tests ─────────────────────────────────────────────────────────────────────
