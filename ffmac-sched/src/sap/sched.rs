/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! SCHED (data-plane) primitive parameters, plus the wire encodings they
//! carry: S11.3 fixed-point SINR and TS 36.321 buffer-size indices.

use super::{Lcid, Rnti, SfnSf};

/// Paging RNTI used for PCCH broadcast entries.
pub const P_RNTI: Rnti = 0xFFFE;

/// Placeholder SINR (dB) for a resource block that has no UL sample.
pub const NO_SINR: f64 = -5000.0;

// ── Fixed point / BSR encodings ───────────────────────────────────────────────

/// S11.3 code point reserved for [`NO_SINR`]; never produced by a real value.
const FP_S11_3_NO_SINR: u16 = i16::MIN as u16;

/// Decode a signed S11.3 fixed-point value.
pub fn fp_s11_3_to_f64(raw: u16) -> f64 {
    if raw == FP_S11_3_NO_SINR {
        return NO_SINR;
    }
    (raw as i16) as f64 / 8.0
}

/// Encode to S11.3.  [`NO_SINR`] survives the round trip; other values
/// saturate at ±4095.875.
pub fn f64_to_fp_s11_3(value: f64) -> u16 {
    if value == NO_SINR {
        return FP_S11_3_NO_SINR;
    }
    let scaled = (value * 8.0).clamp(-(i16::MAX as f64), i16::MAX as f64);
    (scaled as i16) as u16
}

/// TS 36.321 Table 6.1.3.1-1: BSR index → upper buffer size in bytes.
pub const BSR_BUFFER_SIZE: [u32; 64] = [
    0, 10, 12, 14, 17, 19, 22, 26, 31, 36, 42, 49, 57, 67, 78, 91, 107, 125, 146, 171, 200, 234,
    274, 321, 376, 440, 515, 603, 706, 826, 967, 1132, 1326, 1552, 1817, 2127, 2490, 2915, 3413,
    3995, 4677, 5476, 6411, 7505, 8787, 10287, 12043, 14099, 16507, 19325, 22624, 26487, 31009,
    36304, 42502, 49759, 58255, 68201, 79846, 93479, 109439, 128125, 150000, 150000,
];

pub fn bsr_id_to_buffer_size(id: u8) -> u32 {
    BSR_BUFFER_SIZE[(id & 0x3F) as usize]
}

/// Smallest BSR index whose size covers `bytes`.
pub fn buffer_size_to_bsr_id(bytes: u32) -> u8 {
    BSR_BUFFER_SIZE
        .iter()
        .position(|&size| size >= bytes)
        .unwrap_or(BSR_BUFFER_SIZE.len() - 1) as u8
}

// ── DL requests ───────────────────────────────────────────────────────────────

/// `SCHED_DL_RLC_BUFFER_REQ`: RLC queue state of one logical channel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchedDlRlcBufferReqParameters {
    pub rnti: Rnti,
    pub logical_channel_identity: Lcid,
    pub rlc_transmission_queue_size: u32,
    /// Head-of-line delay, ms.
    pub rlc_transmission_queue_hol_delay: u16,
    pub rlc_retransmission_queue_size: u32,
    pub rlc_retransmission_hol_delay: u16,
    pub rlc_status_pdu_size: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagingInfoListElement {
    pub paging_index: u8,
    /// Bytes.
    pub paging_message_size: u16,
    pub paging_subframe: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchedDlPagingBufferReqParameters {
    pub paging_info_list: Vec<PagingInfoListElement>,
}

/// Pending MAC control elements, one bit per CE type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CeBitmap(u8);

impl CeBitmap {
    pub const TIMING_ADVANCE: CeBitmap = CeBitmap(0x1);
    pub const DRX: CeBitmap = CeBitmap(0x2);
    pub const CONTENTION_RESOLUTION: CeBitmap = CeBitmap(0x4);

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: CeBitmap) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: CeBitmap) -> Self {
        Self(self.0 | other.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedDlMacBufferReqParameters {
    pub rnti: Rnti,
    pub ce_bitmap: CeBitmap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarqStatus {
    Ack,
    Nack,
    Dtx,
}

/// DL HARQ feedback for one process; one status per spatial layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DlInfoListElement {
    pub rnti: Rnti,
    pub harq_process_id: u8,
    pub harq_status: Vec<HarqStatus>,
}

impl DlInfoListElement {
    /// A NACK on any layer requires retransmission of the whole process.
    pub fn is_nack(&self) -> bool {
        self.harq_status.iter().any(|s| *s == HarqStatus::Nack)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchedDlTriggerReqParameters {
    pub sfn_sf: SfnSf,
    pub dl_info_list: Vec<DlInfoListElement>,
}

/// One received preamble.  `estimated_size` is the Msg3 size in bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RachListElement {
    pub rnti: Rnti,
    pub preamble_id: u8,
    pub estimated_size: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchedDlRachInfoReqParameters {
    pub sfn_sf: SfnSf,
    pub rach_list: Vec<RachListElement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CqiType {
    /// Periodic wideband.
    P10,
    /// Aperiodic, higher-layer configured subband.
    A30,
}

/// One DL CQI report.
///
/// `wb_cqi` holds one value per layer; `sb_cqi` is indexed `[rbg][layer]` and
/// only filled for A30 reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CqiListElement {
    pub rnti: Rnti,
    pub ri: u8,
    pub cqi_type: CqiType,
    pub wb_cqi: Vec<u8>,
    pub sb_cqi: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchedDlCqiInfoReqParameters {
    pub sfn_sf: SfnSf,
    pub cqi_list: Vec<CqiListElement>,
}

// ── DL indication ─────────────────────────────────────────────────────────────

/// Downlink control information for one scheduled UE (format 1/2A style).
///
/// Per-layer vectors (`tbs_size`, `mcs`, `ndi`, `rv`) have one entry per
/// codeword.  `rb_bitmap` has bit *i* set when RBG *i* is allocated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DlDciListElement {
    pub rnti: Rnti,
    pub rb_bitmap: u32,
    pub tbs_size: Vec<u16>,
    pub mcs: Vec<u8>,
    pub ndi: Vec<u8>,
    pub rv: Vec<u8>,
    pub harq_process: u8,
    pub tpc: u8,
}

impl DlDciListElement {
    /// Allocated RBG indices, ascending.
    pub fn rbgs(&self) -> Vec<u16> {
        (0..32u16)
            .filter(|i| self.rb_bitmap & (1 << i) != 0)
            .collect()
    }

    pub fn bitmap_of(rbgs: &[u16]) -> u32 {
        rbgs.iter().fold(0, |acc, &i| acc | (1 << i))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RlcPduListElement {
    pub logical_channel_identity: Lcid,
    /// Bytes.
    pub size: u16,
}

/// One UE's DL grant.  `rlc_pdu_list` is indexed `[lc][layer]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDataListElement {
    pub rnti: Rnti,
    pub dci: DlDciListElement,
    pub ce_bitmap: CeBitmap,
    pub rlc_pdu_list: Vec<Vec<RlcPduListElement>>,
}

/// UL grant carried in a random access response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UlGrant {
    pub rnti: Rnti,
    pub rb_start: u16,
    pub rb_len: u16,
    /// Bytes.
    pub tb_size: u16,
    pub mcs: u8,
    pub hopping: bool,
    pub tpc: i8,
    pub cqi_request: bool,
    pub ul_delay: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRarListElement {
    pub rnti: Rnti,
    pub preamble_id: u8,
    pub grant: UlGrant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastType {
    Bcch,
    Pcch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildBroadcastListElement {
    pub broadcast_type: BroadcastType,
    pub index: u8,
    pub dci: DlDciListElement,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchedDlConfigIndParameters {
    pub build_data_list: Vec<BuildDataListElement>,
    pub build_rar_list: Vec<BuildRarListElement>,
    pub build_broadcast_list: Vec<BuildBroadcastListElement>,
    pub nr_of_pdcch_ofdm_symbols: u8,
}

// ── UL requests ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceptionStatus {
    Ok,
    NotOk,
    NotValid,
}

/// PUSCH decoding outcome of one UE, i.e. UL HARQ feedback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UlInfoListElement {
    pub rnti: Rnti,
    pub reception_status: ReceptionStatus,
    pub tpc: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchedUlTriggerReqParameters {
    pub sfn_sf: SfnSf,
    pub ul_info_list: Vec<UlInfoListElement>,
}

/// Received interference power and thermal noise power, both S11.3 dBm.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchedUlNoiseInterferenceReqParameters {
    pub sfn_sf: SfnSf,
    pub rip: u16,
    pub tnp: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchedUlSrInfoReqParameters {
    pub sfn_sf: SfnSf,
    pub sr_list: Vec<Rnti>,
}

/// UL MAC control element contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacCeValue {
    /// One 6-bit index per logical-channel group (up to four).
    Bsr { buffer_status: Vec<u8> },
    Phr { phr: u8 },
    Crnti { crnti: Rnti },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacCeListElement {
    pub rnti: Rnti,
    pub value: MacCeValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchedUlMacCtrlInfoReqParameters {
    pub sfn_sf: SfnSf,
    pub mac_ce_list: Vec<MacCeListElement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UlCqiType {
    Srs,
    Pusch,
}

/// UL channel quality; `sinr` holds one S11.3 sample per resource block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UlCqi {
    pub sinr: Vec<u16>,
    pub cqi_type: UlCqiType,
}

/// `SCHED_UL_CQI_INFO_REQ`.
///
/// SRS reports must name the sounding UE in `srs_rnti`.  PUSCH reports are
/// attributed through the allocation decided for `sfn_sf`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedUlCqiInfoReqParameters {
    pub sfn_sf: SfnSf,
    pub ul_cqi: UlCqi,
    pub srs_rnti: Option<Rnti>,
}

// ── UL indication ─────────────────────────────────────────────────────────────

/// UL grant (DCI format 0).  `rb_start`/`rb_len` are in resource blocks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UlDciListElement {
    pub rnti: Rnti,
    pub rb_start: u16,
    pub rb_len: u16,
    pub tb_size: u16,
    pub mcs: u8,
    pub ndi: u8,
    pub tpc: u8,
    pub cqi_request: bool,
    pub hopping: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhichValue {
    Ack,
    Nack,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhichListElement {
    pub rnti: Rnti,
    pub phich: PhichValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchedUlConfigIndParameters {
    pub dci_list: Vec<UlDciListElement>,
    pub phich_list: Vec<PhichListElement>,
}
