/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use ffmac_sched::carrier::{rbg_count, EnbComponentCarrier};
use ffmac_sched::config::{SimConfig, UeProfile};
use ffmac_sched::ffr::FfrSapProvider;
use ffmac_sched::sap::csched::{
    CschedCellConfigCnfParameters, CschedCellConfigReqParameters, CschedLcConfigCnfParameters,
    CschedLcConfigReqParameters, CschedLcReleaseCnfParameters, CschedUeConfigCnfParameters,
    CschedUeConfigReqParameters, CschedUeConfigUpdateIndParameters, CschedUeReleaseCnfParameters,
    CschedUeReleaseReqParameters, LcDirection, LogicalChannelConfigListElement, QosBearerType,
};
use ffmac_sched::sap::sched::{
    buffer_size_to_bsr_id, f64_to_fp_s11_3, CqiListElement, CqiType, DlInfoListElement,
    HarqStatus, MacCeListElement, MacCeValue, RachListElement, ReceptionStatus,
    SchedDlConfigIndParameters, SchedDlCqiInfoReqParameters, SchedDlRachInfoReqParameters,
    SchedDlRlcBufferReqParameters, SchedDlTriggerReqParameters, SchedUlConfigIndParameters,
    SchedUlCqiInfoReqParameters, SchedUlMacCtrlInfoReqParameters,
    SchedUlNoiseInterferenceReqParameters, SchedUlSrInfoReqParameters,
    SchedUlTriggerReqParameters, UlCqi, UlCqiType, UlInfoListElement, NO_SINR,
};
use ffmac_sched::sap::{
    CschedSapProvider, CschedSapUser, Lcid, Rnti, SchedSapProvider, SchedSapUser, SfnSf,
};
use ffmac_sched::scheduler::harq::HARQ_PERIOD;
use ffmac_sched::scheduler::{build_scheduler, FfMacScheduler, TableSizes};

/// Data radio bearer every simulated UE carries.
const DRB_LCID: Lcid = 3;
const DRB_LCG: u8 = 1;

/// Subframes between periodic CQI, SRS and BSR reports.
const REPORT_PERIOD: u64 = 5;

/// Subframes between a DL transmission and its HARQ feedback.
const DL_FEEDBACK_DELAY: u64 = 4;

/// Msg3 size requested in the initial RACH, bits.
const MSG3_BITS: u16 = 56;

/// Offered load beyond this is dropped at the RLC queue.
const RLC_QUEUE_LIMIT: u32 = 1_000_000;

// ── CLI argument definition ───────────────────────────────────────────────────

/// Subframe-driven driver for the FF MAC schedulers.
///
/// Example:
///   ffmac-sim --config demos/ffmac-sim.yaml --subframes 5000
#[derive(Debug, Parser)]
#[command(
    name = "ffmac-sim",
    about = "LTE FF MAC scheduler simulation driver",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML simulation configuration file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Number of subframes to run (overrides the configuration file).
    #[arg(short = 'n', long = "subframes")]
    subframes: Option<u64>,

    /// Pace subframes at 1 ms of wall-clock time.
    #[arg(short = 'r', long = "real-time", default_value_t = false)]
    real_time: bool,
}

// ── SAP users ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
enum SchedIndication {
    Dl(SchedDlConfigIndParameters),
    Ul(SchedUlConfigIndParameters),
}

#[derive(Debug)]
enum CschedIndication {
    CellConfig(CschedCellConfigCnfParameters),
    UeConfig(CschedUeConfigCnfParameters),
    LcConfig(CschedLcConfigCnfParameters),
    LcRelease(CschedLcReleaseCnfParameters),
    UeRelease(CschedUeReleaseCnfParameters),
    UeConfigUpdate(CschedUeConfigUpdateIndParameters),
}

/// Forwards scheduler decisions to the MAC loop of one cell.
struct ChannelSchedUser(UnboundedSender<SchedIndication>);

impl SchedSapUser for ChannelSchedUser {
    fn sched_dl_config_ind(&mut self, params: SchedDlConfigIndParameters) {
        if self.0.send(SchedIndication::Dl(params)).is_err() {
            warn!("MAC loop gone, DL config indication dropped");
        }
    }

    fn sched_ul_config_ind(&mut self, params: SchedUlConfigIndParameters) {
        if self.0.send(SchedIndication::Ul(params)).is_err() {
            warn!("MAC loop gone, UL config indication dropped");
        }
    }
}

struct ChannelCschedUser(UnboundedSender<CschedIndication>);

impl ChannelCschedUser {
    fn forward(&self, indication: CschedIndication) {
        if self.0.send(indication).is_err() {
            warn!("MAC loop gone, CSCHED indication dropped");
        }
    }
}

impl CschedSapUser for ChannelCschedUser {
    fn csched_cell_config_cnf(&mut self, params: CschedCellConfigCnfParameters) {
        self.forward(CschedIndication::CellConfig(params));
    }

    fn csched_ue_config_cnf(&mut self, params: CschedUeConfigCnfParameters) {
        self.forward(CschedIndication::UeConfig(params));
    }

    fn csched_lc_config_cnf(&mut self, params: CschedLcConfigCnfParameters) {
        self.forward(CschedIndication::LcConfig(params));
    }

    fn csched_lc_release_cnf(&mut self, params: CschedLcReleaseCnfParameters) {
        self.forward(CschedIndication::LcRelease(params));
    }

    fn csched_ue_release_cnf(&mut self, params: CschedUeReleaseCnfParameters) {
        self.forward(CschedIndication::UeRelease(params));
    }

    fn csched_ue_config_update_ind(&mut self, params: CschedUeConfigUpdateIndParameters) {
        self.forward(CschedIndication::UeConfigUpdate(params));
    }
}

// ── Simulated MAC / PHY ───────────────────────────────────────────────────────

#[derive(Debug, Default, Clone)]
struct UeStats {
    dl_bytes: u64,
    ul_bytes: u64,
    dl_tbs: u32,
    ul_tbs: u32,
    dl_retx: u32,
    ul_retx: u32,
    dl_nacks: u32,
    ul_nacks: u32,
}

struct SimUe {
    profile: UeProfile,
    dl_queue: u32,
    dl_queue_since: Option<u64>,
    ul_queue: u32,
    stats: UeStats,
}

impl SimUe {
    fn new(profile: UeProfile) -> Self {
        Self {
            profile,
            dl_queue: 0,
            dl_queue_since: None,
            ul_queue: 0,
            stats: UeStats::default(),
        }
    }

    /// Every `nack_every`-th transport block fails.
    fn decode_fails(&self, tb_count: u32) -> bool {
        self.profile.nack_every > 0 && tb_count % self.profile.nack_every == 0
    }

    fn layers(&self) -> usize {
        self.profile.rank.clamp(1, 2) as usize
    }
}

struct CellReport {
    cell_id: u16,
    primary: bool,
    algorithm: &'static str,
    subframes: u64,
    rars: u32,
    ues: Vec<(Rnti, UeStats)>,
    residual: TableSizes,
}

impl CellReport {
    fn log(&self) {
        info!(
            cell_id = self.cell_id,
            primary = self.primary,
            algorithm = self.algorithm,
            subframes = self.subframes,
            rars = self.rars,
            "Cell summary"
        );
        let seconds = self.subframes.max(1) as f64 / 1000.0;
        for (rnti, s) in &self.ues {
            info!(
                "  UE {rnti:>5}: DL {dl:>9.1} kbit/s ({dl_tbs} TBs, {dl_retx} retx, {dl_nacks} NACK) | \
                 UL {ul:>9.1} kbit/s ({ul_tbs} TBs, {ul_retx} retx, {ul_nacks} NACK)",
                dl = s.dl_bytes as f64 * 8.0 / 1000.0 / seconds,
                dl_tbs = s.dl_tbs,
                dl_retx = s.dl_retx,
                dl_nacks = s.dl_nacks,
                ul = s.ul_bytes as f64 * 8.0 / 1000.0 / seconds,
                ul_tbs = s.ul_tbs,
                ul_retx = s.ul_retx,
                ul_nacks = s.ul_nacks,
            );
        }
        if self.residual != TableSizes::default() {
            warn!(cell_id = self.cell_id, residual = ?self.residual, "State left after releasing every UE");
        }
    }
}

/// One carrier: its scheduler plus the MAC/PHY behaviour the driver plays.
struct CellSim {
    enb: EnbComponentCarrier,
    ues: BTreeMap<Rnti, SimUe>,
    sched_rx: UnboundedReceiver<SchedIndication>,
    csched_rx: UnboundedReceiver<CschedIndication>,
    ffr: Option<Box<dyn FfrSapProvider>>,
    sfn_sf: SfnSf,
    tick: u64,
    dl_feedback: Vec<(u64, DlInfoListElement)>,
    ul_feedback: Vec<(u64, UlInfoListElement)>,
    pusch_reports: Vec<SchedUlCqiInfoReqParameters>,
    rars: u32,
}

impl CellSim {
    fn new(index: usize, config: &SimConfig) -> Result<Self> {
        let carrier = config
            .carriers
            .get(index)
            .cloned()
            .with_context(|| format!("carrier {index} not configured"))?;
        let cell_id = index as u16 + 1;

        let mut scheduler = build_scheduler(&config.algorithm, config.scheduler.clone())
            .with_context(|| format!("cell {cell_id}: cannot build scheduler"))?;
        let (sched_tx, sched_rx) = mpsc::unbounded_channel();
        let (csched_tx, csched_rx) = mpsc::unbounded_channel();
        scheduler.set_sched_sap_user(Box::new(ChannelSchedUser(sched_tx)));
        scheduler.set_csched_sap_user(Box::new(ChannelCschedUser(csched_tx)));

        let ffr = config.ffr.build(
            rbg_count(carrier.dl_bandwidth()) as usize,
            carrier.ul_bandwidth(),
        );
        let ues = config
            .ues
            .iter()
            .filter(|ue| ue.carrier == index)
            .map(|ue| (ue.rnti, SimUe::new(ue.clone())))
            .collect();

        Ok(Self {
            enb: EnbComponentCarrier::new(carrier, cell_id, scheduler),
            ues,
            sched_rx,
            csched_rx,
            ffr: Some(ffr),
            sfn_sf: SfnSf::default(),
            tick: 0,
            dl_feedback: Vec::new(),
            ul_feedback: Vec::new(),
            pusch_reports: Vec::new(),
            rars: 0,
        })
    }

    fn cell_id(&self) -> u16 {
        self.enb.cell_id
    }

    async fn run(mut self, subframes: u64, real_time: bool) -> Result<CellReport> {
        self.configure()?;

        let mut ticker = real_time.then(|| tokio::time::interval(Duration::from_millis(1)));
        for _ in 0..subframes {
            match ticker.as_mut() {
                Some(ticker) => {
                    ticker.tick().await;
                }
                None if self.sfn_sf.subframe() == 0 => tokio::task::yield_now().await,
                None => {}
            }
            self.step()
                .with_context(|| format!("cell {} subframe {}", self.cell_id(), self.sfn_sf))?;
        }

        self.release()?;
        Ok(CellReport {
            cell_id: self.cell_id(),
            primary: self.enb.is_primary(),
            algorithm: self.enb.scheduler.algorithm(),
            subframes,
            rars: self.rars,
            ues: self
                .ues
                .iter()
                .map(|(rnti, ue)| (*rnti, ue.stats.clone()))
                .collect(),
            residual: self.enb.scheduler.table_sizes(),
        })
    }

    // ── Control plane ─────────────────────────────────────────────────────────

    fn configure(&mut self) -> Result<()> {
        let cc = &self.enb.carrier;
        let two_layers = self
            .ues
            .values()
            .any(|ue| ue.profile.transmission_mode.layers() > 1);
        let cell = CschedCellConfigReqParameters {
            dl_bandwidth: cc.dl_bandwidth(),
            ul_bandwidth: cc.ul_bandwidth(),
            antenna_ports_count: if two_layers { 2 } else { 1 },
        };
        self.enb.scheduler.csched_cell_config_req(&cell)?;
        if let Some(ffr) = self.ffr.take() {
            info!(cell_id = self.cell_id(), ffr = ffr.name(), "Installing FFR policy");
            self.enb.scheduler.set_ffr_sap_provider(ffr)?;
        }

        for ue in self.ues.values() {
            let p = &ue.profile;
            let gbr_bps = p.gbr_kbps.map_or(0, |kbps| kbps * 1000);
            self.enb
                .scheduler
                .csched_ue_config_req(&CschedUeConfigReqParameters {
                    rnti: p.rnti,
                    reconfigure_flag: false,
                    transmission_mode: p.transmission_mode,
                    ue_aggregated_maximum_bitrate_dl: 0,
                    ue_aggregated_maximum_bitrate_ul: 0,
                })?;
            self.enb
                .scheduler
                .csched_lc_config_req(&CschedLcConfigReqParameters {
                    rnti: p.rnti,
                    reconfigure_flag: false,
                    logical_channel_config_list: vec![LogicalChannelConfigListElement {
                        logical_channel_identity: DRB_LCID,
                        logical_channel_group: DRB_LCG,
                        direction: LcDirection::Both,
                        qos_bearer_type: if p.gbr_kbps.is_some() {
                            QosBearerType::Gbr
                        } else {
                            QosBearerType::NonGbr
                        },
                        qci: p.qci,
                        e_rab_maximum_bitrate_ul: gbr_bps,
                        e_rab_maximum_bitrate_dl: gbr_bps,
                        e_rab_guaranteed_bitrate_ul: gbr_bps,
                        e_rab_guaranteed_bitrate_dl: gbr_bps,
                    }],
                })?;
        }
        self.drain_csched();
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        let rntis: Vec<Rnti> = self.ues.keys().copied().collect();
        for rnti in rntis {
            self.enb
                .scheduler
                .csched_ue_release_req(&CschedUeReleaseReqParameters { rnti })?;
        }
        self.drain_csched();
        Ok(())
    }

    fn drain_csched(&mut self) {
        let cell_id = self.cell_id();
        while let Ok(indication) = self.csched_rx.try_recv() {
            match indication {
                CschedIndication::CellConfig(p) => info!(
                    cell_id,
                    rbg_size = p.rbg_size,
                    rbg_count = p.dl_rbg_count,
                    "Cell configured"
                ),
                CschedIndication::UeConfig(p) => info!(cell_id, rnti = p.rnti, "UE configured"),
                CschedIndication::LcConfig(p) => debug!(
                    cell_id,
                    rnti = p.rnti,
                    lcids = ?p.logical_channel_identity,
                    "Logical channels configured"
                ),
                CschedIndication::LcRelease(p) => debug!(
                    cell_id,
                    rnti = p.rnti,
                    lcids = ?p.logical_channel_identity,
                    "Logical channels released"
                ),
                CschedIndication::UeRelease(p) => info!(cell_id, rnti = p.rnti, "UE released"),
                CschedIndication::UeConfigUpdate(p) => {
                    info!(
                        cell_id,
                        rnti = p.rnti,
                        mode = ?p.transmission_mode,
                        "Scheduler switched transmission mode"
                    );
                    if let Some(ue) = self.ues.get_mut(&p.rnti) {
                        ue.profile.transmission_mode = p.transmission_mode;
                    }
                }
            }
        }
    }

    // ── Data plane ────────────────────────────────────────────────────────────

    /// One subframe: reports first, then the DL and UL triggers.
    fn step(&mut self) -> Result<()> {
        if self.tick == 0 {
            self.send_rach()?;
        }
        self.offer_load()?;
        if self.tick % REPORT_PERIOD == 0 {
            self.report_channel()?;
        }
        for report in std::mem::take(&mut self.pusch_reports) {
            self.enb.scheduler.sched_ul_cqi_info_req(&report)?;
        }
        if self.sfn_sf.subframe() == 0 {
            self.enb
                .scheduler
                .sched_ul_noise_interference_req(&SchedUlNoiseInterferenceReqParameters {
                    sfn_sf: self.sfn_sf,
                    rip: f64_to_fp_s11_3(-110.0),
                    tnp: f64_to_fp_s11_3(-104.5),
                })?;
        }

        let tick = self.tick;
        let dl_info_list = take_due(&mut self.dl_feedback, tick);
        self.enb
            .scheduler
            .sched_dl_trigger_req(&SchedDlTriggerReqParameters {
                sfn_sf: self.sfn_sf,
                dl_info_list,
            })?;
        let ul_info_list = take_due(&mut self.ul_feedback, tick);
        self.enb
            .scheduler
            .sched_ul_trigger_req(&SchedUlTriggerReqParameters {
                sfn_sf: self.sfn_sf,
                ul_info_list,
            })?;

        while let Ok(indication) = self.sched_rx.try_recv() {
            match indication {
                SchedIndication::Dl(params) => self.on_dl_config(params),
                SchedIndication::Ul(params) => self.on_ul_config(params),
            }
        }
        self.drain_csched();

        self.sfn_sf = self.sfn_sf.next();
        self.tick += 1;
        Ok(())
    }

    fn send_rach(&mut self) -> Result<()> {
        let rach_list = self
            .ues
            .keys()
            .enumerate()
            .map(|(i, &rnti)| RachListElement {
                rnti,
                preamble_id: (i % 64) as u8,
                estimated_size: MSG3_BITS,
            })
            .collect();
        self.enb
            .scheduler
            .sched_dl_rach_info_req(&SchedDlRachInfoReqParameters {
                sfn_sf: self.sfn_sf,
                rach_list,
            })?;
        Ok(())
    }

    /// New arrivals into the DL RLC queues and UL buffers.
    fn offer_load(&mut self) -> Result<()> {
        let tick = self.tick;
        let mut sr_list = Vec::new();
        let mut mac_ce_list = Vec::new();

        for (&rnti, ue) in &mut self.ues {
            let p = &ue.profile;
            if p.dl_load_bytes > 0 || ue.dl_queue > 0 {
                ue.dl_queue = ue
                    .dl_queue
                    .saturating_add(p.dl_load_bytes)
                    .min(RLC_QUEUE_LIMIT);
                let since = *ue.dl_queue_since.get_or_insert(tick);
                let hol = (tick - since).min(u16::MAX as u64) as u16;
                self.enb
                    .scheduler
                    .sched_dl_rlc_buffer_req(&SchedDlRlcBufferReqParameters {
                        rnti,
                        logical_channel_identity: DRB_LCID,
                        rlc_transmission_queue_size: ue.dl_queue,
                        rlc_transmission_queue_hol_delay: hol,
                        rlc_retransmission_queue_size: 0,
                        rlc_retransmission_hol_delay: 0,
                        rlc_status_pdu_size: 0,
                    })?;
            }

            if p.ul_load_bytes > 0 {
                let was_empty = ue.ul_queue == 0;
                ue.ul_queue = ue
                    .ul_queue
                    .saturating_add(p.ul_load_bytes)
                    .min(RLC_QUEUE_LIMIT);
                if tick % REPORT_PERIOD == 0 {
                    mac_ce_list.push(MacCeListElement {
                        rnti,
                        value: MacCeValue::Bsr {
                            buffer_status: vec![0, buffer_size_to_bsr_id(ue.ul_queue), 0, 0],
                        },
                    });
                } else if was_empty {
                    sr_list.push(rnti);
                }
            }
        }

        if !sr_list.is_empty() {
            self.enb
                .scheduler
                .sched_ul_sr_info_req(&SchedUlSrInfoReqParameters {
                    sfn_sf: self.sfn_sf,
                    sr_list,
                })?;
        }
        if !mac_ce_list.is_empty() {
            self.enb
                .scheduler
                .sched_ul_mac_ctrl_info_req(&SchedUlMacCtrlInfoReqParameters {
                    sfn_sf: self.sfn_sf,
                    mac_ce_list,
                })?;
        }
        Ok(())
    }

    /// Periodic DL CQI (P10, or A30 when subband values are configured) and
    /// one SRS per UE.
    fn report_channel(&mut self) -> Result<()> {
        if self.ues.is_empty() {
            return Ok(());
        }
        let cqi_list = self
            .ues
            .values()
            .map(|ue| {
                let p = &ue.profile;
                let layers = ue.layers();
                let (cqi_type, sb_cqi) = if p.subband_cqi.is_empty() {
                    (CqiType::P10, Vec::new())
                } else {
                    let sb = p.subband_cqi.iter().map(|&c| vec![c; layers]).collect();
                    (CqiType::A30, sb)
                };
                CqiListElement {
                    rnti: p.rnti,
                    ri: p.rank,
                    cqi_type,
                    wb_cqi: vec![p.wideband_cqi; layers],
                    sb_cqi,
                }
            })
            .collect();
        self.enb
            .scheduler
            .sched_dl_cqi_info_req(&SchedDlCqiInfoReqParameters {
                sfn_sf: self.sfn_sf,
                cqi_list,
            })?;

        let ul_bw = self.enb.carrier.ul_bandwidth() as usize;
        for ue in self.ues.values() {
            self.enb
                .scheduler
                .sched_ul_cqi_info_req(&SchedUlCqiInfoReqParameters {
                    sfn_sf: self.sfn_sf,
                    ul_cqi: UlCqi {
                        sinr: vec![f64_to_fp_s11_3(ue.profile.ul_sinr_db); ul_bw],
                        cqi_type: UlCqiType::Srs,
                    },
                    srs_rnti: Some(ue.profile.rnti),
                })?;
        }
        Ok(())
    }

    fn on_dl_config(&mut self, params: SchedDlConfigIndParameters) {
        self.rars += params.build_rar_list.len() as u32;
        for data in params.build_data_list {
            let Some(ue) = self.ues.get_mut(&data.rnti) else {
                warn!(rnti = data.rnti, "DL grant for a UE the MAC does not know");
                continue;
            };
            let dci = &data.dci;
            if dci.ndi.first() == Some(&1) {
                let pdu_bytes: u32 = data
                    .rlc_pdu_list
                    .iter()
                    .flatten()
                    .map(|pdu| pdu.size as u32)
                    .sum();
                ue.dl_queue = ue.dl_queue.saturating_sub(pdu_bytes);
                if ue.dl_queue == 0 {
                    ue.dl_queue_since = None;
                }
            } else {
                ue.stats.dl_retx += 1;
            }

            ue.stats.dl_tbs += 1;
            let status = if ue.decode_fails(ue.stats.dl_tbs) {
                ue.stats.dl_nacks += 1;
                HarqStatus::Nack
            } else {
                ue.stats.dl_bytes += dci.tbs_size.iter().map(|&b| b as u64).sum::<u64>();
                HarqStatus::Ack
            };
            self.dl_feedback.push((
                self.tick + DL_FEEDBACK_DELAY,
                DlInfoListElement {
                    rnti: data.rnti,
                    harq_process_id: dci.harq_process,
                    harq_status: vec![status; dci.ndi.len().max(1)],
                },
            ));
        }
    }

    fn on_ul_config(&mut self, params: SchedUlConfigIndParameters) {
        let ul_bw = self.enb.carrier.ul_bandwidth() as usize;
        let mut pusch_sinr = vec![f64_to_fp_s11_3(NO_SINR); ul_bw];

        for dci in params.dci_list {
            let Some(ue) = self.ues.get_mut(&dci.rnti) else {
                warn!(rnti = dci.rnti, "UL grant for a UE the MAC does not know");
                continue;
            };
            if dci.ndi == 1 {
                ue.ul_queue = ue.ul_queue.saturating_sub(dci.tb_size as u32);
            } else {
                ue.stats.ul_retx += 1;
            }

            ue.stats.ul_tbs += 1;
            let reception_status = if ue.decode_fails(ue.stats.ul_tbs) {
                ue.stats.ul_nacks += 1;
                ReceptionStatus::NotOk
            } else {
                ue.stats.ul_bytes += dci.tb_size as u64;
                ReceptionStatus::Ok
            };
            self.ul_feedback.push((
                self.tick + HARQ_PERIOD as u64,
                UlInfoListElement {
                    rnti: dci.rnti,
                    reception_status,
                    tpc: 1,
                },
            ));

            let start = dci.rb_start as usize;
            let end = (start + dci.rb_len as usize).min(ul_bw);
            if start < end {
                pusch_sinr[start..end].fill(f64_to_fp_s11_3(ue.profile.ul_sinr_db));
            }
        }

        self.pusch_reports.push(SchedUlCqiInfoReqParameters {
            sfn_sf: self.sfn_sf,
            ul_cqi: UlCqi {
                sinr: pusch_sinr,
                cqi_type: UlCqiType::Pusch,
            },
            srs_rnti: None,
        });
    }
}

/// Remove and return the entries due at `tick`.
fn take_due<T>(pending: &mut Vec<(u64, T)>, tick: u64) -> Vec<T> {
    let (due, later): (Vec<_>, Vec<_>) = pending.drain(..).partition(|(at, _)| *at <= tick);
    *pending = later;
    due.into_iter().map(|(_, item)| item).collect()
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!(
        config = ?cli.config,
        subframes = ?cli.subframes,
        real_time = cli.real_time,
        "ffmac-sim starting up"
    );

    // ── Load simulation configuration ─────────────────────────────────────────
    let mut config = match &cli.config {
        Some(path) => match SimConfig::load_from_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load simulation configuration: {:#}", e);
                process::exit(1);
            }
        },
        None => {
            warn!("No configuration file provided, using the default scenario");
            SimConfig::default_config()
        }
    };
    if let Some(subframes) = cli.subframes {
        config.subframes = subframes;
    }

    // ── One scheduler task per component carrier ──────────────────────────────
    let mut handles = Vec::with_capacity(config.carriers.len());
    for index in 0..config.carriers.len() {
        let cell = match CellSim::new(index, &config) {
            Ok(cell) => cell,
            Err(e) => {
                error!("Failed to set up carrier {}: {:#}", index, e);
                process::exit(1);
            }
        };
        let subframes = config.subframes;
        let real_time = cli.real_time;
        handles.push(tokio::spawn(cell.run(subframes, real_time)));
    }

    let mut failed = false;
    for handle in handles {
        match handle.await {
            Ok(Ok(report)) => report.log(),
            Ok(Err(e)) => {
                error!("Simulation aborted: {:#}", e);
                failed = true;
            }
            Err(e) => {
                error!("Cell task failed: {}", e);
                failed = true;
            }
        }
    }
    if failed {
        process::exit(1);
    }
}
