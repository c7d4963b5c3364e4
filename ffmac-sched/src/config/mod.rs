/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Simulation run configuration loading.
//!
//! The expected YAML structure is:
//! ```yaml
//! subframes: 2000
//! carriers:
//!   - dl_bandwidth: 25
//!     ul_bandwidth: 25
//!     dl_earfcn: 100
//!     ul_earfcn: 18100
//!     primary: true
//! scheduler:
//!   algorithm: cqa
//!   cqi_timers_threshold: 1000
//!   ul_cqi_filter: srs
//! ffr:
//!   algorithm: soft
//!   dl_sub_band: { offset: 8, width: 4 }
//!   ul_sub_band: { offset: 17, width: 8 }
//!   cqi_threshold: 7
//! ues:
//!   - rnti: 1
//!     tx_mode: 0
//!     wideband_cqi: 12
//!     dl_load_bytes: 500
//!     ul_load_bytes: 100
//!     nack_every: 10
//! ```
//!
//! Only `carriers` is structurally required to be non-empty; an empty list
//! falls back to one default 25-RB primary carrier.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::carrier::{rbg_count, validate_carrier_set, ComponentCarrier};
use crate::ffr::{
    DistributedFfr, EnhancedFfr, FfrSapProvider, HardFfr, NoOpFfr, SoftFfr,
};
use crate::sap::csched::TransmissionMode;
use crate::sap::sched::P_RNTI;
use crate::sap::Rnti;
use crate::scheduler::{
    CqaMetric, CqaPolicy, FdBetPolicy, SchedulerConfig, SchedulingPolicy, TdBetPolicy, TtaPolicy,
    UlCqiFilter,
};

// ── Private YAML deserialization types ────────────────────────────────────────

/// Top-level wrapper that maps directly onto the YAML file layout.
#[derive(Debug, Deserialize)]
struct SimConfigFile {
    #[serde(default)]
    carriers: Vec<CarrierEntry>,
    #[serde(default)]
    scheduler: SchedulerEntry,
    #[serde(default)]
    ffr: FfrEntry,
    #[serde(default)]
    ues: Vec<UeEntry>,
    #[serde(default = "default_subframes")]
    subframes: u64,
}

#[derive(Debug, Deserialize)]
struct CarrierEntry {
    #[serde(default = "default_bandwidth")]
    dl_bandwidth: u16,
    #[serde(default = "default_bandwidth")]
    ul_bandwidth: u16,
    #[serde(default = "default_dl_earfcn")]
    dl_earfcn: u32,
    #[serde(default = "default_ul_earfcn")]
    ul_earfcn: u32,
    #[serde(default)]
    csg_id: u32,
    #[serde(default)]
    csg_indication: bool,
    #[serde(default)]
    primary: bool,
}

/// Every field is optional; absent values keep [`SchedulerConfig::default`].
#[derive(Debug, Default, Deserialize)]
struct SchedulerEntry {
    algorithm: Option<String>,
    cqi_timers_threshold: Option<u32>,
    harq_enabled: Option<bool>,
    ul_cqi_filter: Option<UlCqiFilterEntry>,
    time_window: Option<f64>,
    ul_grant_mcs: Option<u8>,
    cqa_metric: Option<CqaMetricEntry>,
    cqa_delay_group_ms: Option<u16>,
    sr_grant_bytes: Option<u32>,
    rank_adaptation: Option<bool>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum UlCqiFilterEntry {
    Srs,
    Pusch,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum CqaMetricEntry {
    Ff,
    Pf,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum FfrAlgorithmEntry {
    #[default]
    None,
    Hard,
    Soft,
    Enhanced,
    Distributed,
}

#[derive(Debug, Default, Deserialize)]
struct FfrEntry {
    #[serde(default)]
    algorithm: FfrAlgorithmEntry,
    dl_sub_band: Option<SubBand>,
    ul_sub_band: Option<SubBand>,
    dl_secondary: Option<SubBand>,
    ul_secondary: Option<SubBand>,
    #[serde(default = "default_ffr_cqi_threshold")]
    cqi_threshold: u8,
    #[serde(default)]
    neighbour_rntp: Vec<RntpEntry>,
}

#[derive(Debug, Deserialize)]
struct RntpEntry {
    cell_id: u16,
    rbgs: Vec<usize>,
}

#[derive(Debug, Deserialize)]
struct UeEntry {
    rnti: Rnti,
    #[serde(default)]
    carrier: usize,
    #[serde(default)]
    tx_mode: u8,
    #[serde(default = "default_qci")]
    qci: u8,
    gbr_kbps: Option<u64>,
    #[serde(default)]
    dl_load_bytes: u32,
    #[serde(default)]
    ul_load_bytes: u32,
    #[serde(default = "default_wideband_cqi")]
    wideband_cqi: u8,
    #[serde(default)]
    subband_cqi: Vec<u8>,
    #[serde(default = "default_ul_sinr_db")]
    ul_sinr_db: f64,
    #[serde(default = "default_rank")]
    rank: u8,
    #[serde(default)]
    nack_every: u32,
}

fn default_subframes() -> u64 {
    1000
}

fn default_bandwidth() -> u16 {
    25
}

fn default_dl_earfcn() -> u32 {
    100
}

fn default_ul_earfcn() -> u32 {
    18100
}

fn default_ffr_cqi_threshold() -> u8 {
    7
}

fn default_qci() -> u8 {
    9
}

fn default_wideband_cqi() -> u8 {
    10
}

fn default_ul_sinr_db() -> f64 {
    15.0
}

fn default_rank() -> u8 {
    1
}

// ── Public data structures ────────────────────────────────────────────────────

/// Contiguous band: `offset` and `width` in RBGs (DL) or RBs (UL).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SubBand {
    pub offset: usize,
    pub width: usize,
}

impl SubBand {
    pub fn new(offset: usize, width: usize) -> Self {
        Self { offset, width }
    }

    fn pair(self) -> (usize, usize) {
        (self.offset, self.width)
    }

    fn fits(self, len: usize) -> bool {
        self.width > 0 && self.offset + self.width <= len
    }
}

/// FFR policy applied to every carrier of the run.
#[derive(Debug, Clone, PartialEq)]
pub enum FfrConfig {
    None,
    Hard {
        dl_sub_band: SubBand,
        ul_sub_band: SubBand,
    },
    Soft {
        dl_edge: SubBand,
        ul_edge: SubBand,
        edge_cqi_threshold: u8,
    },
    Enhanced {
        dl_primary: SubBand,
        dl_secondary: SubBand,
        ul_primary: SubBand,
        ul_secondary: SubBand,
        secondary_cqi_threshold: u8,
    },
    Distributed {
        edge_cqi_threshold: u8,
        /// `(cell_id, announced high-interference RBGs)`.
        neighbour_rntp: Vec<(u16, Vec<usize>)>,
    },
}

impl FfrConfig {
    pub fn name(&self) -> &'static str {
        match self {
            FfrConfig::None => "none",
            FfrConfig::Hard { .. } => "hard",
            FfrConfig::Soft { .. } => "soft",
            FfrConfig::Enhanced { .. } => "enhanced",
            FfrConfig::Distributed { .. } => "distributed",
        }
    }

    /// Check the sub-bands against one carrier's resource grid.
    pub fn validate(&self, dl_rbg_count: usize, ul_bandwidth: u16) -> Result<()> {
        let ul = ul_bandwidth as usize;
        let checks: Vec<(&str, SubBand, usize)> = match self {
            FfrConfig::None => Vec::new(),
            FfrConfig::Hard {
                dl_sub_band,
                ul_sub_band,
            } => vec![("dl_sub_band", *dl_sub_band, dl_rbg_count), ("ul_sub_band", *ul_sub_band, ul)],
            FfrConfig::Soft { dl_edge, ul_edge, .. } => {
                vec![("dl_sub_band", *dl_edge, dl_rbg_count), ("ul_sub_band", *ul_edge, ul)]
            }
            FfrConfig::Enhanced {
                dl_primary,
                dl_secondary,
                ul_primary,
                ul_secondary,
                ..
            } => vec![
                ("dl_sub_band", *dl_primary, dl_rbg_count),
                ("dl_secondary", *dl_secondary, dl_rbg_count),
                ("ul_sub_band", *ul_primary, ul),
                ("ul_secondary", *ul_secondary, ul),
            ],
            FfrConfig::Distributed { neighbour_rntp, .. } => {
                for (cell_id, rbgs) in neighbour_rntp {
                    if let Some(rbg) = rbgs.iter().find(|&&r| r >= dl_rbg_count) {
                        bail!("RNTP of cell {cell_id} names RBG {rbg}, cell has {dl_rbg_count}");
                    }
                }
                Vec::new()
            }
        };
        for (field, band, len) in checks {
            if !band.fits(len) {
                bail!(
                    "ffr.{field} {}+{} does not fit {} ({} available)",
                    band.offset,
                    band.width,
                    self.name(),
                    len
                );
            }
        }
        Ok(())
    }

    /// Instantiate the policy for one carrier.
    pub fn build(&self, dl_rbg_count: usize, ul_bandwidth: u16) -> Box<dyn FfrSapProvider> {
        match self {
            FfrConfig::None => Box::new(NoOpFfr::new(dl_rbg_count, ul_bandwidth)),
            FfrConfig::Hard {
                dl_sub_band,
                ul_sub_band,
            } => Box::new(HardFfr::new(
                dl_rbg_count,
                ul_bandwidth,
                dl_sub_band.pair(),
                ul_sub_band.pair(),
            )),
            FfrConfig::Soft {
                dl_edge,
                ul_edge,
                edge_cqi_threshold,
            } => Box::new(SoftFfr::new(
                dl_rbg_count,
                ul_bandwidth,
                dl_edge.pair(),
                ul_edge.pair(),
                *edge_cqi_threshold,
            )),
            FfrConfig::Enhanced {
                dl_primary,
                dl_secondary,
                ul_primary,
                ul_secondary,
                secondary_cqi_threshold,
            } => Box::new(EnhancedFfr::new(
                dl_rbg_count,
                ul_bandwidth,
                dl_primary.pair(),
                dl_secondary.pair(),
                ul_primary.pair(),
                ul_secondary.pair(),
                *secondary_cqi_threshold,
            )),
            FfrConfig::Distributed {
                edge_cqi_threshold,
                neighbour_rntp,
            } => {
                let mut ffr = DistributedFfr::new(dl_rbg_count, ul_bandwidth, *edge_cqi_threshold);
                for (cell_id, rbgs) in neighbour_rntp {
                    let mut mask = vec![false; dl_rbg_count];
                    for &rbg in rbgs {
                        if let Some(slot) = mask.get_mut(rbg) {
                            *slot = true;
                        }
                    }
                    ffr.receive_neighbour_rntp(*cell_id, mask);
                }
                Box::new(ffr)
            }
        }
    }
}

/// One simulated UE as played by the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct UeProfile {
    pub rnti: Rnti,
    /// Index into [`SimConfig::carriers`].
    pub carrier: usize,
    pub transmission_mode: TransmissionMode,
    pub qci: u8,
    /// Guaranteed bit rate; `None` for a non-GBR bearer.
    pub gbr_kbps: Option<u64>,
    /// Bytes arriving at the DL RLC queue every subframe.
    pub dl_load_bytes: u32,
    /// Bytes arriving at the UE's UL buffer every subframe.
    pub ul_load_bytes: u32,
    pub wideband_cqi: u8,
    /// Optional per-RBG CQI; when set the driver sends A30 reports.
    pub subband_cqi: Vec<u8>,
    pub ul_sinr_db: f64,
    pub rank: u8,
    /// Every n-th transport block is NACKed (0 = never).
    pub nack_every: u32,
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub carriers: Vec<ComponentCarrier>,
    pub algorithm: String,
    pub scheduler: SchedulerConfig,
    pub ffr: FfrConfig,
    pub ues: Vec<UeProfile>,
    pub subframes: u64,
}

impl SimConfig {
    /// The run used when no configuration file is supplied: one primary
    /// 25-RB carrier, TD-BET, no FFR and two full-buffer UEs.
    pub fn default_config() -> Self {
        let mut carrier = ComponentCarrier::new();
        carrier.set_primary(true);
        let ue = |rnti, wideband_cqi| UeProfile {
            rnti,
            carrier: 0,
            transmission_mode: TransmissionMode::Siso,
            qci: default_qci(),
            gbr_kbps: None,
            dl_load_bytes: 2_000,
            ul_load_bytes: 200,
            wideband_cqi,
            subband_cqi: Vec::new(),
            ul_sinr_db: default_ul_sinr_db(),
            rank: 1,
            nack_every: 10,
        };
        Self {
            carriers: vec![carrier],
            algorithm: TdBetPolicy::NAME.to_string(),
            scheduler: SchedulerConfig::default(),
            ffr: FfrConfig::None,
            ues: vec![ue(1, 12), ue(2, 6)],
            subframes: default_subframes(),
        }
    }

    /// Parse and validate `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, the YAML is structurally
    /// invalid, or any carrier, scheduler, FFR or UE value is out of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading simulation configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open configuration file: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Invalid configuration file: {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let file: SimConfigFile =
            serde_yaml::from_str(content).context("Failed to parse YAML")?;

        let carriers = convert_carriers(file.carriers)?;
        let (algorithm, scheduler) = convert_scheduler(file.scheduler)?;
        let ffr = convert_ffr(file.ffr)?;
        for (index, cc) in carriers.iter().enumerate() {
            ffr.validate(rbg_count(cc.dl_bandwidth()) as usize, cc.ul_bandwidth())
                .with_context(|| format!("carrier {index}"))?;
        }
        let ues = convert_ues(file.ues, carriers.len())?;

        let config = Self {
            carriers,
            algorithm,
            scheduler,
            ffr,
            ues,
            subframes: file.subframes,
        };
        info!(
            carriers = config.carriers.len(),
            algorithm = %config.algorithm,
            ffr = config.ffr.name(),
            ues = config.ues.len(),
            subframes = config.subframes,
            "Simulation configuration loaded"
        );
        Ok(config)
    }

    /// Index of the primary carrier.
    pub fn primary_carrier(&self) -> usize {
        self.carriers
            .iter()
            .position(|cc| cc.is_primary())
            .unwrap_or(0)
    }
}

// ── Conversion ────────────────────────────────────────────────────────────────

fn convert_carriers(entries: Vec<CarrierEntry>) -> Result<Vec<ComponentCarrier>> {
    if entries.is_empty() {
        warn!("No carriers in configuration file, using one default primary carrier");
        let mut carrier = ComponentCarrier::new();
        carrier.set_primary(true);
        return Ok(vec![carrier]);
    }

    let mut carriers = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let mut cc = ComponentCarrier::new();
        cc.set_dl_bandwidth(entry.dl_bandwidth)
            .and_then(|_| cc.set_ul_bandwidth(entry.ul_bandwidth))
            .and_then(|_| cc.set_dl_earfcn(entry.dl_earfcn))
            .and_then(|_| cc.set_ul_earfcn(entry.ul_earfcn))
            .with_context(|| format!("carrier {index}"))?;
        cc.set_csg(entry.csg_id, entry.csg_indication);
        cc.set_primary(entry.primary);
        debug!(
            "  Carrier {}: DL {} RB @ {} | UL {} RB @ {} | primary: {}",
            index,
            cc.dl_bandwidth(),
            cc.dl_earfcn(),
            cc.ul_bandwidth(),
            cc.ul_earfcn(),
            cc.is_primary()
        );
        carriers.push(cc);
    }
    validate_carrier_set(&carriers).context("carrier set")?;
    Ok(carriers)
}

fn convert_scheduler(entry: SchedulerEntry) -> Result<(String, SchedulerConfig)> {
    let algorithm = entry
        .algorithm
        .unwrap_or_else(|| TdBetPolicy::NAME.to_string())
        .to_lowercase();
    let known = [CqaPolicy::NAME, FdBetPolicy::NAME, TdBetPolicy::NAME, TtaPolicy::NAME];
    if !known.contains(&algorithm.as_str()) {
        bail!("unknown scheduler.algorithm '{algorithm}' (expected one of {known:?})");
    }

    let defaults = SchedulerConfig::default();
    let config = SchedulerConfig {
        cqi_timers_threshold: entry
            .cqi_timers_threshold
            .unwrap_or(defaults.cqi_timers_threshold),
        harq_enabled: entry.harq_enabled.unwrap_or(defaults.harq_enabled),
        ul_cqi_filter: match entry.ul_cqi_filter {
            Some(UlCqiFilterEntry::Srs) => UlCqiFilter::SrsUlCqi,
            Some(UlCqiFilterEntry::Pusch) => UlCqiFilter::PuschUlCqi,
            None => defaults.ul_cqi_filter,
        },
        time_window: entry.time_window.unwrap_or(defaults.time_window),
        ul_grant_mcs: entry.ul_grant_mcs.unwrap_or(defaults.ul_grant_mcs),
        cqa_metric: match entry.cqa_metric {
            Some(CqaMetricEntry::Ff) => CqaMetric::Ff,
            Some(CqaMetricEntry::Pf) => CqaMetric::Pf,
            None => defaults.cqa_metric,
        },
        cqa_delay_group_ms: entry
            .cqa_delay_group_ms
            .unwrap_or(defaults.cqa_delay_group_ms),
        sr_grant_bytes: entry.sr_grant_bytes.unwrap_or(defaults.sr_grant_bytes),
        rank_adaptation: entry.rank_adaptation.unwrap_or(defaults.rank_adaptation),
    };
    if config.time_window < 1.0 {
        bail!("scheduler.time_window must be at least 1 TTI, got {}", config.time_window);
    }
    if config.ul_grant_mcs > crate::amc::MAX_MCS {
        bail!("scheduler.ul_grant_mcs {} exceeds {}", config.ul_grant_mcs, crate::amc::MAX_MCS);
    }
    Ok((algorithm, config))
}

fn convert_ffr(entry: FfrEntry) -> Result<FfrConfig> {
    let required = |band: Option<SubBand>, field: &str| {
        band.with_context(|| format!("ffr.{field} is required for this algorithm"))
    };
    let ffr = match entry.algorithm {
        FfrAlgorithmEntry::None => FfrConfig::None,
        FfrAlgorithmEntry::Hard => FfrConfig::Hard {
            dl_sub_band: required(entry.dl_sub_band, "dl_sub_band")?,
            ul_sub_band: required(entry.ul_sub_band, "ul_sub_band")?,
        },
        FfrAlgorithmEntry::Soft => FfrConfig::Soft {
            dl_edge: required(entry.dl_sub_band, "dl_sub_band")?,
            ul_edge: required(entry.ul_sub_band, "ul_sub_band")?,
            edge_cqi_threshold: entry.cqi_threshold,
        },
        FfrAlgorithmEntry::Enhanced => FfrConfig::Enhanced {
            dl_primary: required(entry.dl_sub_band, "dl_sub_band")?,
            dl_secondary: required(entry.dl_secondary, "dl_secondary")?,
            ul_primary: required(entry.ul_sub_band, "ul_sub_band")?,
            ul_secondary: required(entry.ul_secondary, "ul_secondary")?,
            secondary_cqi_threshold: entry.cqi_threshold,
        },
        FfrAlgorithmEntry::Distributed => FfrConfig::Distributed {
            edge_cqi_threshold: entry.cqi_threshold,
            neighbour_rntp: entry
                .neighbour_rntp
                .into_iter()
                .map(|n| (n.cell_id, n.rbgs))
                .collect(),
        },
    };
    Ok(ffr)
}

fn convert_ues(entries: Vec<UeEntry>, carrier_count: usize) -> Result<Vec<UeProfile>> {
    if entries.is_empty() {
        warn!("No UEs in configuration file, cells will stay idle");
    }
    let mut seen = BTreeSet::new();
    let mut ues = Vec::with_capacity(entries.len());
    for entry in entries {
        let rnti = entry.rnti;
        if rnti == 0 || rnti == P_RNTI {
            bail!("UE RNTI {rnti:#06x} is reserved");
        }
        if entry.carrier >= carrier_count {
            bail!("UE {rnti}: carrier {} does not exist", entry.carrier);
        }
        if !seen.insert((entry.carrier, rnti)) {
            bail!("UE {rnti}: duplicate RNTI on carrier {}", entry.carrier);
        }
        let Some(transmission_mode) = TransmissionMode::from_index(entry.tx_mode) else {
            bail!("UE {rnti}: invalid tx_mode {}", entry.tx_mode);
        };
        let max_cqi = crate::amc::MAX_CQI;
        if entry.wideband_cqi > max_cqi || entry.subband_cqi.iter().any(|&c| c > max_cqi) {
            bail!("UE {rnti}: CQI above {max_cqi}");
        }
        if entry.rank == 0 {
            bail!("UE {rnti}: rank must be at least 1");
        }

        let ue = UeProfile {
            rnti,
            carrier: entry.carrier,
            transmission_mode,
            qci: entry.qci,
            gbr_kbps: entry.gbr_kbps,
            dl_load_bytes: entry.dl_load_bytes,
            ul_load_bytes: entry.ul_load_bytes,
            wideband_cqi: entry.wideband_cqi,
            subband_cqi: entry.subband_cqi,
            ul_sinr_db: entry.ul_sinr_db,
            rank: entry.rank,
            nack_every: entry.nack_every,
        };
        debug!(
            "  UE {}: carrier {} | tx_mode {} | QCI {} | CQI {} | DL {} B/TTI | UL {} B/TTI",
            ue.rnti,
            ue.carrier,
            entry.tx_mode,
            ue.qci,
            ue.wideband_cqi,
            ue.dl_load_bytes,
            ue.ul_load_bytes
        );
        ues.push(ue);
    }
    Ok(ues)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carrier::ConfigError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Helper: write a YAML string to a temp file and return it.
    fn yaml_tempfile(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    fn root_cause(err: &anyhow::Error) -> String {
        err.root_cause().to_string()
    }

    #[test]
    fn default_config_is_consistent() {
        let cfg = SimConfig::default_config();
        assert_eq!(cfg.carriers.len(), 1);
        assert_eq!(cfg.primary_carrier(), 0);
        assert_eq!(cfg.algorithm, "tdbet");
        assert_eq!(cfg.ffr, FfrConfig::None);
        assert_eq!(cfg.ues.len(), 2);
        assert_eq!(cfg.scheduler, SchedulerConfig::default());
    }

    #[test]
    fn load_full_yaml() {
        let yaml = r#"
subframes: 500
carriers:
  - dl_bandwidth: 50
    ul_bandwidth: 50
    dl_earfcn: 500
    ul_earfcn: 18500
    primary: true
  - dl_bandwidth: 25
    ul_bandwidth: 25
    csg_id: 7
    csg_indication: true
scheduler:
  algorithm: CQA
  cqi_timers_threshold: 40
  harq_enabled: false
  ul_cqi_filter: pusch
  cqa_metric: pf
  rank_adaptation: true
ffr:
  algorithm: enhanced
  dl_sub_band: { offset: 0, width: 4 }
  dl_secondary: { offset: 4, width: 4 }
  ul_sub_band: { offset: 0, width: 10 }
  ul_secondary: { offset: 10, width: 5 }
  cqi_threshold: 9
ues:
  - rnti: 1
    tx_mode: 2
    wideband_cqi: 14
    gbr_kbps: 256
  - rnti: 2
    carrier: 1
    nack_every: 5
"#;
        let f = yaml_tempfile(yaml);
        let cfg = SimConfig::load_from_file(f.path()).unwrap();

        assert_eq!(cfg.subframes, 500);
        assert_eq!(cfg.carriers[0].dl_bandwidth(), 50);
        assert!(cfg.carriers[1].csg_indication());
        assert_eq!(cfg.carriers[1].csg_id(), 7);
        assert_eq!(cfg.algorithm, "cqa");
        assert_eq!(cfg.scheduler.cqi_timers_threshold, 40);
        assert!(!cfg.scheduler.harq_enabled);
        assert_eq!(cfg.scheduler.ul_cqi_filter, UlCqiFilter::PuschUlCqi);
        assert_eq!(cfg.scheduler.cqa_metric, CqaMetric::Pf);
        assert_eq!(cfg.scheduler.time_window, 99.0);
        assert!(matches!(
            cfg.ffr,
            FfrConfig::Enhanced {
                secondary_cqi_threshold: 9,
                ..
            }
        ));
        assert_eq!(cfg.ues[0].transmission_mode, TransmissionMode::OpenLoopSpatialMux);
        assert_eq!(cfg.ues[0].gbr_kbps, Some(256));
        assert_eq!(cfg.ues[1].carrier, 1);
        assert_eq!(cfg.ues[1].wideband_cqi, 10);
    }

    #[test]
    fn empty_file_falls_back_to_defaults() {
        let cfg = SimConfig::from_yaml("{}\n").unwrap();
        assert_eq!(cfg.carriers.len(), 1);
        assert!(cfg.carriers[0].is_primary());
        assert_eq!(cfg.subframes, 1000);
        assert!(cfg.ues.is_empty());
    }

    #[test]
    fn invalid_bandwidth_is_reported() {
        let yaml = "carriers:\n  - dl_bandwidth: 20\n    primary: true\n";
        let err = SimConfig::from_yaml(yaml).unwrap_err();
        assert_eq!(
            err.root_cause().downcast_ref::<ConfigError>(),
            Some(&ConfigError::InvalidBandwidth { value: 20 })
        );
    }

    #[test]
    fn invalid_ul_earfcn_is_reported() {
        let yaml = "carriers:\n  - ul_earfcn: 100\n    primary: true\n";
        let err = SimConfig::from_yaml(yaml).unwrap_err();
        assert!(root_cause(&err).contains("UL EARFCN 100"), "{err:#}");
    }

    #[test]
    fn carrier_set_needs_exactly_one_primary() {
        let none = "carriers:\n  - dl_bandwidth: 25\n";
        let err = SimConfig::from_yaml(none).unwrap_err();
        assert_eq!(
            err.root_cause().downcast_ref::<ConfigError>(),
            Some(&ConfigError::NoPrimaryCarrier)
        );

        let two = "carriers:\n  - primary: true\n  - primary: true\n";
        let err = SimConfig::from_yaml(two).unwrap_err();
        assert_eq!(
            err.root_cause().downcast_ref::<ConfigError>(),
            Some(&ConfigError::MultiplePrimaryCarriers { count: 2 })
        );
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        let err = SimConfig::from_yaml("scheduler:\n  algorithm: pf\n").unwrap_err();
        assert!(root_cause(&err).contains("unknown scheduler.algorithm 'pf'"));
    }

    #[test]
    fn ffr_sub_band_must_fit_every_carrier() {
        let yaml = r#"
carriers:
  - dl_bandwidth: 6
    ul_bandwidth: 6
    primary: true
ffr:
  algorithm: hard
  dl_sub_band: { offset: 4, width: 4 }
  ul_sub_band: { offset: 0, width: 6 }
"#;
        let err = SimConfig::from_yaml(yaml).unwrap_err();
        assert!(root_cause(&err).contains("ffr.dl_sub_band 4+4"), "{err:#}");

        let missing = "ffr:\n  algorithm: soft\n  dl_sub_band: { offset: 0, width: 2 }\n";
        let err = SimConfig::from_yaml(missing).unwrap_err();
        assert!(root_cause(&err).contains("ffr.ul_sub_band is required"));
    }

    #[test]
    fn ue_values_are_validated() {
        for (yaml, needle) in [
            ("ues:\n  - rnti: 0\n", "reserved"),
            ("ues:\n  - rnti: 3\n    carrier: 1\n", "carrier 1 does not exist"),
            ("ues:\n  - rnti: 3\n  - rnti: 3\n", "duplicate RNTI"),
            ("ues:\n  - rnti: 3\n    tx_mode: 9\n", "invalid tx_mode 9"),
            ("ues:\n  - rnti: 3\n    wideband_cqi: 16\n", "CQI above 15"),
        ] {
            let err = SimConfig::from_yaml(yaml).unwrap_err();
            assert!(root_cause(&err).contains(needle), "{yaml}: {err:#}");
        }
    }

    #[test]
    fn ffr_build_matches_grid() {
        let ffr = FfrConfig::Distributed {
            edge_cqi_threshold: 7,
            neighbour_rntp: vec![(2, vec![0, 1, 40])],
        };
        let policy = ffr.build(12, 25);
        assert_eq!(policy.name(), "distributed");
        assert_eq!(policy.get_available_dl_rbg().len(), 12);
        assert_eq!(policy.get_available_ul_rbg().len(), 25);
        assert!(ffr.validate(12, 25).is_err());
    }

    #[test]
    fn missing_file_returns_error() {
        let result = SimConfig::load_from_file(Path::new("/nonexistent/path/sim.yaml"));
        assert!(result.is_err());
    }

    #[test]
    fn malformed_yaml_returns_error() {
        let f = yaml_tempfile("this is: not: valid: yaml: content:::");
        assert!(SimConfig::load_from_file(f.path()).is_err());
    }
}
