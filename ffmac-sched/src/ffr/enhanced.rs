/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Enhanced fractional frequency reuse.
//!
//! The cell owns a primary segment every UE may use and a secondary segment
//! reserved to UEs that report good channel quality on it: per RBG subband
//! CQI on the DL, the latest wideband CQI on the UL.

use std::collections::BTreeMap;

use super::{band_mask, longest_run, FfrSapProvider, TPC_NEUTRAL};
use crate::sap::sched::{CqiType, SchedDlCqiInfoReqParameters};
use crate::sap::Rnti;

#[derive(Debug, Clone)]
pub struct EnhancedFfr {
    dl_primary: Vec<bool>,
    dl_secondary: Vec<bool>,
    ul_primary: Vec<bool>,
    ul_secondary: Vec<bool>,
    secondary_cqi_threshold: u8,
    /// Latest subband CQI (layer 0) per RBG.
    sb_cqi: BTreeMap<Rnti, Vec<u8>>,
    wb_cqi: BTreeMap<Rnti, u8>,
}

impl EnhancedFfr {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dl_rbg_count: usize,
        ul_bandwidth: u16,
        dl_primary: (usize, usize),
        dl_secondary: (usize, usize),
        ul_primary: (usize, usize),
        ul_secondary: (usize, usize),
        secondary_cqi_threshold: u8,
    ) -> Self {
        let ul_len = ul_bandwidth as usize;
        Self {
            dl_primary: band_mask(dl_rbg_count, dl_primary.0, dl_primary.1),
            dl_secondary: band_mask(dl_rbg_count, dl_secondary.0, dl_secondary.1),
            ul_primary: band_mask(ul_len, ul_primary.0, ul_primary.1),
            ul_secondary: band_mask(ul_len, ul_secondary.0, ul_secondary.1),
            secondary_cqi_threshold,
            sb_cqi: BTreeMap::new(),
            wb_cqi: BTreeMap::new(),
        }
    }

    fn union(a: &[bool], b: &[bool]) -> Vec<bool> {
        a.iter().zip(b).map(|(x, y)| *x || *y).collect()
    }
}

impl FfrSapProvider for EnhancedFfr {
    fn name(&self) -> &'static str {
        "enhanced"
    }

    fn get_available_dl_rbg(&self) -> Vec<bool> {
        Self::union(&self.dl_primary, &self.dl_secondary)
    }

    fn is_dl_rbg_available_for_ue(&self, rbg: usize, rnti: Rnti) -> bool {
        if self.dl_primary.get(rbg).copied().unwrap_or(false) {
            return true;
        }
        if !self.dl_secondary.get(rbg).copied().unwrap_or(false) {
            return false;
        }
        self.sb_cqi
            .get(&rnti)
            .and_then(|sb| sb.get(rbg))
            .is_some_and(|&cqi| cqi >= self.secondary_cqi_threshold)
    }

    fn get_available_ul_rbg(&self) -> Vec<bool> {
        Self::union(&self.ul_primary, &self.ul_secondary)
    }

    fn is_ul_rbg_available_for_ue(&self, rb: usize, rnti: Rnti) -> bool {
        if self.ul_primary.get(rb).copied().unwrap_or(false) {
            return true;
        }
        self.ul_secondary.get(rb).copied().unwrap_or(false)
            && self
                .wb_cqi
                .get(&rnti)
                .is_some_and(|&cqi| cqi >= self.secondary_cqi_threshold)
    }

    fn report_dl_cqi_info(&mut self, params: &SchedDlCqiInfoReqParameters) {
        for report in &params.cqi_list {
            if let Some(&wb) = report.wb_cqi.first() {
                self.wb_cqi.insert(report.rnti, wb);
            }
            if report.cqi_type == CqiType::A30 {
                let per_rbg = report
                    .sb_cqi
                    .iter()
                    .map(|layers| layers.first().copied().unwrap_or(0))
                    .collect();
                self.sb_cqi.insert(report.rnti, per_rbg);
            }
        }
    }

    fn report_ul_cqi_info(&mut self, _ul_cqi: &BTreeMap<Rnti, Vec<f64>>) {}

    fn get_tpc(&self, _rnti: Rnti) -> u8 {
        TPC_NEUTRAL
    }

    fn get_min_continuous_ul_bandwidth(&self) -> u16 {
        longest_run(&self.ul_primary) as u16
    }

    fn remove_ue(&mut self, rnti: Rnti) {
        self.sb_cqi.remove(&rnti);
        self.wb_cqi.remove(&rnti);
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::wideband_report;
    use super::*;
    use crate::sap::sched::CqiListElement;
    use crate::sap::SfnSf;

    fn subband_report(rnti: Rnti, sb: &[u8]) -> SchedDlCqiInfoReqParameters {
        SchedDlCqiInfoReqParameters {
            sfn_sf: SfnSf::default(),
            cqi_list: vec![CqiListElement {
                rnti,
                ri: 1,
                cqi_type: CqiType::A30,
                wb_cqi: vec![9],
                sb_cqi: sb.iter().map(|c| vec![*c]).collect(),
            }],
        }
    }

    #[test]
    fn secondary_segment_needs_good_subband_cqi() {
        let mut ffr = EnhancedFfr::new(6, 6, (0, 3), (3, 2), (0, 4), (4, 2), 10);
        assert_eq!(
            ffr.get_available_dl_rbg(),
            vec![true, true, true, true, true, false]
        );
        assert!(ffr.is_dl_rbg_available_for_ue(0, 1));
        assert!(!ffr.is_dl_rbg_available_for_ue(3, 1));

        ffr.report_dl_cqi_info(&subband_report(1, &[5, 5, 5, 12, 4, 15]));
        assert!(ffr.is_dl_rbg_available_for_ue(3, 1));
        assert!(!ffr.is_dl_rbg_available_for_ue(4, 1));
        assert!(!ffr.is_dl_rbg_available_for_ue(5, 1));
    }

    #[test]
    fn ul_secondary_follows_wideband_cqi() {
        let mut ffr = EnhancedFfr::new(6, 6, (0, 3), (3, 2), (0, 4), (4, 2), 10);
        ffr.report_dl_cqi_info(&wideband_report(1, 11));
        ffr.report_dl_cqi_info(&wideband_report(2, 4));
        assert!(ffr.is_ul_rbg_available_for_ue(4, 1));
        assert!(!ffr.is_ul_rbg_available_for_ue(4, 2));
        assert!(ffr.is_ul_rbg_available_for_ue(1, 2));
        assert_eq!(ffr.get_min_continuous_ul_bandwidth(), 4);
    }

    #[test]
    fn removed_ue_loses_secondary_access() {
        let mut ffr = EnhancedFfr::new(6, 6, (0, 3), (3, 2), (0, 4), (4, 2), 10);
        ffr.report_dl_cqi_info(&subband_report(1, &[5, 5, 5, 12, 12, 15]));
        ffr.report_dl_cqi_info(&wideband_report(1, 11));
        assert!(ffr.is_dl_rbg_available_for_ue(3, 1));
        assert!(ffr.is_ul_rbg_available_for_ue(4, 1));
        ffr.remove_ue(1);
        assert!(!ffr.is_dl_rbg_available_for_ue(3, 1));
        assert!(!ffr.is_ul_rbg_available_for_ue(4, 1));
        assert!(ffr.is_dl_rbg_available_for_ue(0, 1));
    }
}
