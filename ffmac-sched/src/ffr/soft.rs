/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Soft frequency reuse.
//!
//! The whole band stays in use, split into an edge part and a centre part.
//! Edge UEs (low wideband CQI) are confined to the edge part and transmit
//! with a power boost; centre UEs use the centre part.

use std::collections::BTreeMap;

use super::{
    band_mask, longest_run, CqiZoneClassifier, FfrSapProvider, UeZone, TPC_BOOST, TPC_NEUTRAL,
};
use crate::sap::sched::SchedDlCqiInfoReqParameters;
use crate::sap::Rnti;

#[derive(Debug, Clone)]
pub struct SoftFfr {
    dl_edge: Vec<bool>,
    ul_edge: Vec<bool>,
    classifier: CqiZoneClassifier,
    min_continuous_ul: u16,
}

impl SoftFfr {
    /// Edge sub-bands are `(offset, width)`, in RBGs for DL and RBs for UL.
    pub fn new(
        dl_rbg_count: usize,
        ul_bandwidth: u16,
        dl_edge_sub_band: (usize, usize),
        ul_edge_sub_band: (usize, usize),
        edge_cqi_threshold: u8,
    ) -> Self {
        let ul_edge = band_mask(ul_bandwidth as usize, ul_edge_sub_band.0, ul_edge_sub_band.1);
        let ul_centre: Vec<bool> = ul_edge.iter().map(|e| !e).collect();
        let edge_run = longest_run(&ul_edge);
        let centre_run = longest_run(&ul_centre);
        let min_continuous_ul = match (edge_run, centre_run) {
            (0, c) => c,
            (e, 0) => e,
            (e, c) => e.min(c),
        } as u16;
        Self {
            dl_edge: band_mask(dl_rbg_count, dl_edge_sub_band.0, dl_edge_sub_band.1),
            ul_edge,
            classifier: CqiZoneClassifier::new(edge_cqi_threshold),
            min_continuous_ul,
        }
    }

    fn allowed(edge_mask: &[bool], index: usize, zone: UeZone) -> bool {
        match edge_mask.get(index) {
            Some(&is_edge) => is_edge == (zone == UeZone::Edge),
            None => false,
        }
    }
}

impl FfrSapProvider for SoftFfr {
    fn name(&self) -> &'static str {
        "soft"
    }

    fn get_available_dl_rbg(&self) -> Vec<bool> {
        vec![true; self.dl_edge.len()]
    }

    fn is_dl_rbg_available_for_ue(&self, rbg: usize, rnti: Rnti) -> bool {
        Self::allowed(&self.dl_edge, rbg, self.classifier.zone(rnti))
    }

    fn get_available_ul_rbg(&self) -> Vec<bool> {
        vec![true; self.ul_edge.len()]
    }

    fn is_ul_rbg_available_for_ue(&self, rb: usize, rnti: Rnti) -> bool {
        Self::allowed(&self.ul_edge, rb, self.classifier.zone(rnti))
    }

    fn report_dl_cqi_info(&mut self, params: &SchedDlCqiInfoReqParameters) {
        self.classifier.update(params);
    }

    fn report_ul_cqi_info(&mut self, _ul_cqi: &BTreeMap<Rnti, Vec<f64>>) {}

    fn get_tpc(&self, rnti: Rnti) -> u8 {
        match self.classifier.zone(rnti) {
            UeZone::Edge => TPC_BOOST,
            UeZone::Centre => TPC_NEUTRAL,
        }
    }

    fn get_min_continuous_ul_bandwidth(&self) -> u16 {
        self.min_continuous_ul
    }

    fn remove_ue(&mut self, rnti: Rnti) {
        self.classifier.remove(rnti);
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::wideband_report;
    use super::*;

    #[test]
    fn edge_and_centre_ues_get_disjoint_parts() {
        let mut ffr = SoftFfr::new(12, 25, (0, 4), (0, 5), 7);
        ffr.report_dl_cqi_info(&wideband_report(1, 3));
        ffr.report_dl_cqi_info(&wideband_report(2, 12));

        assert!(ffr.get_available_dl_rbg().iter().all(|a| *a));
        assert!(ffr.is_dl_rbg_available_for_ue(0, 1));
        assert!(!ffr.is_dl_rbg_available_for_ue(4, 1));
        assert!(!ffr.is_dl_rbg_available_for_ue(0, 2));
        assert!(ffr.is_dl_rbg_available_for_ue(4, 2));
        assert!(ffr.is_ul_rbg_available_for_ue(4, 1));
        assert!(ffr.is_ul_rbg_available_for_ue(5, 2));

        assert_eq!(ffr.get_tpc(1), TPC_BOOST);
        assert_eq!(ffr.get_tpc(2), TPC_NEUTRAL);
        assert_eq!(ffr.get_min_continuous_ul_bandwidth(), 5);
    }

    #[test]
    fn removed_ue_falls_back_to_the_centre_zone() {
        let mut ffr = SoftFfr::new(12, 25, (0, 4), (0, 5), 7);
        ffr.report_dl_cqi_info(&wideband_report(1, 3));
        assert_eq!(ffr.get_tpc(1), TPC_BOOST);
        ffr.remove_ue(1);
        assert_eq!(ffr.get_tpc(1), TPC_NEUTRAL);
        assert!(!ffr.is_dl_rbg_available_for_ue(0, 1));
        assert!(ffr.is_dl_rbg_available_for_ue(4, 1));
    }

    #[test]
    fn unreported_ue_is_a_centre_ue() {
        let ffr = SoftFfr::new(12, 25, (8, 4), (20, 5), 7);
        assert!(ffr.is_dl_rbg_available_for_ue(0, 9));
        assert!(!ffr.is_dl_rbg_available_for_ue(8, 9));
    }
}
