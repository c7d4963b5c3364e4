/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Hard frequency reuse: the cell owns one DL and one UL sub-band.

use std::collections::BTreeMap;

use super::{band_mask, FfrSapProvider, TPC_NEUTRAL};
use crate::sap::sched::SchedDlCqiInfoReqParameters;
use crate::sap::Rnti;

#[derive(Debug, Clone)]
pub struct HardFfr {
    dl_mask: Vec<bool>,
    ul_mask: Vec<bool>,
    ul_sub_band_width: u16,
}

impl HardFfr {
    /// DL offsets/widths are in RBGs, UL in resource blocks.
    pub fn new(
        dl_rbg_count: usize,
        ul_bandwidth: u16,
        dl_sub_band: (usize, usize),
        ul_sub_band: (usize, usize),
    ) -> Self {
        let ul_mask = band_mask(ul_bandwidth as usize, ul_sub_band.0, ul_sub_band.1);
        let ul_sub_band_width = ul_mask.iter().filter(|&&a| a).count() as u16;
        Self {
            dl_mask: band_mask(dl_rbg_count, dl_sub_band.0, dl_sub_band.1),
            ul_mask,
            ul_sub_band_width,
        }
    }
}

impl FfrSapProvider for HardFfr {
    fn name(&self) -> &'static str {
        "hard"
    }

    fn get_available_dl_rbg(&self) -> Vec<bool> {
        self.dl_mask.clone()
    }

    fn is_dl_rbg_available_for_ue(&self, rbg: usize, _rnti: Rnti) -> bool {
        self.dl_mask.get(rbg).copied().unwrap_or(false)
    }

    fn get_available_ul_rbg(&self) -> Vec<bool> {
        self.ul_mask.clone()
    }

    fn is_ul_rbg_available_for_ue(&self, rb: usize, _rnti: Rnti) -> bool {
        self.ul_mask.get(rb).copied().unwrap_or(false)
    }

    fn report_dl_cqi_info(&mut self, _params: &SchedDlCqiInfoReqParameters) {}

    fn report_ul_cqi_info(&mut self, _ul_cqi: &BTreeMap<Rnti, Vec<f64>>) {}

    fn get_tpc(&self, _rnti: Rnti) -> u8 {
        TPC_NEUTRAL
    }

    fn get_min_continuous_ul_bandwidth(&self) -> u16 {
        self.ul_sub_band_width
    }

    fn remove_ue(&mut self, _rnti: Rnti) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_owned_sub_band_is_available() {
        let ffr = HardFfr::new(12, 25, (4, 4), (0, 8));
        let dl = ffr.get_available_dl_rbg();
        assert_eq!(dl.len(), 12);
        assert_eq!(
            dl.iter().enumerate().filter(|(_, a)| **a).map(|(i, _)| i).collect::<Vec<_>>(),
            vec![4, 5, 6, 7]
        );
        assert!(ffr.is_dl_rbg_available_for_ue(4, 1));
        assert!(!ffr.is_dl_rbg_available_for_ue(3, 1));
        assert!(!ffr.is_dl_rbg_available_for_ue(40, 1));
        assert_eq!(ffr.get_min_continuous_ul_bandwidth(), 8);
        assert!(!ffr.is_ul_rbg_available_for_ue(8, 1));
    }
}
