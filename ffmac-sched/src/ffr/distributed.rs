/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Distributed fractional frequency reuse.
//!
//! Neighbour cells announce the RBGs they transmit on at high power
//! (relative narrowband TX power, RNTP).  Edge UEs of this cell avoid every
//! announced RBG; centre UEs may use the whole band.  Transport of the
//! announcements between cells is up to the caller.

use std::collections::BTreeMap;

use super::{CqiZoneClassifier, FfrSapProvider, UeZone, TPC_BOOST, TPC_NEUTRAL};
use crate::sap::sched::SchedDlCqiInfoReqParameters;
use crate::sap::Rnti;

#[derive(Debug, Clone)]
pub struct DistributedFfr {
    dl_rbg_count: usize,
    ul_bandwidth: u16,
    classifier: CqiZoneClassifier,
    /// Neighbour cell id → RNTP bitmap (`true` = high power).
    neighbour_rntp: BTreeMap<u16, Vec<bool>>,
}

impl DistributedFfr {
    pub fn new(dl_rbg_count: usize, ul_bandwidth: u16, edge_cqi_threshold: u8) -> Self {
        Self {
            dl_rbg_count,
            ul_bandwidth,
            classifier: CqiZoneClassifier::new(edge_cqi_threshold),
            neighbour_rntp: BTreeMap::new(),
        }
    }

    /// Store the latest RNTP of a neighbour, replacing its previous one.
    pub fn receive_neighbour_rntp(&mut self, cell_id: u16, rntp: Vec<bool>) {
        self.neighbour_rntp.insert(cell_id, rntp);
    }

    fn announced(&self, rbg: usize) -> bool {
        self.neighbour_rntp
            .values()
            .any(|rntp| rntp.get(rbg).copied().unwrap_or(false))
    }
}

impl FfrSapProvider for DistributedFfr {
    fn name(&self) -> &'static str {
        "distributed"
    }

    fn get_available_dl_rbg(&self) -> Vec<bool> {
        vec![true; self.dl_rbg_count]
    }

    fn is_dl_rbg_available_for_ue(&self, rbg: usize, rnti: Rnti) -> bool {
        if rbg >= self.dl_rbg_count {
            return false;
        }
        match self.classifier.zone(rnti) {
            UeZone::Centre => true,
            UeZone::Edge => !self.announced(rbg),
        }
    }

    fn get_available_ul_rbg(&self) -> Vec<bool> {
        vec![true; self.ul_bandwidth as usize]
    }

    fn is_ul_rbg_available_for_ue(&self, rb: usize, _rnti: Rnti) -> bool {
        rb < self.ul_bandwidth as usize
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
        self.ul_bandwidth
    }

    fn remove_ue(&mut self, rnti: Rnti) {
        self.classifier.remove(rnti);
    }
}
