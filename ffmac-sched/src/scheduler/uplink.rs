/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! UL trigger (synchronous HARQ, contiguous grants) and UL CQI intake.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use super::harq::UlRetx;
use super::{MacScheduler, SchedulerError, SchedulingPolicy, UlCqiFilter, ALLOCATION_MAP_DEPTH};
use crate::sap::sched::{
    fp_s11_3_to_f64, PhichListElement, PhichValue, ReceptionStatus, SchedUlConfigIndParameters,
    SchedUlCqiInfoReqParameters, SchedUlTriggerReqParameters, UlCqiType, UlDciListElement,
};
use crate::sap::Rnti;

/// Smallest grant handed to a new UL flow, in RBs.
const MIN_RB_PER_FLOW: usize = 3;

/// MAC header bytes assumed when draining the BSR estimate.
const UL_MAC_OVERHEAD: u16 = 2;

impl<P: SchedulingPolicy> MacScheduler<P> {
    pub(super) fn schedule_ul(
        &mut self,
        params: &SchedUlTriggerReqParameters,
    ) -> Result<SchedUlConfigIndParameters, SchedulerError> {
        let cell = self.cell()?;
        for info in &params.ul_info_list {
            self.ensure_ue(info.rnti)?;
        }
        let ul_bw = cell.ul_bandwidth as usize;

        self.refresh_ul_cqi_maps();
        self.ffr.report_ul_cqi_info(self.ul_cqi.snapshot());

        // an SR without BSR counts as a small pending buffer
        for rnti in std::mem::take(&mut self.sr_pending) {
            let buffer = self.ul_buffers.entry(rnti).or_insert(0);
            if *buffer == 0 {
                *buffer = self.config.sr_grant_bytes;
            }
        }

        let ffr_map = self.ffr.get_available_ul_rbg();
        let mut alloc_map: Vec<Rnti> = self.rach_allocation_map.clone();
        alloc_map.resize(ul_bw, 0);
        let mut rb_used: Vec<bool> = (0..ul_bw)
            .map(|rb| !ffr_map.get(rb).copied().unwrap_or(false) || alloc_map[rb] != 0)
            .collect();

        let mut ind = SchedUlConfigIndParameters::default();
        for info in &params.ul_info_list {
            let phich = match info.reception_status {
                ReceptionStatus::Ok => PhichValue::Ack,
                ReceptionStatus::NotOk => PhichValue::Nack,
                ReceptionStatus::NotValid => continue,
            };
            ind.phich_list.push(PhichListElement {
                rnti: info.rnti,
                phich,
            });
        }

        let mut served = BTreeSet::new();
        if self.config.harq_enabled {
            ind.dci_list = self.schedule_ul_retx(params, &mut rb_used, &mut alloc_map, &mut served);
        }

        let mut bytes_sent: BTreeMap<Rnti, u32> = BTreeMap::new();
        let candidates: Vec<Rnti> = Self::rotation(self.ues.keys().copied(), self.next_rnti_ul)
            .into_iter()
            .filter(|rnti| !served.contains(rnti))
            .filter(|rnti| self.ul_buffers.get(rnti).is_some_and(|b| *b > 0))
            .collect();
        if !candidates.is_empty() {
            let ffr_bandwidth = ffr_map.iter().filter(|a| **a).count();
            let min_continuous = self.ffr.get_min_continuous_ul_bandwidth() as usize;
            let rb_per_flow = (ffr_bandwidth / (candidates.len() + served.len()))
                .max(MIN_RB_PER_FLOW)
                .min(min_continuous);
            let new_grants =
                self.schedule_ul_new_data(&candidates, rb_per_flow, &mut rb_used, &mut alloc_map);
            for dci in new_grants {
                bytes_sent.insert(dci.rnti, dci.tb_size as u32);
                ind.dci_list.push(dci);
            }
            self.next_rnti_ul = candidates[0].wrapping_add(1);
        }

        self.allocation_maps.retain(|(sfn_sf, _)| *sfn_sf != params.sfn_sf);
        self.allocation_maps.push_back((params.sfn_sf, alloc_map));
        while self.allocation_maps.len() > ALLOCATION_MAP_DEPTH {
            self.allocation_maps.pop_front();
        }
        self.rach_allocation_map.iter_mut().for_each(|r| *r = 0);

        for (rnti, stats) in self.ul_flows.iter_mut() {
            let bytes = bytes_sent.get(rnti).copied().unwrap_or(0);
            stats.record(bytes, self.config.time_window);
        }
        if self.config.harq_enabled {
            self.ul_harq.values_mut().for_each(|h| h.advance());
        }

        debug!(
            sfn_sf = %params.sfn_sf,
            grants = ind.dci_list.len(),
            phich = ind.phich_list.len(),
            "UL scheduled"
        );
        Ok(ind)
    }

    fn schedule_ul_retx(
        &mut self,
        params: &SchedUlTriggerReqParameters,
        rb_used: &mut [bool],
        alloc_map: &mut [Rnti],
        served: &mut BTreeSet<Rnti>,
    ) -> Vec<UlDciListElement> {
        let mut out = Vec::new();
        for info in &params.ul_info_list {
            let rnti = info.rnti;
            let Some(harq) = self.ul_harq.get_mut(&rnti) else {
                warn!(rnti, "UL feedback without HARQ context");
                continue;
            };
            match info.reception_status {
                ReceptionStatus::Ok => {
                    harq.ack();
                    continue;
                }
                ReceptionStatus::NotValid => continue,
                ReceptionStatus::NotOk => {}
            }
            let mut dci = match harq.prepare_retx() {
                UlRetx::Retransmit(dci) => dci,
                UlRetx::NoContext => {
                    warn!(rnti, harq_process = harq.retx_process_id(), "UL NACK for an empty process");
                    continue;
                }
                UlRetx::Dropped => {
                    debug!(rnti, "UL transport block dropped after maximum attempts");
                    continue;
                }
            };
            let rbs = dci.rb_start as usize..(dci.rb_start + dci.rb_len) as usize;
            if rbs.end > rb_used.len() || rb_used[rbs.clone()].iter().any(|u| *u) {
                warn!(rnti, rb_start = dci.rb_start, "UL retransmission RBs already taken, dropped");
                continue;
            }
            for rb in rbs {
                rb_used[rb] = true;
                alloc_map[rb] = rnti;
            }
            dci.ndi = 0;
            served.insert(rnti);
            debug!(rnti, rb_start = dci.rb_start, rb_len = dci.rb_len, "UL retransmission");
            out.push(dci);
        }
        out
    }

    fn schedule_ul_new_data(
        &mut self,
        candidates: &[Rnti],
        rb_per_flow: usize,
        rb_used: &mut [bool],
        alloc_map: &mut [Rnti],
    ) -> Vec<UlDciListElement> {
        let ul_bw = rb_used.len();
        let rb_per_flow = rb_per_flow.min(ul_bw);
        let mut out = Vec::new();
        if rb_per_flow == 0 {
            return out;
        }
        let min_len = MIN_RB_PER_FLOW.min(rb_per_flow);
        let mut search_from = 0usize;
        for &rnti in candidates {
            // the last grants shrink to what is left, down to the minimum
            let window = (min_len..=rb_per_flow).rev().find_map(|len| {
                self.find_ul_window(rnti, rb_used, search_from, len)
                    .map(|start| (start, len))
            });
            let Some((start, rb_len)) = window else {
                debug!(rnti, rb_per_flow, "No contiguous UL RBs left");
                continue;
            };

            let mcs = if self.ul_cqi.contains(rnti) {
                let min_sinr = (start..start + rb_len)
                    .filter_map(|rb| self.ul_cqi.sinr_or_estimate(rnti, rb))
                    .fold(f64::MAX, f64::min);
                let cqi = self.amc.ul_cqi_from_sinr(min_sinr);
                if cqi == 0 {
                    debug!(rnti, sinr_db = min_sinr, "UL CQI 0, UE skipped");
                    continue;
                }
                self.amc.mcs_from_cqi(cqi)
            } else {
                0
            };

            for rb in start..start + rb_len {
                rb_used[rb] = true;
                alloc_map[rb] = rnti;
            }
            search_from = start + rb_len;

            let tb_size = (self.amc.ul_tb_size_bits(mcs, rb_len as u16) / 8)
                .min(u16::MAX as u32) as u16;
            let dci = UlDciListElement {
                rnti,
                rb_start: start as u16,
                rb_len: rb_len as u16,
                tb_size,
                mcs,
                ndi: 1,
                tpc: self.ffr.get_tpc(rnti),
                cqi_request: false,
                hopping: false,
            };
            self.update_ul_rlc_buffer_info(rnti, tb_size);
            if self.config.harq_enabled {
                if let Some(harq) = self.ul_harq.get_mut(&rnti) {
                    harq.store(dci.clone());
                }
            }
            debug!(rnti, rb_start = start, rb_len, mcs, tb_size, "UL grant");
            out.push(dci);
        }
        out
    }

    fn find_ul_window(&self, rnti: Rnti, rb_used: &[bool], from: usize, len: usize) -> Option<usize> {
        let last = rb_used.len().checked_sub(len)?;
        (from..=last).find(|&start| {
            (start..start + len)
                .all(|rb| !rb_used[rb] && self.ffr.is_ul_rbg_available_for_ue(rb, rnti))
        })
    }

    fn update_ul_rlc_buffer_info(&mut self, rnti: Rnti, size: u16) {
        if let Some(buffer) = self.ul_buffers.get_mut(&rnti) {
            *buffer = buffer.saturating_sub(size.saturating_sub(UL_MAC_OVERHEAD) as u32);
        }
    }

    pub(super) fn receive_ul_cqi(
        &mut self,
        params: &SchedUlCqiInfoReqParameters,
    ) -> Result<(), SchedulerError> {
        self.cell()?;
        let accepted = match self.config.ul_cqi_filter {
            UlCqiFilter::SrsUlCqi => UlCqiType::Srs,
            UlCqiFilter::PuschUlCqi => UlCqiType::Pusch,
        };
        if params.ul_cqi.cqi_type != accepted {
            debug!(sfn_sf = %params.sfn_sf, "UL CQI of filtered type ignored");
            return Ok(());
        }
        let sinr: Vec<f64> = params
            .ul_cqi
            .sinr
            .iter()
            .map(|&raw| fp_s11_3_to_f64(raw))
            .collect();

        match params.ul_cqi.cqi_type {
            UlCqiType::Srs => {
                let rnti = params.srs_rnti.ok_or(SchedulerError::MissingSrsRnti)?;
                self.ensure_ue(rnti)?;
                self.ul_cqi.replace(rnti, sinr);
                debug!(rnti, "SRS UL CQI stored");
            }
            UlCqiType::Pusch => {
                let Some(pos) = self
                    .allocation_maps
                    .iter()
                    .position(|(sfn_sf, _)| *sfn_sf == params.sfn_sf)
                else {
                    warn!(sfn_sf = %params.sfn_sf, "PUSCH CQI for a subframe without UL allocation");
                    return Ok(());
                };
                let Some((_, map)) = self.allocation_maps.remove(pos) else {
                    return Ok(());
                };
                for (rb, value) in sinr.into_iter().enumerate() {
                    let Some(&rnti) = map.get(rb) else {
                        break;
                    };
                    if rnti == 0 || !self.ues.contains_key(&rnti) {
                        continue;
                    }
                    self.ul_cqi.set_rb(rnti, rb, value);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::*;
    use crate::ffr::HardFfr;
    use crate::sap::csched::TransmissionMode;
    use crate::sap::sched::{
        f64_to_fp_s11_3, PhichListElement, PhichValue, RachListElement, ReceptionStatus,
        SchedDlRachInfoReqParameters, UlCqi, UlCqiType, UlInfoListElement,
    };
    use crate::sap::SfnSf;

    fn ul_info(rnti: Rnti, reception_status: ReceptionStatus) -> UlInfoListElement {
        UlInfoListElement {
            rnti,
            reception_status,
            tpc: 1,
        }
    }

    fn srs(rnti: Rnti, sinr_db: f64, ul_bw: usize) -> SchedUlCqiInfoReqParameters {
        SchedUlCqiInfoReqParameters {
            sfn_sf: SfnSf::default(),
            ul_cqi: UlCqi {
                sinr: vec![f64_to_fp_s11_3(sinr_db); ul_bw],
                cqi_type: UlCqiType::Srs,
            },
            srs_rnti: Some(rnti),
        }
    }

    #[test]
    fn round_robin_head_rotates_evenly() {
        let (mut s, rec) = configured_cell::<TdBetPolicy>(25);
        for rnti in [1, 2, 3] {
            add_ue(&mut s, rnti, TransmissionMode::Siso);
            bsr(&mut s, rnti, 1_200);
        }
        let mut heads: BTreeMap<Rnti, usize> = BTreeMap::new();
        let mut sfn = SfnSf::new(0, 0);
        for _ in 0..10 {
            sfn = sfn.next();
            let ind = ul_trigger(&mut s, &rec, sfn, vec![]);
            assert_eq!(ind.dci_list.len(), 3);
            *heads.entry(ind.dci_list[0].rnti).or_default() += 1;
        }
        let counts: Vec<usize> = heads.values().copied().collect();
        assert_eq!(counts.len(), 3);
        let (min, max) = (counts.iter().min().unwrap(), counts.iter().max().unwrap());
        assert!(max - min <= 1, "{heads:?}");
    }

    #[test]
    fn grant_splits_band_and_drains_bsr() {
        let (mut s, rec) = configured_cell::<TdBetPolicy>(25);
        add_ue(&mut s, 1, TransmissionMode::Siso);
        add_ue(&mut s, 2, TransmissionMode::Siso);
        bsr(&mut s, 1, 500);
        bsr(&mut s, 2, 500);
        let before = s.ul_buffer(1);

        let ind = ul_trigger(&mut s, &rec, SfnSf::new(0, 1), vec![]);
        assert_eq!(ind.dci_list.len(), 2);
        let first = &ind.dci_list[0];
        let second = &ind.dci_list[1];
        assert_eq!(first.rb_len, 12);
        assert_eq!(first.rb_start, 0);
        assert_eq!(second.rb_start, 12);
        assert_eq!(first.mcs, 0);
        assert_eq!(first.ndi, 1);
        assert_eq!(s.ul_buffer(1), before - (first.tb_size as u32 - 2));
        assert!(s.ul_flow(1).unwrap().total_bytes > 0);
    }

    #[test]
    fn scheduling_request_gets_a_small_grant() {
        let (mut s, rec) = configured_cell::<TtaPolicy>(25);
        add_ue(&mut s, 1, TransmissionMode::Siso);
        s.sched_ul_sr_info_req(&SchedUlSrInfoReqParameters {
            sfn_sf: SfnSf::default(),
            sr_list: vec![1],
        })
        .unwrap();
        let ind = ul_trigger(&mut s, &rec, SfnSf::new(0, 1), vec![]);
        assert_eq!(ind.dci_list.len(), 1);
        assert_eq!(s.table_sizes().sr_pending, 0);
        let ind = ul_trigger(&mut s, &rec, SfnSf::new(0, 2), vec![]);
        assert!(ind.dci_list.is_empty());
    }

    #[test]
    fn nack_retransmits_on_the_same_rbs_seven_triggers_later() {
        let (mut s, rec) = configured_cell::<TdBetPolicy>(25);
        add_ue(&mut s, 1, TransmissionMode::Siso);
        bsr(&mut s, 1, 5_000);
        let mut sfn = SfnSf::new(0, 0);
        sfn = sfn.next();
        let first = ul_trigger(&mut s, &rec, sfn, vec![]).dci_list[0].clone();
        for _ in 0..6 {
            sfn = sfn.next();
            ul_trigger(&mut s, &rec, sfn, vec![]);
        }
        sfn = sfn.next();
        let ind = ul_trigger(&mut s, &rec, sfn, vec![ul_info(1, ReceptionStatus::NotOk)]);

        assert_eq!(ind.phich_list, vec![PhichListElement { rnti: 1, phich: PhichValue::Nack }]);
        assert_eq!(ind.dci_list.len(), 1);
        let retx = &ind.dci_list[0];
        assert_eq!(retx.ndi, 0);
        assert_eq!((retx.rb_start, retx.rb_len), (first.rb_start, first.rb_len));
        assert_eq!(retx.tb_size, first.tb_size);
    }

    #[test]
    fn ul_block_dropped_after_maximum_attempts() {
        let (mut s, rec) = configured_cell::<TdBetPolicy>(25);
        add_ue(&mut s, 1, TransmissionMode::Siso);
        bsr(&mut s, 1, 10);
        let mut sfn = SfnSf::new(0, 0);
        let mut retx = 0;
        for trigger in 0..40 {
            sfn = sfn.next();
            let feedback = if trigger >= 7 && trigger % 7 == 0 {
                vec![ul_info(1, ReceptionStatus::NotOk)]
            } else {
                vec![]
            };
            let ind = ul_trigger(&mut s, &rec, sfn, feedback);
            retx += ind.dci_list.iter().filter(|d| d.ndi == 0).count();
        }
        assert_eq!(retx, 3);
    }

    #[test]
    fn feedback_for_unknown_rnti_is_rejected_untouched() {
        let (mut s, _rec) = configured_cell::<TdBetPolicy>(25);
        add_ue(&mut s, 1, TransmissionMode::Siso);
        bsr(&mut s, 1, 500);
        let before = s.table_sizes();
        let buffer = s.ul_buffer(1);
        let result = s.sched_ul_trigger_req(&SchedUlTriggerReqParameters {
            sfn_sf: SfnSf::new(0, 1),
            ul_info_list: vec![
                ul_info(1, ReceptionStatus::Ok),
                ul_info(77, ReceptionStatus::NotOk),
            ],
        });
        assert_eq!(result, Err(SchedulerError::UnknownRnti { rnti: 77 }));
        assert_eq!(s.table_sizes(), before);
        assert_eq!(s.ul_buffer(1), buffer);
        assert_eq!(s.ul_harq[&1].current(), 0);
    }

    #[test]
    fn phich_skips_invalid_reports() {
        let (mut s, rec) = configured_cell::<TdBetPolicy>(25);
        add_ue(&mut s, 1, TransmissionMode::Siso);
        add_ue(&mut s, 2, TransmissionMode::Siso);
        let ind = ul_trigger(
            &mut s,
            &rec,
            SfnSf::new(0, 1),
            vec![
                ul_info(1, ReceptionStatus::Ok),
                ul_info(2, ReceptionStatus::NotValid),
            ],
        );
        assert_eq!(ind.phich_list, vec![PhichListElement { rnti: 1, phich: PhichValue::Ack }]);
    }

    #[test]
    fn rach_grant_rbs_are_excluded_from_the_next_ul_trigger() {
        let (mut s, rec) = configured_cell::<TdBetPolicy>(25);
        add_ue(&mut s, 1, TransmissionMode::Siso);
        bsr(&mut s, 1, 5_000);
        s.sched_dl_rach_info_req(&SchedDlRachInfoReqParameters {
            sfn_sf: SfnSf::new(0, 1),
            rach_list: vec![RachListElement {
                rnti: 40,
                preamble_id: 1,
                estimated_size: 56,
            }],
        })
        .unwrap();
        let dl = dl_trigger(&mut s, &rec, SfnSf::new(0, 1), vec![]);
        let grant = dl.build_rar_list[0].grant.clone();

        let ind = ul_trigger(&mut s, &rec, SfnSf::new(0, 1), vec![]);
        let dci = &ind.dci_list[0];
        assert!(dci.rb_start >= grant.rb_start + grant.rb_len);
        assert_eq!(s.table_sizes().rach_allocations, 0);
    }

    #[test]
    fn pusch_cqi_is_attributed_through_the_allocation_map() {
        let config = SchedulerConfig {
            ul_cqi_filter: UlCqiFilter::PuschUlCqi,
            ..SchedulerConfig::default()
        };
        let (mut s, rec) = configured_cell_with::<TdBetPolicy>(25, config);
        add_ue(&mut s, 1, TransmissionMode::Siso);
        bsr(&mut s, 1, 5_000);
        let sfn = SfnSf::new(3, 4);
        let dci = ul_trigger(&mut s, &rec, sfn, vec![]).dci_list[0].clone();

        let mut sinr = vec![0u16; 25];
        for rb in dci.rb_start..dci.rb_start + dci.rb_len {
            sinr[rb as usize] = f64_to_fp_s11_3(12.0);
        }
        s.sched_ul_cqi_info_req(&SchedUlCqiInfoReqParameters {
            sfn_sf: sfn,
            ul_cqi: UlCqi {
                sinr,
                cqi_type: UlCqiType::Pusch,
            },
            srs_rnti: None,
        })
        .unwrap();
        assert!(s.ul_cqi.contains(1));
        assert_eq!(s.ul_cqi.snapshot()[&1][dci.rb_start as usize], 12.0);
        // the map is consumed
        assert!(s.allocation_maps.iter().all(|(sf, _)| *sf != sfn));

        // SRS is filtered out in PUSCH mode
        s.sched_ul_cqi_info_req(&srs(1, -10.0, 25)).unwrap();
        assert_eq!(s.ul_cqi.snapshot()[&1][dci.rb_start as usize], 12.0);
    }

    #[test]
    fn srs_report_without_rnti_is_rejected() {
        let (mut s, _rec) = configured_cell::<TdBetPolicy>(25);
        add_ue(&mut s, 1, TransmissionMode::Siso);
        let mut report = srs(1, 10.0, 25);
        report.srs_rnti = None;
        assert_eq!(
            s.sched_ul_cqi_info_req(&report),
            Err(SchedulerError::MissingSrsRnti)
        );
    }

    #[test]
    fn sinr_drives_ul_mcs_and_zero_cqi_skips() {
        let (mut s, rec) = configured_cell::<FdBetPolicy>(25);
        add_ue(&mut s, 1, TransmissionMode::Siso);
        add_ue(&mut s, 2, TransmissionMode::Siso);
        bsr(&mut s, 1, 5_000);
        bsr(&mut s, 2, 5_000);
        s.sched_ul_cqi_info_req(&srs(1, 20.0, 25)).unwrap();
        s.sched_ul_cqi_info_req(&srs(2, -30.0, 25)).unwrap();

        let ind = ul_trigger(&mut s, &rec, SfnSf::new(0, 1), vec![]);
        assert_eq!(ind.dci_list.len(), 1);
        assert_eq!(ind.dci_list[0].rnti, 1);
        assert!(ind.dci_list[0].mcs > 0);
    }

    #[test]
    fn ul_grants_stay_inside_ffr_band() {
        let (mut s, rec) = wired::<TtaPolicy>(SchedulerConfig::default());
        s.set_ffr_sap_provider(Box::new(HardFfr::new(12, 25, (0, 12), (10, 9))))
            .unwrap();
        s.csched_cell_config_req(&crate::sap::csched::CschedCellConfigReqParameters::default())
            .unwrap();
        for rnti in [1, 2] {
            add_ue(&mut s, rnti, TransmissionMode::Siso);
            bsr(&mut s, rnti, 5_000);
        }
        let ind = ul_trigger(&mut s, &rec, SfnSf::new(0, 1), vec![]);
        assert!(!ind.dci_list.is_empty());
        for dci in &ind.dci_list {
            assert!(dci.rb_start >= 10 && dci.rb_start + dci.rb_len <= 19, "{dci:?}");
        }
    }

    #[test]
    fn ul_cqi_expires_after_threshold() {
        let config = SchedulerConfig {
            cqi_timers_threshold: 2,
            ..SchedulerConfig::default()
        };
        let (mut s, rec) = configured_cell_with::<TdBetPolicy>(25, config);
        add_ue(&mut s, 1, TransmissionMode::Siso);
        s.sched_ul_cqi_info_req(&srs(1, 5.0, 25)).unwrap();
        ul_trigger(&mut s, &rec, SfnSf::new(0, 1), vec![]);
        ul_trigger(&mut s, &rec, SfnSf::new(0, 2), vec![]);
        assert_eq!(s.table_sizes().ul_cqi, 1);
        ul_trigger(&mut s, &rec, SfnSf::new(0, 3), vec![]);
        assert_eq!(s.table_sizes().ul_cqi, 0);
    }
}
