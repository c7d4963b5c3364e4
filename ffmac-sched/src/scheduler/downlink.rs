/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! DL trigger: RAR, paging, HARQ retransmissions and new data, in that
//! priority order.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use super::harq::{HARQ_PROC_NUM, MAX_DL_RV};
use super::policy::{DlAllocationContext, DEFAULT_CQI};
use super::{CellGrid, MacScheduler, SchedulerError, SchedulingPolicy};
use crate::ffr::TPC_NEUTRAL;
use crate::sap::sched::{
    BroadcastType, BuildBroadcastListElement, BuildDataListElement, BuildRarListElement, CeBitmap,
    DlDciListElement, RlcPduListElement, SchedDlConfigIndParameters, SchedDlTriggerReqParameters,
    UlDciListElement, UlGrant, P_RNTI,
};
use crate::sap::{FlowId, Lcid, Rnti};

/// TPC command sent in every RAR grant (0 dB).
const RAR_TPC: i8 = 3;

/// RLC header bytes assumed when draining a transmission queue.
const RLC_AM_OVERHEAD: u16 = 4;
const RLC_UM_OVERHEAD: u16 = 2;

impl<P: SchedulingPolicy> MacScheduler<P> {
    pub(super) fn schedule_dl(
        &mut self,
        params: &SchedDlTriggerReqParameters,
    ) -> Result<SchedDlConfigIndParameters, SchedulerError> {
        let cell = self.cell()?;
        for info in &params.dl_info_list {
            self.ensure_ue(info.rnti)?;
            if info.harq_process_id as usize >= HARQ_PROC_NUM {
                return Err(SchedulerError::InvalidHarqProcess {
                    rnti: info.rnti,
                    harq_process: info.harq_process_id,
                });
            }
        }

        self.tti += 1;
        self.refresh_dl_cqi_maps();
        self.refresh_harq_processes();

        let ffr_map = self.ffr.get_available_dl_rbg();
        let mut rbg_used: Vec<bool> = (0..cell.rbg_count)
            .map(|rbg| !ffr_map.get(rbg).copied().unwrap_or(false))
            .collect();

        let mut ind = SchedDlConfigIndParameters {
            nr_of_pdcch_ofdm_symbols: 1,
            ..Default::default()
        };
        ind.build_rar_list = self.schedule_rar(&cell);
        ind.build_broadcast_list = self.schedule_paging(&cell, &mut rbg_used);

        let mut served = BTreeSet::new();
        if self.config.harq_enabled {
            self.dl_info_buffered
                .extend(params.dl_info_list.iter().cloned());
            ind.build_data_list = self.schedule_dl_retx(&mut rbg_used, &mut served);
        } else if !params.dl_info_list.is_empty() {
            debug!(reports = params.dl_info_list.len(), "HARQ disabled, DL feedback ignored");
        }

        let mut bytes_sent: BTreeMap<Rnti, u32> = BTreeMap::new();
        let candidates = self.dl_candidates(&served);
        let new_data = self.schedule_dl_new_data(&cell, &candidates, &mut rbg_used, &mut bytes_sent);
        ind.build_data_list.extend(new_data);

        for (rnti, perf) in self.dl_flows.iter_mut() {
            let bytes = bytes_sent.get(rnti).copied().unwrap_or(0);
            self.policy.record_tti(perf, bytes, self.config.time_window);
        }
        if let Some(&head) = candidates.first() {
            self.next_rnti_dl = head.wrapping_add(1);
        }

        debug!(
            sfn_sf = %params.sfn_sf,
            tti = self.tti,
            rar = ind.build_rar_list.len(),
            paging = ind.build_broadcast_list.len(),
            data = ind.build_data_list.len(),
            "DL scheduled"
        );
        Ok(ind)
    }

    // ── RAR ───────────────────────────────────────────────────────────────────

    /// Answer the pending preambles.  Preamble IDs used by more than one
    /// RACH in the same batch collided and get no RAR.
    fn schedule_rar(&mut self, cell: &CellGrid) -> Vec<BuildRarListElement> {
        let rach = std::mem::take(&mut self.rach_list);
        if rach.is_empty() {
            return Vec::new();
        }

        let mut preamble_users: BTreeMap<u8, usize> = BTreeMap::new();
        for r in &rach {
            *preamble_users.entry(r.preamble_id).or_default() += 1;
        }

        let ul_bw = cell.ul_bandwidth as usize;
        let ul_map = self.ffr.get_available_ul_rbg();
        let max_len = self.ffr.get_min_continuous_ul_bandwidth() as usize;
        let mcs = self.config.ul_grant_mcs;
        let rb_free = |map: &[Rnti], rb: usize| {
            ul_map.get(rb).copied().unwrap_or(false) && map.get(rb).is_some_and(|r| *r == 0)
        };

        let mut rars = Vec::new();
        let mut rb_start = 0usize;
        for r in rach {
            if preamble_users.get(&r.preamble_id).copied().unwrap_or(0) > 1 {
                debug!(rnti = r.rnti, preamble = r.preamble_id, "Preamble collision, no RAR");
                continue;
            }
            while rb_start < ul_bw && !rb_free(&self.rach_allocation_map, rb_start) {
                rb_start += 1;
            }

            let needed = r.estimated_size as u32;
            let mut rb_len = 0usize;
            let mut tb_bits = 0u32;
            while (rb_len == 0 || tb_bits < needed)
                && rb_len < max_len
                && rb_free(&self.rach_allocation_map, rb_start + rb_len)
            {
                rb_len += 1;
                tb_bits = self.amc.ul_tb_size_bits(mcs, rb_len as u16);
            }
            if rb_len == 0 || tb_bits < needed {
                warn!(
                    rnti = r.rnti,
                    preamble = r.preamble_id,
                    needed_bits = needed,
                    "No UL resources left for RAR"
                );
                break;
            }

            let tb_size = (tb_bits / 8).min(u16::MAX as u32) as u16;
            for slot in &mut self.rach_allocation_map[rb_start..rb_start + rb_len] {
                *slot = r.rnti;
            }
            if self.config.harq_enabled {
                if let Some(harq) = self.ul_harq.get_mut(&r.rnti) {
                    harq.store(UlDciListElement {
                        rnti: r.rnti,
                        rb_start: rb_start as u16,
                        rb_len: rb_len as u16,
                        tb_size,
                        mcs,
                        ndi: 1,
                        tpc: TPC_NEUTRAL,
                        cqi_request: false,
                        hopping: false,
                    });
                }
            }
            debug!(rnti = r.rnti, rb_start, rb_len, tb_size, "RAR granted");
            rars.push(BuildRarListElement {
                rnti: r.rnti,
                preamble_id: r.preamble_id,
                grant: UlGrant {
                    rnti: r.rnti,
                    rb_start: rb_start as u16,
                    rb_len: rb_len as u16,
                    tb_size,
                    mcs,
                    hopping: false,
                    tpc: RAR_TPC,
                    cqi_request: false,
                    ul_delay: false,
                },
            });
            rb_start += rb_len;
        }
        rars
    }

    // ── Paging ────────────────────────────────────────────────────────────────

    /// Paging goes out on P-RNTI at MCS 0.  Messages that do not fit wait
    /// for the next subframe.
    fn schedule_paging(
        &mut self,
        cell: &CellGrid,
        rbg_used: &mut [bool],
    ) -> Vec<BuildBroadcastListElement> {
        let queued = std::mem::take(&mut self.paging_queue);
        let mut out = Vec::new();
        for msg in queued {
            let free: Vec<usize> = (0..rbg_used.len()).filter(|&i| !rbg_used[i]).collect();
            let needed = msg.paging_message_size as u32;
            let mut n = 0usize;
            let mut bytes = 0u32;
            while (n == 0 || bytes < needed) && n < free.len() {
                n += 1;
                bytes = self.amc.dl_tb_size_bits(0, n as u16 * cell.rbg_size) / 8;
            }
            if n == 0 || bytes < needed {
                debug!(index = msg.paging_index, size = needed, "Paging deferred");
                self.paging_queue.push(msg);
                continue;
            }

            let rbgs: Vec<u16> = free[..n].iter().map(|&i| i as u16).collect();
            for &rbg in &free[..n] {
                rbg_used[rbg] = true;
            }
            out.push(BuildBroadcastListElement {
                broadcast_type: BroadcastType::Pcch,
                index: msg.paging_index,
                dci: DlDciListElement {
                    rnti: P_RNTI,
                    rb_bitmap: DlDciListElement::bitmap_of(&rbgs),
                    tbs_size: vec![bytes.min(u16::MAX as u32) as u16],
                    mcs: vec![0],
                    ndi: vec![1],
                    rv: vec![0],
                    harq_process: 0,
                    tpc: TPC_NEUTRAL,
                },
            });
        }
        out
    }

    // ── HARQ retransmissions ──────────────────────────────────────────────────

    fn schedule_dl_retx(
        &mut self,
        rbg_used: &mut [bool],
        served: &mut BTreeSet<Rnti>,
    ) -> Vec<BuildDataListElement> {
        let pending = std::mem::take(&mut self.dl_info_buffered);
        let mut out = Vec::new();
        for info in pending {
            let (rnti, id) = (info.rnti, info.harq_process_id);
            let Some(process) = self.dl_harq.process_mut(rnti, id) else {
                continue;
            };
            if process.is_free() {
                debug!(rnti, harq_process = id, "Feedback for a freed process dropped");
                continue;
            }
            if process.has_timed_out() {
                debug!(rnti, harq_process = id, "Feedback for a timed-out process dropped");
                process.release();
                continue;
            }
            if !info.is_nack() {
                process.release();
                continue;
            }
            if served.contains(&rnti) {
                // one retransmission per UE per subframe
                self.dl_info_buffered.push(info);
                continue;
            }
            let Some(mut dci) = process.dci.clone() else {
                process.release();
                continue;
            };
            if dci.rv.iter().copied().max().unwrap_or(0) >= MAX_DL_RV {
                debug!(rnti, harq_process = id, "Maximum redundancy version reached, dropped");
                process.release();
                continue;
            }

            let ffr = self.ffr.as_ref();
            let usable = |rbg: usize| rbg < rbg_used.len() && !rbg_used[rbg] && ffr.is_dl_rbg_available_for_ue(rbg, rnti);
            let original = dci.rbgs();
            let rbgs = if original.iter().all(|&r| usable(r as usize)) {
                original
            } else {
                let relocated: Vec<u16> = (0..rbg_used.len())
                    .filter(|&r| usable(r))
                    .take(original.len())
                    .map(|r| r as u16)
                    .collect();
                if relocated.len() < original.len() {
                    warn!(rnti, harq_process = id, "Retransmission does not fit, kept for next subframe");
                    self.dl_info_buffered.push(info);
                    continue;
                }
                relocated
            };

            for &rbg in &rbgs {
                rbg_used[rbg as usize] = true;
            }
            dci.rb_bitmap = DlDciListElement::bitmap_of(&rbgs);
            dci.ndi.iter_mut().for_each(|ndi| *ndi = 0);
            dci.rv.iter_mut().for_each(|rv| *rv += 1);
            process.status = process.status.saturating_add(1);
            process.timer = 0;
            process.dci = Some(dci.clone());
            served.insert(rnti);
            debug!(rnti, harq_process = id, rv = dci.rv.first().copied().unwrap_or(0), "DL retransmission");
            out.push(BuildDataListElement {
                rnti,
                dci,
                ce_bitmap: CeBitmap::empty(),
                rlc_pdu_list: process.rlc_pdus.clone(),
            });
        }
        out
    }

    // ── New data ──────────────────────────────────────────────────────────────

    fn has_dl_data(&self, rnti: Rnti) -> bool {
        self.ce_pending.get(&rnti).is_some_and(|ce| !ce.is_empty())
            || self.rlc_buffers.range(Self::flow_range(rnti)).any(|(_, b)| {
                b.rlc_status_pdu_size > 0
                    || b.rlc_retransmission_queue_size > 0
                    || b.rlc_transmission_queue_size > 0
            })
    }

    /// UEs eligible for new data, in round-robin order.
    fn dl_candidates(&self, served: &BTreeSet<Rnti>) -> Vec<Rnti> {
        Self::rotation(self.ues.keys().copied(), self.next_rnti_dl)
            .into_iter()
            .filter(|rnti| !served.contains(rnti))
            .filter(|&rnti| self.has_dl_data(rnti))
            .filter(|&rnti| !self.config.harq_enabled || self.dl_harq.is_available(rnti))
            .collect()
    }

    fn schedule_dl_new_data(
        &mut self,
        cell: &CellGrid,
        candidates: &[Rnti],
        rbg_used: &mut [bool],
        bytes_sent: &mut BTreeMap<Rnti, u32>,
    ) -> Vec<BuildDataListElement> {
        if candidates.is_empty() || rbg_used.iter().all(|u| *u) {
            return Vec::new();
        }
        let rbg_free: Vec<bool> = rbg_used.iter().map(|u| !u).collect();
        let proposal = {
            let ctx = DlAllocationContext {
                tti: self.tti,
                rbg_size: cell.rbg_size,
                time_window: self.config.time_window,
                rbg_free: &rbg_free,
                amc: self.amc.as_ref(),
                ffr: self.ffr.as_ref(),
                cqi: &self.dl_cqi,
                tx_modes: &self.ues,
                rlc_buffers: &self.rlc_buffers,
            };
            self.policy.allocate_dl(&ctx, candidates, &self.dl_flows)
        };

        let mut out = Vec::new();
        for &rnti in candidates {
            let Some(proposed) = proposal.get(&rnti) else {
                continue;
            };
            let mut rbgs: Vec<u16> = Vec::new();
            for &rbg in proposed {
                let i = rbg as usize;
                if i < rbg_used.len() && !rbg_used[i] && self.ffr.is_dl_rbg_available_for_ue(i, rnti)
                {
                    rbg_used[i] = true;
                    rbgs.push(rbg);
                }
            }
            if rbgs.is_empty() {
                continue;
            }
            rbgs.sort_unstable();

            match self.build_dl_data(cell, rnti, &rbgs) {
                Some(element) => {
                    let bytes: u32 = element.dci.tbs_size.iter().map(|&b| b as u32).sum();
                    bytes_sent.insert(rnti, bytes);
                    out.push(element);
                }
                None => {
                    for &rbg in &rbgs {
                        rbg_used[rbg as usize] = false;
                    }
                }
            }
        }
        out
    }

    /// Build the grant of one UE on `rbgs`.  `None` when the UE cannot be
    /// served (CQI 0 on a layer or no HARQ process).
    fn build_dl_data(
        &mut self,
        cell: &CellGrid,
        rnti: Rnti,
        rbgs: &[u16],
    ) -> Option<BuildDataListElement> {
        let layers = self.ues.get(&rnti).map_or(1, |m| m.layers());
        let cqis: Vec<u8> = (0..layers)
            .map(|layer| {
                rbgs.iter()
                    .map(|&rbg| {
                        self.dl_cqi
                            .subband(rnti, rbg as usize, layer)
                            .or_else(|| self.dl_cqi.wideband(rnti))
                            .unwrap_or(DEFAULT_CQI)
                    })
                    .min()
                    .unwrap_or(DEFAULT_CQI)
            })
            .collect();
        if cqis.contains(&0) {
            debug!(rnti, "CQI 0 on an allocated layer, UE skipped");
            return None;
        }

        let nprb = rbgs.len() as u16 * cell.rbg_size;
        let mcs: Vec<u8> = cqis.iter().map(|&c| self.amc.mcs_from_cqi(c)).collect();
        let tbs_size: Vec<u16> = mcs
            .iter()
            .map(|&m| (self.amc.dl_tb_size_bits(m, nprb) / 8).min(u16::MAX as u32) as u16)
            .collect();

        let harq_process = if self.config.harq_enabled {
            match self.dl_harq.update_process_id(rnti) {
                Some(id) => {
                    // feedback still buffered for the previous block on this process is stale
                    self.dl_info_buffered
                        .retain(|info| info.rnti != rnti || info.harq_process_id != id);
                    id
                }
                None => {
                    warn!(rnti, "No DL HARQ process available");
                    return None;
                }
            }
        } else {
            0
        };

        let active: Vec<Lcid> = self
            .rlc_buffers
            .range(Self::flow_range(rnti))
            .filter(|(_, b)| {
                b.rlc_status_pdu_size > 0
                    || b.rlc_retransmission_queue_size > 0
                    || b.rlc_transmission_queue_size > 0
            })
            .map(|(flow, _)| flow.lcid)
            .collect();
        let mut rlc_pdu_list = Vec::with_capacity(active.len());
        for &lcid in &active {
            let mut per_layer = Vec::with_capacity(layers);
            for &tb in &tbs_size {
                let size = tb / active.len() as u16;
                per_layer.push(RlcPduListElement {
                    logical_channel_identity: lcid,
                    size,
                });
                self.update_dl_rlc_buffer_info(rnti, lcid, size);
            }
            rlc_pdu_list.push(per_layer);
        }

        let dci = DlDciListElement {
            rnti,
            rb_bitmap: DlDciListElement::bitmap_of(rbgs),
            tbs_size,
            mcs,
            ndi: vec![1; layers],
            rv: vec![0; layers],
            harq_process,
            tpc: self.ffr.get_tpc(rnti),
        };
        if self.config.harq_enabled {
            if let Some(process) = self.dl_harq.process_mut(rnti, harq_process) {
                process.start(dci.clone(), rlc_pdu_list.clone());
            }
        }
        let ce_bitmap = self.ce_pending.remove(&rnti).unwrap_or_default();

        debug!(
            rnti,
            rbgs = rbgs.len(),
            mcs = dci.mcs.first().copied().unwrap_or(0),
            tbs = dci.tbs_size.first().copied().unwrap_or(0),
            harq_process,
            "DL grant"
        );
        Some(BuildDataListElement {
            rnti,
            dci,
            ce_bitmap,
            rlc_pdu_list,
        })
    }

    /// Drain `size` bytes from one LC: STATUS PDU first, then the
    /// retransmission queue, then the transmission queue.
    fn update_dl_rlc_buffer_info(&mut self, rnti: Rnti, lcid: Lcid, size: u16) {
        let Some(buffer) = self.rlc_buffers.get_mut(&FlowId::new(rnti, lcid)) else {
            return;
        };
        if buffer.rlc_status_pdu_size > 0 && size >= buffer.rlc_status_pdu_size {
            buffer.rlc_status_pdu_size = 0;
        } else if buffer.rlc_retransmission_queue_size > 0
            && size as u32 >= buffer.rlc_retransmission_queue_size
        {
            buffer.rlc_retransmission_queue_size = 0;
        } else if buffer.rlc_transmission_queue_size > 0 {
            let overhead = if lcid == 1 { RLC_AM_OVERHEAD } else { RLC_UM_OVERHEAD };
            let payload = size.saturating_sub(overhead) as u32;
            buffer.rlc_transmission_queue_size =
                buffer.rlc_transmission_queue_size.saturating_sub(payload);
        }
    }
}
