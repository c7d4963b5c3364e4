/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Throughput to average.
//!
//! Each RBG goes to the UE for which it is best *relative to that UE's own
//! wideband channel*: `subband rate / wideband rate`.  No history is kept.

use std::collections::BTreeMap;

use super::{first_max, DlAllocationContext, SchedulingPolicy};
use crate::sap::Rnti;
use crate::scheduler::SchedulerConfig;

#[derive(Debug, Default)]
pub struct TtaPolicy;

impl SchedulingPolicy for TtaPolicy {
    type FlowPerf = ();

    const NAME: &'static str = "tta";

    fn new(_config: &SchedulerConfig) -> Self {
        Self
    }

    fn new_flow(&self, _tti: u64) {}

    fn allocate_dl(
        &mut self,
        ctx: &DlAllocationContext<'_>,
        candidates: &[Rnti],
        _perf: &BTreeMap<Rnti, ()>,
    ) -> BTreeMap<Rnti, Vec<u16>> {
        let mut alloc: BTreeMap<Rnti, Vec<u16>> = BTreeMap::new();
        for rbg in 0..ctx.rbg_count() {
            let winner = first_max(
                candidates
                    .iter()
                    .filter(|&&r| ctx.is_allowed(rbg, r))
                    .map(|&r| {
                        let wb = ctx.wideband_rate(r);
                        let metric = if wb > 0.0 {
                            ctx.subband_rate(r, rbg) / wb
                        } else {
                            0.0
                        };
                        (r, metric)
                    }),
            );
            if let Some(rnti) = winner {
                alloc.entry(rnti).or_default().push(rbg as u16);
            }
        }
        alloc
    }

    fn record_tti(&self, _perf: &mut (), _bytes: u32, _time_window: f64) {}
}
