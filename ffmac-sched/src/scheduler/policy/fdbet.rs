/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Frequency-domain blind equal throughput.
//!
//! RBGs are handed out one at a time to the UE whose *estimated* average
//! throughput (the average it would have after this TTI with what it already
//! got) is lowest, so one TTI is shared between several UEs.

use std::collections::BTreeMap;

use super::{ewma, first_max, DlAllocationContext, FlowStats, SchedulingPolicy, TTI_SECONDS};
use crate::sap::Rnti;
use crate::scheduler::SchedulerConfig;

#[derive(Debug, Default)]
pub struct FdBetPolicy;

impl SchedulingPolicy for FdBetPolicy {
    type FlowPerf = FlowStats;

    const NAME: &'static str = "fdbet";

    fn new(_config: &SchedulerConfig) -> Self {
        Self
    }

    fn new_flow(&self, tti: u64) -> FlowStats {
        FlowStats::new(tti)
    }

    fn allocate_dl(
        &mut self,
        ctx: &DlAllocationContext<'_>,
        candidates: &[Rnti],
        perf: &BTreeMap<Rnti, FlowStats>,
    ) -> BTreeMap<Rnti, Vec<u16>> {
        let avg = |rnti: Rnti| perf.get(&rnti).map_or(1.0, |p| p.avg_throughput);
        let mut served: BTreeMap<Rnti, f64> = candidates.iter().map(|&r| (r, 0.0)).collect();
        let mut estimate: BTreeMap<Rnti, f64> = candidates
            .iter()
            .map(|&r| (r, ewma(avg(r), 0.0, ctx.time_window)))
            .collect();
        let mut alloc: BTreeMap<Rnti, Vec<u16>> = BTreeMap::new();

        for rbg in 0..ctx.rbg_count() {
            let winner = first_max(
                candidates
                    .iter()
                    .filter(|&&r| ctx.is_allowed(rbg, r))
                    .map(|&r| (r, 1.0 / estimate[&r])),
            );
            let Some(rnti) = winner else {
                continue;
            };
            alloc.entry(rnti).or_default().push(rbg as u16);
            let bytes = served.entry(rnti).or_default();
            *bytes += ctx.wideband_rate(rnti) * TTI_SECONDS;
            estimate.insert(
                rnti,
                ewma(avg(rnti), *bytes / TTI_SECONDS, ctx.time_window),
            );
        }
        alloc
    }

    fn record_tti(&self, perf: &mut FlowStats, bytes: u32, time_window: f64) {
        perf.record(bytes, time_window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::testing::PolicyFixture;

    #[test]
    fn equal_ues_share_the_band() {
        let mut fx = PolicyFixture::new(6);
        fx.ue(1, 7, 5000).ue(2, 7, 5000);
        let perf: BTreeMap<Rnti, FlowStats> =
            [(1, FlowStats::new(0)), (2, FlowStats::new(0))].into();

        let alloc = FdBetPolicy.allocate_dl(&fx.ctx(), &[1, 2], &perf);
        assert_eq!(alloc[&1], vec![0, 2, 4]);
        assert_eq!(alloc[&2], vec![1, 3, 5]);
    }

    #[test]
    fn starved_ue_gets_more_rbgs() {
        let mut fx = PolicyFixture::new(6);
        fx.ue(1, 7, 5000).ue(2, 7, 5000);
        let mut rich = FlowStats::new(0);
        rich.avg_throughput = 1.0e6;
        let perf: BTreeMap<Rnti, FlowStats> = [(1, rich), (2, FlowStats::new(0))].into();

        let alloc = FdBetPolicy.allocate_dl(&fx.ctx(), &[1, 2], &perf);
        let for_two = alloc.get(&2).map_or(0, Vec::len);
        let for_one = alloc.get(&1).map_or(0, Vec::len);
        assert!(for_two > for_one);
        assert_eq!(for_one + for_two, 6);
    }
}
