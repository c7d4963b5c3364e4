/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Time-domain blind equal throughput.
//!
//! Each TTI the UE with the lowest past average throughput gets every RBG it
//! may use.  Over time all UEs converge to the same throughput regardless of
//! channel quality.

use std::collections::BTreeMap;

use super::{first_max, DlAllocationContext, FlowStats, SchedulingPolicy};
use crate::sap::Rnti;
use crate::scheduler::SchedulerConfig;

#[derive(Debug, Default)]
pub struct TdBetPolicy;

impl SchedulingPolicy for TdBetPolicy {
    type FlowPerf = FlowStats;

    const NAME: &'static str = "tdbet";

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
        let eligible = candidates
            .iter()
            .map(|&rnti| (rnti, ctx.allowed_rbgs(rnti)))
            .filter(|(_, rbgs)| !rbgs.is_empty())
            .collect::<Vec<_>>();

        let winner = first_max(eligible.iter().map(|(rnti, _)| {
            let avg = perf.get(rnti).map_or(1.0, |p| p.avg_throughput);
            (*rnti, 1.0 / avg)
        }));

        eligible
            .into_iter()
            .filter(|(rnti, _)| Some(*rnti) == winner)
            .collect()
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
    fn lowest_average_takes_every_rbg() {
        let mut fx = PolicyFixture::new(6);
        fx.ue(1, 10, 5000).ue(2, 3, 5000);
        let mut perf = BTreeMap::new();
        let mut fast = FlowStats::new(0);
        fast.avg_throughput = 5000.0;
        let mut slow = FlowStats::new(0);
        slow.avg_throughput = 100.0;
        perf.insert(1, fast);
        perf.insert(2, slow);

        let alloc = TdBetPolicy.allocate_dl(&fx.ctx(), &[1, 2], &perf);
        assert_eq!(alloc.len(), 1);
        assert_eq!(alloc[&2], vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn equal_averages_go_to_the_round_robin_head() {
        let mut fx = PolicyFixture::new(4);
        fx.ue(1, 7, 100).ue(2, 7, 100);
        fx.rbg_free[1] = false;
        let perf: BTreeMap<Rnti, FlowStats> =
            [(1, FlowStats::new(0)), (2, FlowStats::new(0))].into();

        let alloc = TdBetPolicy.allocate_dl(&fx.ctx(), &[2, 1], &perf);
        assert_eq!(alloc.keys().copied().collect::<Vec<_>>(), vec![2]);
        assert_eq!(alloc[&2], vec![0, 2, 3]);
    }
}
