/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Channel and QoS aware scheduling.
//!
//! Candidates are grouped by head-of-line delay (`hol / delay_group_ms`);
//! the most delayed group is served first.  Inside a group every free RBG
//! goes to the UE with the best channel metric, boosted for GBR flows that
//! run below their guaranteed bitrate.  A UE stops receiving RBGs once the
//! estimated bytes cover its buffer, leaving the rest to the next group.

use std::collections::BTreeMap;

use super::{first_max, DlAllocationContext, FlowStats, SchedulingPolicy, TTI_SECONDS};
use crate::sap::csched::{LogicalChannelConfigListElement, QosBearerType};
use crate::sap::Rnti;
use crate::scheduler::SchedulerConfig;

/// Channel metric used inside a delay group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CqaMetric {
    /// Frequency-selective: `subband rate / wideband rate`.
    #[default]
    Ff,
    /// Proportional fair: `subband rate / average throughput`.
    Pf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CqaFlowPerf {
    pub stats: FlowStats,
    /// Sum of the GBR of the UE's DL bearers, bytes/s.
    pub target_throughput: f64,
    pub last_avg_throughput: f64,
    pub second_last_avg_throughput: f64,
}

impl CqaFlowPerf {
    /// GBR boost factor, 1 when the target is met or absent.
    fn gbr_weight(&self) -> f64 {
        if self.target_throughput <= 0.0 {
            return 1.0;
        }
        let recent = (self.last_avg_throughput + self.second_last_avg_throughput) / 2.0;
        if recent < self.target_throughput {
            self.target_throughput / recent.max(1.0)
        } else {
            1.0
        }
    }
}

#[derive(Debug)]
pub struct CqaPolicy {
    metric: CqaMetric,
    delay_group_ms: u16,
}

impl CqaPolicy {
    fn metric(
        &self,
        ctx: &DlAllocationContext<'_>,
        perf: Option<&CqaFlowPerf>,
        rnti: Rnti,
        rbg: usize,
    ) -> f64 {
        let sb = ctx.subband_rate(rnti, rbg);
        let base = match self.metric {
            CqaMetric::Ff => {
                let wb = ctx.wideband_rate(rnti);
                if wb > 0.0 {
                    sb / wb
                } else {
                    0.0
                }
            }
            CqaMetric::Pf => sb / perf.map_or(1.0, |p| p.stats.avg_throughput.max(1.0)),
        };
        base * perf.map_or(1.0, CqaFlowPerf::gbr_weight)
    }
}

impl SchedulingPolicy for CqaPolicy {
    type FlowPerf = CqaFlowPerf;

    const NAME: &'static str = "cqa";

    fn new(config: &SchedulerConfig) -> Self {
        Self {
            metric: config.cqa_metric,
            delay_group_ms: config.cqa_delay_group_ms.max(1),
        }
    }

    fn new_flow(&self, tti: u64) -> CqaFlowPerf {
        let stats = FlowStats::new(tti);
        CqaFlowPerf {
            last_avg_throughput: stats.avg_throughput,
            second_last_avg_throughput: stats.avg_throughput,
            stats,
            target_throughput: 0.0,
        }
    }

    fn on_lc_config(&self, perf: &mut CqaFlowPerf, lcs: &[&LogicalChannelConfigListElement]) {
        perf.target_throughput = lcs
            .iter()
            .filter(|lc| lc.qos_bearer_type == QosBearerType::Gbr)
            .map(|lc| lc.e_rab_guaranteed_bitrate_dl as f64 / 8.0)
            .sum();
    }

    fn allocate_dl(
        &mut self,
        ctx: &DlAllocationContext<'_>,
        candidates: &[Rnti],
        perf: &BTreeMap<Rnti, CqaFlowPerf>,
    ) -> BTreeMap<Rnti, Vec<u16>> {
        let mut groups: BTreeMap<u16, Vec<Rnti>> = BTreeMap::new();
        for &rnti in candidates {
            groups
                .entry(ctx.hol_delay(rnti) / self.delay_group_ms)
                .or_default()
                .push(rnti);
        }
        // CE-only UEs still need room for the control elements
        let mut remaining: BTreeMap<Rnti, f64> = candidates
            .iter()
            .map(|&r| (r, (ctx.buffered_bytes(r) as f64).max(1.0)))
            .collect();

        let mut taken = vec![false; ctx.rbg_count()];
        let mut alloc: BTreeMap<Rnti, Vec<u16>> = BTreeMap::new();

        for (_, group) in groups.iter().rev() {
            for (rbg, used) in taken.iter_mut().enumerate() {
                if *used {
                    continue;
                }
                let winner = first_max(
                    group
                        .iter()
                        .filter(|&&r| remaining[&r] > 0.0 && ctx.is_allowed(rbg, r))
                        .map(|&r| (r, self.metric(ctx, perf.get(&r), r, rbg))),
                );
                let Some(rnti) = winner else {
                    continue;
                };
                *used = true;
                alloc.entry(rnti).or_default().push(rbg as u16);
                if let Some(left) = remaining.get_mut(&rnti) {
                    *left -= ctx.subband_rate(rnti, rbg) * TTI_SECONDS;
                }
            }
        }
        alloc
    }

    fn record_tti(&self, perf: &mut CqaFlowPerf, bytes: u32, time_window: f64) {
        perf.second_last_avg_throughput = perf.last_avg_throughput;
        perf.last_avg_throughput = perf.stats.avg_throughput;
        perf.stats.record(bytes, time_window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sap::csched::QosBearerType;
    use crate::scheduler::testing::PolicyFixture;

    fn policy(metric: CqaMetric) -> CqaPolicy {
        CqaPolicy::new(&SchedulerConfig {
            cqa_metric: metric,
            ..SchedulerConfig::default()
        })
    }

    fn perf_of(p: &CqaPolicy, rntis: &[Rnti]) -> BTreeMap<Rnti, CqaFlowPerf> {
        rntis.iter().map(|&r| (r, p.new_flow(0))).collect()
    }

    #[test]
    fn most_delayed_group_is_served_first() {
        let mut fx = PolicyFixture::new(4);
        // UE 1 buffer fits in one RBG; UE 2 has plenty but waits less
        fx.ue(1, 7, 10).ue(2, 15, 50_000);
        fx.hol(1, 80).hol(2, 5);
        let mut p = policy(CqaMetric::Ff);
        let perf = perf_of(&p, &[1, 2]);

        let alloc = p.allocate_dl(&fx.ctx(), &[2, 1], &perf);
        assert_eq!(alloc[&1], vec![0]);
        assert_eq!(alloc[&2], vec![1, 2, 3]);
    }

    #[test]
    fn gbr_deficit_boosts_metric() {
        let mut fx = PolicyFixture::new(2);
        fx.ue(1, 7, 50_000).ue(2, 7, 50_000);
        let mut p = policy(CqaMetric::Pf);
        let mut perf = perf_of(&p, &[1, 2]);
        let gbr = LogicalChannelConfigListElement {
            logical_channel_identity: 3,
            qos_bearer_type: QosBearerType::Gbr,
            e_rab_guaranteed_bitrate_dl: 8_000_000,
            ..Default::default()
        };
        if let Some(flow) = perf.get_mut(&2) {
            p.on_lc_config(flow, &[&gbr]);
            assert_eq!(flow.target_throughput, 1_000_000.0);
        }

        let alloc = p.allocate_dl(&fx.ctx(), &[1, 2], &perf);
        assert_eq!(alloc.get(&2).map(Vec::len), Some(2));
        assert!(!alloc.contains_key(&1));
    }

    #[test]
    fn record_tti_shifts_the_average_history() {
        let p = policy(CqaMetric::Ff);
        let mut flow = p.new_flow(0);
        p.record_tti(&mut flow, 100, 100.0);
        let first = flow.stats.avg_throughput;
        p.record_tti(&mut flow, 100, 100.0);
        assert_eq!(flow.last_avg_throughput, first);
        assert_eq!(flow.second_last_avg_throughput, 1.0);
    }
}
