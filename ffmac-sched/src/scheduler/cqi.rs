/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Channel quality tables with validity timers.
//!
//! Every stored report carries a countdown started at the configured
//! threshold (in subframes).  Each refresh decrements it; the first refresh
//! that finds it at zero evicts the report, so a report never influences a
//! decision once it is older than the threshold.

use std::collections::BTreeMap;

use crate::sap::sched::NO_SINR;
use crate::sap::Rnti;

/// Decrement every timer; drop the entries whose timer already hit zero.
fn refresh_timers<V>(
    values: &mut BTreeMap<Rnti, V>,
    timers: &mut BTreeMap<Rnti, u32>,
) -> Vec<Rnti> {
    let mut evicted = Vec::new();
    timers.retain(|rnti, timer| {
        if *timer == 0 {
            evicted.push(*rnti);
            false
        } else {
            *timer -= 1;
            true
        }
    });
    for rnti in &evicted {
        values.remove(rnti);
    }
    evicted
}

// ── Downlink ──────────────────────────────────────────────────────────────────

/// Periodic wideband (P10) and aperiodic subband (A30) DL CQI.
#[derive(Debug, Default)]
pub struct DlCqiTables {
    threshold: u32,
    p10: BTreeMap<Rnti, u8>,
    p10_timers: BTreeMap<Rnti, u32>,
    /// `[rbg][layer]`.
    a30: BTreeMap<Rnti, Vec<Vec<u8>>>,
    a30_timers: BTreeMap<Rnti, u32>,
}

impl DlCqiTables {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }

    pub fn update_wideband(&mut self, rnti: Rnti, cqi: u8) {
        self.p10.insert(rnti, cqi);
        self.p10_timers.insert(rnti, self.threshold);
    }

    pub fn update_subband(&mut self, rnti: Rnti, sb_cqi: Vec<Vec<u8>>) {
        self.a30.insert(rnti, sb_cqi);
        self.a30_timers.insert(rnti, self.threshold);
    }

    /// Returns the RNTIs whose wideband or subband report was evicted.
    pub fn refresh(&mut self) -> Vec<Rnti> {
        let mut evicted = refresh_timers(&mut self.p10, &mut self.p10_timers);
        evicted.extend(refresh_timers(&mut self.a30, &mut self.a30_timers));
        evicted
    }

    pub fn wideband(&self, rnti: Rnti) -> Option<u8> {
        self.p10.get(&rnti).copied()
    }

    /// Subband CQI of one RBG and layer; a missing layer falls back to the
    /// first one.
    pub fn subband(&self, rnti: Rnti, rbg: usize, layer: usize) -> Option<u8> {
        let layers = self.a30.get(&rnti)?.get(rbg)?;
        layers.get(layer).or_else(|| layers.first()).copied()
    }

    pub fn remove(&mut self, rnti: Rnti) {
        self.p10.remove(&rnti);
        self.p10_timers.remove(&rnti);
        self.a30.remove(&rnti);
        self.a30_timers.remove(&rnti);
    }

    /// Number of UEs with a live report of either kind.
    pub fn len(&self) -> usize {
        self.p10
            .keys()
            .chain(self.a30.keys().filter(|r| !self.p10.contains_key(r)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.p10.is_empty() && self.a30.is_empty()
    }
}

// ── Uplink ────────────────────────────────────────────────────────────────────

/// Per-RB UL SINR (dB) per UE.  RBs never measured hold [`NO_SINR`].
#[derive(Debug, Default)]
pub struct UlCqiTable {
    threshold: u32,
    ul_bandwidth: usize,
    sinr: BTreeMap<Rnti, Vec<f64>>,
    timers: BTreeMap<Rnti, u32>,
}

impl UlCqiTable {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }

    pub fn set_bandwidth(&mut self, ul_bandwidth: u16) {
        self.ul_bandwidth = ul_bandwidth as usize;
    }

    /// Replace the whole vector (SRS).
    pub fn replace(&mut self, rnti: Rnti, mut sinr: Vec<f64>) {
        sinr.resize(self.ul_bandwidth.max(sinr.len()), NO_SINR);
        self.sinr.insert(rnti, sinr);
        self.timers.insert(rnti, self.threshold);
    }

    /// Update one RB (PUSCH), creating the vector on first use.
    pub fn set_rb(&mut self, rnti: Rnti, rb: usize, sinr: f64) {
        let len = self.ul_bandwidth.max(rb + 1);
        let entry = self.sinr.entry(rnti).or_insert_with(|| vec![NO_SINR; len]);
        if entry.len() <= rb {
            entry.resize(rb + 1, NO_SINR);
        }
        entry[rb] = sinr;
        self.timers.insert(rnti, self.threshold);
    }

    pub fn refresh(&mut self) -> Vec<Rnti> {
        refresh_timers(&mut self.sinr, &mut self.timers)
    }

    pub fn contains(&self, rnti: Rnti) -> bool {
        self.sinr.contains_key(&rnti)
    }

    pub fn snapshot(&self) -> &BTreeMap<Rnti, Vec<f64>> {
        &self.sinr
    }

    /// SINR of one RB; unmeasured RBs are estimated as the mean of the
    /// measured ones (or `f64::MAX` without any sample) and the estimate is
    /// stored back.  `None` when the UE has no report at all.
    pub fn sinr_or_estimate(&mut self, rnti: Rnti, rb: usize) -> Option<f64> {
        let samples = self.sinr.get_mut(&rnti)?;
        if let Some(&value) = samples.get(rb) {
            if value != NO_SINR {
                return Some(value);
            }
        }
        let known: Vec<f64> = samples.iter().copied().filter(|s| *s != NO_SINR).collect();
        let estimate = if known.is_empty() {
            f64::MAX
        } else {
            known.iter().sum::<f64>() / known.len() as f64
        };
        if let Some(slot) = samples.get_mut(rb) {
            *slot = estimate;
        }
        Some(estimate)
    }

    pub fn remove(&mut self, rnti: Rnti) {
        self.sinr.remove(&rnti);
        self.timers.remove(&rnti);
    }

    pub fn len(&self) -> usize {
        self.sinr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinr.is_empty()
    }
}
