/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! HARQ bookkeeping.
//!
//! # Downlink
//! Every UE owns [`HARQ_PROC_NUM`] asynchronous processes.  A process is
//! in flight from its first transmission until an ACK, a drop after the last
//! redundancy version, or [`HARQ_DL_TIMEOUT`] subframes without feedback.
//! The per-UE entities live in one arena ([`DlHarqTable`]) indexed by RNTI,
//! so a refresh walks a single contiguous vector.
//!
//! # Uplink
//! UL HARQ is synchronous: the process id is not chosen but follows the
//! subframe.  [`UlHarqEntity`] keeps one cursor per UE that advances every
//! UL trigger; feedback received now refers to the process used
//! [`HARQ_PERIOD`] triggers ago.

use std::collections::BTreeMap;

use crate::sap::sched::{DlDciListElement, RlcPduListElement, UlDciListElement};
use crate::sap::Rnti;

// ── Constants ─────────────────────────────────────────────────────────────────

pub const HARQ_PROC_NUM: usize = 8;

/// Subframes after which an unacknowledged DL process is force-freed.
pub const HARQ_DL_TIMEOUT: u8 = 11;

/// UL triggers between a PUSCH grant and the feedback for it.
pub const HARQ_PERIOD: usize = 7;

/// Highest redundancy version; a NACK beyond it drops the transport block.
pub const MAX_DL_RV: u8 = 3;

/// UL attempts after which a NACKed transport block is dropped.
pub const MAX_UL_ATTEMPTS: u8 = 3;

// ── Downlink ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct DlHarqProcess {
    /// 0 = free, otherwise the number of transmissions so far.
    pub status: u8,
    /// Subframes since the last transmission.
    pub timer: u8,
    pub dci: Option<DlDciListElement>,
    /// Buffered PDUs, `[lc][layer]`.
    pub rlc_pdus: Vec<Vec<RlcPduListElement>>,
}

impl DlHarqProcess {
    pub fn is_free(&self) -> bool {
        self.status == 0
    }

    pub fn is_available(&self) -> bool {
        self.status == 0 || self.timer >= HARQ_DL_TIMEOUT
    }

    /// In flight but past the feedback deadline.
    pub fn has_timed_out(&self) -> bool {
        self.status != 0 && self.timer >= HARQ_DL_TIMEOUT
    }

    pub fn release(&mut self) {
        *self = Self::default();
    }

    /// Start a new transmission on this process.
    pub fn start(&mut self, dci: DlDciListElement, rlc_pdus: Vec<Vec<RlcPduListElement>>) {
        self.status = 1;
        self.timer = 0;
        self.dci = Some(dci);
        self.rlc_pdus = rlc_pdus;
    }
}

#[derive(Debug, Clone, Default)]
struct DlHarqEntity {
    current: u8,
    processes: [DlHarqProcess; HARQ_PROC_NUM],
}

/// Arena of per-UE DL HARQ entities.
#[derive(Debug, Default)]
pub struct DlHarqTable {
    slots: Vec<DlHarqEntity>,
    index: BTreeMap<Rnti, usize>,
    free: Vec<usize>,
}

impl DlHarqTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh entity for `rnti`, reusing a released slot if any.
    pub fn insert(&mut self, rnti: Rnti) {
        if let Some(&slot) = self.index.get(&rnti) {
            self.slots[slot] = DlHarqEntity::default();
            return;
        }
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = DlHarqEntity::default();
                slot
            }
            None => {
                self.slots.push(DlHarqEntity::default());
                self.slots.len() - 1
            }
        };
        self.index.insert(rnti, slot);
    }

    pub fn remove(&mut self, rnti: Rnti) -> bool {
        match self.index.remove(&rnti) {
            Some(slot) => {
                self.slots[slot] = DlHarqEntity::default();
                self.free.push(slot);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, rnti: Rnti) -> bool {
        self.index.contains_key(&rnti)
    }

    pub fn process(&self, rnti: Rnti, id: u8) -> Option<&DlHarqProcess> {
        let slot = *self.index.get(&rnti)?;
        self.slots[slot].processes.get(id as usize)
    }

    pub fn process_mut(&mut self, rnti: Rnti, id: u8) -> Option<&mut DlHarqProcess> {
        let slot = *self.index.get(&rnti)?;
        self.slots[slot].processes.get_mut(id as usize)
    }

    /// Whether `rnti` has at least one process that may carry new data.
    pub fn is_available(&self, rnti: Rnti) -> bool {
        self.index
            .get(&rnti)
            .is_some_and(|&slot| self.slots[slot].processes.iter().any(|p| p.is_available()))
    }

    /// Move the UE's current process to the next available one, searching
    /// cyclically from `current + 1`, and return its id.
    pub fn update_process_id(&mut self, rnti: Rnti) -> Option<u8> {
        let slot = *self.index.get(&rnti)?;
        let entity = &mut self.slots[slot];
        for step in 1..=HARQ_PROC_NUM {
            let id = (entity.current as usize + step) % HARQ_PROC_NUM;
            if entity.processes[id].is_available() {
                entity.processes[id].release();
                entity.current = id as u8;
                return Some(id as u8);
            }
        }
        None
    }

    /// Age every in-flight process by one subframe; free the ones that hit
    /// the timeout.  Returns the `(rnti, process)` pairs that were freed.
    pub fn refresh(&mut self) -> Vec<(Rnti, u8)> {
        let mut expired = Vec::new();
        for (&rnti, &slot) in &self.index {
            for (id, process) in self.slots[slot].processes.iter_mut().enumerate() {
                if process.is_free() {
                    continue;
                }
                if process.timer >= HARQ_DL_TIMEOUT {
                    process.release();
                    expired.push((rnti, id as u8));
                } else {
                    process.timer += 1;
                }
            }
        }
        expired
    }
}

// ── Uplink ────────────────────────────────────────────────────────────────────

/// Outcome of a UL NACK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UlRetx {
    /// Nothing was granted on the referenced process.
    NoContext,
    /// The transport block exhausted its attempts and was dropped.
    Dropped,
    /// Re-grant this DCI on the current process.
    Retransmit(UlDciListElement),
}

#[derive(Debug, Clone, Default)]
pub struct UlHarqEntity {
    current: u8,
    status: [u8; HARQ_PROC_NUM],
    dci: [Option<UlDciListElement>; HARQ_PROC_NUM],
}

impl UlHarqEntity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u8 {
        self.current
    }

    /// Process the feedback received this trigger refers to.
    pub fn retx_process_id(&self) -> u8 {
        ((self.current as usize + HARQ_PROC_NUM - HARQ_PERIOD) % HARQ_PROC_NUM) as u8
    }

    pub fn attempts(&self, id: u8) -> u8 {
        self.status[id as usize % HARQ_PROC_NUM]
    }

    /// Record a first transmission on the current process.
    pub fn store(&mut self, dci: UlDciListElement) {
        let cur = self.current as usize;
        self.status[cur] = 0;
        self.dci[cur] = Some(dci);
    }

    /// Handle a NACK: move the referenced transport block onto the current
    /// process, or drop it once it ran out of attempts.
    pub fn prepare_retx(&mut self) -> UlRetx {
        let harq_id = self.retx_process_id() as usize;
        let cur = self.current as usize;
        let Some(dci) = self.dci[harq_id].clone() else {
            return UlRetx::NoContext;
        };
        if self.status[harq_id] >= MAX_UL_ATTEMPTS {
            self.status[harq_id] = 0;
            self.dci[harq_id] = None;
            return UlRetx::Dropped;
        }
        self.status[cur] = self.status[harq_id] + 1;
        self.status[harq_id] = 0;
        if harq_id != cur {
            self.dci[harq_id] = None;
        }
        self.dci[cur] = Some(dci.clone());
        UlRetx::Retransmit(dci)
    }

    /// Handle an ACK: the referenced transport block is delivered.
    pub fn ack(&mut self) {
        let harq_id = self.retx_process_id() as usize;
        self.status[harq_id] = 0;
        self.dci[harq_id] = None;
    }

    pub fn advance(&mut self) {
        self.current = ((self.current as usize + 1) % HARQ_PROC_NUM) as u8;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn occupy_all(table: &mut DlHarqTable, rnti: Rnti) {
        for id in 0..HARQ_PROC_NUM as u8 {
            table
                .process_mut(rnti, id)
                .unwrap()
                .start(DlDciListElement::default(), Vec::new());
        }
    }

    #[test]
    fn timed_out_process_becomes_assignable_again() {
        let mut table = DlHarqTable::new();
        table.insert(7);
        occupy_all(&mut table, 7);
        assert!(!table.is_available(7));
        assert_eq!(table.update_process_id(7), None);

        for _ in 0..HARQ_DL_TIMEOUT {
            assert!(table.refresh().is_empty());
        }
        // timer reached the timeout: available, and the next refresh frees it
        assert!(table.process(7, 3).unwrap().is_available());
        let expired = table.refresh();
        assert_eq!(expired.len(), HARQ_PROC_NUM);
        assert!(table.process(7, 3).unwrap().is_free());
        assert_eq!(table.update_process_id(7), Some(1));
    }

    #[test]
    fn process_id_search_is_cyclic_from_current() {
        let mut table = DlHarqTable::new();
        table.insert(1);
        assert_eq!(table.update_process_id(1), Some(1));
        table.process_mut(1, 1).unwrap().start(DlDciListElement::default(), Vec::new());
        table.process_mut(1, 2).unwrap().start(DlDciListElement::default(), Vec::new());
        assert_eq!(table.update_process_id(1), Some(3));
        for id in 4..HARQ_PROC_NUM as u8 {
            table.process_mut(1, id).unwrap().start(DlDciListElement::default(), Vec::new());
        }
        // wraps past 7 back to 0
        assert_eq!(table.update_process_id(1), Some(0));
    }

    #[test]
    fn removed_slots_are_reused() {
        let mut table = DlHarqTable::new();
        table.insert(1);
        table.insert(2);
        occupy_all(&mut table, 1);
        assert!(table.remove(1));
        assert!(!table.remove(1));
        assert_eq!(table.len(), 1);
        table.insert(3);
        assert_eq!(table.len(), 2);
        assert_eq!(table.slots.len(), 2);
        assert!(table.process(3, 0).unwrap().is_free());
        assert!(table.process(1, 0).is_none());
        assert!(table.process(3, HARQ_PROC_NUM as u8).is_none());
    }

    #[test]
    fn ul_feedback_refers_to_process_used_seven_triggers_ago() {
        let mut ul = UlHarqEntity::new();
        let dci = UlDciListElement {
            rnti: 4,
            rb_start: 2,
            rb_len: 3,
            ..Default::default()
        };
        ul.store(dci.clone());
        for _ in 0..HARQ_PERIOD {
            ul.advance();
        }
        assert_eq!(ul.retx_process_id(), 0);
        assert_eq!(ul.prepare_retx(), UlRetx::Retransmit(dci));
        assert_eq!(ul.attempts(ul.current()), 1);
        assert_eq!(ul.attempts(0), 0);
    }

    #[test]
    fn ul_ack_forgets_the_transport_block() {
        let mut ul = UlHarqEntity::new();
        ul.store(UlDciListElement {
            rnti: 4,
            rb_len: 3,
            ..Default::default()
        });
        for _ in 0..HARQ_PERIOD {
            ul.advance();
        }
        ul.ack();
        assert_eq!(ul.attempts(0), 0);
        // a later NACK landing on the same process has nothing to resend
        for _ in 0..HARQ_PROC_NUM {
            ul.advance();
        }
        assert_eq!(ul.retx_process_id(), 0);
        assert_eq!(ul.prepare_retx(), UlRetx::NoContext);
    }

    #[test]
    fn ul_block_is_dropped_after_max_attempts() {
        let mut ul = UlHarqEntity::new();
        ul.store(UlDciListElement::default());
        let mut outcomes = Vec::new();
        for _ in 0..4 {
            for _ in 0..HARQ_PERIOD {
                ul.advance();
            }
            outcomes.push(ul.prepare_retx());
        }
        assert!(matches!(outcomes[0], UlRetx::Retransmit(_)));
        assert!(matches!(outcomes[1], UlRetx::Retransmit(_)));
        assert!(matches!(outcomes[2], UlRetx::Retransmit(_)));
        assert_eq!(outcomes[3], UlRetx::Dropped);
        assert_eq!(ul.prepare_retx(), UlRetx::NoContext);
    }
}
