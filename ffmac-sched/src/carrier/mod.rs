/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Component-carrier descriptors.
//!
//! A [`ComponentCarrier`] is a plain validated value: bandwidths, EARFCNs,
//! closed-subscriber-group settings and the primary flag.  The eNB side wraps
//! it in an [`EnbComponentCarrier`] that adds the cell identifier and the
//! scheduler instance serving that carrier.
//!
//! Every setter validates its argument and refuses to store an invalid value,
//! so a constructed carrier is always consistent.

use thiserror::Error;

use crate::scheduler::FfMacScheduler;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Bandwidths (resource blocks) defined by TS 36.101 Table 5.6-1.
pub const VALID_BANDWIDTHS: [u16; 6] = [6, 15, 25, 50, 75, 100];

/// TS 36.101 5.7.3.
pub const MAX_EARFCN: u32 = 262_143;
pub const MIN_UL_EARFCN: u32 = 18_000;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Carrier configuration rejected at configuration time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid bandwidth {value} RBs (valid: 6, 15, 25, 50, 75, 100)")]
    InvalidBandwidth { value: u16 },

    #[error("invalid DL EARFCN {value} (valid: 0..=262143)")]
    InvalidDlEarfcn { value: u32 },

    #[error("invalid UL EARFCN {value} (valid: 18000..=262143)")]
    InvalidUlEarfcn { value: u32 },

    #[error("no primary component carrier configured")]
    NoPrimaryCarrier,

    #[error("{count} carriers flagged primary, exactly one is allowed")]
    MultiplePrimaryCarriers { count: usize },
}

pub fn validate_bandwidth(value: u16) -> Result<u16, ConfigError> {
    if VALID_BANDWIDTHS.contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::InvalidBandwidth { value })
    }
}

/// DL resource block group size for a bandwidth (TS 36.213 Table 7.1.6.1-1).
pub fn rbg_size(bandwidth: u16) -> u16 {
    match bandwidth {
        0..=10 => 1,
        11..=26 => 2,
        27..=63 => 3,
        _ => 4,
    }
}

/// Number of whole RBGs in a DL bandwidth.
pub fn rbg_count(bandwidth: u16) -> u16 {
    bandwidth / rbg_size(bandwidth)
}

// ── ComponentCarrier ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentCarrier {
    dl_bandwidth: u16,
    ul_bandwidth: u16,
    dl_earfcn: u32,
    ul_earfcn: u32,
    csg_id: u32,
    csg_indication: bool,
    primary: bool,
}

impl Default for ComponentCarrier {
    fn default() -> Self {
        Self {
            dl_bandwidth: 25,
            ul_bandwidth: 25,
            dl_earfcn: 100,
            ul_earfcn: 18_100,
            csg_id: 0,
            csg_indication: false,
            primary: false,
        }
    }
}

impl ComponentCarrier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dl_bandwidth(&self) -> u16 {
        self.dl_bandwidth
    }

    pub fn ul_bandwidth(&self) -> u16 {
        self.ul_bandwidth
    }

    pub fn dl_earfcn(&self) -> u32 {
        self.dl_earfcn
    }

    pub fn ul_earfcn(&self) -> u32 {
        self.ul_earfcn
    }

    pub fn csg_id(&self) -> u32 {
        self.csg_id
    }

    pub fn csg_indication(&self) -> bool {
        self.csg_indication
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn set_dl_bandwidth(&mut self, value: u16) -> Result<(), ConfigError> {
        self.dl_bandwidth = validate_bandwidth(value)?;
        Ok(())
    }

    pub fn set_ul_bandwidth(&mut self, value: u16) -> Result<(), ConfigError> {
        self.ul_bandwidth = validate_bandwidth(value)?;
        Ok(())
    }

    pub fn set_dl_earfcn(&mut self, value: u32) -> Result<(), ConfigError> {
        if value > MAX_EARFCN {
            return Err(ConfigError::InvalidDlEarfcn { value });
        }
        self.dl_earfcn = value;
        Ok(())
    }

    pub fn set_ul_earfcn(&mut self, value: u32) -> Result<(), ConfigError> {
        if !(MIN_UL_EARFCN..=MAX_EARFCN).contains(&value) {
            return Err(ConfigError::InvalidUlEarfcn { value });
        }
        self.ul_earfcn = value;
        Ok(())
    }

    pub fn set_csg(&mut self, csg_id: u32, csg_indication: bool) {
        self.csg_id = csg_id;
        self.csg_indication = csg_indication;
    }

    pub fn set_primary(&mut self, primary: bool) {
        self.primary = primary;
    }
}

/// Check that exactly one carrier of an eNB is primary and return its index.
pub fn validate_carrier_set(carriers: &[ComponentCarrier]) -> Result<usize, ConfigError> {
    let primaries: Vec<usize> = carriers
        .iter()
        .enumerate()
        .filter(|(_, cc)| cc.is_primary())
        .map(|(i, _)| i)
        .collect();
    match primaries.as_slice() {
        [] => Err(ConfigError::NoPrimaryCarrier),
        [index] => Ok(*index),
        _ => Err(ConfigError::MultiplePrimaryCarriers {
            count: primaries.len(),
        }),
    }
}

// ── eNB side ──────────────────────────────────────────────────────────────────

/// A carrier as seen by the eNB: descriptor, cell id and its MAC scheduler.
pub struct EnbComponentCarrier {
    pub carrier: ComponentCarrier,
    pub cell_id: u16,
    pub scheduler: Box<dyn FfMacScheduler>,
}

impl EnbComponentCarrier {
    pub fn new(carrier: ComponentCarrier, cell_id: u16, scheduler: Box<dyn FfMacScheduler>) -> Self {
        Self {
            carrier,
            cell_id,
            scheduler,
        }
    }

    pub fn is_primary(&self) -> bool {
        self.carrier.is_primary()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
