/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Adaptive modulation and coding.
//!
//! The schedulers only need four mappings (CQI → MCS, MCS → transport block
//! size in both directions, spectral efficiency → CQI), consumed through the
//! [`Amc`] trait so a PHY model can inject exact link curves.  [`DefaultAmc`]
//! is a table-driven approximation built on the TS 36.213 CQI and MCS
//! spectral-efficiency tables.

/// Highest MCS index carrying data (29..31 are reserved for retransmissions).
pub const MAX_MCS: u8 = 28;

/// Highest CQI index.
pub const MAX_CQI: u8 = 15;

/// Target bit error rate used to map UL SINR to an equivalent CQI.
const UL_TARGET_BER: f64 = 0.00005;

/// Spectral efficiency (bit/s/Hz) per CQI index, TS 36.213 Table 7.2.3-1.
const CQI_EFFICIENCY: [f64; 16] = [
    0.0, 0.15, 0.23, 0.38, 0.6, 0.88, 1.18, 1.48, 1.91, 2.41, 2.73, 3.32, 3.9, 4.52, 5.12, 5.55,
];

/// Spectral efficiency per MCS index.
const MCS_EFFICIENCY: [f64; 32] = [
    0.15, 0.19, 0.23, 0.31, 0.38, 0.49, 0.6, 0.74, 0.88, 1.03, 1.18, 1.33, 1.48, 1.7, 1.91, 2.16,
    2.41, 2.57, 2.73, 3.03, 3.32, 3.61, 3.9, 4.21, 4.52, 4.82, 5.12, 5.33, 5.55, 0.0, 0.0, 0.0,
];

/// Data resource elements per PRB pair (12 subcarriers).
const DL_RE_PER_PRB: f64 = 12.0 * 11.0;
const UL_RE_PER_PRB: f64 = 12.0 * 12.0;

pub trait Amc: Send {
    fn mcs_from_cqi(&self, cqi: u8) -> u8;

    /// DL transport block size in bits for `nprb` resource blocks.
    fn dl_tb_size_bits(&self, mcs: u8, nprb: u16) -> u32;

    /// UL transport block size in bits for `nprb` resource blocks.
    fn ul_tb_size_bits(&self, mcs: u8, nprb: u16) -> u32;

    fn cqi_from_spectral_efficiency(&self, efficiency: f64) -> u8;

    /// Equivalent CQI of an UL SINR sample (dB).
    fn ul_cqi_from_sinr(&self, sinr_db: f64) -> u8 {
        let gap = -(5.0 * UL_TARGET_BER).ln() / 1.5;
        let efficiency = (1.0 + 10f64.powf(sinr_db / 10.0) / gap).log2();
        self.cqi_from_spectral_efficiency(efficiency)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAmc;

impl DefaultAmc {
    pub fn new() -> Self {
        Self
    }

    fn tb_bits(mcs: u8, nprb: u16, re_per_prb: f64) -> u32 {
        let eff = MCS_EFFICIENCY[mcs.min(MAX_MCS) as usize];
        let bits = (eff * re_per_prb * nprb as f64).floor() as u32;
        bits / 8 * 8
    }
}

impl Amc for DefaultAmc {
    fn mcs_from_cqi(&self, cqi: u8) -> u8 {
        let cqi_eff = CQI_EFFICIENCY[cqi.min(MAX_CQI) as usize];
        let mut mcs = 0u8;
        while mcs < MAX_MCS && MCS_EFFICIENCY[mcs as usize + 1] <= cqi_eff {
            mcs += 1;
        }
        mcs
    }

    fn dl_tb_size_bits(&self, mcs: u8, nprb: u16) -> u32 {
        Self::tb_bits(mcs, nprb, DL_RE_PER_PRB)
    }

    fn ul_tb_size_bits(&self, mcs: u8, nprb: u16) -> u32 {
        Self::tb_bits(mcs, nprb, UL_RE_PER_PRB)
    }

    fn cqi_from_spectral_efficiency(&self, efficiency: f64) -> u8 {
        let mut cqi = 0u8;
        while cqi < MAX_CQI && CQI_EFFICIENCY[cqi as usize + 1] < efficiency {
            cqi += 1;
        }
        cqi
    }
}
