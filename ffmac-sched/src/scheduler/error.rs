/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error type for the MAC scheduler SAPs.
//!
//! Every CSCHED/SCHED provider call returns `Result<(), SchedulerError>`.
//! The variants split into three groups:
//!
//! | Group | Variants | Raised |
//! |---|---|---|
//! | Configuration | `Config`, `CellAlreadyConfigured`, `FfrBandwidthMismatch`, `UnknownAlgorithm` | at configuration time |
//! | Contract violation | `CellNotConfigured`, `UnknownRnti`, `UeAlreadyConfigured`, `UnknownLogicalChannel`, `InvalidHarqProcess`, `MissingSrsRnti`, `SapNotConnected` | when the MAC breaks the CSCHED/SCHED ordering |
//! | Unsupported | `NotImplemented` | on an intentionally unsupported request |
//!
//! Transient radio anomalies (stale CQI, RACH collisions, HARQ timeouts) are
//! handled inside the scheduler and never surface here.
//!
//! A rejected call leaves the scheduler state unchanged.

use thiserror::Error;

use crate::carrier::ConfigError;
use crate::sap::{Lcid, Rnti};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerError {
    /// Bandwidth or carrier parameters rejected by [`crate::carrier`].
    #[error("invalid cell configuration: {0}")]
    Config(#[from] ConfigError),

    /// A second `CSCHED_CELL_CONFIG_REQ`; cell reconfiguration is unsupported.
    #[error("cell is already configured, reconfiguration is not supported")]
    CellAlreadyConfigured,

    #[error("cell is not configured")]
    CellNotConfigured,

    #[error("RNTI {rnti} is not configured")]
    UnknownRnti { rnti: Rnti },

    /// A non-reconfiguring UE config for an RNTI that already exists.
    #[error("RNTI {rnti} is already configured")]
    UeAlreadyConfigured { rnti: Rnti },

    #[error("logical channel {lcid} of RNTI {rnti} is not configured")]
    UnknownLogicalChannel { rnti: Rnti, lcid: Lcid },

    #[error("HARQ process {harq_process} of RNTI {rnti} is out of range")]
    InvalidHarqProcess { rnti: Rnti, harq_process: u8 },

    #[error("{operation} is not implemented")]
    NotImplemented { operation: &'static str },

    /// The FFR policy was built for a different resource grid.
    #[error("FFR {direction} availability has {actual} entries, the cell has {expected}")]
    FfrBandwidthMismatch {
        direction: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("SRS UL CQI report carries no RNTI")]
    MissingSrsRnti,

    #[error("{sap} SAP user is not connected")]
    SapNotConnected { sap: &'static str },

    #[error("unknown scheduling algorithm: '{0}' (valid: cqa, fdbet, tdbet, tta)")]
    UnknownAlgorithm(String),
}
