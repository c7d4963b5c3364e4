/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! LTE FF MAC schedulers (Femto Forum MAC Scheduler Interface).
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── sap/        – CSCHED / SCHED SAP parameter types and traits
//! ├── carrier/    – component carrier descriptor and validation
//! ├── amc/        – CQI → MCS → TB size service
//! ├── ffr/        – frequency reuse policies (FFR SAP)
//! ├── scheduler/  – MacScheduler skeleton, HARQ/CQI tables, CQA/FDBET/TDBET/TTA
//! └── config/     – YAML run configuration for the simulation driver
//! ```

pub mod amc;
pub mod carrier;
pub mod config;
pub mod ffr;
pub mod sap;
pub mod scheduler;
