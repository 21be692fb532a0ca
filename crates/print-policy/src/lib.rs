//! Print job billing and access policy.
//!
//! The print management server calls into this crate twice per job: once at
//! submission and once after a billing account has been chosen. Each call runs
//! a fixed pipeline of rules against a read-only snapshot of the job and drives
//! the server through the [`HostActions`](workflows::print_job::HostActions)
//! seam.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
