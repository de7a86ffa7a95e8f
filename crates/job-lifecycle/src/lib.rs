/*
 * 5D Labs Agent Platform - Job Lifecycle Core
 * Copyright (C) 2025 5D Labs
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 */

#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc, clippy::doc_markdown)]

//! Job lifecycle core
//!
//! Kind-agnostic lifecycle primitives for distributed training jobs: clean-pod
//! policy enforcement, backoff limits, active deadlines and TTL-based deletion
//! of finished jobs. Each job kind plugs in through a [`JobAdapter`].

pub mod adapter;
pub mod api;
pub mod backoff;
pub mod classify;
pub mod cleanup;
pub mod config;
pub mod controller;
pub mod deadline;
pub mod error;
pub mod finalize;
pub mod labels;
pub mod status;
pub mod telemetry;
pub mod template;

// Re-export commonly used types
pub use adapter::{JobAdapter, KubeJobAdapter};
pub use api::{CleanPodPolicy, JobStatus, ReplicaSpec, ReplicaSpecs, ReplicaType, RunPolicy};
pub use backoff::past_backoff_limit;
pub use cleanup::delete_pods_and_services;
pub use config::ControllerConfig;
pub use controller::{FailureReason, JobController, LifecycleDecision};
pub use deadline::past_active_deadline;
pub use error::{Error, Result};
pub use finalize::{cleanup_job, Finalization};
