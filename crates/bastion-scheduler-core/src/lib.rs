// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the bastion task scheduler.
//!
//! This crate carries the data shared between the scheduler engine and the
//! components around it:
//! - [`NamespaceId`] and the namespace metadata tag attached to every message
//! - [`Schedule`], the operator-defined recurring schedule, and its [`JobHash`]
//! - [`TriggeredMessage`], the envelope published when a stored schedule fires
//! - the catalog of built-in task actions in [`actions`]

pub mod actions;
pub mod error;
pub mod message;
pub mod namespace;
pub mod schedule;

pub use error::{Result, SchedulerCoreError};
pub use message::{timestamp_body, Metadata, TriggeredMessage};
pub use namespace::{namespace_metadata, NamespaceId, NAMESPACE_KEY};
pub use schedule::{JobHash, Schedule};
