// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tenant namespaces.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Metadata key carrying the namespace on every published message.
pub const NAMESPACE_KEY: &str = "namespace";

/// Identifier of a tenant-isolated execution scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamespaceId(pub String);

impl NamespaceId {
	pub fn new(name: impl Into<String>) -> Self {
		Self(name.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for NamespaceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for NamespaceId {
	fn from(s: &str) -> Self {
		Self(s.to_string())
	}
}

/// Build the message metadata for a namespace.
pub fn namespace_metadata(namespace: &NamespaceId) -> HashMap<String, String> {
	HashMap::from([(NAMESPACE_KEY.to_string(), namespace.0.clone())])
}
