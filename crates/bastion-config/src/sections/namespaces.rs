// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tenant namespaces served by this worker.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NamespacesConfigLayer {
	#[serde(default)]
	pub names: Option<Vec<String>>,
}

impl NamespacesConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.names.is_some() {
			self.names = other.names;
		}
	}

	/// Names are trimmed; blanks and repeats are dropped, first occurrence wins.
	pub fn finalize(self) -> NamespacesConfig {
		let mut names: Vec<String> = Vec::new();
		for name in self.names.unwrap_or_else(|| vec!["default".to_string()]) {
			let name = name.trim();
			if !name.is_empty() && !names.iter().any(|n| n == name) {
				names.push(name.to_string());
			}
		}
		NamespacesConfig { names }
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamespacesConfig {
	pub names: Vec<String>,
}

impl Default for NamespacesConfig {
	fn default() -> Self {
		Self {
			names: vec!["default".to_string()],
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_namespace() {
		assert_eq!(NamespacesConfigLayer::default().finalize(), NamespacesConfig::default());
	}

	#[test]
	fn test_finalize_cleans_names() {
		let layer = NamespacesConfigLayer {
			names: Some(vec![
				" acme ".to_string(),
				"".to_string(),
				"globex".to_string(),
				"acme".to_string(),
			]),
		};
		assert_eq!(layer.finalize().names, vec!["acme", "globex"]);
	}

	#[test]
	fn test_explicit_empty_list_stays_empty() {
		let layer = NamespacesConfigLayer { names: Some(vec![]) };
		assert!(layer.finalize().names.is_empty());
	}
}
