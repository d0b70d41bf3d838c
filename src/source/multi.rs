// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Source combinator.

use anyhow::Result;
use async_trait::async_trait;

use super::{DesiredBundle, Source};

/// A [`Source`] that merges the bundles of its nested sources by
/// concatenation.
pub struct MultiSource {
    children: Vec<Box<dyn Source>>,
}

impl MultiSource {
    #[must_use]
    pub fn new(children: Vec<Box<dyn Source>>) -> Self {
        Self { children }
    }
}

#[async_trait]
impl Source for MultiSource {
    async fn bundle(&self) -> Result<DesiredBundle> {
        let mut result = DesiredBundle::default();
        for child in &self.children {
            let bundle = child.bundle().await?;
            result.endpoints.extend(bundle.endpoints);
            result.rule_sets.extend(bundle.rule_sets);
            result.service_ext_ips.extend(bundle.service_ext_ips);
        }
        Ok(result)
    }
}
