// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Label selector parsing and matching.
//!
//! This module implements the standard Kubernetes label-selector string
//! syntax used by the `selector` annotation (node targeting) and by the
//! `--annotation-filter` flag (service filtering):
//!
//! - `key=value`, `key==value`, `key!=value`
//! - `key in (v1,v2)`, `key notin (v1,v2)`
//! - `key` (exists), `!key` (does not exist)
//!
//! Requirements are comma-separated and all must hold. An empty selector
//! matches everything.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Raised when a selector string does not follow the label-selector syntax.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid label selector {selector:?}: {reason}")]
pub struct SelectorParseError {
    pub selector: String,
    pub reason: String,
}

/// The set-based plus equality-based selector operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Equals,
    NotEquals,
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

/// A single parsed requirement, e.g. `env in (prod,staging)`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Requirement {
    key: String,
    operator: Operator,
    values: Vec<String>,
}

impl Requirement {
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self.operator {
            // Label must exist and value must be in the set
            Operator::Equals | Operator::In => labels
                .get(&self.key)
                .is_some_and(|v| self.values.contains(v)),
            // If label doesn't exist, it passes
            Operator::NotEquals | Operator::NotIn => labels
                .get(&self.key)
                .is_none_or(|v| !self.values.contains(v)),
            Operator::Exists => labels.contains_key(&self.key),
            Operator::DoesNotExist => !labels.contains_key(&self.key),
        }
    }
}

/// A parsed label selector: a conjunction of requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

impl Selector {
    /// Parse a label-selector string. Empty input yields the empty selector.
    ///
    /// # Errors
    ///
    /// Returns [`SelectorParseError`] on malformed requirements.
    pub fn parse(selector: &str) -> Result<Self, SelectorParseError> {
        let mut requirements = Vec::new();
        for part in split_requirements(selector) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            requirements.push(parse_requirement(part).map_err(|reason| SelectorParseError {
                selector: selector.to_owned(),
                reason,
            })?);
        }
        Ok(Self { requirements })
    }

    /// An empty selector matches everything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Check whether a label set satisfies every requirement.
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|req| req.matches(labels))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .requirements
            .iter()
            .map(|req| match req.operator {
                Operator::Equals => format!("{}={}", req.key, req.values[0]),
                Operator::NotEquals => format!("{}!={}", req.key, req.values[0]),
                Operator::In => format!("{} in ({})", req.key, req.values.join(",")),
                Operator::NotIn => format!("{} notin ({})", req.key, req.values.join(",")),
                Operator::Exists => req.key.clone(),
                Operator::DoesNotExist => format!("!{}", req.key),
            })
            .collect();
        f.write_str(&parts.join(","))
    }
}

/// Split a selector on top-level commas, leaving `in (a,b)` value lists
/// intact.
fn split_requirements(selector: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in selector.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&selector[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&selector[start..]);
    parts
}

fn parse_requirement(part: &str) -> Result<Requirement, String> {
    if let Some(key) = part.strip_prefix('!') {
        let key = key.trim();
        validate_key(key)?;
        return Ok(Requirement {
            key: key.to_owned(),
            operator: Operator::DoesNotExist,
            values: Vec::new(),
        });
    }

    // Set-based operators carry a parenthesized value list.
    for (token, operator) in [(" notin ", Operator::NotIn), (" in ", Operator::In)] {
        if let Some(idx) = part.find(token) {
            let key = part[..idx].trim();
            validate_key(key)?;
            let rest = part[idx + token.len()..].trim();
            let inner = rest
                .strip_prefix('(')
                .and_then(|r| r.strip_suffix(')'))
                .ok_or_else(|| format!("expected parenthesized values after {:?}", token.trim()))?;
            let values: Vec<String> = inner
                .split(',')
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
                .collect();
            return Ok(Requirement {
                key: key.to_owned(),
                operator,
                values,
            });
        }
    }

    // "!=" must be checked before "=" / "==".
    if let Some((key, value)) = part.split_once("!=") {
        let key = key.trim();
        validate_key(key)?;
        return Ok(Requirement {
            key: key.to_owned(),
            operator: Operator::NotEquals,
            values: vec![value.trim().to_owned()],
        });
    }
    if let Some((key, value)) = part.split_once('=') {
        let key = key.trim();
        validate_key(key)?;
        let value = value.trim_start_matches('=');
        return Ok(Requirement {
            key: key.to_owned(),
            operator: Operator::Equals,
            values: vec![value.trim().to_owned()],
        });
    }

    let key = part.trim();
    validate_key(key)?;
    Ok(Requirement {
        key: key.to_owned(),
        operator: Operator::Exists,
        values: Vec::new(),
    })
}

fn validate_key(key: &str) -> Result<(), String> {
    if key.is_empty() {
        return Err("empty key".to_owned());
    }
    if key.contains(|c: char| c.is_whitespace() || c == '(' || c == ')' || c == ',') {
        return Err(format!("invalid key {key:?}"));
    }
    Ok(())
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod selector_tests;
