//! Structural validation of module descriptors.
//!
//! Runs at registration time so that malformed ids, versions and patterns
//! are reported as `USER` errors then, never while routing a request.

use super::descriptor::{InterfaceReference, ModuleDescriptor};
use super::routing::{ProxyType, RoutingEntry};
use crate::error::GatewayError;
use crate::version::InterfaceVersion;
use std::collections::HashSet;

const KNOWN_METHODS: &[&str] = &[
    "GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "OPTIONS", "TRACE", "CONNECT",
];

impl ModuleDescriptor {
    /// Validate all structural invariants of this descriptor.
    ///
    /// Checks performed (in order):
    /// 1. The module id carries a version.
    /// 2. Every provided interface has an id, a parseable version list and
    ///    is declared only once.
    /// 3. Every routing entry passes [`RoutingEntry::validate`].
    /// 4. Every required and optional reference is well formed.
    pub fn validate(&self) -> Result<(), GatewayError> {
        let module = self.id.as_str();

        // ── 1. Versioned id ──────────────────────────────────────────────────
        if !self.id.has_semver() {
            return Err(GatewayError::user(format!(
                "Missing version component in module id '{module}'"
            )));
        }

        // ── 2. Provided interfaces ───────────────────────────────────────────
        let mut seen = HashSet::new();
        for interface in &self.provides {
            if interface.id.trim().is_empty() {
                return Err(GatewayError::user(format!(
                    "Module '{module}': provided interface with empty id"
                )));
            }
            InterfaceVersion::parse_list(&interface.version).map_err(|e| {
                GatewayError::user(format!(
                    "Module '{module}': interface '{}': {e}",
                    interface.id
                ))
            })?;
            if !seen.insert(interface.id.as_str()) {
                return Err(GatewayError::user(format!(
                    "Module '{module}': interface '{}' provided twice",
                    interface.id
                )));
            }

            // ── 3. Routing entries ───────────────────────────────────────────
            for entry in &interface.handlers {
                entry
                    .validate()
                    .map_err(|e| GatewayError::user(format!("Module '{module}': {e}")))?;
            }
        }
        for entry in &self.filters {
            entry
                .validate()
                .map_err(|e| GatewayError::user(format!("Module '{module}': {e}")))?;
        }

        // ── 4. Requirements ──────────────────────────────────────────────────
        for reference in self.requires.iter().chain(&self.optional) {
            validate_reference(reference)
                .map_err(|e| GatewayError::user(format!("Module '{module}': {e}")))?;
        }
        Ok(())
    }
}

fn validate_reference(reference: &InterfaceReference) -> Result<(), String> {
    if reference.id.trim().is_empty() {
        return Err("required interface with empty id".to_string());
    }
    InterfaceVersion::parse_list(&reference.version)
        .map(|_| ())
        .map_err(|e| format!("required interface '{}': {e}", reference.id))
}

impl RoutingEntry {
    /// Check methods, pattern syntax and redirect consistency.
    pub fn validate(&self) -> Result<(), String> {
        let pattern = self.pattern_text().to_string();
        if self.methods.is_empty() {
            return Err(format!("routing entry '{pattern}' has no methods"));
        }
        for method in &self.methods {
            if method != "*" && !KNOWN_METHODS.contains(&method.to_ascii_uppercase().as_str()) {
                return Err(format!("routing entry '{pattern}': unknown method '{method}'"));
            }
        }
        if self.path.is_some() && self.path_pattern.is_some() {
            return Err(format!(
                "routing entry '{pattern}' sets both path and pathPattern"
            ));
        }
        self.segments()?;

        match (self.proxy_type, &self.redirect_path) {
            (ProxyType::Redirect, None) => Err(format!(
                "redirect entry '{pattern}' is missing redirectPath"
            )),
            (ProxyType::Redirect, Some(target)) if !target.starts_with('/') => Err(format!(
                "redirect entry '{pattern}': redirectPath '{target}' must start with '/'"
            )),
            (ProxyType::Redirect, Some(_)) if self.phase.is_some() => Err(format!(
                "redirect entry '{pattern}' cannot be a filter"
            )),
            (other, Some(_)) if other != ProxyType::Redirect => Err(format!(
                "routing entry '{pattern}': redirectPath requires type redirect"
            )),
            _ => Ok(()),
        }
    }
}
