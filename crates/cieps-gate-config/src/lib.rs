// crates/cieps-gate-config/src/lib.rs
// ============================================================================
// Module: CIEPS Gate Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for cieps-gate.toml semantics.
// Dependencies: cieps-gate-core, serde, toml
// ============================================================================

//! ## Overview
//! `cieps-gate-config` defines the configuration model for the CIEPS gate
//! service. It provides strict, fail-closed validation and converts validated
//! sections into the option types the core and server crates consume.
//!
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
