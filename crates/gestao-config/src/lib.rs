// gestao-config/src/lib.rs
// ============================================================================
// Module: Gestão 360 Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for gestao360.toml semantics.
// Dependencies: gestao-store, serde, toml
// ============================================================================

//! ## Overview
//! `gestao-config` defines the configuration model for the Gestão 360 record
//! service: store, schema cache, HTTP server and auth, diagnostics, and
//! logging. Validation is strict and fails closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
