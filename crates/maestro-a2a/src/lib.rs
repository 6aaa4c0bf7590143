//! Agent-to-Agent (A2A) support for Maestro.
//!
//! Discovers remote agents through their published agent cards, keeps them in
//! a shared registry, and dispatches task messages to them in batch or SSE
//! streaming mode.
//!
//! # Main types
//!
//! - [`AgentRegistry`] — Process-wide cache of discovered external agents.
//! - [`ExternalAgent`] — A discovered remote agent keyed by its local alias.
//! - [`AgentCard`] — The raw capability descriptor published by an agent.
//! - [`A2aClient`] — Sends a message to an external agent and extracts its reply.
//! - [`RegistrySource`] — Where the registry bootstrap list comes from.
//! - [`A2aError`] — Protocol-level error types.

/// Agent card and external agent descriptors.
pub mod card;
/// Message dispatch to external agents.
pub mod client;
/// Registry bootstrap configuration.
pub mod config;
/// Agent card discovery protocol.
pub mod discovery;
/// A2A error types.
pub mod error;
/// Reply text extraction strategies.
pub mod extract;
/// Shared external-agent registry.
pub mod registry;

pub use card::{AgentCard, AgentSummary, ExternalAgent};
pub use client::{A2aClient, DispatchMode, HttpTimeouts};
pub use config::{AgentEndpointConfig, RegistryFileConfig, RegistrySource};
pub use error::A2aError;
pub use registry::AgentRegistry;
