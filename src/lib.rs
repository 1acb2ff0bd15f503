//! Request defense and telemetry substrate for a property-management platform.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────┐
//!                    │                 DEFENSE SERVER                    │
//!                    │                                                   │
//!   Client Request   │  ┌─────────┐   ┌──────────┐   ┌──────────────┐  │
//!   ─────────────────┼─▶│  http   │──▶│ security │──▶│    auth      │  │
//!                    │  │ server  │   │ pipeline │   │ gate + rbac  │  │
//!                    │  └─────────┘   └────┬─────┘   └──────┬───────┘  │
//!                    │                     │                 │          │
//!                    │                     ▼                 ▼          │
//!                    │              ┌────────────────────────────┐      │
//!                    │              │     application routes     │      │
//!                    │              └────────────────────────────┘      │
//!                    │                                                   │
//!                    │  ┌────────────────────────────────────────────┐  │
//!                    │  │            Cross-Cutting Concerns           │  │
//!                    │  │  ┌────────┐ ┌───────────┐ ┌─────────────┐  │  │
//!                    │  │  │ config │ │ telemetry │ │observability│  │  │
//!                    │  │  │        │ │ monitors  │ │ logs+metrics│  │  │
//!                    │  │  └────────┘ └─────┬─────┘ └─────────────┘  │  │
//!                    │  │             ┌─────┴─────┐  ┌────────────┐  │  │
//!                    │  │             │   store   │  │   admin    │  │  │
//!                    │  │             │ (bounded) │  │  surface   │  │  │
//!                    │  │             └───────────┘  └────────────┘  │  │
//!                    │  └────────────────────────────────────────────┘  │
//!                    └──────────────────────────────────────────────────┘
//! ```
//!
//! Every request passes the defense chain in a fixed order: block check,
//! request log, origin check, rate limit, validation and sanitization,
//! authentication, authorization. The telemetry monitors (faults, critical
//! events, navigation) share one bounded time-windowed store core and feed
//! the admin surface.

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod store;

// Defense chain
pub mod auth;
pub mod security;

// Telemetry monitors
pub mod telemetry;

// Cross-cutting concerns
pub mod admin;
pub mod observability;

pub use config::GuardConfig;
pub use error::Rejection;
pub use http::{AppState, DefenseServer};
