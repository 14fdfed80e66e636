//! Polyglot Core Types and Definitions
//!
//! This crate provides the foundational types shared by the polyglot parser
//! and its consumers:
//!
//! - **Identifiers**: interned kernel names ([`identifier::Id`])
//! - **Schemas**: option tables for directives ([`schema`] module)
//! - **Directives**: the kernel/action registry and name resolution
//!   ([`directive`] module)

pub mod directive;
pub mod identifier;
pub mod schema;
