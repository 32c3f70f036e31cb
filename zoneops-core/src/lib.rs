//! The zone reconciliation engine.
//!
//! A lifecycle action (see [`lifecycle::Action`]) probes the live zone through an
//! [`executor::Executor`], parses `zonecfg info` into [`props::ZoneProps`], builds
//! the same shape from a [`declaration::ZoneDeclaration`], and issues the
//! `zonecfg`/`zoneadm` commands that close the gap.

pub mod collaborators;
pub mod declaration;
pub mod error;
pub mod executor;
pub mod lifecycle;
pub mod parse;
pub mod probe;
pub mod props;
pub mod reconcile;

#[cfg(test)]
pub(crate) mod testing;

pub use error::Error;
