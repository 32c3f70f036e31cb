//! Diffing live against desired properties, and applying the difference with
//! `zonecfg`.
//!
//! [`plan`] is pure: it computes every mutation from one snapshot of both
//! sides. [`apply`] then issues them in order and stops at the first failure.
//! No re-probe happens in between, so a partially applied plan is picked up by
//! the next run, which diffs against whatever the zone looks like by then.

use std::collections::BTreeSet;
use std::fmt;

use tracing::info;

use crate::executor::Host;
use crate::props::{ScalarProp, SpecialProp, ZoneProps};
use crate::Error;

/// One `zonecfg` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigMutation {
    Create { zonepath: String },
    Set { prop: ScalarProp, value: String },
    Remove { prop: SpecialProp, entry: String },
    Add { prop: SpecialProp, entry: String },
}

impl ConfigMutation {
    /// The script passed to `zonecfg -z <zone>`.
    pub fn script(&self) -> String {
        match self {
            ConfigMutation::Create { zonepath } => {
                format!("create; set zonepath={}; commit", zonepath)
            }
            ConfigMutation::Set { prop, value } => format!("set {}={}", prop, value),
            ConfigMutation::Remove { prop, entry } => prop.remove_clause(entry),
            ConfigMutation::Add { prop, entry } => prop.add_clauses(entry).join("; "),
        }
    }

    fn op(&self) -> &'static str {
        match self {
            ConfigMutation::Create { .. } => "create",
            ConfigMutation::Set { .. } => "set property on",
            ConfigMutation::Remove { .. } => "remove resource from",
            ConfigMutation::Add { .. } => "add resource to",
        }
    }
}

impl fmt::Display for ConfigMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigMutation::Create { zonepath } => write!(f, "Configuring zone at {}", zonepath),
            ConfigMutation::Set { prop, value } => write!(f, "Setting {} to {}", prop, value),
            ConfigMutation::Remove { prop, entry } => write!(f, "Removing {} {}", prop, entry),
            ConfigMutation::Add { prop, entry } => write!(f, "Adding {} {}", prop, entry),
        }
    }
}

/// The mutations that take `current` to `desired`.
///
/// Scalars come first, in [`ScalarProp::ALL`] order; a scalar with no desired
/// value is not managed. Then, per [`SpecialProp`], removals in `current` order
/// followed by additions in `desired` order. Removing first matters when an
/// entry changes but keeps its key, e.g. a `net` with the same address on a
/// different interface: `remove net address=...` must not hit the new one.
pub fn plan(current: &ZoneProps, desired: &ZoneProps) -> Vec<ConfigMutation> {
    let mut mutations = Vec::new();

    for prop in ScalarProp::ALL {
        if let Some(value) = desired.scalar(prop) {
            if current.scalar(prop) != Some(value) {
                mutations.push(ConfigMutation::Set {
                    prop,
                    value: value.to_string(),
                });
            }
        }
    }

    for prop in SpecialProp::ALL {
        let current_entries = current.special(prop);
        let desired_entries = desired.special(prop);
        let current_set: BTreeSet<&str> = current_entries.iter().map(String::as_str).collect();
        let desired_set: BTreeSet<&str> = desired_entries.iter().map(String::as_str).collect();
        if current_set == desired_set {
            continue;
        }
        mutations.extend(
            current_entries
                .iter()
                .filter(|e| !desired_set.contains(e.as_str()))
                .map(|entry| ConfigMutation::Remove {
                    prop,
                    entry: entry.clone(),
                }),
        );
        mutations.extend(
            desired_entries
                .iter()
                .filter(|e| !current_set.contains(e.as_str()))
                .map(|entry| ConfigMutation::Add {
                    prop,
                    entry: entry.clone(),
                }),
        );
    }

    mutations
}

/// Issues one mutation against `zone`.
pub fn apply_one(host: &Host, zone: &str, mutation: &ConfigMutation) -> Result<(), Error> {
    info!(zone, "{} for zone {}", mutation, zone);
    host.executor
        .run_checked(&host.tools.zonecfg(zone).arg(mutation.script()))
        .map_err(|err| Error::Mutation {
            zone: zone.to_string(),
            op: mutation.op().to_string(),
            err,
        })?;
    Ok(())
}

/// Issues `mutations` in order, stopping at the first failure. Returns the
/// number applied.
pub fn apply(host: &Host, zone: &str, mutations: &[ConfigMutation]) -> Result<usize, Error> {
    for mutation in mutations {
        apply_one(host, zone, mutation)?;
    }
    Ok(mutations.len())
}

/// Plans and applies. Returns whether anything was changed.
pub fn reconcile(
    host: &Host,
    zone: &str,
    current: &ZoneProps,
    desired: &ZoneProps,
) -> Result<bool, Error> {
    let mutations = plan(current, desired);
    Ok(apply(host, zone, &mutations)? > 0)
}
