//! The normalized property mapping shared by live and desired state.
//!
//! Both sides of a diff are a [`ZoneProps`]: the top-level scalar values seen in
//! (or declared for) the zone, plus one ordered list per [`SpecialProp`].

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::SerializeMap as _;
use serde::Serialize;

/// A single-valued property that is set with one `set <name>=<value>` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScalarProp {
    ZonePath,
    Autoboot,
    LimitPriv,
    IpType,
}

impl ScalarProp {
    /// In the order in which they are reconciled.
    pub const ALL: [ScalarProp; 4] = [
        ScalarProp::ZonePath,
        ScalarProp::Autoboot,
        ScalarProp::LimitPriv,
        ScalarProp::IpType,
    ];

    /// The name used by `zonecfg`.
    pub fn name(self) -> &'static str {
        match self {
            ScalarProp::ZonePath => "zonepath",
            ScalarProp::Autoboot => "autoboot",
            ScalarProp::LimitPriv => "limitpriv",
            ScalarProp::IpType => "ip-type",
        }
    }
}

impl fmt::Display for ScalarProp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A composite property: a set of resources, each encoded as a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SpecialProp {
    Dataset,
    InheritPkgDir,
    Net,
    Fs,
}

impl SpecialProp {
    /// In the order in which they are reconciled.
    pub const ALL: [SpecialProp; 4] = [
        SpecialProp::Dataset,
        SpecialProp::InheritPkgDir,
        SpecialProp::Net,
        SpecialProp::Fs,
    ];

    /// The resource type used by `zonecfg`.
    pub fn name(self) -> &'static str {
        match self {
            SpecialProp::Dataset => "dataset",
            SpecialProp::InheritPkgDir => "inherit-pkg-dir",
            SpecialProp::Net => "net",
            SpecialProp::Fs => "fs",
        }
    }

    pub fn from_name(name: &str) -> Option<SpecialProp> {
        SpecialProp::ALL.into_iter().find(|p| p.name() == name)
    }

    /// The sub-field that identifies a resource, and that `remove` selects on.
    pub fn key_field(self) -> &'static str {
        match self {
            SpecialProp::Dataset => "name",
            SpecialProp::InheritPkgDir => "dir",
            SpecialProp::Net => "address",
            SpecialProp::Fs => "dir",
        }
    }

    /// Sub-fields that `zonecfg info` prints for this resource type.
    ///
    /// Anything else is unexpected and gets reported by the parser.
    pub fn known_fields(self) -> &'static [&'static str] {
        match self {
            SpecialProp::Dataset => &["name", "alias"],
            SpecialProp::InheritPkgDir => &["dir"],
            SpecialProp::Net => &["address", "allowed-address", "physical", "defrouter"],
            SpecialProp::Fs => &["dir", "special", "raw", "type", "options"],
        }
    }

    /// The `zonecfg` clauses that add `entry`.
    pub fn add_clauses(self, entry: &str) -> Vec<String> {
        let mut clauses = vec![format!("add {}", self.name())];
        match self {
            SpecialProp::Dataset | SpecialProp::InheritPkgDir => {
                clauses.push(format!("set {}={}", self.key_field(), entry));
            }
            SpecialProp::Net => {
                let net = NetEntry::decode(entry);
                clauses.push(format!("set address={}", net.address));
                if let Some(physical) = net.physical {
                    clauses.push(format!("set physical={}", physical));
                }
                if let Some(defrouter) = net.defrouter {
                    clauses.push(format!("set defrouter={}", defrouter));
                }
            }
            SpecialProp::Fs => {
                // Loopback mounts only, read-only and without devices.
                clauses.push(format!("set dir={}", entry));
                clauses.push(format!("set special={}", entry));
                clauses.push("set type=lofs".to_string());
                clauses.push("add options [ro,nodevices]".to_string());
            }
        }
        clauses.push("end".to_string());
        clauses
    }

    /// The `zonecfg` clause that removes `entry`.
    pub fn remove_clause(self, entry: &str) -> String {
        let key = match self {
            SpecialProp::Net => NetEntry::decode(entry).address,
            SpecialProp::Dataset | SpecialProp::InheritPkgDir | SpecialProp::Fs => entry,
        };
        format!("remove {} {}={}", self.name(), self.key_field(), key)
    }
}

impl fmt::Display for SpecialProp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A network resource in its string encoding, `address:physical[:defrouter]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetEntry<'a> {
    pub address: &'a str,
    pub physical: Option<&'a str>,
    pub defrouter: Option<&'a str>,
}

impl<'a> NetEntry<'a> {
    pub fn decode(entry: &'a str) -> NetEntry<'a> {
        let mut parts = entry.splitn(3, ':');
        NetEntry {
            address: parts.next().unwrap_or_default(),
            physical: parts.next().filter(|s| !s.is_empty()),
            defrouter: parts.next().filter(|s| !s.is_empty()),
        }
    }

    pub fn encode(&self) -> String {
        let mut s = self.address.to_string();
        for part in [self.physical, self.defrouter].into_iter().flatten() {
            s.push(':');
            s.push_str(part);
        }
        s
    }
}

/// Zone properties, normalized so that live and declared state compare directly.
///
/// Every [`SpecialProp`] is always present; one that has no resources is an
/// empty list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneProps {
    scalars: BTreeMap<String, String>,
    special: BTreeMap<SpecialProp, Vec<String>>,
}

impl Default for ZoneProps {
    fn default() -> Self {
        ZoneProps {
            scalars: BTreeMap::new(),
            special: SpecialProp::ALL.into_iter().map(|p| (p, Vec::new())).collect(),
        }
    }
}

impl ZoneProps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scalar(&self, prop: ScalarProp) -> Option<&str> {
        self.get(prop.name())
    }

    /// Any top-level value, managed or not (`brand`, `zonename`, ...).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.scalars.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.scalars.insert(key.into(), value.into());
    }

    pub fn special(&self, prop: SpecialProp) -> &[String] {
        self.special.get(&prop).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn special_mut(&mut self, prop: SpecialProp) -> &mut Vec<String> {
        self.special.entry(prop).or_default()
    }
}

/// Serializes as one flat object: scalar values as strings, composite
/// properties as arrays under their `zonecfg` names.
impl Serialize for ZoneProps {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.scalars.len() + self.special.len()))?;
        for (k, v) in &self.scalars {
            map.serialize_entry(k, v)?;
        }
        for p in SpecialProp::ALL {
            map.serialize_entry(p.name(), self.special(p))?;
        }
        map.end()
    }
}
