//! The declared configuration of a zone, and its normalization into
//! [`ZoneProps`] so that it compares directly against parsed live state.

use serde::{Deserialize, Deserializer, Serialize};

use crate::props::{ScalarProp, SpecialProp, ZoneProps};

pub const DEFAULT_SYSIDCFG_TEMPLATE: &str = "sysidcfg";

/// What a zone should look like.
///
/// ```json
/// {
///   "name": "web1",
///   "path": "/zones/web1",
///   "iptype": "shared",
///   "nets": ["10.0.0.5:net0"],
///   "loopbacks": ["/export/home"]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneDeclaration {
    pub name: String,
    /// The zonepath.
    pub path: String,
    #[serde(default, deserialize_with = "string_or_bool")]
    pub autoboot: Option<String>,
    #[serde(default)]
    pub limitpriv: Option<String>,
    #[serde(default)]
    pub iptype: Option<String>,

    /// ZFS datasets delegated to the zone.
    #[serde(default)]
    pub datasets: Vec<String>,
    /// Directories inherited from the global zone (sparse zones).
    #[serde(default)]
    pub inherits: Vec<String>,
    /// Network interfaces, as `address:physical[:defrouter]`.
    #[serde(default)]
    pub nets: Vec<String>,
    /// Directories of the global zone mounted read-only at the same path.
    #[serde(default)]
    pub loopbacks: Vec<String>,

    /// Install by cloning this zone instead of installing from scratch.
    #[serde(default)]
    pub clone: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub use_sysidcfg: bool,
    #[serde(default = "default_sysidcfg_template")]
    pub sysidcfg_template: String,
    #[serde(default)]
    pub copy_sshd_config: bool,
}

fn default_sysidcfg_template() -> String {
    DEFAULT_SYSIDCFG_TEMPLATE.to_string()
}

/// `zonecfg` takes `autoboot=true`; accept a JSON boolean as well.
fn string_or_bool<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrBool {
        String(String),
        Bool(bool),
    }
    Ok(
        Option::<StringOrBool>::deserialize(deserializer)?.map(|v| match v {
            StringOrBool::String(s) => s,
            StringOrBool::Bool(b) => b.to_string(),
        }),
    )
}

impl ZoneDeclaration {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        ZoneDeclaration {
            name: name.into(),
            path: path.into(),
            autoboot: None,
            limitpriv: None,
            iptype: None,
            datasets: Vec::new(),
            inherits: Vec::new(),
            nets: Vec::new(),
            loopbacks: Vec::new(),
            clone: None,
            password: None,
            use_sysidcfg: false,
            sysidcfg_template: default_sysidcfg_template(),
            copy_sshd_config: false,
        }
    }

    /// The declared value, if any. Undeclared properties are left alone.
    ///
    /// This is where declaration fields map to `zonecfg` properties, e.g.
    /// `iptype` to `ip-type`.
    pub fn scalar(&self, prop: ScalarProp) -> Option<&str> {
        let value = match prop {
            ScalarProp::ZonePath => Some(&self.path),
            ScalarProp::Autoboot => self.autoboot.as_ref(),
            ScalarProp::LimitPriv => self.limitpriv.as_ref(),
            ScalarProp::IpType => self.iptype.as_ref(),
        };
        value.map(String::as_str).filter(|v| !v.is_empty())
    }

    pub fn entries(&self, prop: SpecialProp) -> &[String] {
        match prop {
            SpecialProp::Dataset => &self.datasets,
            SpecialProp::InheritPkgDir => &self.inherits,
            SpecialProp::Net => &self.nets,
            SpecialProp::Fs => &self.loopbacks,
        }
    }

    /// The desired state, in the shape [`crate::parse::parse_info`] produces.
    ///
    /// Composite entries are sorted and deduplicated: they are compared as sets.
    pub fn desired_props(&self) -> ZoneProps {
        let mut props = ZoneProps::new();
        for prop in ScalarProp::ALL {
            if let Some(value) = self.scalar(prop) {
                props.set(prop.name(), value);
            }
        }
        for prop in SpecialProp::ALL {
            let mut entries = self.entries(prop).to_vec();
            entries.sort();
            entries.dedup();
            *props.special_mut(prop) = entries;
        }
        props
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal() {
        let decl: ZoneDeclaration =
            serde_json::from_str(r#"{"name": "web1", "path": "/zones/web1"}"#).unwrap();
        assert_eq!(decl, ZoneDeclaration::new("web1", "/zones/web1"));
        assert_eq!(decl.sysidcfg_template, "sysidcfg");
    }

    #[test]
    fn test_deserialize_autoboot_bool() {
        let decl: ZoneDeclaration = serde_json::from_str(
            r#"{"name": "web1", "path": "/zones/web1", "autoboot": true}"#,
        )
        .unwrap();
        assert_eq!(decl.autoboot.as_deref(), Some("true"));
        let decl: ZoneDeclaration = serde_json::from_str(
            r#"{"name": "web1", "path": "/zones/web1", "autoboot": "false"}"#,
        )
        .unwrap();
        assert_eq!(decl.autoboot.as_deref(), Some("false"));
    }

    #[test]
    fn test_deserialize_requires_path() {
        let r = serde_json::from_str::<ZoneDeclaration>(r#"{"name": "web1"}"#);
        assert!(r.is_err());
    }

    #[test]
    fn test_desired_props_renames() {
        let mut decl = ZoneDeclaration::new("web1", "/zones/web1");
        decl.iptype = Some("exclusive".to_string());
        decl.limitpriv = Some("default,dtrace_proc".to_string());
        let props = decl.desired_props();
        assert_eq!(props.scalar(ScalarProp::ZonePath), Some("/zones/web1"));
        assert_eq!(props.scalar(ScalarProp::IpType), Some("exclusive"));
        assert_eq!(props.get("iptype"), None);
        assert_eq!(props.get("path"), None);
        assert_eq!(
            props.scalar(ScalarProp::LimitPriv),
            Some("default,dtrace_proc")
        );
        assert_eq!(props.scalar(ScalarProp::Autoboot), None);
    }

    #[test]
    fn test_empty_scalar_is_undeclared() {
        let mut decl = ZoneDeclaration::new("web1", "/zones/web1");
        decl.limitpriv = Some(String::new());
        assert_eq!(decl.desired_props().scalar(ScalarProp::LimitPriv), None);
    }

    #[test]
    fn test_desired_props_sorted() {
        let mut decl = ZoneDeclaration::new("web1", "/zones/web1");
        decl.datasets = vec!["tank/b".into(), "tank/a".into(), "tank/b".into()];
        decl.nets = vec!["10.0.0.6:net1".into(), "10.0.0.5:net0".into()];
        decl.loopbacks = vec!["/opt".into(), "/export/home".into()];
        let props = decl.desired_props();
        assert_eq!(props.special(SpecialProp::Dataset), ["tank/a", "tank/b"]);
        assert_eq!(
            props.special(SpecialProp::Net),
            ["10.0.0.5:net0", "10.0.0.6:net1"]
        );
        assert_eq!(props.special(SpecialProp::Fs), ["/export/home", "/opt"]);
        assert!(props.special(SpecialProp::InheritPkgDir).is_empty());
    }
}
