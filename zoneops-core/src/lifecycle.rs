//! Sequencing probes and mutations across a zone's life.
//!
//! Each action starts from a fresh [`Zone`] loaded from the host, and is
//! idempotent with respect to it: steps whose effect is already present are
//! skipped. Composite actions call their prerequisites directly, so `start`
//! on a zone that does not exist yet configures, installs and boots it.
//!
//! ```text
//!   (none) --configure--> configured --install--> installed --start--> running
//!   (none) <--delete----- configured <-uninstall- installed <--stop--- running
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, info, info_span};

use crate::collaborators::{FileCopier, TemplateRenderer};
use crate::declaration::ZoneDeclaration;
use crate::executor::Host;
use crate::parse::parse_info;
use crate::probe::{self, ZoneState};
use crate::props::ZoneProps;
use crate::reconcile::{self, ConfigMutation};
use crate::Error;

pub const SSHD_CONFIG: &str = "/etc/ssh/sshd_config";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Configure,
    Install,
    Start,
    Stop,
    Uninstall,
    Delete,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Configure,
        Action::Install,
        Action::Start,
        Action::Stop,
        Action::Uninstall,
        Action::Delete,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Action::Configure => "configure",
            Action::Install => "install",
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Uninstall => "uninstall",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.name() == s)
            .ok_or_else(|| format!("unknown action: {}", s))
    }
}

/// The result of an action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Whether anything on the host was modified.
    pub changed: bool,
}

/// A zone as seen at the start of an action.
///
/// Mutations issued during the action change the real zone, not this value;
/// only creation triggers a refresh of `current_props`.
#[derive(Debug, Clone, Serialize)]
pub struct Zone {
    #[serde(flatten)]
    pub declaration: ZoneDeclaration,
    pub exists: bool,
    /// `None` when the zone does not exist.
    pub state: Option<ZoneState>,
    pub current_props: ZoneProps,
    pub desired_props: ZoneProps,
}

impl Zone {
    pub fn load(host: &Host, declaration: &ZoneDeclaration) -> Result<Zone, Error> {
        let name = declaration.name.as_str();
        let existence = probe::probe_existence(host, name)?;
        let mut zone = Zone {
            declaration: declaration.clone(),
            exists: existence.exists(),
            state: None,
            current_props: ZoneProps::new(),
            desired_props: declaration.desired_props(),
        };
        if zone.exists {
            zone.state = Some(probe::state_from_listing(name, &existence.line)?);
            zone.refresh_props(host)?;
        }
        debug!(zone = name, exists = zone.exists, state = ?zone.state, "loaded zone");
        Ok(zone)
    }

    pub fn name(&self) -> &str {
        &self.declaration.name
    }

    fn refresh_props(&mut self, host: &Host) -> Result<(), Error> {
        let info = probe::probe_info(host, self.name())?;
        let parsed = parse_info(&info);
        for line in &parsed.ignored {
            debug!(zone = self.name(), line = %line, "ignored zonecfg info line");
        }
        self.current_props = parsed.props;
        Ok(())
    }

    pub fn is_installed(&self) -> bool {
        self.state.as_ref().is_some_and(ZoneState::is_installed)
    }

    pub fn is_running(&self) -> bool {
        self.state.as_ref().is_some_and(ZoneState::is_running)
    }

    /// The root of the zone's filesystem, as seen from the global zone.
    pub fn root(&self) -> PathBuf {
        Path::new(&self.declaration.path).join("root")
    }

    /// The configuration mutations `configure` would issue right now.
    ///
    /// For a zone that does not exist yet, this is only the creation: what
    /// follows is diffed against the properties `zonecfg create` leaves behind,
    /// which are not known until it has run.
    pub fn planned_mutations(&self) -> Vec<ConfigMutation> {
        if !self.exists {
            return vec![ConfigMutation::Create {
                zonepath: self.declaration.path.clone(),
            }];
        }
        reconcile::plan(&self.current_props, &self.desired_props)
    }
}

/// The collaborators that work on files rather than through zone tools.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub templates: &'a dyn TemplateRenderer,
    pub files: &'a dyn FileCopier,
}

/// Runs actions against one loaded [`Zone`].
pub struct Lifecycle<'a> {
    host: Host<'a>,
    collaborators: Collaborators<'a>,
    zone: Zone,
    changed: bool,
}

impl<'a> Lifecycle<'a> {
    pub fn load(
        host: Host<'a>,
        collaborators: Collaborators<'a>,
        declaration: &ZoneDeclaration,
    ) -> Result<Self, Error> {
        let zone = Zone::load(&host, declaration)?;
        Ok(Lifecycle {
            host,
            collaborators,
            zone,
            changed: false,
        })
    }

    pub fn run(mut self, action: Action) -> Result<Outcome, Error> {
        let span = info_span!("zone action", zone = self.zone.name(), action = %action);
        let _enter = span.enter();
        match action {
            Action::Configure => self.configure()?,
            Action::Install => self.install()?,
            Action::Start => self.start()?,
            Action::Stop => self.stop()?,
            Action::Uninstall => self.uninstall()?,
            Action::Delete => self.delete()?,
        }
        Ok(Outcome {
            changed: self.changed,
        })
    }

    pub fn configure(&mut self) -> Result<(), Error> {
        if !self.zone.exists {
            self.do_create()?;
        }
        if reconcile::reconcile(
            &self.host,
            self.zone.name(),
            &self.zone.current_props,
            &self.zone.desired_props,
        )? {
            self.changed = true;
        }
        Ok(())
    }

    pub fn install(&mut self) -> Result<(), Error> {
        self.configure()?;
        if !self.zone.is_installed() {
            self.do_install()?;
        }
        if self.zone.declaration.use_sysidcfg {
            self.render_sysidcfg()?;
        }
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), Error> {
        self.install()?;
        if !self.zone.is_running() {
            info!(zone = self.zone.name(), "Booting zone {}", self.zone.name());
            self.zoneadm("boot", &["boot"])?;
        }
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), Error> {
        if self.zone.is_running() {
            info!(zone = self.zone.name(), "Halting zone {}", self.zone.name());
            self.zoneadm("halt", &["halt"])?;
        }
        Ok(())
    }

    pub fn uninstall(&mut self) -> Result<(), Error> {
        self.stop()?;
        if self.zone.is_installed() {
            info!(zone = self.zone.name(), "Uninstalling zone {}", self.zone.name());
            self.zoneadm("uninstall", &["uninstall", "-F"])?;
        }
        Ok(())
    }

    pub fn delete(&mut self) -> Result<(), Error> {
        self.stop()?;
        if self.zone.exists {
            let name = self.zone.name().to_string();
            info!(zone = %name, "Deleting zone {}", name);
            self.host
                .executor
                .run_checked(&self.host.tools.zonecfg(&name).args(["delete", "-F"]))
                .map_err(|err| Error::Mutation {
                    zone: name.clone(),
                    op: "delete".to_string(),
                    err,
                })?;
            self.changed = true;
        }
        Ok(())
    }

    fn do_create(&mut self) -> Result<(), Error> {
        reconcile::apply_one(
            &self.host,
            self.zone.name(),
            &ConfigMutation::Create {
                zonepath: self.zone.declaration.path.clone(),
            },
        )?;
        self.changed = true;
        self.zone.exists = true;
        self.zone.state = Some(ZoneState::Configured);
        let host = self.host;
        self.zone.refresh_props(&host)
    }

    fn do_install(&mut self) -> Result<(), Error> {
        match self.zone.declaration.clone.clone() {
            None => {
                info!(zone = self.zone.name(), "Installing zone {}", self.zone.name());
                self.zoneadm("install", &["install"])?
            }
            Some(source) => {
                info!(zone = self.zone.name(), source = %source, "Cloning zone from {}", source);
                self.zoneadm("clone", &["clone", source.as_str()])?
            }
        }
        if self.zone.declaration.copy_sshd_config {
            let src = Path::new(SSHD_CONFIG);
            let dest = self.zone.root().join("etc/ssh/sshd_config");
            info!(zone = self.zone.name(), dest = %dest.display(), "copying sshd_config");
            self.collaborators
                .files
                .copy(src, &dest)
                .map_err(|err| Error::Copy {
                    src: src.to_path_buf(),
                    dest,
                    err,
                })?;
        }
        Ok(())
    }

    fn render_sysidcfg(&mut self) -> Result<(), Error> {
        let dest = self.zone.root().join("etc/sysidcfg");
        let template = self.zone.declaration.sysidcfg_template.clone();
        let variables = serde_json::json!({ "zone": &self.zone });
        let changed = self
            .collaborators
            .templates
            .render(&dest, &template, &variables)
            .map_err(|err| Error::Render {
                template,
                dest,
                err,
            })?;
        self.changed |= changed;
        Ok(())
    }

    /// Runs `zoneadm -z <zone> <args>`. `op` names the operation in errors.
    fn zoneadm(&mut self, op: &str, args: &[&str]) -> Result<(), Error> {
        let name = self.zone.name().to_string();
        self.host
            .executor
            .run_checked(&self.host.tools.zoneadm(&name).args(args.iter().copied()))
            .map_err(|err| Error::Mutation {
                zone: name,
                op: op.to_string(),
                err,
            })?;
        self.changed = true;
        Ok(())
    }
}

/// Loads the zone and runs one action against it.
pub fn run_action(
    host: Host,
    collaborators: Collaborators,
    declaration: &ZoneDeclaration,
    action: Action,
) -> Result<Outcome, Error> {
    Lifecycle::load(host, collaborators, declaration)?.run(action)
}
