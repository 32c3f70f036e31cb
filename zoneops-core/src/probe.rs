//! Read-only queries against `zoneadm` and `zonecfg`.

use std::fmt;

use serde::Serialize;

use crate::executor::Host;
use crate::Error;

/// A zone's lifecycle state, as reported in the third field of
/// `zoneadm list -p`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneState {
    Configured,
    Incomplete,
    Installed,
    Ready,
    Running,
    ShuttingDown,
    Down,
    /// A state this version does not know about, kept verbatim.
    Other(String),
}

impl ZoneState {
    pub fn parse(token: &str) -> ZoneState {
        match token {
            "configured" => ZoneState::Configured,
            "incomplete" => ZoneState::Incomplete,
            "installed" => ZoneState::Installed,
            "ready" => ZoneState::Ready,
            "running" => ZoneState::Running,
            "shutting_down" => ZoneState::ShuttingDown,
            "down" => ZoneState::Down,
            other => ZoneState::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ZoneState::Configured => "configured",
            ZoneState::Incomplete => "incomplete",
            ZoneState::Installed => "installed",
            ZoneState::Ready => "ready",
            ZoneState::Running => "running",
            ZoneState::ShuttingDown => "shutting_down",
            ZoneState::Down => "down",
            ZoneState::Other(s) => s,
        }
    }

    /// Installed, whether or not it is booted.
    pub fn is_installed(&self) -> bool {
        matches!(
            self,
            ZoneState::Installed | ZoneState::Ready | ZoneState::Running
        )
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ZoneState::Running)
    }
}

impl fmt::Display for ZoneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ZoneState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// The answer to "is this zone configured at all?".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Existence {
    /// Exit code of `zoneadm list -p`; zero when the zone exists.
    pub code: Option<i32>,
    /// The raw listing line, e.g. `-:web1:installed:/zones/web1:...:native:shared`.
    pub line: String,
}

impl Existence {
    pub fn exists(&self) -> bool {
        self.code == Some(0)
    }
}

fn list(host: &Host, zone: &str) -> crate::executor::Input {
    host.tools.zoneadm(zone).args(["list", "-p"])
}

/// Runs `zoneadm -z <zone> list -p`. A zone that does not exist is a normal
/// answer, not an error.
pub fn probe_existence(host: &Host, zone: &str) -> Result<Existence, Error> {
    let output = host
        .executor
        .run(&list(host, zone))
        .map_err(|err| Error::Probe {
            zone: zone.to_string(),
            err,
        })?;
    Ok(Existence {
        line: output.stdout.trim_end().to_string(),
        code: output.code,
    })
}

/// Extracts the state from a `zoneadm list -p` line.
pub fn state_from_listing(zone: &str, line: &str) -> Result<ZoneState, Error> {
    match line.split(':').nth(2) {
        Some(token) if !token.is_empty() => Ok(ZoneState::parse(token)),
        _ => Err(Error::MalformedListing {
            zone: zone.to_string(),
            line: line.to_string(),
        }),
    }
}

/// The lifecycle state of an existing zone. Fails if the zone does not exist.
pub fn probe_state(host: &Host, zone: &str) -> Result<ZoneState, Error> {
    let output = host
        .executor
        .run_checked(&list(host, zone))
        .map_err(|err| Error::Probe {
            zone: zone.to_string(),
            err,
        })?;
    state_from_listing(zone, output.stdout.trim_end())
}

/// The raw output of `zonecfg -z <zone> info`.
pub fn probe_info(host: &Host, zone: &str) -> Result<String, Error> {
    let output = host
        .executor
        .run_checked(&host.tools.zonecfg(zone).arg("info"))
        .map_err(|err| Error::Probe {
            zone: zone.to_string(),
            err,
        })?;
    Ok(output.stdout)
}
