//! A simulated host that answers `zoneadm` and `zonecfg` the way illumos does,
//! closely enough for the prober, the parser and the reconcile engine to run
//! against it end to end.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::executor::{log_input, log_output, ExecutionError, Executor, Input, Output};
use crate::probe::ZoneState;

#[derive(Debug, Clone)]
struct Resource {
    kind: String,
    fields: Vec<(String, String)>,
}

impl Resource {
    fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
struct FakeZone {
    state: ZoneState,
    scalars: BTreeMap<String, String>,
    resources: Vec<Resource>,
}

impl FakeZone {
    /// What `zonecfg create` leaves behind.
    fn created(name: &str) -> Self {
        let mut scalars = BTreeMap::new();
        scalars.insert("zonename".to_string(), name.to_string());
        scalars.insert("brand".to_string(), "native".to_string());
        scalars.insert("autoboot".to_string(), "false".to_string());
        FakeZone {
            state: ZoneState::Configured,
            scalars,
            resources: Vec::new(),
        }
    }

    fn info(&self) -> String {
        let mut out = String::new();
        for key in [
            "zonename",
            "zonepath",
            "brand",
            "autoboot",
            "bootargs",
            "pool",
            "limitpriv",
            "scheduling-class",
            "ip-type",
        ] {
            match self.scalars.get(key) {
                Some(value) => out.push_str(&format!("{}: {}\n", key, value)),
                // Solaris 10 prints unset top-level properties with no value
                None if key != "ip-type" => out.push_str(&format!("{}:\n", key)),
                None => {}
            }
        }
        for resource in &self.resources {
            out.push_str(&format!("{}:\n", resource.kind));
            for (k, v) in &resource.fields {
                out.push_str(&format!("\t{}: {}\n", k, v));
            }
            if resource.kind == "net" && resource.field("defrouter").is_none() {
                out.push_str("\tdefrouter not specified\n");
            }
        }
        out
    }

    /// Applies a `zonecfg` script made of `;`-separated clauses.
    fn apply_script(&mut self, script: &str) -> Result<(), String> {
        let mut scope: Option<Resource> = None;
        for clause in script.split(';').map(str::trim).filter(|c| !c.is_empty()) {
            let (verb, rest) = clause.split_once(' ').unwrap_or((clause, ""));
            let syntax_error = || format!("syntax error: {}", clause);
            match (verb, scope.is_some()) {
                ("create", false) | ("commit", false) => {}
                ("set", _) => {
                    let (k, v) = rest.split_once('=').ok_or_else(syntax_error)?;
                    match scope.as_mut() {
                        Some(resource) => resource.fields.push((k.to_string(), v.to_string())),
                        None => {
                            self.scalars.insert(k.to_string(), v.to_string());
                        }
                    }
                }
                ("add", true) => {
                    let v = rest.strip_prefix("options ").ok_or_else(syntax_error)?;
                    if let Some(resource) = scope.as_mut() {
                        resource.fields.push(("options".to_string(), v.to_string()));
                    }
                }
                ("add", false) => {
                    scope = Some(Resource {
                        kind: rest.to_string(),
                        fields: Vec::new(),
                    })
                }
                ("end", true) => {
                    if let Some(resource) = scope.take() {
                        self.resources.push(resource);
                    }
                }
                ("remove", false) => {
                    let (kind, selector) = rest.split_once(' ').ok_or_else(syntax_error)?;
                    let (k, v) = selector.split_once('=').ok_or_else(syntax_error)?;
                    let before = self.resources.len();
                    self.resources
                        .retain(|r| !(r.kind == kind && r.field(k) == Some(v)));
                    if self.resources.len() == before {
                        return Err(format!("No such {} resource.", kind));
                    }
                }
                _ => return Err(format!("{}: command not valid here", clause)),
            }
        }
        if scope.is_some() {
            return Err("resource incomplete".to_string());
        }
        Ok(())
    }
}

#[derive(Default)]
struct Inner {
    zones: BTreeMap<String, FakeZone>,
    commands: Vec<Input>,
    failures: Vec<String>,
}

#[derive(Default)]
pub struct FakeZoneHost {
    inner: Mutex<Inner>,
    counter: AtomicU64,
}

impl FakeZoneHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a zone as if it had been created with only a zonepath set.
    pub fn add_zone(&self, name: &str, zonepath: &str, state: ZoneState) {
        let mut zone = FakeZone::created(name);
        zone.scalars
            .insert("zonepath".to_string(), zonepath.to_string());
        zone.state = state;
        self.inner
            .lock()
            .unwrap()
            .zones
            .insert(name.to_string(), zone);
    }

    pub fn state(&self, name: &str) -> Option<ZoneState> {
        self.inner
            .lock()
            .unwrap()
            .zones
            .get(name)
            .map(|z| z.state.clone())
    }

    pub fn set_state(&self, name: &str, state: ZoneState) {
        if let Some(zone) = self.inner.lock().unwrap().zones.get_mut(name) {
            zone.state = state;
        }
    }

    /// What `zonecfg -z <name> info` would print right now.
    pub fn info(&self, name: &str) -> String {
        self.inner
            .lock()
            .unwrap()
            .zones
            .get(name)
            .map(FakeZone::info)
            .unwrap_or_default()
    }

    /// Every command run so far, e.g. `zoneadm -z web1 list -p`.
    pub fn commands(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .commands
            .iter()
            .map(|input| format!("{} {}", input.program_name(), input.args.join(" ")))
            .collect()
    }

    /// The commands that modify a zone, without the `-z <zone>` prefix. A
    /// `zonecfg` script is shown on its own, e.g.
    /// `add dataset; set name=tank/a; end`.
    pub fn issued(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .commands
            .iter()
            .filter_map(|input| {
                let rest = input.args.get(2..).unwrap_or_default();
                match (input.program_name(), rest) {
                    ("zoneadm", [list, ..]) if list == "list" => None,
                    ("zonecfg", [info]) if info == "info" => None,
                    ("zonecfg", [script]) => Some(script.clone()),
                    (program, rest) => Some(format!("{} {}", program, rest.join(" "))),
                }
            })
            .collect()
    }

    pub fn clear_commands(&self) {
        self.inner.lock().unwrap().commands.clear();
    }

    /// Makes every command whose command line contains `pattern` fail.
    pub fn fail_when(&self, pattern: &str) {
        self.inner
            .lock()
            .unwrap()
            .failures
            .push(pattern.to_string());
    }

    pub fn clear_failures(&self) {
        self.inner.lock().unwrap().failures.clear();
    }
}

fn zoneadm(inner: &mut Inner, name: &str, args: &[String]) -> Output {
    let no_such_zone = || Output::failed(1, format!("zoneadm: {}: No such zone configured\n", name));
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    if args == ["list", "-p"] {
        return match inner.zones.get(name) {
            Some(zone) => {
                let zonepath = zone.scalars.get("zonepath").cloned().unwrap_or_default();
                let id = if zone.state.is_running() { "1" } else { "-" };
                Output::ok(format!(
                    "{}:{}:{}:{}::native:shared\n",
                    id, name, zone.state, zonepath
                ))
            }
            None => no_such_zone(),
        };
    }
    if let ["clone", source] = args.as_slice() {
        if !inner.zones.get(*source).is_some_and(|z| z.state.is_installed()) {
            return Output::failed(1, format!("zoneadm: zone '{}' is not installed\n", source));
        }
    }

    let Some(zone) = inner.zones.get_mut(name) else {
        return no_such_zone();
    };
    let (from, to) = match args.as_slice() {
        ["install"] | ["clone", _] => (ZoneState::Configured, ZoneState::Installed),
        ["boot"] => (ZoneState::Installed, ZoneState::Running),
        ["halt"] => (ZoneState::Running, ZoneState::Installed),
        ["uninstall", "-F"] => (ZoneState::Installed, ZoneState::Configured),
        _ => return Output::failed(2, format!("zoneadm: unknown subcommand {:?}\n", args)),
    };
    if zone.state != from {
        return Output::failed(
            1,
            format!(
                "zoneadm: zone '{}': must be {} to {}; it is {}\n",
                name, from, args[0], zone.state
            ),
        );
    }
    zone.state = to;
    Output::ok("")
}

fn zonecfg(inner: &mut Inner, name: &str, args: &[String]) -> Output {
    let no_such_zone = || Output::failed(1, format!("{}: No such zone configured\n", name));
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        ["info"] => match inner.zones.get(name) {
            Some(zone) => Output::ok(zone.info()),
            None => no_such_zone(),
        },
        ["delete", "-F"] => match inner.zones.get(name).map(|z| z.state.clone()) {
            Some(state) if state != ZoneState::Configured => Output::failed(
                1,
                format!("Zone {} is {}; uninstall it first\n", name, state),
            ),
            Some(_) => {
                inner.zones.remove(name);
                Output::ok("")
            }
            None => no_such_zone(),
        },
        [script] => {
            let creating = script.trim_start().starts_with("create");
            let mut zone = match (inner.zones.get(name), creating) {
                (Some(_), true) => {
                    return Output::failed(1, format!("{}: zone already exists\n", name))
                }
                (Some(zone), false) => zone.clone(),
                (None, true) => FakeZone::created(name),
                (None, false) => return no_such_zone(),
            };
            match zone.apply_script(script) {
                Ok(()) => {
                    inner.zones.insert(name.to_string(), zone);
                    Output::ok("")
                }
                Err(e) => Output::failed(1, format!("zonecfg:{}> {}\n", name, e)),
            }
        }
        _ => Output::failed(2, format!("zonecfg: unexpected arguments {:?}\n", args)),
    }
}

impl Executor for FakeZoneHost {
    fn run(&self, input: &Input) -> Result<Output, ExecutionError> {
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        log_input(id, input);

        let mut inner = self.inner.lock().unwrap();
        inner.commands.push(input.clone());
        let command_line = input.to_string();
        let output = if inner.failures.iter().any(|p| command_line.contains(p.as_str())) {
            Output::failed(1, format!("injected failure: {}\n", command_line))
        } else {
            match (input.program_name(), input.args.as_slice()) {
                ("zoneadm", [z, name, rest @ ..]) if z == "-z" => zoneadm(&mut inner, name, rest),
                ("zonecfg", [z, name, rest @ ..]) if z == "-z" => zonecfg(&mut inner, name, rest),
                _ => {
                    return Err(ExecutionError::Spawn {
                        command: command_line,
                        err: std::io::Error::from(std::io::ErrorKind::NotFound),
                    })
                }
            }
        };

        log_output(id, &output);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Tools;
    use crate::parse::parse_info;
    use crate::props::SpecialProp;

    fn zonecfg(fake: &FakeZoneHost, script: &str) -> Output {
        fake.run(&Tools::default().zonecfg("web1").arg(script)).unwrap()
    }

    #[test]
    fn test_create_then_info() {
        let fake = FakeZoneHost::new();
        assert!(zonecfg(&fake, "create; set zonepath=/zones/web1; commit").success());
        let info = fake.info("web1");
        assert!(info.starts_with("zonename: web1\nzonepath: /zones/web1\n"), "{}", info);
        assert!(!info.contains("ip-type"));
        assert_eq!(fake.state("web1"), Some(ZoneState::Configured));
        assert!(!zonecfg(&fake, "create; set zonepath=/zones/web1; commit").success());
    }

    #[test]
    fn test_resources_parse_back() {
        let fake = FakeZoneHost::new();
        fake.add_zone("web1", "/zones/web1", ZoneState::Configured);
        assert!(zonecfg(&fake, "add net; set address=10.0.0.5; set physical=net0; end").success());
        assert!(zonecfg(
            &fake,
            "add fs; set dir=/opt; set special=/opt; set type=lofs; add options [ro,nodevices]; end"
        )
        .success());
        let parsed = parse_info(&fake.info("web1"));
        assert_eq!(parsed.props.special(SpecialProp::Net), ["10.0.0.5:net0"]);
        assert_eq!(parsed.props.special(SpecialProp::Fs), ["/opt"]);
        assert!(parsed.ignored.is_empty(), "{:?}", parsed.ignored);

        assert!(zonecfg(&fake, "remove net address=10.0.0.5").success());
        assert!(!zonecfg(&fake, "remove net address=10.0.0.5").success());
    }

    #[test]
    fn test_zoneadm_transitions() {
        let fake = FakeZoneHost::new();
        fake.add_zone("web1", "/zones/web1", ZoneState::Configured);
        let zoneadm = |args: &[&str]| {
            fake.run(&Tools::default().zoneadm("web1").args(args.iter().copied()))
                .unwrap()
        };
        assert!(!zoneadm(&["boot"]).success());
        assert!(zoneadm(&["install"]).success());
        assert!(zoneadm(&["boot"]).success());
        assert!(zoneadm(&["list", "-p"]).stdout.starts_with("1:web1:running:/zones/web1:"));
        assert!(zoneadm(&["halt"]).success());
        assert!(zoneadm(&["uninstall", "-F"]).success());
        assert_eq!(fake.state("web1"), Some(ZoneState::Configured));
        assert_eq!(
            fake.issued(),
            vec![
                "zoneadm boot",
                "zoneadm install",
                "zoneadm boot",
                "zoneadm halt",
                "zoneadm uninstall -F"
            ]
        );
    }

    #[test]
    fn test_injected_failure() {
        let fake = FakeZoneHost::new();
        fake.add_zone("web1", "/zones/web1", ZoneState::Configured);
        fake.fail_when("set autoboot");
        assert!(!zonecfg(&fake, "set autoboot=true").success());
        assert!(fake.info("web1").contains("autoboot: false"));
        fake.clear_failures();
        assert!(zonecfg(&fake, "set autoboot=true").success());
        assert!(fake.info("web1").contains("autoboot: true"));
    }
}
