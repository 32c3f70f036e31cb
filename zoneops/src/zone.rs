use anyhow::Result;
use serde::Serialize;
use zoneops_core::collaborators::{FileTemplates, HostFiles};
use zoneops_core::executor::{Host, HostExecutor};
use zoneops_core::lifecycle::{self, Action, Collaborators, Zone};
use zoneops_core::parse::parse_info;
use zoneops_core::probe::{self, ZoneState};
use zoneops_core::props::ZoneProps;

use crate::inputs::DeclarationArgs;
use crate::options::Options;

/// Run one lifecycle action.
pub(crate) fn run(options: &Options, args: &DeclarationArgs, action: Action) -> Result<()> {
    let declaration = args.to_declaration()?;
    let executor = HostExecutor::new();
    let tools = options.tools();
    let templates = FileTemplates::new(&options.template_dir);
    let collaborators = Collaborators {
        templates: &templates,
        files: &HostFiles,
    };

    let outcome = lifecycle::run_action(
        Host::new(&executor, &tools),
        collaborators,
        &declaration,
        action,
    )?;
    if outcome.changed {
        println!("{}: {}: changed", declaration.name, action);
    } else {
        println!("{}: {}: up to date", declaration.name, action);
    }
    Ok(())
}

/// Print the configuration commands `configure` would run, without running
/// them. For a zone that does not exist yet, only its creation is known.
pub(crate) fn plan(options: &Options, args: &DeclarationArgs) -> Result<()> {
    let declaration = args.to_declaration()?;
    let executor = HostExecutor::new();
    let tools = options.tools();
    let zone = Zone::load(&Host::new(&executor, &tools), &declaration)?;

    let mutations = zone.planned_mutations();
    if !zone.exists {
        eprintln!(
            "Zone {} does not exist yet; the rest of its configuration is diffed once it is created.",
            declaration.name
        );
    } else if mutations.is_empty() {
        eprintln!(
            "Zone {} matches its declaration; nothing to configure.",
            declaration.name
        );
    }
    for mutation in &mutations {
        println!("{}", tools.zonecfg(&declaration.name).arg(mutation.script()));
    }
    Ok(())
}

#[derive(Serialize)]
struct Shown<'a> {
    name: &'a str,
    exists: bool,
    state: Option<ZoneState>,
    props: Option<ZoneProps>,
    /// Lines of `zonecfg info` that were not understood.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ignored: Vec<String>,
}

/// Print what is known about a zone, as JSON.
pub(crate) fn show(options: &Options, name: &str) -> Result<()> {
    let executor = HostExecutor::new();
    let tools = options.tools();
    let host = Host::new(&executor, &tools);

    let existence = probe::probe_existence(&host, name)?;
    let mut shown = Shown {
        name,
        exists: existence.exists(),
        state: None,
        props: None,
        ignored: Vec::new(),
    };
    if shown.exists {
        shown.state = Some(probe::state_from_listing(name, &existence.line)?);
        let parsed = parse_info(&probe::probe_info(&host, name)?);
        shown.props = Some(parsed.props);
        shown.ignored = parsed.ignored;
    }
    println!("{}", serde_json::to_string_pretty(&shown)?);
    Ok(())
}
