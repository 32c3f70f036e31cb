mod inputs;
mod logging;
mod options;
mod zone;

use anyhow::Result;
use clap::{CommandFactory as _, Parser, Subcommand};
use inputs::DeclarationArgs;
use options::Options;
use std::process::exit;
use zoneops_core::lifecycle::Action;

fn main() {
    let args = Args::parse();
    handle_result(run_args(args));
}

fn run_args(args: Args) -> Result<()> {
    let _frontend = if args.command.uses_host() {
        Some(logging::set_up(&args.options.logging_options())?)
    } else {
        None
    };
    match &args.command {
        Commands::Configure(decl) => zone::run(&args.options, decl, Action::Configure),
        Commands::Install(decl) => zone::run(&args.options, decl, Action::Install),
        Commands::Start(decl) => zone::run(&args.options, decl, Action::Start),
        Commands::Stop(decl) => zone::run(&args.options, decl, Action::Stop),
        Commands::Uninstall(decl) => zone::run(&args.options, decl, Action::Uninstall),
        Commands::Delete(decl) => zone::run(&args.options, decl, Action::Delete),
        Commands::Plan(decl) => zone::plan(&args.options, decl),
        Commands::Show { name } => zone::show(&args.options, name),
        Commands::GenerateMan => (|| {
            let cmd = Args::command();
            let man = clap_mangen::Man::new(cmd);
            let mut buffer: Vec<u8> = Default::default();
            man.render(&mut buffer)?;
            println!("{}", String::from_utf8(buffer)?);
            Ok(())
        })(),
        Commands::GenerateMarkdown => {
            let opts = clap_markdown::MarkdownOptions::new().show_footer(false);
            let markdown: String = clap_markdown::help_markdown_custom::<Args>(&opts);
            println!("{}", markdown);
            Ok(())
        }
        Commands::GenerateCompletion { shell } => {
            let mut cmd = Args::command();
            clap_complete::generate(*shell, &mut cmd, "zoneops", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn handle_result(r: Result<()>) {
    match r {
        Ok(()) => {}
        Err(e) => {
            // Library errors already include their cause in the message
            let message = e.to_string();
            let root = e.root_cause().to_string();
            if message.contains(&root) {
                eprintln!("zoneops error: {}", message);
            } else {
                eprintln!("zoneops error: {}: {}", message, root);
            }
            exit(1);
        }
    }
}

/// zoneops: converge illumos zones to their declared configuration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    options: Options,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the zone if needed, and bring its configuration in line with the declaration
    Configure(DeclarationArgs),

    /// Configure, then install (or clone) the zone if it is not installed
    Install(DeclarationArgs),

    /// Install, then boot the zone if it is not running
    Start(DeclarationArgs),

    /// Halt the zone if it is running
    Stop(DeclarationArgs),

    /// Stop, then uninstall the zone if it is installed
    Uninstall(DeclarationArgs),

    /// Stop, then delete the zone's configuration if it exists
    Delete(DeclarationArgs),

    /// Print the `zonecfg` commands that `configure` would run, without running them
    ///
    /// For a zone that does not exist yet, only the `create` command is printed:
    /// the rest is diffed against the defaults that `create` sets.
    Plan(DeclarationArgs),

    /// Print the state and configuration of a zone as JSON
    Show {
        /// The zone name
        name: String,
    },

    /// Generate markdown documentation for zoneops
    #[command(hide = true)]
    GenerateMarkdown,

    /// Generate a manpage for zoneops
    #[command(hide = true)]
    GenerateMan,

    /// Generate shell completion for zoneops
    #[command(hide = true)]
    GenerateCompletion {
        /// The shell to generate completion for
        #[arg(long)]
        shell: clap_complete::Shell,
    },
}

impl Commands {
    fn uses_host(&self) -> bool {
        !matches!(
            self,
            Commands::GenerateMarkdown | Commands::GenerateMan | Commands::GenerateCompletion { .. }
        )
    }
}
