use std::io::IsTerminal as _;
use std::path::PathBuf;

use clap::{ColorChoice, Parser};
use zoneops_core::executor::{Tools, ZONEADM, ZONECFG};

use crate::logging;

pub const DEFAULT_TEMPLATE_DIR: &str = "/etc/zoneops/templates";

#[derive(Parser, Debug, Clone)]
pub struct Options {
    #[arg(short, long, global = true, default_value = "false")]
    pub verbose: bool,

    #[arg(long, global = true, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// The `zoneadm` executable
    #[arg(long, global = true, value_name = "PATH", default_value = ZONEADM)]
    pub zoneadm: String,

    /// The `zonecfg` executable
    #[arg(long, global = true, value_name = "PATH", default_value = ZONECFG)]
    pub zonecfg: String,

    /// Directory to look up templates in, such as the one named by
    /// `sysidcfg_template`
    #[arg(long, global = true, value_name = "DIR", default_value = DEFAULT_TEMPLATE_DIR)]
    pub template_dir: PathBuf,
}

impl Options {
    pub fn tools(&self) -> Tools {
        Tools {
            zoneadm: self.zoneadm.clone(),
            zonecfg: self.zonecfg.clone(),
        }
    }

    pub(crate) fn logging_options(&self) -> logging::Options {
        logging::Options {
            verbose: self.verbose,
            color: match self.color {
                ColorChoice::Always => true,
                ColorChoice::Never => false,
                ColorChoice::Auto => std::io::stderr().is_terminal(),
            },
        }
    }
}
