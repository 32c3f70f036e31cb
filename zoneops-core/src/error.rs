use std::path::PathBuf;

use crate::collaborators::RenderError;
use crate::executor::ExecutionError;

/// Errors that abort a lifecycle action.
///
/// Nothing is rolled back: mutations issued before the failure stay in place,
/// and the next run reconciles from whatever state the zone was left in.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A read-only query failed where success was expected.
    #[error("failed to probe zone '{zone}': {err}")]
    Probe {
        zone: String,
        #[source]
        err: ExecutionError,
    },

    #[error("unexpected `zoneadm list -p` output for zone '{zone}': {line:?}")]
    MalformedListing { zone: String, line: String },

    /// A mutating command exited non-zero.
    #[error("failed to {op} zone '{zone}': {err}")]
    Mutation {
        zone: String,
        op: String,
        #[source]
        err: ExecutionError,
    },

    #[error("failed to render template '{template}' to {}: {err}", .dest.display())]
    Render {
        template: String,
        dest: PathBuf,
        #[source]
        err: RenderError,
    },

    #[error("failed to copy {} to {}: {err}", .src.display(), .dest.display())]
    Copy {
        src: PathBuf,
        dest: PathBuf,
        #[source]
        err: std::io::Error,
    },
}

impl Error {
    pub fn is_probe(&self) -> bool {
        matches!(self, Error::Probe { .. } | Error::MalformedListing { .. })
    }

    pub fn is_mutation(&self) -> bool {
        matches!(self, Error::Mutation { .. })
    }
}
