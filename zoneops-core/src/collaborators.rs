//! Filesystem work done on behalf of a lifecycle action: rendering the
//! `sysidcfg` machine identity file and copying the SSH daemon configuration
//! into a freshly installed zone.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("undefined variable '{0}'")]
    Undefined(String),

    #[error("unterminated placeholder at byte {0}")]
    Unterminated(usize),

    #[error("variable '{0}' is not a scalar value")]
    NotScalar(String),
}

/// Renders a named template into a file.
pub trait TemplateRenderer {
    /// Renders `template` with `variables` into `dest`. Returns whether `dest`
    /// was changed; rendering identical content leaves the file alone.
    fn render(&self, dest: &Path, template: &str, variables: &Value) -> Result<bool, RenderError>;
}

/// Copies files on the host.
pub trait FileCopier {
    fn copy(&self, src: &Path, dest: &Path) -> io::Result<()>;
}

/// Templates read from a directory, with `{{ dotted.path }}` placeholders
/// looked up in the variables.
#[derive(Debug, Clone)]
pub struct FileTemplates {
    dir: PathBuf,
}

impl FileTemplates {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileTemplates { dir: dir.into() }
    }
}

impl TemplateRenderer for FileTemplates {
    fn render(&self, dest: &Path, template: &str, variables: &Value) -> Result<bool, RenderError> {
        let source = fs::read_to_string(self.dir.join(template))?;
        let rendered = render_str(&source, variables)?;
        write_if_changed(dest, &rendered)
    }
}

fn lookup<'a>(variables: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(variables, |v, segment| match v {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Substitutes every `{{ path }}` in `source`. Null renders as the empty
/// string; arrays and objects are rejected.
pub fn render_str(source: &str, variables: &Value) -> Result<String, RenderError> {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| RenderError::Unterminated(source.len() - rest.len() + start))?;
        let path = after[..end].trim();
        match lookup(variables, path) {
            None => return Err(RenderError::Undefined(path.to_string())),
            Some(Value::Null) => {}
            Some(Value::String(s)) => out.push_str(s),
            Some(v @ (Value::Bool(_) | Value::Number(_))) => out.push_str(&v.to_string()),
            Some(Value::Array(_) | Value::Object(_)) => {
                return Err(RenderError::NotScalar(path.to_string()))
            }
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

fn write_if_changed(dest: &Path, contents: &str) -> Result<bool, RenderError> {
    match fs::read_to_string(dest) {
        Ok(existing) if existing == contents => {
            debug!(dest = %dest.display(), "rendered file is up to date");
            return Ok(false);
        }
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(dest, contents)?;
    info!(dest = %dest.display(), "rendered file");
    Ok(true)
}

/// Copies with `std::fs`, creating the destination directory as needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostFiles;

impl FileCopier for HostFiles {
    fn copy(&self, src: &Path, dest: &Path) -> io::Result<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(src, dest)?;
        Ok(())
    }
}
