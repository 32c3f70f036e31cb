//! Assembling a zone declaration from the command line.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use zoneops_core::declaration::ZoneDeclaration;

#[derive(clap::Args, Debug, Clone, Default)]
pub(crate) struct DeclarationArgs {
    /// A JSON file with the (whole) zone declaration
    #[arg(long, value_name = "PATH", conflicts_with = "decl_json")]
    decl_file: Option<PathBuf>,

    /// The (whole) zone declaration, as a JSON object
    ///
    /// For example: `{"name": "web1", "path": "/zones/web1", "nets": ["10.0.0.5:net0"]}`
    #[arg(long, value_name = "JSON")]
    decl_json: Option<String>,

    /// An individual declaration field, in JSON format
    #[arg(long("set-json"), num_args = 2, value_names = &["NAME", "JSON"])]
    set_json: Vec<String>,

    /// An individual declaration field, as a raw string.
    ///
    /// This is equivalent to `--set-json NAME JSON` if JSON is the JSON string formatting of STR.
    #[arg(long("set"), num_args = 2, value_names = &["NAME", "STR"])]
    set_str: Vec<String>,
}

impl DeclarationArgs {
    pub(crate) fn to_declaration(&self) -> Result<ZoneDeclaration> {
        // NOTE: clap does not preserve the order of flags across different
        // options, so we cannot tell which setting came last. Rather than
        // pick a winner, duplicate fields are rejected.
        let mut fields = match (&self.decl_file, &self.decl_json) {
            (Some(path), _) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                serde_json::from_str::<Map<String, Value>>(&text)
                    .with_context(|| format!("failed to parse {}", path.display()))?
            }
            (None, Some(json)) => serde_json::from_str::<Map<String, Value>>(json)
                .context("failed to parse value of --decl-json")?,
            (None, None) => Map::new(),
        };

        for pair in self.set_json.chunks(2) {
            let [k, v] = pair else {
                bail!("--set-json takes a NAME and a JSON value");
            };
            let value = serde_json::from_str(v)
                .with_context(|| format!("failed to parse JSON value for field: {}", k))?;
            insert_new(&mut fields, k, value)?;
        }
        for pair in self.set_str.chunks(2) {
            let [k, v] = pair else {
                bail!("--set takes a NAME and a STR value");
            };
            insert_new(&mut fields, k, Value::String(v.clone()))?;
        }

        serde_json::from_value(Value::Object(fields)).context("invalid zone declaration")
    }
}

fn insert_new(fields: &mut Map<String, Value>, key: &str, value: Value) -> Result<()> {
    if fields.contains_key(key) {
        bail!("duplicate declaration field: {}", key);
    }
    fields.insert(key.to_string(), value);
    Ok(())
}
