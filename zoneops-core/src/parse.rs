//! Parser for the output of `zonecfg -z <zone> info`.
//!
//! The output is meant for humans: top-level `key: value` lines, resource
//! headers such as `net:`, and indented sub-fields belonging to the resource
//! above them. Unset sub-fields are printed as `<name> not specified`.
//!
//! ```text
//! zonename: web1
//! zonepath: /zones/web1
//! autoboot: false
//! net:
//!         address: 10.0.0.1
//!         physical: net0
//!         defrouter not specified
//! ```
//!
//! Each line is classified into a [`Line`] first; [`parse_info`] then runs a
//! small state machine over the classified lines. Parsing never fails: lines it
//! does not understand are skipped and reported in [`ParsedInfo::ignored`].

use crate::props::{SpecialProp, ZoneProps};

/// One line of `zonecfg info` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    Blank,
    /// A non-indented line naming a composite property, e.g. `net:`.
    SectionHeader(SpecialProp),
    /// A non-indented `key: value` line. `value` may be empty, as for `bootargs:`
    /// or for headers of resources that are not managed here (`rctl:`).
    TopLevel { key: &'a str, value: &'a str },
    /// An indented `key: value` line.
    SubField { key: &'a str, value: &'a str },
    /// `<key> not specified`, indented or not.
    Unspecified { key: &'a str, indented: bool },
    Unrecognized(&'a str),
}

const NOT_SPECIFIED: &str = " not specified";

pub fn classify(line: &str) -> Line<'_> {
    let line = line.trim_end();
    let body = line.trim_start();
    if body.is_empty() {
        return Line::Blank;
    }
    let indented = body.len() != line.len();

    if let Some(key) = body.strip_suffix(NOT_SPECIFIED) {
        return Line::Unspecified {
            key: key.trim(),
            indented,
        };
    }
    // Aliased resource controls, e.g. `[cpu-shares: 10]`
    if body.starts_with('[') {
        return Line::Unrecognized(body);
    }
    let Some((key, value)) = body.split_once(':') else {
        return Line::Unrecognized(body);
    };
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() || key.contains(char::is_whitespace) {
        return Line::Unrecognized(body);
    }
    match (indented, SpecialProp::from_name(key)) {
        (false, Some(prop)) => Line::SectionHeader(prop),
        (false, None) => Line::TopLevel { key, value },
        (true, _) => Line::SubField { key, value },
    }
}

/// The result of parsing `zonecfg info`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedInfo {
    pub props: ZoneProps,
    /// Lines that had no effect on `props`: sub-fields a resource is not known
    /// to have, and lines that did not classify. These indicate output from a
    /// tool version we have not seen, and possibly drift we cannot detect.
    pub ignored: Vec<String>,
}

#[derive(Clone, Copy)]
enum Section {
    None,
    Managed(SpecialProp),
    /// A resource we do not manage, such as `rctl` or `attr`.
    Other,
}

struct Parser {
    section: Section,
    /// A `net` resource being assembled, as `address[:physical]`.
    net: Option<String>,
    parsed: ParsedInfo,
}

impl Parser {
    fn ignore(&mut self, line: &str) {
        self.parsed.ignored.push(line.trim().to_string());
    }

    fn finish_net(&mut self) {
        if let Some(net) = self.net.take() {
            self.parsed.props.special_mut(SpecialProp::Net).push(net);
        }
    }

    fn line(&mut self, raw: &str) {
        match classify(raw) {
            Line::Blank => {}
            Line::SectionHeader(prop) => {
                self.net = None;
                self.section = Section::Managed(prop);
                self.parsed.props.special_mut(prop);
            }
            Line::TopLevel { key, value } => {
                self.net = None;
                self.section = if value.is_empty() {
                    Section::Other
                } else {
                    Section::None
                };
                if !value.is_empty() {
                    self.parsed.props.set(key, value);
                }
            }
            Line::SubField { key, value } => match self.section {
                Section::Managed(prop) if prop.known_fields().contains(&key) => {
                    self.sub_field(raw, prop, key, value)
                }
                Section::Other => {}
                Section::Managed(_) | Section::None => self.ignore(raw),
            },
            Line::Unspecified { key, indented } => match self.section {
                Section::Managed(SpecialProp::Net) if indented && key == "defrouter" => {
                    self.finish_net()
                }
                _ => {}
            },
            Line::Unrecognized(_) => self.ignore(raw),
        }
    }

    fn sub_field(&mut self, raw: &str, prop: SpecialProp, key: &str, value: &str) {
        match prop {
            SpecialProp::Net => match key {
                "address" => self.net = Some(value.to_string()),
                "physical" | "defrouter" => match self.net.as_mut() {
                    Some(net) => {
                        net.push(':');
                        net.push_str(value);
                        if key == "defrouter" {
                            self.finish_net();
                        }
                    }
                    None => self.ignore(raw),
                },
                _ => {}
            },
            SpecialProp::Fs | SpecialProp::Dataset | SpecialProp::InheritPkgDir => {
                if key == prop.key_field() {
                    self.parsed.props.special_mut(prop).push(value.to_string());
                }
            }
        }
    }
}

/// Parses `zonecfg info` output into normalized properties.
pub fn parse_info(text: &str) -> ParsedInfo {
    let mut parser = Parser {
        section: Section::None,
        net: None,
        parsed: ParsedInfo::default(),
    };
    for line in text.lines() {
        parser.line(line);
    }
    parser.parsed
}
