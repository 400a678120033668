//! Parser for freeform model documentation into typed parameter specs.
//!
//! Model docs expose their inputs under a `## Model Inputs:` section as
//! loosely-structured YAML-ish lines. The parser is deliberately lenient:
//! a malformed or absent section yields an empty list, and callers treat
//! empty as "use a minimal fallback", never as failure.

use serde::{Deserialize, Serialize};

const SECTION_HEADER: &str = "## Model Inputs:";

/// Field kind as declared in model docs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamKind {
    Text,
    Textarea,
    Numeric,
    /// File or media upload slot (`fileinput`, `imageinput`,
    /// `combinefileinput`).
    FileLike,
    Other(String),
}

impl ParamKind {
    pub fn from_doc(raw: &str) -> Self {
        match raw {
            "text" => Self::Text,
            "textarea" => Self::Textarea,
            "number" | "integer" | "float" | "slider" => Self::Numeric,
            "fileinput" | "imageinput" | "combinefileinput" => Self::FileLike,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamOption {
    pub value: String,
    pub label: String,
}

/// One input parameter of a remote model, in documentation order.
///
/// Order matters: the "first textarea becomes the prompt" fallback rule
/// depends on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub label: String,
    pub help: String,
    pub kind: ParamKind,
    pub default: String,
    pub options: Vec<ParamOption>,
    pub required: bool,
}

impl ParameterSpec {
    fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: String::new(),
            help: String::new(),
            kind: ParamKind::Text,
            default: String::new(),
            options: Vec::new(),
            required: false,
        }
    }
}

fn attr_value(line: &str) -> String {
    line.split_once(':').map(|(_, v)| v.trim().to_string()).unwrap_or_default()
}

/// Parse the `## Model Inputs:` section of a documentation blob.
///
/// Entries start at `- name:` lines; `label:`, `help:`, `type:` and
/// `default:` attach to the current entry; an `options:` marker opens a
/// nested `(value, label)` list that any non-option attribute closes.
pub fn parse_model_inputs(doc: &str) -> Vec<ParameterSpec> {
    let mut specs = Vec::new();

    let Some(start) = doc.find(SECTION_HEADER) else {
        return specs;
    };
    let body = &doc[start + SECTION_HEADER.len()..];
    let section = match body.find("\n## ") {
        Some(end) => &body[..end],
        None => body,
    };

    let mut current: Option<ParameterSpec> = None;
    let mut collecting_options = false;

    for line in section.lines() {
        let stripped = line.trim();

        if let Some(rest) = stripped.strip_prefix("- name:") {
            if let Some(spec) = current.take() {
                specs.push(spec);
            }
            current = Some(ParameterSpec::named(rest.trim()));
            collecting_options = false;
            continue;
        }

        let Some(spec) = current.as_mut() else {
            continue;
        };

        if collecting_options {
            if let Some(rest) = stripped.strip_prefix("- value:") {
                spec.options.push(ParamOption {
                    value: rest.trim().trim_matches('"').to_string(),
                    label: String::new(),
                });
                continue;
            }
            if stripped.starts_with("label:") && !spec.options.is_empty() {
                if let Some(last) = spec.options.last_mut() {
                    last.label = attr_value(stripped);
                }
                continue;
            }
            // Any other attribute line terminates the options block.
            collecting_options = false;
        }

        if stripped.starts_with("label:") {
            spec.label = attr_value(stripped);
        } else if stripped.starts_with("help:") {
            spec.help = attr_value(stripped);
        } else if stripped.starts_with("type:") {
            spec.kind = ParamKind::from_doc(&attr_value(stripped));
        } else if stripped.starts_with("default:") {
            spec.default = attr_value(stripped);
        } else if stripped.starts_with("required:") {
            spec.required = attr_value(stripped) == "true";
        } else if stripped == "options:" {
            collecting_options = true;
        }
    }

    if let Some(spec) = current {
        specs.push(spec);
    }

    specs
}
