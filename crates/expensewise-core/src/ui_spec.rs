//! Declarative UI specs attached to chat answers
//!
//! A model may append a fenced `ui-spec` block holding one JSON patch per
//! line. Patches build a tree of chart/table components rooted at `/root`:
//!
//! ````text
//! ```ui-spec
//! {"op":"add","path":"/root","value":{"type":"Stack","props":{},"children":[]}}
//! {"op":"add","path":"/root/children/-","value":{"type":"Metric","props":{"label":"Spent","value":"1,204 EUR"}}}
//! ```
//! ````
//!
//! Rendering is a client concern; this module only builds and validates.

use std::sync::OnceLock;

use json_patch::PatchOperation;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::error::{Error, Result};

/// Components a client knows how to render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComponentType {
    Stack,
    Card,
    Metric,
    BarChart,
    LineChart,
    PieChart,
    Table,
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiNode {
    #[serde(rename = "type")]
    pub component: ComponentType,
    #[serde(default)]
    pub props: Map<String, Value>,
    #[serde(default)]
    pub children: Vec<UiNode>,
}

/// A validated component tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UiSpec {
    pub root: UiNode,
}

impl UiSpec {
    /// Apply patches to an empty `{"root": null}` document and validate the
    /// resulting tree
    pub fn from_patches(patches: &[PatchOperation]) -> Result<Self> {
        let mut doc = json!({ "root": null });
        for (i, op) in patches.iter().enumerate() {
            json_patch::patch(&mut doc, std::slice::from_ref(op))
                .map_err(|e| Error::UiSpec(format!("patch {}: {}", i + 1, e)))?;
        }
        let root = match doc.get_mut("root").map(Value::take) {
            Some(Value::Null) | None => return Err(Error::UiSpec("no root component".into())),
            Some(root) => root,
        };
        let root: UiNode = serde_json::from_value(root)
            .map_err(|e| Error::UiSpec(format!("invalid component tree: {}", e)))?;
        Ok(Self { root })
    }

    /// Parse JSONL patch text (one patch per line, blank lines ignored)
    pub fn parse(jsonl: &str) -> Result<Self> {
        let patches = jsonl
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                parse_patch_line(line.trim())
                    .map_err(|e| Error::UiSpec(format!("line {}: {}", n + 1, e)))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_patches(&patches)
    }

    /// Number of nodes in the tree
    pub fn node_count(&self) -> usize {
        fn count(node: &UiNode) -> usize {
            1 + node.children.iter().map(count).sum::<usize>()
        }
        count(&self.root)
    }
}

/// Whether a JSON pointer addresses `/root` or something below it
fn under_root(path: &str) -> bool {
    path == "/root" || path.starts_with("/root/")
}

/// Parse one patch line, keeping every pointer inside `/root`
fn parse_patch_line(line: &str) -> std::result::Result<PatchOperation, String> {
    let value: Value = serde_json::from_str(line).map_err(|e| e.to_string())?;
    for key in ["path", "from"] {
        if let Some(path) = value.get(key) {
            let path = path.as_str().ok_or_else(|| format!("{} must be a string", key))?;
            if !under_root(path) {
                return Err(format!("{} must start with /root: {}", key, path));
            }
        }
    }
    serde_json::from_value(value).map_err(|e| e.to_string())
}

fn block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```ui-spec[ \t]*\r?\n(.*?)```").expect("valid regex"))
}

/// A chat answer split into its text and optional UI spec
#[derive(Debug, Clone, PartialEq)]
pub struct SplitAnswer {
    /// Answer text with every `ui-spec` block removed
    pub text: String,
    pub ui_spec: Option<UiSpec>,
    /// Why a present block was dropped
    pub ui_spec_error: Option<String>,
}

/// Separate `ui-spec` blocks from answer text.
///
/// The first block is parsed; an invalid spec is dropped with a warning and
/// the text is still returned.
pub fn split_answer(text: &str) -> SplitAnswer {
    let re = block_regex();
    let first = re
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());
    let stripped = re.replace_all(text, "").trim().to_string();

    let (ui_spec, ui_spec_error) = match first {
        None => (None, None),
        Some(block) => match UiSpec::parse(&block) {
            Ok(spec) => (Some(spec), None),
            Err(e) => {
                warn!(error = %e, "Dropping invalid UI spec");
                (None, Some(e.to_string()))
            }
        },
    };

    SplitAnswer {
        text: stripped,
        ui_spec,
        ui_spec_error,
    }
}
