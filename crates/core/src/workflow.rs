//! Workflow template store.
//!
//! A template is one JSON document per name on disk, pairing a backend
//! node graph with a slot map that names the graph leaves a request may
//! overwrite:
//!
//! ```json
//! {
//!   "slots": {
//!     "prompt": {"node": "6", "input": "text"},
//!     "seed":   {"node": "3", "input": "seed"}
//!   },
//!   "graph": { "3": {"inputs": {"seed": 0, ...}}, ... }
//! }
//! ```
//!
//! Substitution only ever overwrites existing leaf values; it never
//! adds or removes inputs, and it always operates on a clone of the
//! graph so the stored template is untouched.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::CoreError;
use crate::types::JobRequest;

/// Addresses one overwritable leaf in the node graph.
#[derive(Debug, Clone, Deserialize)]
pub struct SlotRef {
    /// Node identifier in the graph (object key).
    pub node: String,
    /// Input name inside that node's `inputs` object.
    pub input: String,
}

/// The fixed, known set of substitution slots.
///
/// `prompt` and `seed` are mandatory; the rest are only substituted
/// when both the template declares them and the request supplies a
/// value.
#[derive(Debug, Clone, Deserialize)]
pub struct SlotMap {
    pub prompt: SlotRef,
    pub seed: SlotRef,
    #[serde(default)]
    pub negative_prompt: Option<SlotRef>,
    #[serde(default)]
    pub width: Option<SlotRef>,
    #[serde(default)]
    pub height: Option<SlotRef>,
    #[serde(default)]
    pub steps: Option<SlotRef>,
    #[serde(default)]
    pub cfg: Option<SlotRef>,
}

/// A parsed, validated workflow template.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowTemplate {
    pub slots: SlotMap,
    pub graph: serde_json::Value,
}

impl WorkflowTemplate {
    /// Parse a template document and verify that every declared slot
    /// addresses an existing leaf in the graph.
    pub fn parse(name: &str, text: &str) -> Result<Self, CoreError> {
        let template: WorkflowTemplate = serde_json::from_str(text)
            .map_err(|e| CoreError::Malformed(format!("workflow template '{name}': {e}")))?;
        template.check_slots(name)?;
        Ok(template)
    }

    /// Instantiate the template for one request.
    ///
    /// Returns a new graph with the prompt and seed leaves overwritten,
    /// plus any optional slot for which the request carries a value.
    /// The template itself is never mutated.
    pub fn apply(&self, request: &JobRequest, seed: u64) -> Result<serde_json::Value, CoreError> {
        let mut graph = self.graph.clone();

        set_slot(&mut graph, &self.slots.prompt, request.prompt_text.clone().into())?;
        set_slot(&mut graph, &self.slots.seed, seed.into())?;

        if let (Some(slot), Some(text)) =
            (&self.slots.negative_prompt, &request.negative_prompt_text)
        {
            set_slot(&mut graph, slot, text.clone().into())?;
        }
        if let (Some(slot), Some(width)) = (&self.slots.width, request.width) {
            set_slot(&mut graph, slot, width.into())?;
        }
        if let (Some(slot), Some(height)) = (&self.slots.height, request.height) {
            set_slot(&mut graph, slot, height.into())?;
        }
        if let (Some(slot), Some(steps)) = (&self.slots.steps, request.step_count) {
            set_slot(&mut graph, slot, steps.into())?;
        }
        if let (Some(slot), Some(cfg)) = (&self.slots.cfg, request.guidance_scale) {
            set_slot(&mut graph, slot, cfg.into())?;
        }

        Ok(graph)
    }

    /// Verify every declared slot points at an existing input leaf.
    fn check_slots(&self, name: &str) -> Result<(), CoreError> {
        let declared = [
            Some(&self.slots.prompt),
            Some(&self.slots.seed),
            self.slots.negative_prompt.as_ref(),
            self.slots.width.as_ref(),
            self.slots.height.as_ref(),
            self.slots.steps.as_ref(),
            self.slots.cfg.as_ref(),
        ];
        for slot in declared.into_iter().flatten() {
            if slot_value(&self.graph, slot).is_none() {
                return Err(CoreError::Malformed(format!(
                    "workflow template '{name}': slot {}/{} missing from graph",
                    slot.node, slot.input
                )));
            }
        }
        Ok(())
    }
}

fn slot_value<'a>(graph: &'a serde_json::Value, slot: &SlotRef) -> Option<&'a serde_json::Value> {
    graph.get(&slot.node)?.get("inputs")?.get(&slot.input)
}

/// Overwrite one existing input leaf. Refuses to create new inputs so
/// that substitution can never change the shape of the graph.
fn set_slot(
    graph: &mut serde_json::Value,
    slot: &SlotRef,
    value: serde_json::Value,
) -> Result<(), CoreError> {
    let leaf = graph
        .get_mut(&slot.node)
        .and_then(|node| node.get_mut("inputs"))
        .and_then(|inputs| inputs.get_mut(&slot.input))
        .ok_or_else(|| {
            CoreError::Malformed(format!("slot {}/{} missing from graph", slot.node, slot.input))
        })?;
    *leaf = value;
    Ok(())
}

/// In-memory store of all workflow templates, loaded once at startup.
#[derive(Debug)]
pub struct TemplateStore {
    templates: HashMap<String, WorkflowTemplate>,
}

impl TemplateStore {
    /// Scan `dir` for `*.json` files and parse each into a template
    /// keyed by its file stem. Any unparsable file fails the load.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, CoreError> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|_| CoreError::NotFound {
            what: "workflow directory",
            name: dir.display().to_string(),
        })?;

        let mut templates = HashMap::new();
        for entry in entries {
            let entry = entry.map_err(|e| CoreError::Malformed(format!("workflow dir: {e}")))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let text = std::fs::read_to_string(&path)
                .map_err(|e| CoreError::Malformed(format!("workflow template '{name}': {e}")))?;
            let template = WorkflowTemplate::parse(name, &text)?;
            tracing::debug!(name, "Loaded workflow template");
            templates.insert(name.to_string(), template);
        }

        tracing::info!(count = templates.len(), dir = %dir.display(), "Workflow templates loaded");
        Ok(Self { templates })
    }

    pub fn get(&self, name: &str) -> Result<&WorkflowTemplate, CoreError> {
        self.templates.get(name).ok_or(CoreError::NotFound {
            what: "workflow template",
            name: name.to_string(),
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
