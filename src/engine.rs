//! Form engine: one interpreter owning the whole build lifecycle.
//!
//! Template → render tree → control set, then every value change runs the
//! dependent-dropdown and visibility passes to a fixed point and reports the
//! resulting `ChangeSet`. Rebuilds happen on template, document, step and
//! repeat-count changes and replay a snapshot of prior values.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::collab::{DocumentKey, DocumentStore, Identity, OptionSource, SearchProvider, SearchRequest, TemplateSource};
use crate::config::EngineConfig;
use crate::error::{EngineError, RequiredViolation};
use crate::eval::{ChangeSet, Snapshot, visibility};
use crate::lookup::{self, LookupResolver, ResolvedLookup};
use crate::options::{DependencyGraph, OptionItem, OptionRequest, OptionResolver, OptionState};
use crate::parse::{self, TemplateSchema};
use crate::persist;
use crate::render::{BuildOptions, RenderField, RenderTree, RepeatRegistry, build_render_tree};
use crate::state::value::{display_text, has_value};
use crate::state::{BindingContext, ControlSet, ControlState, bind_controls};

/// Repeat group status for the view layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatStatus {
    pub key: String,
    pub label: Option<String>,
    pub count: u32,
    pub min: u32,
    pub max: u32,
    pub can_add: bool,
    pub can_remove: bool,
}

/// Everything a view layer binds to, borrowed from the engine.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineView<'a> {
    pub step: Option<&'a str>,
    pub tree: &'a RenderTree,
    pub controls: BTreeMap<&'a str, &'a ControlState>,
    pub options: BTreeMap<&'a str, &'a [OptionItem]>,
    pub groups: &'a BTreeMap<String, bool>,
    pub repeats: Vec<RepeatStatus>,
}

pub struct FormEngine {
    config: EngineConfig,
    template: TemplateSchema,
    persisted: Map<String, Value>,
    has_persisted: bool,
    operator_id: Option<String>,
    step: Option<String>,
    registry: RepeatRegistry,
    tree: RenderTree,
    controls: ControlSet,
    options: OptionResolver,
    dependents: DependencyGraph,
    lookups: LookupResolver,
    group_visibility: BTreeMap<String, bool>,
}

impl FormEngine {
    pub fn new(template: TemplateSchema, config: EngineConfig) -> Self {
        let mut engine = FormEngine {
            config,
            template,
            persisted: Map::new(),
            has_persisted: false,
            operator_id: None,
            step: None,
            registry: RepeatRegistry::new(),
            tree: RenderTree::default(),
            controls: ControlSet::new(),
            options: OptionResolver::new(),
            dependents: DependencyGraph::default(),
            lookups: LookupResolver::new(),
            group_visibility: BTreeMap::new(),
        };
        engine.rebuild(Map::new());
        engine
    }

    /// Build from template JSON. A malformed template renders an empty form.
    pub fn from_json(template_json: &str, config: EngineConfig) -> Self {
        Self::new(parse::parse_lenient(template_json), config)
    }

    /// Set the operator used for owner defaults. Rebinds from the persisted
    /// document, so call it before the user starts editing.
    pub fn with_operator(mut self, operator_id: impl Into<String>) -> Self {
        self.operator_id = Some(operator_id.into());
        let snapshot = self.persisted.clone();
        self.rebuild(snapshot);
        self
    }

    pub fn with_identity(self, identity: &dyn Identity) -> Self {
        match identity.operator_id() {
            Some(id) => self.with_operator(id),
            None => self,
        }
    }

    // =========================================================================
    // LOADING
    // =========================================================================

    /// Switch templates. Repeat counts, option and lookup caches are reset.
    pub fn load_template(&mut self, template: TemplateSchema) {
        self.template = template;
        self.registry.reset();
        self.options.teardown();
        self.lookups.reset();
        let snapshot = self.persisted.clone();
        self.rebuild(snapshot);
    }

    pub fn load_template_from(&mut self, source: &mut dyn TemplateSource, template_id: &str) -> Result<(), EngineError> {
        let json = source.fetch(template_id)?;
        self.load_template(parse::parse_lenient(&json));
        Ok(())
    }

    /// Replace the persisted document and rebind every control from it.
    pub fn load_document(&mut self, raw: Option<&str>) {
        self.persisted = persist::parse_document(raw);
        self.has_persisted = !self.persisted.is_empty();
        self.registry.reset();
        self.lookups.reset();
        let snapshot = self.persisted.clone();
        self.rebuild(snapshot);
    }

    pub fn load_document_from(&mut self, store: &mut dyn DocumentStore, key: &DocumentKey) -> Result<(), EngineError> {
        let raw = store.load(key)?;
        self.load_document(raw.as_deref());
        Ok(())
    }

    /// Render only the sections tagged with `step` (`None` renders all).
    /// Values entered so far are folded into the in-memory document; the
    /// store only sees them at the next save.
    pub fn set_step(&mut self, step: Option<&str>) {
        self.persisted = self.merged_document();
        let snapshot = self.persisted.clone();
        self.step = step.map(str::to_string);
        self.options.teardown();
        self.lookups.reset();
        self.rebuild(snapshot);
    }

    // =========================================================================
    // BUILD & RECOMPUTE
    // =========================================================================

    fn rebuild(&mut self, snapshot: Map<String, Value>) {
        let options = BuildOptions {
            step: self.step.as_deref(),
            persisted: &self.persisted,
            fallback_max: self.config.repeat_fallback_max,
        };
        self.tree = build_render_tree(&self.template, &mut self.registry, &options);

        self.controls = ControlSet::new();
        let ctx = BindingContext {
            snapshot: &snapshot,
            operator_id: self.operator_id.as_deref(),
            has_persisted: self.has_persisted,
            config: &self.config,
            now: Utc::now(),
        };
        let bound = bind_controls(&self.tree, &mut self.controls, &ctx);

        self.dependents = DependencyGraph::build(&self.config.dependent_rules, &self.tree);
        self.options.bind(&self.tree, &self.config);
        self.options.reconcile(&mut self.controls);
        self.group_visibility.clear();
        self.recompute();
        tracing::debug!(controls = bound, generation = self.options.generation(), "form rebuilt");
    }

    /// Dependent refresh and visibility, repeated until neither changes
    /// anything. `&mut self` keeps the pass from re-entering itself.
    fn recompute(&mut self) {
        let limit = self.controls.len() + 2;
        for pass in 1..=limit {
            let dependents_changed = self
                .options
                .refresh_dependents(&self.dependents, &self.config, &mut self.controls);
            let cleared = visibility::evaluate(&self.tree, &mut self.controls, &mut self.group_visibility);
            if !dependents_changed && cleared.is_empty() {
                tracing::trace!(passes = pass, "recompute settled");
                return;
            }
        }
        tracing::warn!(passes = limit, "recompute did not settle");
    }

    fn diff(&self, before: &Snapshot, requested: Option<&str>) -> ChangeSet {
        before.diff(&self.controls, &self.group_visibility, requested)
    }

    // =========================================================================
    // VALUES
    // =========================================================================

    /// Set a control's value and recompute everything that depends on it.
    pub fn set_value(&mut self, control_id: &str, value: Value) -> Result<ChangeSet, EngineError> {
        let before = Snapshot::capture(&self.controls, &self.group_visibility);
        self.controls.set_value(control_id, value)?;
        self.options.reconcile(&mut self.controls);
        self.recompute();
        Ok(self.diff(&before, Some(control_id)))
    }

    pub fn touch(&mut self, control_id: &str) -> Result<(), EngineError> {
        let control = self
            .controls
            .get_mut(control_id)
            .ok_or_else(|| EngineError::UnknownControl(control_id.to_string()))?;
        control.touched = true;
        Ok(())
    }

    pub fn value(&self, control_id: &str) -> Option<&Value> {
        self.controls.value(control_id)
    }

    // =========================================================================
    // REPEAT GROUPS
    // =========================================================================

    /// Append an empty instance. `false` when the group is unknown or full.
    pub fn add_instance(&mut self, key: &str) -> bool {
        if !self.registry.can_add(key) {
            tracing::debug!(key, "add instance rejected");
            return false;
        }
        let snapshot = self.controls.snapshot();
        self.registry.add(key);
        self.rebuild(snapshot);
        true
    }

    /// Remove instance `index` (1-based) and shift later instances down.
    /// `false` when the group is unknown, at its minimum or `index` is out of
    /// range.
    pub fn remove_instance(&mut self, key: &str, index: u32) -> bool {
        let Some(removed) = self.registry.remove(key, index) else {
            tracing::debug!(key, index, "remove instance rejected");
            return false;
        };
        let mut snapshot = self.controls.snapshot();
        removed.shift(&mut snapshot);
        removed.shift(&mut self.persisted);
        self.lookups.shift(&removed);
        self.rebuild(snapshot);
        true
    }

    pub fn repeat_groups(&self) -> Vec<RepeatStatus> {
        self.registry
            .entries()
            .map(|entry| {
                let count = self.registry.count(&entry.key).unwrap_or(0);
                RepeatStatus {
                    key: entry.key.clone(),
                    label: entry.label.clone(),
                    count,
                    min: entry.min,
                    max: entry.max,
                    can_add: self.registry.can_add(&entry.key),
                    can_remove: count > entry.min,
                }
            })
            .collect()
    }

    // =========================================================================
    // OPTIONS
    // =========================================================================

    /// Sources the host still has to fetch for the current build.
    pub fn pending_option_requests(&mut self) -> Vec<OptionRequest> {
        self.options.pending_requests(&self.template.module_hints)
    }

    /// Apply a fetched (or failed) source. Stale responses change nothing.
    pub fn receive_options(
        &mut self,
        generation: u64,
        source: &str,
        rows: Result<Vec<Value>, EngineError>,
    ) -> ChangeSet {
        let before = Snapshot::capture(&self.controls, &self.group_visibility);
        if !self.options.receive(generation, source, rows, &self.config) {
            return ChangeSet::default();
        }
        self.options.reconcile(&mut self.controls);
        self.recompute();
        self.diff(&before, None)
    }

    /// Fetch every pending source through `source` and apply the results.
    pub fn resolve_options(&mut self, source: &mut dyn OptionSource) -> ChangeSet {
        let before = Snapshot::capture(&self.controls, &self.group_visibility);
        for request in self.pending_option_requests() {
            let rows = source.resolve(&request.source, &request.module_hints);
            self.options.receive(request.generation, &request.source, rows, &self.config);
        }
        self.options.reconcile(&mut self.controls);
        self.recompute();
        self.diff(&before, None)
    }

    pub fn options_for(&self, control_id: &str) -> Option<&[OptionItem]> {
        self.options.options_for(control_id)
    }

    pub fn option_state(&self, control_id: &str) -> Option<&OptionState> {
        self.options.state(control_id)
    }

    // =========================================================================
    // LOOKUPS
    // =========================================================================

    fn lookup_field(&self, control_id: &str) -> Result<(RenderField, ResolvedLookup), EngineError> {
        let field = self
            .tree
            .field(control_id)
            .ok_or_else(|| EngineError::UnknownControl(control_id.to_string()))?;
        let lookup = lookup::resolve_lookup(&field.field, &self.config)
            .ok_or_else(|| EngineError::NotALookup(control_id.to_string()))?;
        Ok((field.clone(), lookup))
    }

    /// Request a host would send to its search backend for this field.
    pub fn search_request(&self, control_id: &str, query: &str) -> Result<SearchRequest, EngineError> {
        let (_, lookup) = self.lookup_field(control_id)?;
        Ok(lookup::search_request(&lookup, query))
    }

    /// Run a search through `provider`. A failing provider yields no results.
    pub fn search(
        &self,
        control_id: &str,
        query: &str,
        provider: &mut dyn SearchProvider,
    ) -> Result<Vec<Value>, EngineError> {
        let request = self.search_request(control_id, query)?;
        match provider.search(&request) {
            Ok(results) => Ok(results),
            Err(e) => {
                tracing::warn!(control_id, entity = %request.entity, error = %e, "search failed");
                Ok(Vec::new())
            }
        }
    }

    /// Store a search selection and apply its fill pairs.
    pub fn select_lookup(&mut self, control_id: &str, selected: Value) -> Result<ChangeSet, EngineError> {
        let (field, lookup) = self.lookup_field(control_id)?;
        let before = Snapshot::capture(&self.controls, &self.group_visibility);
        self.lookups
            .select(&field, &lookup, selected, &self.config, &mut self.controls)?;
        self.options.reconcile(&mut self.controls);
        self.recompute();
        Ok(self.diff(&before, Some(control_id)))
    }

    pub fn clear_lookup(&mut self, control_id: &str) -> Result<ChangeSet, EngineError> {
        let (field, lookup) = self.lookup_field(control_id)?;
        let before = Snapshot::capture(&self.controls, &self.group_visibility);
        self.lookups.clear(&field, &lookup, &mut self.controls)?;
        self.recompute();
        Ok(self.diff(&before, Some(control_id)))
    }

    /// Text to show for a lookup control: the cached selection, else the
    /// stored value.
    pub fn display_label(&self, control_id: &str) -> Option<String> {
        if let Ok((_, lookup)) = self.lookup_field(control_id) {
            if let Some(label) = self.lookups.display_label(control_id, &lookup, &self.config) {
                return Some(label);
            }
        }
        self.controls
            .value(control_id)
            .filter(|v| has_value(v))
            .map(display_text)
    }

    // =========================================================================
    // SAVE
    // =========================================================================

    /// Required controls that are visible, enabled and empty.
    pub fn validate(&self) -> Vec<RequiredViolation> {
        self.tree
            .fields()
            .into_iter()
            .filter(|f| self.controls.get(&f.control_id).is_some_and(|c| !c.is_valid()))
            .map(|f| RequiredViolation {
                control_id: f.control_id.clone(),
                raw_id: f.raw_id().to_string(),
                label: if f.field.name.trim().is_empty() {
                    f.raw_id().to_string()
                } else {
                    f.field.name.clone()
                },
            })
            .collect()
    }

    /// Values of every data-bearing control in the current step.
    pub fn current_values(&self) -> Map<String, Value> {
        self.tree
            .fields()
            .into_iter()
            .filter(|f| !f.field.kind.is_decorative())
            .filter_map(|f| {
                self.controls
                    .value(&f.control_id)
                    .map(|v| (f.control_id.clone(), v.clone()))
            })
            .collect()
    }

    /// The persisted document with this step's values folded in.
    pub fn merged_document(&self) -> Map<String, Value> {
        persist::merge_document(&self.persisted, &self.current_values())
    }

    /// Validate and merge; the document a host should persist.
    pub fn prepare_save(&self) -> Result<Map<String, Value>, EngineError> {
        let violations = self.validate();
        if !violations.is_empty() {
            tracing::debug!(count = violations.len(), "save blocked by required fields");
            return Err(EngineError::Validation(violations));
        }
        Ok(self.merged_document())
    }

    /// Adopt a document the host has persisted as the new baseline.
    pub fn commit_saved(&mut self, document: Map<String, Value>) {
        self.persisted = document;
        self.has_persisted = true;
        self.controls.commit_all();
    }

    pub fn save(&mut self, store: &mut dyn DocumentStore, key: &DocumentKey) -> Result<Map<String, Value>, EngineError> {
        let document = self.prepare_save()?;
        let operator = self.operator_id.clone().unwrap_or_default();
        store.save(key, &document, &operator)?;
        tracing::debug!(case_id = %key.case_id, step = %key.step, keys = document.len(), "document saved");
        self.commit_saved(document.clone());
        Ok(document)
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn template(&self) -> &TemplateSchema {
        &self.template
    }

    pub fn tree(&self) -> &RenderTree {
        &self.tree
    }

    pub fn controls(&self) -> &ControlSet {
        &self.controls
    }

    pub fn control(&self, control_id: &str) -> Option<&ControlState> {
        self.controls.get(control_id)
    }

    pub fn step(&self) -> Option<&str> {
        self.step.as_deref()
    }

    pub fn persisted(&self) -> &Map<String, Value> {
        &self.persisted
    }

    /// Unknown groups count as hidden.
    pub fn is_group_visible(&self, key: &str) -> bool {
        self.group_visibility.get(key).copied().unwrap_or(false)
    }

    pub fn view(&self) -> EngineView<'_> {
        EngineView {
            step: self.step.as_deref(),
            tree: &self.tree,
            controls: self.controls.iter().collect(),
            options: self
                .controls
                .ids()
                .iter()
                .filter_map(|id| self.options.options_for(id).map(|o| (id.as_str(), o)))
                .collect(),
            groups: &self.group_visibility,
            repeats: self.repeat_groups(),
        }
    }
}
