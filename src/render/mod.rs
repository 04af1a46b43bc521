//! Render model builder: TemplateSchema → RenderTree.
//!
//! Walks sections top-down, sorts by declared order, expands repeat groups into
//! concrete instances and gives every field a unique control identifier.

pub mod ids;
pub mod repeat;
pub mod types;

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::parse::types::{Section, TemplateSchema, effective_conditions};

pub use repeat::{RepeatBounds, RepeatEntry, RepeatRegistry};
pub use types::*;

/// Inputs a build consults besides the template.
pub struct BuildOptions<'a> {
    /// Only sections tagged with this step (untagged sections always render).
    pub step: Option<&'a str>,
    /// Values used to infer repeat counts the registry has not recorded yet.
    pub persisted: &'a Map<String, Value>,
    pub fallback_max: u32,
}

struct Builder<'a, 'r> {
    options: &'a BuildOptions<'a>,
    registry: &'r mut RepeatRegistry,
    seen_controls: HashSet<String>,
    seen_groups: HashSet<String>,
}

/// Build the render tree for the active step.
pub fn build_render_tree(
    template: &TemplateSchema,
    registry: &mut RepeatRegistry,
    options: &BuildOptions<'_>,
) -> RenderTree {
    registry.clear_entries();
    let mut builder = Builder {
        options,
        registry,
        seen_controls: HashSet::new(),
        seen_groups: HashSet::new(),
    };

    let mut sections: Vec<&Section> = template
        .sections
        .iter()
        .filter(|s| match (options.step, s.step.as_deref()) {
            (Some(active), Some(tagged)) => active == tagged,
            _ => true,
        })
        .collect();
    sort_by_order(&mut sections, |s| s.order);

    let groups = sections
        .into_iter()
        .map(|s| builder.build_group(s, GroupKind::Section, &[]))
        .collect();

    let tree = RenderTree { groups };
    tracing::debug!(
        step = options.step.unwrap_or("*"),
        fields = tree.fields().len(),
        "render tree built"
    );
    tree
}

impl Builder<'_, '_> {
    fn build_group(&mut self, section: &Section, kind: GroupKind, scope: &[ScopeFrame]) -> RenderGroup {
        let conditions = effective_conditions(&section.conditions, &section.visibility);
        let outer = ids::scope_prefix(scope);

        let Some(spec) = section.repeat.as_ref().filter(|r| r.enabled) else {
            let key = self.unique_group_key(format!("{outer}{}", ids::repeat_key(section)));
            let instance = self.build_instance(section, None, None, scope);
            return RenderGroup {
                key,
                title: section.title.clone(),
                kind,
                template_enabled: section.is_enabled,
                conditions,
                scope: scope.to_vec(),
                repeat_key: None,
                instances: vec![instance],
            };
        };

        let key = self.unique_group_key(format!("{outer}{}", ids::repeat_key(section)));
        let bounds = RepeatBounds::from_spec(spec, self.options.fallback_max);
        let entry = RepeatEntry {
            key: key.clone(),
            owner: kind,
            prefix: format!("{key}_"),
            field_ids: repeated_field_ids(section),
            min: bounds.min,
            max: bounds.max,
            default_count: bounds.default_count,
            label: spec.label.clone(),
        };
        let count = self.registry.resolve_count(&entry, self.options.persisted);
        let prefix = entry.prefix.clone();
        self.registry.register(entry);

        let label_base = spec
            .label
            .clone()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| section.title.clone());

        let instances = (1..=count)
            .map(|index| {
                let mut inner = scope.to_vec();
                inner.push(ScopeFrame {
                    prefix: prefix.clone(),
                    index,
                });
                let label = format!("{label_base} {index}");
                self.build_instance(section, Some(index), Some(label), &inner)
            })
            .collect();

        RenderGroup {
            key: key.clone(),
            title: section.title.clone(),
            kind,
            template_enabled: section.is_enabled,
            conditions,
            scope: scope.to_vec(),
            repeat_key: Some(key),
            instances,
        }
    }

    fn build_instance(
        &mut self,
        section: &Section,
        index: Option<u32>,
        label: Option<String>,
        scope: &[ScopeFrame],
    ) -> RenderInstance {
        let mut fields: Vec<_> = section.fields.iter().collect();
        sort_by_order(&mut fields, |f| f.order);

        let fields = fields
            .into_iter()
            .map(|field| {
                let control_id = self.unique_control_id(ids::control_id(scope, &field.id));
                RenderField {
                    control_id,
                    instance_index: scope.last().map(|f| f.index),
                    scope: scope.to_vec(),
                    conditions: effective_conditions(&field.conditions, &field.visibility),
                    field: field.clone(),
                }
            })
            .collect();

        let mut subsections: Vec<&Section> = section.subsections.iter().collect();
        sort_by_order(&mut subsections, |s| s.order);
        let children = subsections
            .into_iter()
            .map(|sub| self.build_group(sub, GroupKind::Subsection, scope))
            .collect();

        RenderInstance {
            index,
            label,
            fields,
            children,
        }
    }

    fn unique_control_id(&mut self, candidate: String) -> String {
        if self.seen_controls.insert(candidate.clone()) {
            return candidate;
        }
        let mut n = 2;
        loop {
            let next = format!("{candidate}__{n}");
            if self.seen_controls.insert(next.clone()) {
                tracing::warn!(control_id = %candidate, renamed = %next, "duplicate control identifier");
                return next;
            }
            n += 1;
        }
    }

    /// Group keys double as repeat prefixes, so a clash is suffixed without
    /// an underscore: `contacts_2` would read as instance 2 of `contacts`.
    fn unique_group_key(&mut self, candidate: String) -> String {
        if self.seen_groups.insert(candidate.clone()) {
            return candidate;
        }
        let mut n = 2;
        loop {
            let next = format!("{candidate}{n}");
            if self.seen_groups.insert(next.clone()) {
                return next;
            }
            n += 1;
        }
    }
}

/// Raw ids carried by each instance: own fields plus those of nested
/// non-repeating subsections.
fn repeated_field_ids(section: &Section) -> Vec<String> {
    let mut ids: Vec<String> = section.fields.iter().map(|f| f.id.clone()).collect();
    for sub in section.subsections.iter().filter(|s| !s.is_repeating()) {
        ids.extend(repeated_field_ids(sub));
    }
    ids
}

/// Stable sort by declared order; entries without an order keep their
/// position after ordered ones.
fn sort_by_order<T>(items: &mut [T], order: impl Fn(&T) -> Option<f64>) {
    items.sort_by(|a, b| {
        let a = order(a).unwrap_or(f64::INFINITY);
        let b = order(b).unwrap_or(f64::INFINITY);
        a.total_cmp(&b)
    });
}
