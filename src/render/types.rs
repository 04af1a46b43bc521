//! Render model: the template expanded into concrete, addressable controls.

use serde::Serialize;

use crate::parse::types::{Condition, Field};

/// One enclosing repeat instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeFrame {
    /// Naming prefix of the repeat group, e.g. `contacts_`.
    pub prefix: String,
    /// 1-based instance index.
    pub index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupKind {
    Section,
    Subsection,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RenderTree {
    pub groups: Vec<RenderGroup>,
}

impl RenderTree {
    /// Every render field in document order.
    pub fn fields(&self) -> Vec<&RenderField> {
        let mut out = Vec::new();
        for group in &self.groups {
            group.collect_fields(&mut out);
        }
        out
    }

    pub fn field(&self, control_id: &str) -> Option<&RenderField> {
        self.fields().into_iter().find(|f| f.control_id == control_id)
    }

    /// Every group (sections and nested subsections) in document order.
    pub fn all_groups(&self) -> Vec<&RenderGroup> {
        let mut out = Vec::new();
        for group in &self.groups {
            group.collect_groups(&mut out);
        }
        out
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderGroup {
    /// Unique within the tree; repeat groups use their repeat key.
    pub key: String,
    pub title: String,
    pub kind: GroupKind,
    pub template_enabled: bool,
    /// Effective conditions (list form, or the legacy shorthand).
    pub conditions: Vec<Condition>,
    /// Instances enclosing this group.
    pub scope: Vec<ScopeFrame>,
    /// Registry key when the group repeats.
    pub repeat_key: Option<String>,
    pub instances: Vec<RenderInstance>,
}

impl RenderGroup {
    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a RenderField>) {
        for instance in &self.instances {
            out.extend(instance.fields.iter());
            for child in &instance.children {
                child.collect_fields(out);
            }
        }
    }

    fn collect_groups<'a>(&'a self, out: &mut Vec<&'a RenderGroup>) {
        out.push(self);
        for instance in &self.instances {
            for child in &instance.children {
                child.collect_groups(out);
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderInstance {
    /// 1-based index inside a repeat group, `None` for plain groups.
    pub index: Option<u32>,
    pub label: Option<String>,
    pub fields: Vec<RenderField>,
    pub children: Vec<RenderGroup>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderField {
    pub control_id: String,
    /// Index of the innermost enclosing repeat instance.
    pub instance_index: Option<u32>,
    pub scope: Vec<ScopeFrame>,
    pub conditions: Vec<Condition>,
    pub field: Field,
}

impl RenderField {
    pub fn raw_id(&self) -> &str {
        &self.field.id
    }
}
