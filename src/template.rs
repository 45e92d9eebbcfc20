//! Named, durable transformation-plan templates.
//!
//! A template is a saved plan keyed by name so a mapping worked out for one
//! quarter's RCM file can be reused on the next. Names are effectively
//! unique: saving under an existing name overwrites that template's plan in
//! place (same id) instead of creating a duplicate.
//!
//! The store is a single JSON file holding the full ordered template list,
//! read on open and rewritten on every mutation. Writes go through a sibling
//! temp file and an atomic rename, so a failed write leaves the previous
//! state intact.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::plan::TransformationPlan;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: Uuid,
    pub name: String,
    pub plan: TransformationPlan,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

impl Template {
    pub fn new(name: impl Into<String>, plan: TransformationPlan) -> Self {
        Template {
            id: Uuid::new_v4(),
            name: name.into(),
            plan,
            saved_at: Some(Utc::now()),
        }
    }
}

#[derive(Debug)]
pub struct TemplateStore {
    path: PathBuf,
    templates: Vec<Template>,
}

impl TemplateStore {
    /// Open the store at `path`, reading any existing collection. A missing
    /// file is an empty store, not an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let templates = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("Reading template store {path:?}"))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Parsing template store {path:?}"))?
        } else {
            Vec::new()
        };
        Ok(TemplateStore { path, templates })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All templates in insertion order.
    pub fn list(&self) -> &[Template] {
        &self.templates
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.name == name)
    }

    /// Save a plan under `name`. An existing template with that name is
    /// overwritten in place, keeping its id and position; otherwise a new
    /// template with a fresh id is appended. The full collection persists
    /// before this returns.
    pub fn save(&mut self, name: &str, plan: TransformationPlan) -> Result<&Template> {
        let idx = match self.templates.iter().position(|t| t.name == name) {
            Some(idx) => {
                debug!("Overwriting template '{name}'");
                let existing = &mut self.templates[idx];
                existing.plan = plan;
                existing.saved_at = Some(Utc::now());
                idx
            }
            None => {
                self.templates.push(Template::new(name, plan));
                self.templates.len() - 1
            }
        };
        self.persist()?;
        Ok(&self.templates[idx])
    }

    /// Remove the template with `id`. Removing an absent id is a no-op and
    /// does not rewrite the file.
    pub fn delete(&mut self, id: Uuid) -> Result<bool> {
        let before = self.templates.len();
        self.templates.retain(|t| t.id != id);
        if self.templates.len() == before {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating template store directory {parent:?}"))?;
        }
        let serialized =
            serde_json::to_string_pretty(&self.templates).context("Serializing template store")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serialized)
            .with_context(|| format!("Writing template store {tmp:?}"))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Replacing template store {:?}", self.path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{plan::MappingRule, schema::StandardColumn};
    use tempfile::tempdir;

    fn plan_with_source(source: &str) -> TransformationPlan {
        TransformationPlan::new(vec![MappingRule::direct(StandardColumn::Risk, source)]).unwrap()
    }

    #[test]
    fn save_overwrites_by_name_and_keeps_id() {
        let dir = tempdir().expect("temp dir");
        let mut store = TemplateStore::open(dir.path().join("templates.json")).unwrap();

        store.save("T1", plan_with_source("A")).unwrap();
        let first_id = store.list()[0].id;
        store.save("T1", plan_with_source("B")).unwrap();

        assert_eq!(store.list().len(), 1);
        assert_eq!(store.list()[0].id, first_id);
        let rule = store.list()[0].plan.rule_for(StandardColumn::Risk).unwrap();
        assert_eq!(rule.source, vec!["B".to_string()]);
    }

    #[test]
    fn delete_of_unknown_id_is_a_noop() {
        let dir = tempdir().expect("temp dir");
        let mut store = TemplateStore::open(dir.path().join("templates.json")).unwrap();
        store.save("T1", plan_with_source("A")).unwrap();

        let removed = store.delete(Uuid::new_v4()).unwrap();
        assert!(!removed);
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn collection_survives_reopen() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("templates.json");
        {
            let mut store = TemplateStore::open(&path).unwrap();
            store.save("T1", plan_with_source("A")).unwrap();
            store.save("T2", plan_with_source("B")).unwrap();
        }
        let reopened = TemplateStore::open(&path).unwrap();
        let names: Vec<_> = reopened.list().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["T1", "T2"]);
        assert!(reopened.list()[0].saved_at.is_some());
    }
}
