use crate::core::model::ClassId;
use crate::core::sources::{AllocationStore, ClassRecord, StockLink, sort_class_records};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Allocation targets kept in a YAML file:
///
/// ```yaml
/// classes:
///   - { id: 1, name: Equity, target_allocation: 60 }
///   - { id: 2, parent_id: 1, name: International, target_allocation: 100 }
/// stock_links:
///   - { class_id: 2, symbol: "NYSEARCA:VEU" }
/// ```
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct AllocationFile {
    #[serde(default)]
    pub classes: Vec<ClassRecord>,
    #[serde(default)]
    pub stock_links: Vec<StockLink>,
}

impl AllocationFile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read allocation file: {}", path.display()))?;
        let file: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse allocation file: {}", path.display()))?;
        debug!(
            classes = file.classes.len(),
            links = file.stock_links.len(),
            "Loaded allocation file"
        );
        Ok(file)
    }

    /// Writes the whole file back as YAML.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write allocation file: {}", path.display()))?;
        debug!(classes = self.classes.len(), "Saved allocation file");
        Ok(())
    }

    fn find(&self, id: ClassId) -> Result<&ClassRecord> {
        match self.classes.iter().find(|c| c.id == id) {
            Some(record) => Ok(record),
            None => bail!("Asset class with id {id} not found"),
        }
    }

    fn find_mut(&mut self, id: ClassId) -> Result<&mut ClassRecord> {
        match self.classes.iter_mut().find(|c| c.id == id) {
            Some(record) => Ok(record),
            None => bail!("Asset class with id {id} not found"),
        }
    }

    /// Adds a class after its future siblings and returns the new id.
    pub fn add_class(
        &mut self,
        name: &str,
        parent_id: Option<ClassId>,
        target_allocation: Decimal,
    ) -> Result<ClassId> {
        if let Some(parent) = parent_id {
            self.find(parent)?;
        }
        let id = self.classes.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        let sort_order = self
            .classes
            .iter()
            .filter(|c| c.parent_id == parent_id)
            .map(|c| c.sort_order)
            .max()
            .map_or(1, |last| last + 1);
        self.classes.push(ClassRecord {
            id,
            parent_id,
            name: name.to_string(),
            target_allocation,
            sort_order,
        });
        Ok(id)
    }

    /// Applies `edit` to class `id`. Returns false when the edit changes nothing.
    pub fn edit_class(&mut self, id: ClassId, edit: &ClassEdit) -> Result<bool> {
        if let Some(parent) = edit.parent_id {
            if parent == id {
                bail!("Asset class {id} can not be its own parent");
            }
            self.find(parent)?;
            if self.is_descendant(parent, id) {
                bail!("Moving asset class {id} under {parent} would create a cycle");
            }
        }

        let record = self.find_mut(id)?;
        let mut changed = false;
        if let Some(name) = &edit.name {
            record.name = name.clone();
            changed = true;
        }
        if let Some(parent) = edit.parent_id {
            record.parent_id = Some(parent);
            changed = true;
        }
        if let Some(target) = edit.target_allocation {
            record.target_allocation = target;
            changed = true;
        }
        Ok(changed)
    }

    /// Removes a class that has no children, along with the stock links pointing at it.
    pub fn delete_class(&mut self, id: ClassId) -> Result<ClassRecord> {
        let Some(position) = self.classes.iter().position(|c| c.id == id) else {
            bail!("Asset class with id {id} not found");
        };
        if let Some(child) = self.classes.iter().find(|c| c.parent_id == Some(id)) {
            bail!(
                "Asset class {id} still has child classes (first: {}), delete or move them first",
                child.name
            );
        }

        let links = self.stock_links.len();
        self.stock_links.retain(|link| link.class_id != id);
        let dropped = links - self.stock_links.len();
        if dropped > 0 {
            debug!(class = id, dropped, "Dropped stock links of deleted class");
        }

        Ok(self.classes.remove(position))
    }

    /// Whether `id` sits somewhere below `ancestor`.
    fn is_descendant(&self, id: ClassId, ancestor: ClassId) -> bool {
        let mut current = self.classes.iter().find(|c| c.id == id);
        let mut steps = 0;
        while let Some(record) = current {
            match record.parent_id {
                Some(parent) if parent == ancestor => return true,
                Some(parent) => current = self.classes.iter().find(|c| c.id == parent),
                None => return false,
            }
            // Stop on an already broken file.
            steps += 1;
            if steps > self.classes.len() {
                return false;
            }
        }
        false
    }
}

/// Changes to apply to an asset class. `None` leaves a field as it is.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClassEdit {
    pub name: Option<String>,
    pub parent_id: Option<ClassId>,
    pub target_allocation: Option<Decimal>,
}

#[async_trait]
impl AllocationStore for AllocationFile {
    async fn list_classes(&self) -> Result<Vec<ClassRecord>> {
        let mut records = self.classes.clone();
        sort_class_records(&mut records);
        Ok(records)
    }

    async fn list_stock_links(&self) -> Result<Vec<StockLink>> {
        Ok(self.stock_links.clone())
    }
}
