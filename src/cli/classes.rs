use super::{listing, ui};
use crate::core::engine::validation_report;
use crate::core::loader::load_targets;
use crate::core::model::ClassId;
use crate::store::targets::{AllocationFile, ClassEdit};
use anyhow::Result;
use rust_decimal::Decimal;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassesCommand {
    List,
    Add {
        name: String,
        parent_id: Option<ClassId>,
        target_allocation: Decimal,
    },
    Edit {
        id: ClassId,
        edit: ClassEdit,
    },
    /// Remove a class without children, and the stock links pointing at it.
    Delete {
        id: ClassId,
    },
}

/// Lists or changes the asset classes in the allocation file at `path`.
pub async fn run(path: &Path, base_currency: &str, cmd: ClassesCommand) -> Result<()> {
    let mut file = AllocationFile::load(path)?;
    match cmd {
        ClassesCommand::List => return listing::classes(&file).await,
        ClassesCommand::Add {
            name,
            parent_id,
            target_allocation,
        } => {
            let id = file.add_class(&name, parent_id, target_allocation)?;
            file.save(path)?;
            info!(id, %name, "Asset class created");
            println!("Asset class {name} created with id {id}.");
        }
        ClassesCommand::Edit { id, edit } => {
            if !file.edit_class(id, &edit)? {
                println!("No data modified. Use --help to see possible parameters.");
                return Ok(());
            }
            file.save(path)?;
            info!(id, "Asset class updated");
            println!("Asset class {id} saved.");
        }
        ClassesCommand::Delete { id } => {
            let removed = file.delete_class(id)?;
            file.save(path)?;
            info!(id, name = %removed.name, "Asset class deleted");
            println!("Asset class {} deleted.", removed.name);
        }
    }

    // Targets are usually edited one class at a time, so a mismatch here is expected.
    let model = load_targets(&file, base_currency).await?;
    if let Err(failure) = validation_report(&model) {
        println!(
            "{}",
            ui::style_text(&format!("Note: {failure}"), ui::StyleType::Subtle)
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::fs;

    const ALLOCATION: &str = r#"
classes:
  - { id: 1, name: Equity, target_allocation: 100, sort_order: 1 }
  - { id: 2, parent_id: 1, name: Domestic, target_allocation: 100, sort_order: 1 }
stock_links:
  - { class_id: 2, symbol: "ASX:VHY" }
"#;

    #[tokio::test]
    async fn test_add_edit_delete_rewrite_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("allocation.yaml");
        fs::write(&path, ALLOCATION).unwrap();

        let add = ClassesCommand::Add {
            name: "International".to_string(),
            parent_id: Some(1),
            target_allocation: dec!(40),
        };
        run(&path, "AUD", add).await.unwrap();
        let edit = ClassesCommand::Edit {
            id: 2,
            edit: ClassEdit {
                target_allocation: Some(dec!(60)),
                ..Default::default()
            },
        };
        run(&path, "AUD", edit).await.unwrap();

        let file = AllocationFile::load(&path).unwrap();
        let model = load_targets(&file, "AUD").await.unwrap();
        assert_eq!(validation_report(&model), Ok(()));

        run(&path, "AUD", ClassesCommand::Delete { id: 2 })
            .await
            .unwrap();
        let file = AllocationFile::load(&path).unwrap();
        let names: Vec<_> = file.classes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Equity", "International"]);
        assert!(file.stock_links.is_empty());
    }

    #[tokio::test]
    async fn test_failed_change_leaves_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("allocation.yaml");
        fs::write(&path, ALLOCATION).unwrap();

        let result = run(&path, "AUD", ClassesCommand::Delete { id: 1 }).await;

        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), ALLOCATION);
    }
}
