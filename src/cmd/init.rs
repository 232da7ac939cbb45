//! Project setup: `taskboard init`.

use anyhow::{Context, Result};
use std::path::Path;

use taskboard::board::db::{BoardDb, DbHandle};
use taskboard::config::{self, TaskboardConfig};

pub async fn cmd_init(
    project_dir: &Path,
    config: &TaskboardConfig,
    board: Option<&str>,
) -> Result<()> {
    let board_dir = project_dir.join(config::CONFIG_DIR);
    std::fs::create_dir_all(&board_dir)
        .with_context(|| format!("Failed to create {}", board_dir.display()))?;

    let config_path = config::config_path(project_dir);
    if !config_path.exists() {
        TaskboardConfig::default().save(&config_path)?;
        println!("Created {}", config_path.display());
    }

    let db_path = project_dir.join(&config.server.db_path);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let db = DbHandle::new(BoardDb::new(&db_path)?);
    println!("Board database ready at {}", db_path.display());

    if let Some(name) = board {
        let name = name.to_string();
        let created = db
            .call(move |db| db.create_board(&name, false, "cli"))
            .await?;
        tracing::info!(board_id = created.id, "board created");
        println!("Created board '{}' (id {})", created.name, created.id);
    }

    println!("Initialized taskboard project in {}", project_dir.display());
    Ok(())
}
