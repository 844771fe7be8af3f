//! stm init command implementation
//!
//! Creates the data directory and a default `config.toml`.

use std::path::{Path, PathBuf};

use crate::config::{self, Config, CONFIG_FILE};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::storage::FileKvStore;

#[derive(serde::Serialize)]
struct InitReport {
    dir: PathBuf,
    created: InitCreated,
}

#[derive(serde::Serialize)]
struct InitCreated {
    dir: bool,
    config: bool,
}

pub fn run(dir: Option<PathBuf>, json: bool, quiet: bool) -> Result<()> {
    let dir = match dir {
        Some(path) => path,
        None => config::default_data_dir()?,
    };

    if dir.exists() && !dir.is_dir() {
        return Err(Error::OperationFailed(format!(
            "data path exists but is not a directory: {}",
            dir.display()
        )));
    }
    let created_dir = !dir.exists();
    FileKvStore::new(&dir).init()?;
    let created_config = ensure_config(&dir)?;

    let report = InitReport {
        dir: dir.clone(),
        created: InitCreated {
            dir: created_dir,
            config: created_config,
        },
    };

    let mut created_items = Vec::new();
    if created_dir {
        created_items.push("data dir");
    }
    if created_config {
        created_items.push(CONFIG_FILE);
    }

    let header = if created_items.is_empty() {
        "stm init: nothing to do"
    } else {
        "stm init: initialized"
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("dir", dir.display().to_string());
    human.push_summary(
        "created",
        if created_items.is_empty() {
            "none".to_string()
        } else {
            created_items.join(", ")
        },
    );

    emit_success(OutputOptions { json, quiet }, "init", &report, Some(&human))
}

fn ensure_config(dir: &Path) -> Result<bool> {
    let config_path = dir.join(CONFIG_FILE);
    if config_path.exists() {
        if !config_path.is_file() {
            return Err(Error::OperationFailed(format!(
                "{CONFIG_FILE} exists but is not a file: {}",
                config_path.display()
            )));
        }
        return Ok(false);
    }

    Config::default().save(&config_path)?;
    Ok(true)
}
