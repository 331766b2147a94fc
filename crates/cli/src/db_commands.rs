use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use {anyhow::Result, clap::Subcommand, reelay_config::ReelayConfig};

#[derive(Subcommand)]
pub enum DbAction {
    /// Create the database if needed and run pending migrations.
    Migrate,
    /// Delete the database file (and its WAL/SHM files) completely.
    Reset,
}

pub async fn handle_db(action: DbAction, config: &ReelayConfig) -> Result<()> {
    match action {
        DbAction::Migrate => run_migrations(&config.database.path).await,
        DbAction::Reset => reset_database(&config.database.path),
    }
}

async fn run_migrations(path: &Path) -> Result<()> {
    let pool = reelay_store::connect(path).await?;
    reelay_store::run_migrations(&pool).await?;
    pool.close().await;
    println!("Migrations applied: {}", path.display());
    Ok(())
}

/// The database file plus the WAL and SHM files SQLite may have created.
fn db_files(path: &Path) -> [PathBuf; 3] {
    let with_suffix = |suffix: &str| {
        let mut name = OsString::from(path.as_os_str());
        name.push(suffix);
        PathBuf::from(name)
    };
    [path.to_path_buf(), with_suffix("-wal"), with_suffix("-shm")]
}

fn reset_database(path: &Path) -> Result<()> {
    let mut deleted = false;
    for file in db_files(path) {
        if file.exists() {
            std::fs::remove_file(&file)?;
            println!("Deleted: {}", file.display());
            deleted = true;
        }
    }

    if deleted {
        println!("Database deleted. Run `reelay db migrate` to recreate it.");
    } else {
        println!("No database files found at {}.", path.display());
    }
    Ok(())
}
