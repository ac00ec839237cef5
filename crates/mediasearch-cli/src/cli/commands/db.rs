//! Database maintenance commands.

use console::style;
use mediasearch::config::Settings;
use mediasearch::ports::MediaDatabase;

use super::super::Runtime;

pub async fn cmd_db_init(settings: Settings) -> anyhow::Result<()> {
    let path = settings.database_path();
    let _runtime = Runtime::initialize(settings)?;
    println!(
        "{} Database initialized at {}",
        style("✓").green(),
        path.display()
    );
    Ok(())
}

pub async fn cmd_db_purge(settings: Settings) -> anyhow::Result<()> {
    let retention_days = settings.retention_days;
    let runtime = Runtime::initialize(settings)?;
    let cutoff = chrono::Utc::now() - chrono::Duration::days(i64::from(retention_days));
    let purged = runtime.db.purge_archived(cutoff).await?;
    println!(
        "{} Purged {purged} archived version(s) older than {retention_days} days",
        style("✓").green()
    );
    Ok(())
}
