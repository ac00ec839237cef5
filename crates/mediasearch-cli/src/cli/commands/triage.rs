//! Operator triage commands.

use console::style;
use mediasearch::config::Settings;
use mediasearch::ports::MediaDatabase;

use super::super::Runtime;
use super::search::truncate_cell;

pub async fn cmd_triage_list(settings: Settings) -> anyhow::Result<()> {
    let runtime = Runtime::initialize(settings)?;
    let assets = runtime.db.list_quarantined().await?;

    if assets.is_empty() {
        println!("{} No quarantined assets", style("✓").green());
        return Ok(());
    }

    println!("\n{}", style("Quarantined assets").bold());
    println!("{}", "-".repeat(100));
    println!(
        "{:<36} {:<20} {:<22} {}",
        "Asset", "Location", "Triage state", "Recommended action"
    );
    println!("{}", "-".repeat(100));
    for asset in assets {
        println!(
            "{:<36} {:<20} {:<22} {}",
            asset.asset_id,
            truncate_cell(&format!("{}/{}", asset.bucket, asset.object_key), 19),
            asset.triage_state.map(|t| t.as_str()).unwrap_or("-"),
            asset.recommended_action.as_deref().unwrap_or("-")
        );
        if let Some(error) = &asset.last_error {
            println!("  {} {}", style("last error:").dim(), truncate_cell(error, 90));
        }
    }
    Ok(())
}

pub async fn cmd_triage_retry(settings: Settings, asset_id: &str) -> anyhow::Result<()> {
    let runtime = Runtime::initialize(settings)?;
    let worker = runtime.worker();
    tokio::spawn(async move {
        let _ = worker.run().await;
    });

    runtime.retry_manager().triage_retry(asset_id).await?;
    println!("{} Retry scheduled for {asset_id}", style("✓").green());

    // The queue is in-process: wait for the retried job to settle before
    // the process exits and the queue with it.
    use mediasearch::models::AssetStatus;
    loop {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        let Some(asset) = runtime.db.get_asset(asset_id).await? else {
            anyhow::bail!("asset {asset_id} disappeared during retry");
        };
        match asset.status {
            AssetStatus::Indexed => {
                println!("{} Asset {asset_id} indexed", style("✓").green());
                return Ok(());
            }
            AssetStatus::Quarantined | AssetStatus::Failed => {
                println!(
                    "{} Retry failed: {}",
                    style("✗").red(),
                    asset.last_error.as_deref().unwrap_or("see triage list")
                );
                return Ok(());
            }
            _ => {}
        }
    }
}

pub async fn cmd_triage_skip(settings: Settings, asset_id: &str) -> anyhow::Result<()> {
    let runtime = Runtime::initialize(settings)?;
    runtime.retry_manager().triage_skip(asset_id).await?;
    println!("{} Asset {asset_id} marked FAILED", style("✓").green());
    Ok(())
}
