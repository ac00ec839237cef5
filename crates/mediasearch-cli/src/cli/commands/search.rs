//! Search indexed transcripts from the command line.

use console::style;
use mediasearch::config::Settings;
use mediasearch::search::{SearchMode, SearchRequest};
use mediasearch::PipelineError;

use super::super::Runtime;

pub async fn cmd_search(
    settings: Settings,
    query: &str,
    mode: &str,
    limit: usize,
    offset: usize,
) -> anyhow::Result<()> {
    let mode = SearchMode::from_str(mode).ok_or_else(|| {
        PipelineError::InvalidInput(format!(
            "unknown search type `{mode}` (expected keyword, semantic, or hybrid)"
        ))
    })?;

    let runtime = Runtime::initialize(settings)?;
    let service = runtime.search_service();

    let request = SearchRequest {
        query: query.to_string(),
        mode,
        bucket: None,
        speaker: None,
        limit,
        offset,
    };
    let response = service.search(&request).await?;

    if response.results.is_empty() {
        println!("{} No matches for \"{query}\"", style("·").dim());
        return Ok(());
    }

    println!(
        "\n{} ({} results, {} mode)",
        style(format!("Results for \"{query}\"")).bold(),
        response.total,
        response.mode.as_str()
    );
    println!("{}", "-".repeat(72));
    for hit in &response.results {
        let time = format!("{}–{}ms", hit.start_ms, hit.end_ms);
        let speaker = hit.speaker.as_deref().unwrap_or("-");
        println!(
            "{:>6.3}  {:<16} {:<10} {}/{}",
            hit.score,
            time,
            speaker,
            hit.bucket,
            hit.object_key
        );
        println!("        {}", truncate_cell(&hit.snippet, 96));
    }
    Ok(())
}

pub(crate) fn truncate_cell(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}
