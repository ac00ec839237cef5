//! Dead-letter queue persistence.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::error::PipelineError;
use crate::models::{DlqItem, TerminalError};

use super::{parse_datetime, SqliteRepository};

/// Raw row before the job snapshot and log trail are decoded.
struct DlqRow {
    dlq_id: String,
    asset_id: String,
    version_id: String,
    error: TerminalError,
    job_data: String,
    logs_json: String,
    created_at: DateTime<Utc>,
}

fn row_to_dlq(row: &Row<'_>) -> rusqlite::Result<DlqRow> {
    Ok(DlqRow {
        dlq_id: row.get("dlq_id")?,
        asset_id: row.get("asset_id")?,
        version_id: row.get("version_id")?,
        error: TerminalError {
            code: row.get("error_code")?,
            message: row.get("error_message")?,
            retryable: row.get::<_, i64>("error_retryable")? != 0,
        },
        job_data: row.get("job_data")?,
        logs_json: row.get("logs")?,
        created_at: parse_datetime(&row.get::<_, String>("created_at")?),
    })
}

fn decode_dlq(row: DlqRow) -> Result<DlqItem, PipelineError> {
    Ok(DlqItem {
        dlq_id: row.dlq_id,
        job: serde_json::from_str(&row.job_data)?,
        asset_id: row.asset_id,
        version_id: row.version_id,
        error: row.error,
        logs: serde_json::from_str(&row.logs_json)?,
        created_at: row.created_at,
    })
}

impl SqliteRepository {
    pub(crate) fn dlq_add_sync(&self, item: &DlqItem) -> Result<(), PipelineError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO dlq_items
             (dlq_id, job_id, asset_id, version_id, error_code, error_message,
              error_retryable, job_data, logs, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                item.dlq_id,
                item.job.job_id,
                item.asset_id,
                item.version_id,
                item.error.code,
                item.error.message,
                item.error.retryable as i64,
                serde_json::to_string(&item.job)?,
                serde_json::to_string(&item.logs)?,
                item.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub(crate) fn dlq_get_sync(&self, dlq_id: &str) -> Result<Option<DlqItem>, PipelineError> {
        let conn = self.connect()?;
        let raw = conn
            .query_row(
                "SELECT * FROM dlq_items WHERE dlq_id = ?",
                params![dlq_id],
                row_to_dlq,
            )
            .optional()?;
        raw.map(decode_dlq).transpose()
    }

    pub(crate) fn dlq_find_by_asset_sync(
        &self,
        asset_id: &str,
    ) -> Result<Option<DlqItem>, PipelineError> {
        let conn = self.connect()?;
        let raw = conn
            .query_row(
                "SELECT * FROM dlq_items WHERE asset_id = ?
                 ORDER BY created_at DESC LIMIT 1",
                params![asset_id],
                row_to_dlq,
            )
            .optional()?;
        raw.map(decode_dlq).transpose()
    }

    pub(crate) fn dlq_list_sync(&self) -> Result<Vec<DlqItem>, PipelineError> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT * FROM dlq_items ORDER BY created_at DESC")?;
        let raw = stmt
            .query_map([], row_to_dlq)?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter().map(decode_dlq).collect()
    }

    pub(crate) fn dlq_remove_sync(&self, dlq_id: &str) -> Result<(), PipelineError> {
        let conn = self.connect()?;
        conn.execute("DELETE FROM dlq_items WHERE dlq_id = ?", params![dlq_id])?;
        Ok(())
    }
}
