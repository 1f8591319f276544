//! Writes a markdown-formatted summary report after running a load test.

mod common;
mod markdown;

use crate::stats::RunSummary;
use crate::LoadTestError;

/// Render the markdown report for a completed run.
pub fn render_report(summary: &RunSummary) -> Result<String, LoadTestError> {
    let mut buffer = Vec::new();
    markdown::write_markdown_report(&mut buffer, summary)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Persist a rendered report.
pub(crate) async fn write_report(path: &str, report: &str) -> Result<(), LoadTestError> {
    tokio::fs::write(path, report).await?;
    Ok(())
}
