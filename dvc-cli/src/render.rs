//! Human-readable output for every response.
//!
//! Everything is written to the given writer so stdout stays the only
//! channel a caller needs to parse; logs go to stderr.

use anyhow::Result;
use dvc_core::{Commit, MergeOutcome, ObjectId, Response, Status, SyncLogEntry, SyncOutcome};
use std::io::Write;

/// Render `response` onto `writer`
pub fn render(response: &Response, writer: &mut dyn Write) -> Result<()> {
    match response {
        Response::Done | Response::Committed(_) | Response::Reset(_) => {}
        Response::Initialized { root, branch } => {
            writeln!(
                writer,
                "Initialized empty repository on {} ({}).",
                branch,
                root.short()
            )?;
        }
        Response::Commits(commits) => {
            for (id, commit) in commits {
                write_commit(writer, id, commit)?;
            }
        }
        Response::Found(ids) => {
            for id in ids {
                writeln!(writer, "{}", id)?;
            }
        }
        Response::Status(status) => write_status(writer, status)?,
        Response::Merged(outcome) => write_merge(writer, outcome)?,
        Response::Pushed(outcome) | Response::Fetched(outcome) => {
            write_transfer(writer, outcome)?;
        }
        Response::Pulled(pull) => {
            write_transfer(writer, &pull.fetch)?;
            write_merge(writer, &pull.merge)?;
        }
        Response::SyncLog(entries) => write_sync_log(writer, entries)?,
    }
    Ok(())
}

fn format_date(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .map(|dt| {
            dt.with_timezone(&chrono::Local)
                .format("%a %b %-d %H:%M:%S %Y %z")
                .to_string()
        })
        .unwrap_or_else(|| timestamp.to_string())
}

fn write_commit(writer: &mut dyn Write, id: &ObjectId, commit: &Commit) -> Result<()> {
    writeln!(writer, "===")?;
    writeln!(writer, "commit {}", id)?;
    if let (Some(first), Some(second)) = (commit.parent, commit.second_parent) {
        writeln!(writer, "Merge: {} {}", first.short(), second.short())?;
    }
    writeln!(writer, "Date: {}", format_date(commit.timestamp))?;
    writeln!(writer, "{}", commit.message)?;
    writeln!(writer)?;
    Ok(())
}

fn write_section<I, S>(writer: &mut dyn Write, title: &str, lines: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: std::fmt::Display,
{
    writeln!(writer, "=== {} ===", title)?;
    for line in lines {
        writeln!(writer, "{}", line)?;
    }
    writeln!(writer)?;
    Ok(())
}

fn write_status(writer: &mut dyn Write, status: &Status) -> Result<()> {
    let branches = status.branches.iter().map(|name| {
        if *name == status.current_branch {
            format!("*{}", name)
        } else {
            name.clone()
        }
    });
    write_section(writer, "Branches", branches)?;
    write_section(writer, "Staged Files", &status.staged)?;
    write_section(writer, "Removed Files", &status.removed)?;
    let changes = status
        .not_staged
        .iter()
        .map(|(path, change)| format!("{} ({})", path, change));
    write_section(writer, "Modifications Not Staged For Commit", changes)?;
    write_section(writer, "Untracked Files", &status.untracked)?;
    Ok(())
}

fn write_merge(writer: &mut dyn Write, outcome: &MergeOutcome) -> Result<()> {
    match outcome {
        MergeOutcome::FastForwarded { .. } => {
            writeln!(writer, "Current branch fast-forwarded.")?;
        }
        MergeOutcome::Merged { conflicts, .. } if !conflicts.is_empty() => {
            writeln!(writer, "Encountered a merge conflict.")?;
        }
        MergeOutcome::Merged { .. } => {}
    }
    Ok(())
}

fn write_transfer(writer: &mut dyn Write, outcome: &SyncOutcome) -> Result<()> {
    let old = outcome
        .old_head
        .map(|id| id.short())
        .unwrap_or_else(|| "(new)".to_string());
    writeln!(
        writer,
        "{}: {}..{}",
        outcome.branch.name,
        old,
        outcome.branch.head.short()
    )?;
    if outcome.stats.is_empty() {
        writeln!(writer, "Everything up-to-date.")?;
    } else {
        writeln!(writer, "{}", outcome.stats.summary())?;
    }
    Ok(())
}

/// Format a sync log entry on one line.
pub fn format_entry(entry: &SyncLogEntry) -> String {
    let date = chrono::DateTime::from_timestamp(entry.timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| entry.timestamp.to_string());
    let status = if entry.success { "OK" } else { "FAILED" };
    let head = entry
        .new_head
        .map(|id| id.short())
        .unwrap_or_else(|| "-".to_string());

    format!(
        "#{} [{}] {} {}/{} -> {} | {} commits, {} blobs, {} | {}ms | {}{}",
        entry.sequence,
        date,
        entry.direction,
        entry.remote,
        entry.branch,
        head,
        entry.commits,
        entry.blobs,
        dvc_core::remote::format_size(entry.bytes),
        entry.duration_ms,
        status,
        entry
            .error
            .as_ref()
            .map(|e| format!(" ({})", e))
            .unwrap_or_default(),
    )
}

fn write_sync_log(writer: &mut dyn Write, entries: &[SyncLogEntry]) -> Result<()> {
    if entries.is_empty() {
        writeln!(writer, "No sync log entries found.")?;
        return Ok(());
    }

    writeln!(writer, "Sync Log ({} entries):", entries.len())?;
    writeln!(writer, "{}", "-".repeat(80))?;
    for entry in entries {
        writeln!(writer, "  {}", format_entry(entry))?;
    }
    writeln!(writer, "{}", "-".repeat(80))?;

    let total_bytes: u64 = entries.iter().map(|e| e.bytes).sum();
    let successes = entries.iter().filter(|e| e.success).count();
    writeln!(
        writer,
        "Summary: {} transfers ({} successful), {}",
        entries.len(),
        successes,
        dvc_core::remote::format_size(total_bytes),
    )?;
    Ok(())
}
