use std::collections::BTreeMap;
use std::io;

use colored::{ColoredString, Colorize};

use crate::error::{Error, Result};
use crate::query::HydratedJob;
use crate::slurm::JobStatus;

const DEFAULT_COLUMNS: &[&str] = &["id", "node_name", "node_id", "command", "status"];

/// Compact one-line-per-job dependency listing.
pub fn render_main(jobs: &[HydratedJob]) -> String {
    if jobs.is_empty() {
        return "No jobs found.".to_string();
    }

    let mut out = String::from("Job Dependencies:\n");
    out.push_str(&"=".repeat(40));
    out.push('\n');
    for job in jobs {
        let deps = if job.parents.is_empty() {
            String::new()
        } else {
            format!(" <- {}", job.parents.join(", "))
        };
        out.push_str(&format!(
            "{} [{}] ({}): {}{}\n",
            job.id,
            job.node_name,
            paint_status(job.status),
            truncate(&job.command, 48),
            deps
        ));
    }
    out
}

/// Mermaid `graph TD` rendering of the stored DAG.
pub fn render_mermaid(jobs: &[HydratedJob]) -> String {
    let mut out = String::from("graph TD\n");
    for job in jobs {
        let command = truncate(&job.command.replace('"', "'"), 24);
        out.push_str(&format!(
            "    {}[\"{}<br/>{}<br/>{}\"]\n",
            job.id, job.id, job.status, command
        ));
    }
    for job in jobs {
        for parent in &job.parents {
            out.push_str(&format!("    {} --> {}\n", parent, job.id));
        }
    }
    out
}

/// Jobs bucketed by plan node, preserving submission order inside each
/// bucket.
pub fn render_grouped(jobs: &[HydratedJob]) -> String {
    if jobs.is_empty() {
        return "No jobs found.".to_string();
    }

    let mut buckets: BTreeMap<&str, Vec<&HydratedJob>> = BTreeMap::new();
    for job in jobs {
        buckets.entry(job.node_id.as_str()).or_default().push(job);
    }

    let mut out = String::new();
    for (node_id, members) in buckets {
        let node_name = members
            .first()
            .map(|j| j.node_name.as_str())
            .unwrap_or_default();
        out.push_str(&format!("node {node_id} [{node_name}]\n"));
        for job in members {
            out.push_str(&format!(
                "  {} ({}): {}\n",
                job.id,
                paint_status(job.status),
                truncate(&job.command, 48)
            ));
        }
    }
    out
}

pub fn render_json(jobs: &[HydratedJob]) -> Result<String> {
    serde_json::to_string_pretty(jobs)
        .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

/// Fixed-width status table over a column selection.
pub fn render_table(jobs: &[HydratedJob], columns: &[String]) -> Result<String> {
    let columns: Vec<String> = if columns.is_empty() {
        DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect()
    } else {
        columns.to_vec()
    };

    let mut rows = Vec::with_capacity(jobs.len());
    for job in jobs {
        let row = columns
            .iter()
            .map(|column| column_value(job, column))
            .collect::<Result<Vec<String>>>()?;
        rows.push(row);
    }

    let headers: Vec<String> = columns.iter().map(|c| c.to_uppercase()).collect();
    let mut widths: Vec<usize> = headers.iter().map(String::len).collect();
    for row in &rows {
        for (index, cell) in row.iter().enumerate() {
            widths[index] = widths[index].max(cell.len());
        }
    }

    let render_row = |cells: &[String]| {
        cells
            .iter()
            .enumerate()
            .map(|(index, cell)| format!("{:width$}", cell, width = widths[index]))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = render_row(&headers);
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in &rows {
        out.push('\n');
        out.push_str(&render_row(row));
    }
    Ok(out)
}

fn column_value(job: &HydratedJob, column: &str) -> Result<String> {
    let value = match column {
        "id" => job.id.clone(),
        "command" => truncate(&job.command, 48),
        "preamble" => truncate(&job.preamble, 32),
        "node_id" => job.node_id.clone(),
        "node_name" => job.node_name.clone(),
        "status" => job.status.to_string(),
        "created_at" => job.created_at.clone(),
        "updated_at" => job.updated_at.clone(),
        "parents" => job.parents.join(","),
        "children" => job.children.join(","),
        other => {
            return Err(Error::InvalidFilter(format!("unknown column `{other}`")));
        }
    };
    Ok(value)
}

fn paint_status(status: JobStatus) -> ColoredString {
    match status {
        JobStatus::Completed => status.as_str().green(),
        JobStatus::Running => status.as_str().blue(),
        JobStatus::Pending => status.as_str().yellow(),
        JobStatus::Failed | JobStatus::Timeout => status.as_str().red(),
        JobStatus::Cancelled => status.as_str().magenta(),
        JobStatus::Blocked | JobStatus::Unknown => status.as_str().bright_black(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}
