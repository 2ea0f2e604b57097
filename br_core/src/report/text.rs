use super::{CreateSnafu, ReportError, WriteSnafu};
use crate::monitor::MonitoredResult;
use crate::orchestrator::TestRun;
use crate::record::PhaseRecord;
use chrono::Utc;
use snafu::ResultExt;
use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

const RULE: &str = "================================================================";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Human readable companion report. Each configuration gets a block as soon
/// as it finishes; the summary table is appended by `finalize`.
pub struct TextReport {
    path: PathBuf,
    file: File,
}

impl TextReport {
    pub fn create(path: &Path) -> Result<Self, ReportError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context(CreateSnafu { path })?;
        }
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .context(CreateSnafu { path })?;
        let mut report = Self {
            path: path.to_path_buf(),
            file,
        };
        let header = format!(
            "Backup/Restore Benchmark Report\n{RULE}\nStarted: {}\n\n",
            Utc::now().format(TIMESTAMP_FORMAT)
        );
        report.write(&header)?;
        Ok(report)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, record: &PhaseRecord) -> Result<(), ReportError> {
        let block = render_record(record);
        self.write(&block)
    }

    pub fn finalize(&mut self, run: &TestRun) -> Result<(), ReportError> {
        let summary = render_summary(run);
        self.write(&summary)?;
        let path = self.path.as_path();
        self.file.sync_all().context(WriteSnafu { path })
    }

    fn write(&mut self, text: &str) -> Result<(), ReportError> {
        let path = self.path.as_path();
        self.file
            .write_all(text.as_bytes())
            .context(WriteSnafu { path })?;
        self.file.flush().context(WriteSnafu { path })
    }
}

/// `754.2` -> `12m 34s`.
pub fn format_elapsed(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    format!("{}m {}s", total / 60, total % 60)
}

fn render_record(record: &PhaseRecord) -> String {
    let mut out = String::new();
    // writing into a String cannot fail
    let _ = writeln!(out, "Configuration: {}", record.target_size);
    let _ = writeln!(out, "{}", "-".repeat(RULE.len()));
    let _ = writeln!(out, "Scale factor:    {}", record.scale_factor);
    let _ = writeln!(out, "Database size:   {}", record.database_size);
    let _ = writeln!(out, "Timestamp:       {}", record.timestamp.format(TIMESTAMP_FORMAT));
    let _ = writeln!(out, "Status:          {}", record.status());
    out.push('\n');

    for (title, result) in [
        ("Fill", &record.fill),
        ("Backup", &record.backup),
        ("Restore", &record.restore),
    ] {
        render_monitored(&mut out, title, result.as_ref());
    }

    if !record.failures.is_empty() {
        let failed: Vec<String> = record
            .failures
            .iter()
            .map(|f| format!("{} (exit {})", f.step, f.exit_status))
            .collect();
        let _ = writeln!(out, "Failed steps:    {}", failed.join(", "));
    }
    if let Some(step) = record.aborted_at {
        let _ = writeln!(out, "Aborted at:      {} ({})", step, step.title());
    }
    let restarted = match record.service_restarted {
        Some(true) => "yes",
        Some(false) => "FAILED",
        None => "not attempted",
    };
    let _ = writeln!(out, "Service restart: {restarted}");
    out.push('\n');
    out
}

fn render_monitored(out: &mut String, title: &str, result: Option<&MonitoredResult>) {
    let _ = writeln!(out, "{title}:");
    let Some(result) = result else {
        let _ = writeln!(out, "  Elapsed:     n/a");
        return;
    };
    let _ = writeln!(
        out,
        "  Elapsed:     {:.2} s ({})",
        result.elapsed_seconds,
        format_elapsed(result.elapsed_seconds)
    );
    let _ = writeln!(out, "  Average CPU: {}", percent(result.average_cpu_percent));
    let _ = writeln!(out, "  Peak CPU:    {}", percent(result.peak_cpu_percent));
    if !result.success() {
        let reason = if result.timed_out { " (timed out)" } else { "" };
        let _ = writeln!(out, "  Exit status: {}{reason}", result.exit_status);
        let excerpt = result.output_excerpt.trim();
        if !excerpt.is_empty() {
            let _ = writeln!(out, "  Output:");
            for line in excerpt.lines() {
                let _ = writeln!(out, "    {line}");
            }
        }
    }
}

fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| "unavailable".to_string(), |v| format!("{v:.2}%"))
}

fn seconds(result: &Option<MonitoredResult>) -> String {
    result
        .as_ref()
        .map_or_else(|| "n/a".to_string(), |r| format!("{:.2}", r.elapsed_seconds))
}

fn render_summary(run: &TestRun) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Summary");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(
        out,
        "{:<10} {:>6} {:>14} {:>10} {:>11} {:>12} {:>9}",
        "Size", "Scale", "DB size", "Fill (s)", "Backup (s)", "Restore (s)", "Status"
    );
    for record in &run.records {
        let _ = writeln!(
            out,
            "{:<10} {:>6} {:>14} {:>10} {:>11} {:>12} {:>9}",
            record.target_size,
            record.scale_factor,
            record.database_size,
            seconds(&record.fill),
            seconds(&record.backup),
            seconds(&record.restore),
            record.status().to_string(),
        );
    }
    out.push('\n');

    let complete = run.completed_configurations();
    let partial = run.partial_configurations();
    let _ = writeln!(out, "Complete configurations: {}", list_or_none(&complete));
    let _ = writeln!(out, "Partial configurations:  {}", list_or_none(&partial));
    if let Some(reason) = &run.abort_reason {
        let _ = writeln!(out, "Run aborted: {reason}");
    }
    let _ = writeln!(out, "Finished: {}", Utc::now().format(TIMESTAMP_FORMAT));
    out
}

fn list_or_none(labels: &[&str]) -> String {
    if labels.is_empty() {
        "none".to_string()
    } else {
        labels.join(", ")
    }
}
