use chrono::{DateTime, Utc};
use std::fmt;

use crate::core::participants::Participant;

// ============================================================================
// DOMAIN MODELS
// ============================================================================

/// Outcome of one participant's pipeline run.
///
/// The kinds are mutually exclusive; the pipeline assigns exactly one per
/// participant and never changes it afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// Every step completed. Detail may still carry a note if the working
    /// copy could not be deleted afterwards.
    Success,
    /// Template id invalid or not visible to the authenticated identity.
    NotFound,
    /// The authenticated identity lacks rights to copy/edit the template.
    PermissionDenied,
    /// Duplication failed for any other transport reason.
    CopyFailed,
    /// Certificate was produced but mail submission failed.
    EmailFailed,
    /// Unclassified failure during substitution, export or send.
    SystemError,
}

impl DeliveryStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DeliveryStatus::Success => "Sent",
            DeliveryStatus::NotFound => "Template not found",
            DeliveryStatus::PermissionDenied => "Permission denied",
            DeliveryStatus::CopyFailed => "Copy failed",
            DeliveryStatus::EmailFailed => "Email failed",
            DeliveryStatus::SystemError => "System error",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One report row. Built once per participant, never mutated after append.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub name: String,
    pub email: String,
    pub timestamp: DateTime<Utc>,
    pub status: DeliveryStatus,
    pub detail: String,
}

impl LogEntry {
    /// Creates an entry for `participant` stamped with the current time.
    pub fn now(
        participant: &Participant,
        status: DeliveryStatus,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            name: participant.name.clone(),
            email: participant.email.clone(),
            timestamp: Utc::now(),
            status,
            detail: detail.into(),
        }
    }
}

// ============================================================================
// RUN REPORT
// ============================================================================

/// Ordered collection of per-participant outcomes.
///
/// Entries are kept strictly in processing order - no aggregation, filtering
/// or sorting happens here beyond counting for the summary line.
#[derive(Debug, Default)]
pub struct RunReport {
    entries: Vec<LogEntry>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sent_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status == DeliveryStatus::Success)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.len() - self.sent_count()
    }

    /// Renders the report as a fixed-width plain-text table.
    pub fn render_table(&self) -> String {
        let header = ["Name", "Email", "Time", "Status", "Detail"];

        let rows: Vec<[String; 5]> = self
            .entries
            .iter()
            .map(|e| {
                [
                    e.name.clone(),
                    e.email.clone(),
                    e.timestamp.format("%H:%M:%S").to_string(),
                    e.status.label().to_string(),
                    e.detail.clone(),
                ]
            })
            .collect();

        let mut widths: [usize; 5] = header.map(str::len);
        for row in &rows {
            for (w, cell) in widths.iter_mut().zip(row.iter()) {
                *w = (*w).max(cell.len());
            }
        }

        let render_row = |cells: &[String; 5]| -> String {
            let mut line = String::new();
            for (i, (cell, width)) in cells.iter().zip(widths.iter()).enumerate() {
                if i > 0 {
                    line.push_str("  ");
                }
                line.push_str(&format!("{:<width$}", cell, width = *width));
            }
            line.trim_end().to_string()
        };

        let mut out = String::new();
        out.push_str(&render_row(&header.map(String::from)));
        out.push('\n');
        out.push_str(&"-".repeat(widths.iter().sum::<usize>() + 2 * (widths.len() - 1)));
        for row in &rows {
            out.push('\n');
            out.push_str(&render_row(row));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(name: &str, email: &str) -> Participant {
        Participant {
            name: name.to_string(),
            email: email.to_string(),
        }
    }

    #[test]
    fn test_preserves_insertion_order_across_mixed_outcomes() {
        let mut report = RunReport::new();
        report.push(LogEntry::now(
            &participant("Budi", "budi@example.com"),
            DeliveryStatus::EmailFailed,
            "relay refused",
        ));
        report.push(LogEntry::now(
            &participant("Siti", "siti@example.com"),
            DeliveryStatus::Success,
            "",
        ));
        report.push(LogEntry::now(
            &participant("Andi", "andi@example.com"),
            DeliveryStatus::NotFound,
            "404",
        ));

        let names: Vec<&str> = report.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Budi", "Siti", "Andi"]);
    }

    #[test]
    fn test_counts() {
        let mut report = RunReport::new();
        report.push(LogEntry::now(
            &participant("Budi", "budi@example.com"),
            DeliveryStatus::Success,
            "",
        ));
        report.push(LogEntry::now(
            &participant("Siti", "siti@example.com"),
            DeliveryStatus::SystemError,
            "boom",
        ));

        assert_eq!(report.len(), 2);
        assert_eq!(report.sent_count(), 1);
        assert_eq!(report.failed_count(), 1);
    }

    #[test]
    fn test_render_table_contains_rows() {
        let mut report = RunReport::new();
        report.push(LogEntry::now(
            &participant("Budi Santoso", "budi@example.com"),
            DeliveryStatus::Success,
            "",
        ));

        let table = report.render_table();
        assert!(table.contains("Name"));
        assert!(table.contains("Budi Santoso"));
        assert!(table.contains("Sent"));
    }
}
