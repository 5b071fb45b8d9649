//! Presentation of fleet results for the command line.
//!
//! Torrent lists are sorted by instance then name; everything else keeps the
//! order it came in. Table output separates instances with a rule line.

use std::io::{self, Write};

use clap::ValueEnum;
use qbfleet_core::{AbandonedTorrent, Category, InstanceFailure, SyncReport, TorrentRecord};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
    Tsv,
    Markdown,
}

/// Sort torrents by instance, then by name.
pub fn sort_torrents(torrents: &mut [TorrentRecord]) {
    torrents.sort_by(|a, b| a.instance.cmp(&b.instance).then_with(|| a.name.cmp(&b.name)));
}

/// Sort abandoned torrents by instance, then by name.
pub fn sort_abandoned(torrents: &mut [AbandonedTorrent]) {
    torrents.sort_by(|a, b| {
        a.torrent
            .instance
            .cmp(&b.torrent.instance)
            .then_with(|| a.torrent.name.cmp(&b.torrent.name))
    });
}

pub fn write_torrents<W: Write>(
    out: &mut W,
    torrents: &[TorrentRecord],
    format: OutputFormat,
) -> io::Result<()> {
    if format == OutputFormat::Json {
        return write_json(out, &torrents);
    }

    let mut grid = Grid::new(&["Name", "Host", "Category", "Ratio", "Path"]);
    for t in torrents {
        grid.push(
            t.instance.as_str(),
            vec![
                t.name.clone(),
                t.instance.to_string(),
                t.category.clone().unwrap_or_default(),
                format!("{:.2}", t.ratio),
                t.content_path.clone(),
            ],
        );
    }
    grid.write(out, format)
}

pub fn write_abandoned<W: Write>(
    out: &mut W,
    torrents: &[AbandonedTorrent],
    format: OutputFormat,
) -> io::Result<()> {
    if format == OutputFormat::Json {
        return write_json(out, &torrents);
    }

    let mut grid = Grid::new(&["Name", "Host", "Category", "Ratio", "Path", "Tracker"]);
    for a in torrents {
        let t = &a.torrent;
        grid.push(
            t.instance.as_str(),
            vec![
                t.name.clone(),
                t.instance.to_string(),
                t.category.clone().unwrap_or_default(),
                format!("{:.2}", t.ratio),
                t.content_path.clone(),
                a.tracker_url.clone(),
            ],
        );
    }
    grid.write(out, format)
}

pub fn write_categories<W: Write>(
    out: &mut W,
    categories: &[Category],
    format: OutputFormat,
) -> io::Result<()> {
    if format == OutputFormat::Json {
        return write_json(out, &categories);
    }

    let mut grid = Grid::new(&["Name", "Save Path", "Instances"]);
    for c in categories {
        let instances: Vec<&str> = c.instances.iter().map(|i| i.as_str()).collect();
        grid.push(
            "",
            vec![c.name.clone(), c.save_path.clone(), instances.join(" ")],
        );
    }
    grid.write(out, format)
}

pub fn write_sync_report<W: Write>(
    out: &mut W,
    report: &SyncReport,
    format: OutputFormat,
) -> io::Result<()> {
    if format == OutputFormat::Json {
        return write_json(out, report);
    }
    if report.created.is_empty() {
        if format == OutputFormat::Table {
            writeln!(out, "Categories already in sync")?;
        }
        return Ok(());
    }

    let mut grid = Grid::new(&["Host", "Created Category"]);
    for (instance, category) in &report.created {
        grid.push(instance.as_str(), vec![instance.to_string(), category.clone()]);
    }
    grid.write(out, format)
}

/// One line per failed instance.
pub fn write_failures<W: Write>(out: &mut W, failures: &[InstanceFailure]) -> io::Result<()> {
    for failure in failures {
        writeln!(out, "error: {}", failure)?;
    }
    Ok(())
}

fn write_json<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)
}

/// Rows of text cells, each tagged with the group it belongs to.
struct Grid {
    header: Vec<String>,
    rows: Vec<(String, Vec<String>)>,
}

impl Grid {
    fn new(header: &[&str]) -> Self {
        Self {
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    fn push(&mut self, group: &str, cells: Vec<String>) {
        self.rows.push((group.to_string(), cells));
    }

    fn write<W: Write>(&self, out: &mut W, format: OutputFormat) -> io::Result<()> {
        match format {
            OutputFormat::Table | OutputFormat::Json => self.write_table(out),
            OutputFormat::Csv => self.write_delimited(out, ',', csv_field),
            OutputFormat::Tsv => self.write_delimited(out, '\t', tsv_field),
            OutputFormat::Markdown => self.write_markdown(out),
        }
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.header.iter().map(|h| h.chars().count()).collect();
        for (_, cells) in &self.rows {
            for (width, cell) in widths.iter_mut().zip(cells) {
                *width = (*width).max(cell.chars().count());
            }
        }
        widths
    }

    fn write_table<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let widths = self.widths();
        let rule_len = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
        let rule = "-".repeat(rule_len);

        write_padded(out, &self.header, &widths)?;
        writeln!(out, "{}", rule)?;

        let mut last_group: Option<&str> = None;
        for (group, cells) in &self.rows {
            if last_group.is_some_and(|last| last != group) {
                writeln!(out, "{}", rule)?;
            }
            last_group = Some(group);
            write_padded(out, cells, &widths)?;
        }
        Ok(())
    }

    fn write_delimited<W: Write>(
        &self,
        out: &mut W,
        separator: char,
        escape: fn(&str) -> String,
    ) -> io::Result<()> {
        let sep = separator.to_string();
        let line = |cells: &[String]| -> String {
            cells.iter().map(|c| escape(c)).collect::<Vec<_>>().join(&sep)
        };

        writeln!(out, "{}", line(&self.header))?;
        for (_, cells) in &self.rows {
            writeln!(out, "{}", line(cells))?;
        }
        Ok(())
    }

    fn write_markdown<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let line = |cells: &[String]| -> String {
            let escaped: Vec<String> = cells.iter().map(|c| c.replace('|', "\\|")).collect();
            format!("| {} |", escaped.join(" | "))
        };

        writeln!(out, "{}", line(&self.header))?;
        let divider: Vec<String> = self.header.iter().map(|_| "---".to_string()).collect();
        writeln!(out, "{}", line(&divider))?;
        for (_, cells) in &self.rows {
            writeln!(out, "{}", line(cells))?;
        }
        Ok(())
    }
}

fn write_padded<W: Write>(out: &mut W, cells: &[String], widths: &[usize]) -> io::Result<()> {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect();
    writeln!(out, "{}", padded.join("  ").trim_end())
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn tsv_field(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}
