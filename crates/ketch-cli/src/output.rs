//! Output formatting shared by the read commands

use clap::ValueEnum;
use console::style;
use serde::Serialize;

use crate::error::Result;

/// Machine-readable output selected with `--output`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

/// Print `value` in the requested format
pub fn print_structured<T: Serialize>(format: OutputFormat, value: &T) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

/// Column-aligned table, four spaces between columns
#[derive(Debug, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

const COLUMN_GAP: usize = 4;

impl Table {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                let len = cell.chars().count();
                match widths.get_mut(i) {
                    Some(width) => *width = (*width).max(len),
                    None => widths.push(len),
                }
            }
        }
        widths
    }

    fn format_line(cells: &[String], widths: &[usize]) -> String {
        let mut line = String::new();
        for (i, cell) in cells.iter().enumerate() {
            if i + 1 == cells.len() {
                line.push_str(cell);
            } else {
                let width = widths.get(i).copied().unwrap_or_default() + COLUMN_GAP;
                line.push_str(&format!("{:<width$}", cell, width = width));
            }
        }
        line
    }

    /// Plain text rendering, one line per row, header first
    pub fn render(&self) -> String {
        let widths = self.widths();
        let mut out = Self::format_line(&self.headers, &widths);
        out.push('\n');
        for row in &self.rows {
            out.push_str(&Self::format_line(row, &widths));
            out.push('\n');
        }
        out
    }

    /// Print with a bold header
    pub fn print(&self) {
        let rendered = self.render();
        let mut lines = rendered.lines();
        if let Some(header) = lines.next() {
            println!("{}", style(header).bold());
        }
        for line in lines {
            println!("{}", line);
        }
    }
}
