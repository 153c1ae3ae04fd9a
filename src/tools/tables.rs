//! Markdown table to Excel export tool

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook};
use serde_json::{json, Value};
use tracing::debug;
use crate::Result;
use crate::error::Error;
use crate::files::sanitize_filename_or;
use super::{required_str, Tool};

/// Prefix of a successful export report. The stream adapter keys on it to
/// render download links for the listed files.
pub const CONVERSION_MARKER: &str = "Successfully converted";

const DEFAULT_PREFIX: &str = "table";

fn table_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\|[^\n]+\|\n\|[-:|\s]+\|\n(?:\|[^\n]+\|\n)+)").expect("valid table regex")
    })
}

/// A parsed markdown table
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    fn parse(block: &str) -> Option<Self> {
        let lines: Vec<&str> = block.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        if lines.len() < 2 {
            return None;
        }

        let split = |line: &str| -> Vec<String> {
            line.trim_matches('|').split('|').map(|c| c.trim().to_string()).collect()
        };

        Some(Self {
            headers: split(lines[0]),
            // lines[1] is the |---| separator
            rows: lines[2..].iter().map(|l| split(l)).collect(),
        })
    }

    /// Write the table as a single-sheet workbook, header row first.
    fn save_xlsx(&self, path: &Path) -> std::result::Result<(), rust_xlsxwriter::XlsxError> {
        let mut workbook = Workbook::new();
        let header = Format::new()
            .set_bold()
            .set_border(FormatBorder::Thin)
            .set_align(FormatAlign::Center);

        let sheet = workbook.add_worksheet();
        for (col, title) in self.headers.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, title, &header)?;
        }
        for (row, cells) in self.rows.iter().enumerate() {
            for (col, cell) in cells.iter().enumerate() {
                sheet.write_string(row as u32 + 1, col as u16, cell)?;
            }
        }

        workbook.save(path)
    }
}

/// Find every markdown table in free-form content.
pub fn find_tables(markdown: &str) -> Vec<Table> {
    // Indented tables are common in model output; the pattern expects lines
    // to start with '|'
    let mut normalized: String = markdown.lines().map(str::trim).collect::<Vec<_>>().join("\n");
    normalized.push('\n');

    table_regex()
        .find_iter(&normalized)
        .filter_map(|m| Table::parse(m.as_str()))
        .collect()
}

/// Converts markdown tables into Excel workbooks under the output directory
pub struct MarkdownExcelTool {
    output_dir: PathBuf,
}

impl MarkdownExcelTool {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }
}

#[async_trait]
impl Tool for MarkdownExcelTool {
    fn name(&self) -> &str { "markdown_to_excel" }
    fn description(&self) -> &str {
        "Converts markdown tables to Excel files. Supports several tables in the same content. Returns the paths of the generated Excel files."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "markdown_content": {
                    "type": "string",
                    "description": "The markdown content containing one or more tables"
                },
                "filename_prefix": {
                    "type": "string",
                    "description": "Prefix for the generated Excel files (default 'table')"
                }
            },
            "required": ["markdown_content"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let content = required_str(&params, "markdown_content")?;
        // Only a plain file name stem may come from the model
        let prefix = params
            .get("filename_prefix")
            .and_then(|v| v.as_str())
            .map(|p| sanitize_filename_or(p, DEFAULT_PREFIX))
            .unwrap_or_else(|| DEFAULT_PREFIX.to_string());

        let tables = find_tables(content);
        if tables.is_empty() {
            return Ok("No tables found in the markdown content.".to_string());
        }

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| Error::Tool(format!("Failed to create {:?}: {}", self.output_dir, e)))?;

        let output_dir = self.output_dir.clone();
        let written = tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
            let mut written = Vec::with_capacity(tables.len());
            for (i, table) in tables.iter().enumerate() {
                let path = output_dir.join(format!("{}_{}.xlsx", prefix, i + 1));
                table
                    .save_xlsx(&path)
                    .map_err(|e| Error::Tool(format!("Error converting markdown to Excel: {}", e)))?;
                debug!("Wrote table {} to {:?}", i + 1, path);
                written.push(path.display().to_string());
            }
            Ok(written)
        })
        .await
        .map_err(|e| Error::Tool(format!("Excel export task failed: {}", e)))??;

        Ok(format!(
            "{} {} tables to Excel:\n{}",
            CONVERSION_MARKER,
            written.len(),
            written.join("\n")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = "
    | Name | Age | City |
    |------|-----|------|
    | John | 30  | NY   |
    | Jane | 25  | LA, CA |
    ";

    fn is_xlsx(path: &Path) -> bool {
        // xlsx workbooks are zip archives
        std::fs::read(path).map(|b| b.starts_with(b"PK")).unwrap_or(false)
    }

    #[test]
    fn test_find_tables() {
        let tables = find_tables(SAMPLE);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].headers, vec!["Name", "Age", "City"]);
        assert_eq!(tables[0].rows[1], vec!["Jane", "25", "LA, CA"]);
    }

    #[test]
    fn test_find_multiple_tables() {
        let md = "Intro\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\ntext\n\n| c |\n|:-:|\n| 3 |\n";
        let tables = find_tables(md);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[1].headers, vec!["c"]);
    }

    #[tokio::test]
    async fn test_execute_writes_workbooks() {
        let tmp = TempDir::new().unwrap();
        let tool = MarkdownExcelTool::new(tmp.path().join("output"));

        let out = tool
            .execute(json!({"markdown_content": SAMPLE, "filename_prefix": "people"}))
            .await
            .unwrap();

        assert!(out.starts_with("Successfully converted 1 tables to Excel:\n"));
        let path = tmp.path().join("output").join("people_1.xlsx");
        assert!(out.ends_with(&path.display().to_string()));
        assert!(is_xlsx(&path));
    }

    #[tokio::test]
    async fn test_execute_default_prefix_numbers_each_table() {
        let tmp = TempDir::new().unwrap();
        let tool = MarkdownExcelTool::new(tmp.path().to_path_buf());
        let md = "| a |\n|---|\n| 1 |\n\n| b |\n|---|\n| 2 |\n";

        let out = tool.execute(json!({"markdown_content": md})).await.unwrap();

        assert!(out.starts_with("Successfully converted 2 tables to Excel:\n"));
        assert!(is_xlsx(&tmp.path().join("table_1.xlsx")));
        assert!(is_xlsx(&tmp.path().join("table_2.xlsx")));
    }

    #[tokio::test]
    async fn test_prefix_cannot_leave_output_dir() {
        let tmp = TempDir::new().unwrap();
        let output = tmp.path().join("data").join("output");
        let tool = MarkdownExcelTool::new(output.clone());
        let md = "| a |\n|---|\n| 1 |\n";

        let out = tool
            .execute(json!({"markdown_content": md, "filename_prefix": "../../escaped"}))
            .await
            .unwrap();

        let inside = output.join("escaped_1.xlsx");
        assert!(out.ends_with(&inside.display().to_string()));
        assert!(is_xlsx(&inside));
        assert!(!tmp.path().join("escaped_1.xlsx").exists());

        tool.execute(json!({"markdown_content": md, "filename_prefix": ".."}))
            .await
            .unwrap();
        assert!(output.join("table_1.xlsx").is_file());
    }

    #[tokio::test]
    async fn test_execute_without_tables() {
        let tmp = TempDir::new().unwrap();
        let tool = MarkdownExcelTool::new(tmp.path().to_path_buf());
        let out = tool.execute(json!({"markdown_content": "no tables"})).await.unwrap();
        assert_eq!(out, "No tables found in the markdown content.");
    }
}
