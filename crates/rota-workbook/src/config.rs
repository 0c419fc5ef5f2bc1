//! Workbook connection and presentation settings, deserialised from the
//! `[workbook]` section of `rota.toml`.

use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkbookConfig {
  /// Graph API root, e.g. `https://graph.microsoft.com/v1.0`.
  pub base_url:         String,
  pub access_token:     String,
  /// Drive folder (relative to the drive root) holding the monthly
  /// workbooks.
  pub drive_folder:     String,
  /// Drive item id of an empty workbook copied when a month's workbook is
  /// missing.
  pub template_item_id: Option<String>,
  pub workbook_prefix:  String,
  /// Worksheet holding the consolidated incidence log.
  pub incidence_sheet:  String,
  pub table_style:      String,
  pub font_name:        String,
  pub font_size:        f64,
  /// Pixels per character of column width.
  pub px_per_char:      u32,
  /// Column width in characters, keyed by header; others use
  /// `default_chars`.
  pub column_chars:     BTreeMap<String, u32>,
  pub default_chars:    u32,
}

impl Default for WorkbookConfig {
  fn default() -> Self {
    let column_chars = [
      ("Date", 11),
      ("Program", 28),
      ("Start", 7),
      ("End", 7),
      ("Instructor", 24),
      ("Minutes", 8),
      ("Units", 6),
      ("Description", 40),
      ("Feedback", 40),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_owned(), v))
    .collect();

    Self {
      base_url: "https://graph.microsoft.com/v1.0".into(),
      access_token: String::new(),
      drive_folder: "Rota".into(),
      template_item_id: None,
      workbook_prefix: "Schedule".into(),
      incidence_sheet: "Incidences".into(),
      table_style: "TableStyleMedium2".into(),
      font_name: "Calibri".into(),
      font_size: 10.0,
      px_per_char: 7,
      column_chars,
      default_chars: 14,
    }
  }
}

impl WorkbookConfig {
  /// Pixel width for a column with header `header`, padded by 5px as
  /// spreadsheet applications do.
  pub fn column_pixels(&self, header: &str) -> u32 {
    let chars = self.column_chars.get(header).copied().unwrap_or(self.default_chars);
    chars * self.px_per_char + 5
  }

  /// `<prefix> YYYY-MM.xlsx`
  pub fn workbook_name(&self, year: i32, month: u32) -> String {
    format!("{} {year:04}-{month:02}.xlsx", self.workbook_prefix)
  }
}
