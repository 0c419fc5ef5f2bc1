//! [`SpreadsheetApi`] over the Microsoft Graph workbook endpoints.
//!
//! Workbooks are drive items in the configured folder; worksheets, tables
//! and ranges are addressed under `/me/drive/items/{id}/workbook`.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};

use crate::{
  Error, Result,
  api::{ColumnWidth, FontSpec, ItemRef, KeySpec, SpreadsheetApi, UpsertCounts},
  config::WorkbookConfig,
  layout::column_letter,
};

/// Attempts made to find a copied workbook before giving up.
const COPY_POLL_ATTEMPTS: u32 = 10;
const COPY_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Graph list responses wrap their items in `value`.
#[derive(Deserialize)]
struct Collection<T> {
  value: Vec<T>,
}

#[derive(Deserialize)]
struct TableRow {
  index:  usize,
  values: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveItem {
  id:               String,
  parent_reference: Option<ParentReference>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParentReference {
  drive_id: Option<String>,
}

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct GraphClient {
  client: Client,
  config: WorkbookConfig,
}

impl GraphClient {
  pub fn new(config: WorkbookConfig) -> Result<Self> {
    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder {
    if self.config.access_token.is_empty() {
      req
    } else {
      req.bearer_auth(&self.config.access_token)
    }
  }

  fn workbook_path(workbook: &str) -> String {
    format!("/me/drive/items/{}/workbook", escape(workbook))
  }

  fn sheet_path(workbook: &str, worksheet: &str) -> String {
    format!("{}/worksheets/{}", Self::workbook_path(workbook), escape(worksheet))
  }

  fn table_path(workbook: &str, table: &str) -> String {
    format!("{}/tables/{}", Self::workbook_path(workbook), escape(table))
  }

  fn folder_path(&self) -> String {
    format!("/me/drive/root:/{}:", escape_path(&self.config.drive_folder))
  }

  /// Send a request and turn a non-success status into [`Error::Status`].
  async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Response> {
    let mut req = self.auth(self.client.request(method.clone(), self.url(path)));
    if let Some(body) = body {
      req = req.json(&body);
    }
    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      return Err(Error::Status { method, path: path.to_owned(), status, body });
    }
    Ok(resp)
  }

  async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
    Ok(self.send(Method::GET, path, None).await?.json().await?)
  }

  async fn list(&self, path: &str) -> Result<Vec<ItemRef>> {
    Ok(self.get::<Collection<ItemRef>>(path).await?.value)
  }
}

impl SpreadsheetApi for GraphClient {
  type Error = Error;

  async fn list_workbooks(&self) -> Result<Vec<ItemRef>> {
    self.list(&format!("{}/children", self.folder_path())).await
  }

  /// Copies the template workbook into the folder, then polls until the
  /// copy is listed; Graph performs copies asynchronously.
  async fn create_workbook(&self, name: &str) -> Result<ItemRef> {
    let template = self.config.template_item_id.as_deref().ok_or(Error::NoTemplate)?;
    let folder: DriveItem = self.get(&self.folder_path()).await?;
    let drive_id = folder.parent_reference.and_then(|p| p.drive_id);

    self
      .send(
        Method::POST,
        &format!("/me/drive/items/{}/copy", escape(template)),
        Some(json!({
          "name": name,
          "parentReference": { "driveId": drive_id, "id": folder.id },
        })),
      )
      .await?;

    for attempt in 1..=COPY_POLL_ATTEMPTS {
      if let Some(item) = self.list_workbooks().await?.into_iter().find(|w| w.name == name) {
        return Ok(item);
      }
      tracing::debug!(name, attempt, "waiting for workbook copy");
      tokio::time::sleep(COPY_POLL_INTERVAL).await;
    }
    Err(Error::CopyTimedOut(name.to_owned()))
  }

  async fn list_worksheets(&self, workbook: &str) -> Result<Vec<ItemRef>> {
    self.list(&format!("{}/worksheets", Self::workbook_path(workbook))).await
  }

  async fn create_worksheet(&self, workbook: &str, name: &str) -> Result<ItemRef> {
    let path = format!("{}/worksheets/add", Self::workbook_path(workbook));
    Ok(self.send(Method::POST, &path, Some(json!({ "name": name }))).await?.json().await?)
  }

  async fn list_tables(&self, workbook: &str, worksheet: &str) -> Result<Vec<ItemRef>> {
    self.list(&format!("{}/tables", Self::sheet_path(workbook, worksheet))).await
  }

  async fn write_range(
    &self,
    workbook: &str,
    worksheet: &str,
    address: &str,
    values: Vec<Vec<Value>>,
  ) -> Result<()> {
    let path = format!(
      "{}/range(address='{}')",
      Self::sheet_path(workbook, worksheet),
      escape(address)
    );
    self.send(Method::PATCH, &path, Some(json!({ "values": values }))).await?;
    Ok(())
  }

  async fn create_table(
    &self,
    workbook: &str,
    worksheet: &str,
    address: &str,
  ) -> Result<ItemRef> {
    let path = format!("{}/tables/add", Self::sheet_path(workbook, worksheet));
    let body = json!({ "address": address, "hasHeaders": true });
    Ok(self.send(Method::POST, &path, Some(body)).await?.json().await?)
  }

  /// Reads the table's rows once, patches matches in place by index and
  /// appends the remainder in a single call.
  async fn upsert_rows(
    &self,
    workbook: &str,
    table: &str,
    key: &KeySpec,
    rows: Vec<Vec<Value>>,
  ) -> Result<UpsertCounts> {
    let base = Self::table_path(workbook, table);
    let existing: Collection<TableRow> = self.get(&format!("{base}/rows")).await?;

    let mut index = std::collections::HashMap::new();
    for row in &existing.value {
      if let Some(values) = row.values.first() {
        index.entry(key.row_key(values)).or_insert(row.index);
      }
    }

    let mut counts = UpsertCounts::default();
    let mut appended: Vec<Vec<Value>> = vec![];
    let mut appended_keys = std::collections::HashMap::new();
    for row in rows {
      let k = key.row_key(&row);
      if let Some(&i) = index.get(&k) {
        let path = format!("{base}/rows/itemAt(index={i})");
        self.send(Method::PATCH, &path, Some(json!({ "values": [row] }))).await?;
        counts.updated += 1;
      } else if let Some(&pos) = appended_keys.get(&k) {
        appended[pos] = row;
        counts.updated += 1;
      } else {
        appended_keys.insert(k, appended.len());
        appended.push(row);
        counts.inserted += 1;
      }
    }

    if !appended.is_empty() {
      let path = format!("{base}/rows/add");
      self.send(Method::POST, &path, Some(json!({ "values": appended }))).await?;
    }
    Ok(counts)
  }

  async fn format_table_style(&self, workbook: &str, table: &str, style: &str) -> Result<()> {
    let path = Self::table_path(workbook, table);
    self.send(Method::PATCH, &path, Some(json!({ "style": style }))).await?;
    Ok(())
  }

  /// Graph sizes columns in points; one pixel is three quarters of a point.
  async fn format_column_widths(
    &self,
    workbook: &str,
    worksheet: &str,
    widths: &[ColumnWidth],
  ) -> Result<()> {
    let sheet = Self::sheet_path(workbook, worksheet);
    for w in widths {
      let col = column_letter(w.column);
      let path = format!("{sheet}/range(address='{col}:{col}')/format");
      let points = f64::from(w.pixels) * 0.75;
      self.send(Method::PATCH, &path, Some(json!({ "columnWidth": points }))).await?;
    }
    Ok(())
  }

  async fn format_font(
    &self,
    workbook: &str,
    worksheet: &str,
    address: &str,
    font: &FontSpec,
  ) -> Result<()> {
    let path = format!(
      "{}/range(address='{}')/format/font",
      Self::sheet_path(workbook, worksheet),
      escape(address)
    );
    let body = json!({ "name": font.name, "size": font.size });
    self.send(Method::PATCH, &path, Some(body)).await?;
    Ok(())
  }
}

/// Percent-encode everything outside the URL-unreserved set.
fn escape(segment: &str) -> String {
  let mut out = String::with_capacity(segment.len());
  for b in segment.bytes() {
    match b {
      b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'!' | b':' => {
        out.push(b as char)
      }
      _ => out.push_str(&format!("%{b:02X}")),
    }
  }
  out
}

/// [`escape`] each `/`-separated segment of a drive path.
fn escape_path(path: &str) -> String {
  path
    .trim_matches('/')
    .split('/')
    .map(escape)
    .collect::<Vec<_>>()
    .join("/")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn escapes_ids_and_paths() {
    assert_eq!(escape("{00000000-0001}"), "%7B00000000-0001%7D");
    assert_eq!(escape("A1:Q3"), "A1:Q3");
    assert_eq!(escape_path("/Shared/Rota 2024/"), "Shared/Rota%202024");
  }

  #[test]
  fn paths_nest_under_workbook() {
    assert_eq!(
      GraphClient::sheet_path("ITEM", "{S}"),
      "/me/drive/items/ITEM/workbook/worksheets/%7BS%7D"
    );
    assert_eq!(
      GraphClient::table_path("ITEM", "1"),
      "/me/drive/items/ITEM/workbook/tables/1"
    );
  }

  #[test]
  fn folder_path_uses_drive_root_syntax() {
    let client = GraphClient::new(WorkbookConfig::default()).unwrap();
    assert_eq!(client.folder_path(), "/me/drive/root:/Rota:");
    assert_eq!(client.url("/x"), "https://graph.microsoft.com/v1.0/x");
  }
}
