//! In-process [`SpreadsheetApi`] used for dry runs and tests.
//!
//! Workbooks, worksheets, written ranges and tables live in a mutex-guarded
//! tree. Ids are opaque `wb-N` / `ws-N` / `tbl-N` strings, so callers cannot
//! rely on them matching names. Every call is recorded, and any operation can
//! be made to fail to exercise abort behaviour.

use std::{
  collections::{BTreeMap, HashMap},
  sync::{Mutex, MutexGuard, PoisonError},
};

use serde_json::Value;

use crate::{
  Error, Result,
  api::{ColumnWidth, FontSpec, ItemRef, KeySpec, SpreadsheetApi, UpsertCounts},
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryTable {
  pub item:   ItemRef,
  pub style:  Option<String>,
  pub header: Vec<Value>,
  pub rows:   Vec<Vec<Value>>,
}

#[derive(Debug, Clone, Default)]
struct Sheet {
  item:   ItemRef,
  ranges: BTreeMap<String, Vec<Vec<Value>>>,
  tables: Vec<MemoryTable>,
  widths: Vec<ColumnWidth>,
  font:   Option<FontSpec>,
}

#[derive(Debug, Clone, Default)]
struct Book {
  item:   ItemRef,
  sheets: Vec<Sheet>,
}

#[derive(Debug, Default)]
struct Inner {
  next_id:   u64,
  workbooks: Vec<Book>,
  failing:   Option<String>,
  calls:     Vec<String>,
}

impl Inner {
  /// Record `op` and fail it if it was marked.
  fn call(&mut self, op: &str) -> Result<()> {
    self.calls.push(op.to_owned());
    if self.failing.as_deref() == Some(op) {
      return Err(Error::Unavailable(op.to_owned()));
    }
    Ok(())
  }

  fn mint(&mut self, prefix: &str, name: &str) -> ItemRef {
    self.next_id += 1;
    ItemRef { id: format!("{prefix}-{}", self.next_id), name: name.to_owned() }
  }

  fn book(&mut self, id: &str) -> Result<&mut Book> {
    self
      .workbooks
      .iter_mut()
      .find(|b| b.item.id == id)
      .ok_or_else(|| Error::UnknownId { kind: "workbook", id: id.to_owned() })
  }

  fn sheet(&mut self, workbook: &str, id: &str) -> Result<&mut Sheet> {
    self
      .book(workbook)?
      .sheets
      .iter_mut()
      .find(|s| s.item.id == id)
      .ok_or_else(|| Error::UnknownId { kind: "worksheet", id: id.to_owned() })
  }

  fn table(&mut self, workbook: &str, id: &str) -> Result<&mut MemoryTable> {
    self
      .book(workbook)?
      .sheets
      .iter_mut()
      .flat_map(|s| s.tables.iter_mut())
      .find(|t| t.item.id == id)
      .ok_or_else(|| Error::UnknownId { kind: "table", id: id.to_owned() })
  }
}

#[derive(Debug, Default)]
pub struct MemoryWorkbook {
  inner: Mutex<Inner>,
}

impl MemoryWorkbook {
  pub fn new() -> Self { Self::default() }

  /// Make every later call to `op` (a [`SpreadsheetApi`] method name) fail.
  pub fn fail_on(&self, op: &str) {
    self.lock().failing = Some(op.to_owned());
  }

  pub fn clear_failure(&self) { self.lock().failing = None; }

  /// Method names called so far, in order.
  pub fn calls(&self) -> Vec<String> { self.lock().calls.clone() }

  pub fn workbook_names(&self) -> Vec<String> {
    self.lock().workbooks.iter().map(|b| b.item.name.clone()).collect()
  }

  pub fn worksheet_names(&self, workbook: &str) -> Vec<String> {
    self
      .lock()
      .workbooks
      .iter()
      .find(|b| b.item.name == workbook)
      .map(|b| b.sheets.iter().map(|s| s.item.name.clone()).collect())
      .unwrap_or_default()
  }

  /// The first table on the named worksheet.
  pub fn table(&self, workbook: &str, worksheet: &str) -> Option<MemoryTable> {
    self.with_sheet(workbook, worksheet, |s| s.tables.first().cloned()).flatten()
  }

  pub fn column_widths(&self, workbook: &str, worksheet: &str) -> Vec<ColumnWidth> {
    self.with_sheet(workbook, worksheet, |s| s.widths.clone()).unwrap_or_default()
  }

  pub fn font(&self, workbook: &str, worksheet: &str) -> Option<FontSpec> {
    self.with_sheet(workbook, worksheet, |s| s.font.clone()).flatten()
  }

  fn with_sheet<T>(
    &self,
    workbook: &str,
    worksheet: &str,
    f: impl FnOnce(&Sheet) -> T,
  ) -> Option<T> {
    let inner = self.lock();
    let book = inner.workbooks.iter().find(|b| b.item.name == workbook)?;
    book.sheets.iter().find(|s| s.item.name == worksheet).map(f)
  }

  fn lock(&self) -> MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl SpreadsheetApi for MemoryWorkbook {
  type Error = Error;

  async fn list_workbooks(&self) -> Result<Vec<ItemRef>> {
    let mut inner = self.lock();
    inner.call("list_workbooks")?;
    Ok(inner.workbooks.iter().map(|b| b.item.clone()).collect())
  }

  async fn create_workbook(&self, name: &str) -> Result<ItemRef> {
    let mut inner = self.lock();
    inner.call("create_workbook")?;
    let item = inner.mint("wb", name);
    inner.workbooks.push(Book { item: item.clone(), sheets: vec![] });
    Ok(item)
  }

  async fn list_worksheets(&self, workbook: &str) -> Result<Vec<ItemRef>> {
    let mut inner = self.lock();
    inner.call("list_worksheets")?;
    Ok(inner.book(workbook)?.sheets.iter().map(|s| s.item.clone()).collect())
  }

  async fn create_worksheet(&self, workbook: &str, name: &str) -> Result<ItemRef> {
    let mut inner = self.lock();
    inner.call("create_worksheet")?;
    let item = inner.mint("ws", name);
    inner
      .book(workbook)?
      .sheets
      .push(Sheet { item: item.clone(), ..Sheet::default() });
    Ok(item)
  }

  async fn list_tables(&self, workbook: &str, worksheet: &str) -> Result<Vec<ItemRef>> {
    let mut inner = self.lock();
    inner.call("list_tables")?;
    let sheet = inner.sheet(workbook, worksheet)?;
    Ok(sheet.tables.iter().map(|t| t.item.clone()).collect())
  }

  async fn write_range(
    &self,
    workbook: &str,
    worksheet: &str,
    address: &str,
    values: Vec<Vec<Value>>,
  ) -> Result<()> {
    let mut inner = self.lock();
    inner.call("write_range")?;
    inner.sheet(workbook, worksheet)?.ranges.insert(address.to_owned(), values);
    Ok(())
  }

  async fn create_table(
    &self,
    workbook: &str,
    worksheet: &str,
    address: &str,
  ) -> Result<ItemRef> {
    let mut inner = self.lock();
    inner.call("create_table")?;
    let name = format!("Table{}", inner.next_id + 1);
    let item = inner.mint("tbl", &name);
    let sheet = inner.sheet(workbook, worksheet)?;
    let mut values = sheet
      .ranges
      .get(address)
      .cloned()
      .ok_or_else(|| Error::UnknownRange(address.to_owned()))?
      .into_iter();
    let header = values.next().unwrap_or_default();
    sheet.tables.push(MemoryTable {
      item: item.clone(),
      style: None,
      header,
      rows: values.collect(),
    });
    Ok(item)
  }

  async fn upsert_rows(
    &self,
    workbook: &str,
    table: &str,
    key: &KeySpec,
    rows: Vec<Vec<Value>>,
  ) -> Result<UpsertCounts> {
    let mut inner = self.lock();
    inner.call("upsert_rows")?;
    let table = inner.table(workbook, table)?;

    let mut index: HashMap<String, usize> = HashMap::new();
    for (i, row) in table.rows.iter().enumerate() {
      index.entry(key.row_key(row)).or_insert(i);
    }

    let mut counts = UpsertCounts::default();
    for row in rows {
      let k = key.row_key(&row);
      match index.get(&k) {
        Some(&i) => {
          table.rows[i] = row;
          counts.updated += 1;
        }
        None => {
          index.insert(k, table.rows.len());
          table.rows.push(row);
          counts.inserted += 1;
        }
      }
    }
    Ok(counts)
  }

  async fn format_table_style(&self, workbook: &str, table: &str, style: &str) -> Result<()> {
    let mut inner = self.lock();
    inner.call("format_table_style")?;
    inner.table(workbook, table)?.style = Some(style.to_owned());
    Ok(())
  }

  async fn format_column_widths(
    &self,
    workbook: &str,
    worksheet: &str,
    widths: &[ColumnWidth],
  ) -> Result<()> {
    let mut inner = self.lock();
    inner.call("format_column_widths")?;
    inner.sheet(workbook, worksheet)?.widths = widths.to_vec();
    Ok(())
  }

  async fn format_font(
    &self,
    workbook: &str,
    worksheet: &str,
    _address: &str,
    font: &FontSpec,
  ) -> Result<()> {
    let mut inner = self.lock();
    inner.call("format_font")?;
    inner.sheet(workbook, worksheet)?.font = Some(font.clone());
    Ok(())
  }
}
