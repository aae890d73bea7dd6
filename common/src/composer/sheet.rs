//! ワークシート XML のセル書き換え
//!
//! sheetData を先頭から流しながら、書き込み対象のセルだけ差し替える。
//! 様式のセル書式（s 属性）はそのまま残し、無い行・セルは順序を守って挿入する。
//!
//! 共有数式（`<f t="shared">`）の親セルを上書きする場合、残る従属セルは
//! 親の数式を自分の位置にずらした通常の数式に置き換える。

use super::package::{attribute, REL_NS};
use super::PackageError;
use crate::cell::{column_index, column_name, CellRef};
use crate::layout::MAX_ROW;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use regex::{Captures, Regex};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::BufRead;

/// xlsx の最終列（0始まり, XFD）
const MAX_COL: u32 = 16_383;

lazy_static::lazy_static! {
    static ref A1_REF_RE: Regex = Regex::new(r"(\$?)([A-Za-z]{1,3})(\$?)([0-9]{1,7})").unwrap();
}

/// worksheet の子要素のうち drawing より後ろに来るもの
const AFTER_DRAWING: &[&[u8]] = &[
    b"legacyDrawing",
    b"legacyDrawingHF",
    b"drawingHF",
    b"picture",
    b"oleObjects",
    b"controls",
    b"webPublishItems",
    b"tableParts",
    b"extLst",
];

/// 書き込む内容
#[derive(Debug, Clone, PartialEq)]
pub enum CellContent {
    Text(String),
    Number(f64),
    /// 先頭の `=` なしの数式
    Formula(String),
}

/// セル1つ分の書き込み
#[derive(Debug, Clone, PartialEq)]
pub struct CellWrite {
    pub cell: CellRef,
    pub content: CellContent,
}

impl CellWrite {
    pub fn new(cell: CellRef, content: CellContent) -> Self {
        Self { cell, content }
    }
}

/// 1始まりの行番号 → (0始まりの列 → 内容)。同じセルへの書き込みは後勝ち
type RowWrites<'a> = BTreeMap<u32, BTreeMap<u32, &'a CellContent>>;

fn group_by_row(writes: &[CellWrite]) -> RowWrites<'_> {
    let mut rows: RowWrites<'_> = BTreeMap::new();
    for write in writes {
        rows.entry(write.cell.row + 1)
            .or_default()
            .insert(write.cell.col, &write.content);
    }
    rows
}

/// 上書きで失われる共有数式の親セル
#[derive(Debug, Clone, PartialEq)]
struct SharedMaster {
    cell: CellRef,
    formula: String,
}

/// si → 親セル
type OrphanedShared = HashMap<String, SharedMaster>;

/// シート XML にセル書き込みを適用する
pub fn patch_cells(xml: &[u8], writes: &[CellWrite]) -> Result<Vec<u8>, PackageError> {
    let orphaned = orphaned_shared_formulas(xml, writes)?;
    let mut rows = group_by_row(writes);

    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + writes.len() * 64));
    let mut buf = Vec::new();
    let mut saw_sheet_data = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(ref e) if e.local_name().as_ref() == b"sheetData" => {
                saw_sheet_data = true;
                writer.write_event(Event::Start(e.to_owned()))?;
                patch_sheet_data(&mut reader, &mut writer, &mut rows, &orphaned)?;
            }
            Event::Empty(ref e) if e.local_name().as_ref() == b"sheetData" => {
                saw_sheet_data = true;
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                writer.write_event(Event::Start(e.to_owned()))?;
                for (row, cells) in std::mem::take(&mut rows) {
                    write_new_row(&mut writer, row, &cells)?;
                }
                writer.write_event(Event::End(BytesEnd::new(name)))?;
            }
            ev => writer.write_event(ev.into_owned())?,
        }
        buf.clear();
    }

    if !saw_sheet_data {
        return Err(PackageError::Invalid("sheetData がありません".to_string()));
    }
    Ok(writer.into_inner())
}

fn patch_sheet_data<R: BufRead>(
    reader: &mut Reader<R>,
    writer: &mut Writer<Vec<u8>>,
    rows: &mut RowWrites<'_>,
    orphaned: &OrphanedShared,
) -> Result<(), PackageError> {
    let mut buf = Vec::new();
    let mut last_row = 0u32;
    let mut current: Option<CellRef> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) if e.local_name().as_ref() == b"row" => {
                let row = row_number(e)?.unwrap_or(last_row + 1);
                last_row = row;
                flush_rows_before(writer, rows, row)?;
                match rows.remove(&row) {
                    Some(cells) => {
                        writer.write_event(Event::Start(row_without_spans(e)?))?;
                        patch_row(reader, writer, row, cells, orphaned)?;
                    }
                    None => writer.write_event(Event::Start(e.to_owned()))?,
                }
            }
            Event::Empty(ref e) if e.local_name().as_ref() == b"row" => {
                let row = row_number(e)?.unwrap_or(last_row + 1);
                last_row = row;
                flush_rows_before(writer, rows, row)?;
                match rows.remove(&row) {
                    Some(cells) => {
                        let start = row_without_spans(e)?;
                        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                        writer.write_event(Event::Start(start))?;
                        for (col, content) in cells {
                            write_cell(writer, CellRef::new(row - 1, col), None, content)?;
                        }
                        writer.write_event(Event::End(BytesEnd::new(name)))?;
                    }
                    None => writer.write_event(Event::Empty(e.to_owned()))?,
                }
            }
            Event::End(ref e) if e.local_name().as_ref() == b"sheetData" => {
                for (row, cells) in std::mem::take(rows) {
                    write_new_row(writer, row, &cells)?;
                }
                writer.write_event(Event::End(e.to_owned()))?;
                return Ok(());
            }
            Event::Start(ref e) if e.local_name().as_ref() == b"c" => {
                current = attribute(e, b"r")?.and_then(|r| CellRef::parse(&r));
                writer.write_event(Event::Start(e.to_owned()))?;
            }
            Event::Start(ref e) if e.local_name().as_ref() == b"f" => {
                if !expand_follower(reader, writer, e, true, current, orphaned)? {
                    writer.write_event(Event::Start(e.to_owned()))?;
                }
            }
            Event::Empty(ref e) if e.local_name().as_ref() == b"f" => {
                if !expand_follower(reader, writer, e, false, current, orphaned)? {
                    writer.write_event(Event::Empty(e.to_owned()))?;
                }
            }
            Event::Eof => {
                return Err(PackageError::Invalid("sheetData が閉じていません".to_string()))
            }
            ev => writer.write_event(ev.into_owned())?,
        }
        buf.clear();
    }
}

fn flush_rows_before(
    writer: &mut Writer<Vec<u8>>,
    rows: &mut RowWrites<'_>,
    row: u32,
) -> Result<(), PackageError> {
    while let Some(entry) = rows.first_entry() {
        if *entry.key() >= row {
            break;
        }
        let (pending, cells) = entry.remove_entry();
        write_new_row(writer, pending, &cells)?;
    }
    Ok(())
}

fn patch_row<R: BufRead>(
    reader: &mut Reader<R>,
    writer: &mut Writer<Vec<u8>>,
    row: u32,
    mut cells: BTreeMap<u32, &CellContent>,
    orphaned: &OrphanedShared,
) -> Result<(), PackageError> {
    let mut buf = Vec::new();
    let mut last_col: Option<u32> = None;
    let mut current: Option<CellRef> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) if e.local_name().as_ref() == b"c" => {
                let col = cell_column(e)?.unwrap_or_else(|| last_col.map_or(0, |c| c + 1));
                last_col = Some(col);
                flush_cells_before(writer, &mut cells, row, col)?;
                match cells.remove(&col) {
                    Some(content) => {
                        let style = attribute(e, b"s")?;
                        skip_element(reader, b"c")?;
                        write_cell(writer, CellRef::new(row - 1, col), style.as_deref(), content)?;
                    }
                    None => {
                        current = Some(CellRef::new(row - 1, col));
                        writer.write_event(Event::Start(e.to_owned()))?;
                    }
                }
            }
            Event::Start(ref e) if e.local_name().as_ref() == b"f" => {
                if !expand_follower(reader, writer, e, true, current, orphaned)? {
                    writer.write_event(Event::Start(e.to_owned()))?;
                }
            }
            Event::Empty(ref e) if e.local_name().as_ref() == b"f" => {
                if !expand_follower(reader, writer, e, false, current, orphaned)? {
                    writer.write_event(Event::Empty(e.to_owned()))?;
                }
            }
            Event::Empty(ref e) if e.local_name().as_ref() == b"c" => {
                let col = cell_column(e)?.unwrap_or_else(|| last_col.map_or(0, |c| c + 1));
                last_col = Some(col);
                flush_cells_before(writer, &mut cells, row, col)?;
                match cells.remove(&col) {
                    Some(content) => {
                        let style = attribute(e, b"s")?;
                        write_cell(writer, CellRef::new(row - 1, col), style.as_deref(), content)?;
                    }
                    None => writer.write_event(Event::Empty(e.to_owned()))?,
                }
            }
            Event::End(ref e) if e.local_name().as_ref() == b"row" => {
                for (col, content) in std::mem::take(&mut cells) {
                    write_cell(writer, CellRef::new(row - 1, col), None, content)?;
                }
                writer.write_event(Event::End(e.to_owned()))?;
                return Ok(());
            }
            Event::Eof => return Err(PackageError::Invalid("row が閉じていません".to_string())),
            ev => writer.write_event(ev.into_owned())?,
        }
        buf.clear();
    }
}

fn flush_cells_before(
    writer: &mut Writer<Vec<u8>>,
    cells: &mut BTreeMap<u32, &CellContent>,
    row: u32,
    col: u32,
) -> Result<(), PackageError> {
    while let Some(entry) = cells.first_entry() {
        if *entry.key() >= col {
            break;
        }
        let (pending, content) = entry.remove_entry();
        write_cell(writer, CellRef::new(row - 1, pending), None, content)?;
    }
    Ok(())
}

/// 開始タグを読んだ直後から、対応する終了タグまで読み捨てる
fn skip_element<R: BufRead>(reader: &mut Reader<R>, name: &[u8]) -> Result<(), PackageError> {
    let mut buf = Vec::new();
    let mut depth = 0usize;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) if e.local_name().as_ref() == name => depth += 1,
            Event::End(ref e) if e.local_name().as_ref() == name => {
                if depth == 0 {
                    return Ok(());
                }
                depth -= 1;
            }
            Event::Eof => {
                return Err(PackageError::Invalid(format!(
                    "<{}> が閉じていません",
                    String::from_utf8_lossy(name)
                )))
            }
            _ => {}
        }
        buf.clear();
    }
}

/// `<f t="shared" si="..">` の si
fn shared_index(e: &BytesStart<'_>) -> Result<Option<String>, PackageError> {
    if attribute(e, b"t")?.as_deref() != Some("shared") {
        return Ok(None);
    }
    attribute(e, b"si")
}

/// 開始タグを読んだ直後から、終了タグまでのテキスト
fn read_text<R: BufRead>(reader: &mut Reader<R>, name: &[u8]) -> Result<String, PackageError> {
    let mut buf = Vec::new();
    let mut text = String::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Text(t) => text.push_str(&t.unescape()?),
            Event::CData(t) => text.push_str(&String::from_utf8_lossy(&t)),
            Event::End(ref e) if e.local_name().as_ref() == name => return Ok(text),
            Event::Eof => {
                return Err(PackageError::Invalid(format!(
                    "<{}> が閉じていません",
                    String::from_utf8_lossy(name)
                )))
            }
            _ => {}
        }
        buf.clear();
    }
}

/// 書き込み先にある共有数式の親セルを集める
fn orphaned_shared_formulas(
    xml: &[u8],
    writes: &[CellWrite],
) -> Result<OrphanedShared, PackageError> {
    let targets: HashSet<CellRef> = writes.iter().map(|w| w.cell).collect();
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut current: Option<CellRef> = None;
    let mut masters = OrphanedShared::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"c" => {
                current = attribute(e, b"r")?.and_then(|r| CellRef::parse(&r));
            }
            Event::Start(ref e) if e.local_name().as_ref() == b"f" => {
                let cell = current.filter(|c| targets.contains(c));
                if let (Some(cell), Some(si)) = (cell, shared_index(e)?) {
                    if attribute(e, b"ref")?.is_some() {
                        let formula = read_text(&mut reader, b"f")?;
                        masters.insert(si, SharedMaster { cell, formula });
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(masters)
}

/// 親を失った共有数式の従属セルなら、通常の数式にして書く（書いたら true）
fn expand_follower<R: BufRead>(
    reader: &mut Reader<R>,
    writer: &mut Writer<Vec<u8>>,
    e: &BytesStart<'_>,
    has_body: bool,
    cell: Option<CellRef>,
    orphaned: &OrphanedShared,
) -> Result<bool, PackageError> {
    if orphaned.is_empty() {
        return Ok(false);
    }
    let Some(si) = shared_index(e)? else {
        return Ok(false);
    };
    let (Some(master), Some(cell)) = (orphaned.get(&si), cell) else {
        return Ok(false);
    };

    if has_body {
        skip_element(reader, b"f")?;
    }
    let formula = shift_formula(
        &master.formula,
        i64::from(cell.row) - i64::from(master.cell.row),
        i64::from(cell.col) - i64::from(master.cell.col),
    );
    writer.write_event(Event::Start(BytesStart::new("f")))?;
    writer.write_event(Event::Text(BytesText::new(&formula)))?;
    writer.write_event(Event::End(BytesEnd::new("f")))?;
    Ok(true)
}

/// 数式中の相対参照を (行, 列) だけずらす。`$` 付きと引用符の内側はそのまま
fn shift_formula(formula: &str, rows: i64, cols: i64) -> String {
    let mut out = String::with_capacity(formula.len() + 8);
    let mut start = 0;
    let mut quote: Option<char> = None;

    for (i, ch) in formula.char_indices() {
        match quote {
            Some(q) if ch == q => {
                out.push_str(&formula[start..=i]);
                start = i + 1;
                quote = None;
            }
            Some(_) => {}
            None if ch == '"' || ch == '\'' => {
                out.push_str(&shift_refs(&formula[start..i], rows, cols));
                start = i;
                quote = Some(ch);
            }
            None => {}
        }
    }

    match quote {
        Some(_) => out.push_str(&formula[start..]),
        None => out.push_str(&shift_refs(&formula[start..], rows, cols)),
    }
    out
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.'
}

fn shift_refs(text: &str, rows: i64, cols: i64) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in A1_REF_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let before = whole.start().checked_sub(1).map(|i| bytes[i]);
        let after = bytes.get(whole.end()).copied();
        // 関数名（LOG10( など）や名前の一部は参照ではない
        if before.is_some_and(is_name_byte) || after.is_some_and(|b| is_name_byte(b) || b == b'(') {
            continue;
        }
        let Some(shifted) = shift_ref(&caps, rows, cols) else {
            continue;
        };
        out.push_str(&text[last..whole.start()]);
        out.push_str(&shifted);
        last = whole.end();
    }
    out.push_str(&text[last..]);
    out
}

fn shift_ref(caps: &Captures<'_>, rows: i64, cols: i64) -> Option<String> {
    let col_abs = &caps[1];
    let row_abs = &caps[3];
    let col = i64::from(column_index(&caps[2])?);
    let row: i64 = caps[4].parse().ok()?;
    if row < 1 || row > i64::from(MAX_ROW) || col > i64::from(MAX_COL) {
        return None;
    }

    let col = if col_abs.is_empty() { col + cols } else { col };
    let row = if row_abs.is_empty() { row + rows } else { row };
    if col < 0 || col > i64::from(MAX_COL) || row < 1 || row > i64::from(MAX_ROW) {
        return Some("#REF!".to_string());
    }
    Some(format!("{}{}{}{}", col_abs, column_name(col as u32), row_abs, row))
}

fn write_new_row(
    writer: &mut Writer<Vec<u8>>,
    row: u32,
    cells: &BTreeMap<u32, &CellContent>,
) -> Result<(), PackageError> {
    let mut start = BytesStart::new("row");
    start.push_attribute(("r", row.to_string().as_str()));
    writer.write_event(Event::Start(start))?;
    for (col, content) in cells {
        write_cell(writer, CellRef::new(row - 1, *col), None, content)?;
    }
    writer.write_event(Event::End(BytesEnd::new("row")))?;
    Ok(())
}

fn write_cell(
    writer: &mut Writer<Vec<u8>>,
    cell: CellRef,
    style: Option<&str>,
    content: &CellContent,
) -> Result<(), PackageError> {
    let a1 = cell.to_a1();
    let mut start = BytesStart::new("c");
    start.push_attribute(("r", a1.as_str()));
    if let Some(style) = style {
        start.push_attribute(("s", style));
    }

    match content {
        CellContent::Text(text) => {
            start.push_attribute(("t", "inlineStr"));
            writer.write_event(Event::Start(start))?;
            writer.write_event(Event::Start(BytesStart::new("is")))?;
            let mut t = BytesStart::new("t");
            if needs_space_preserve(text) {
                t.push_attribute(("xml:space", "preserve"));
            }
            writer.write_event(Event::Start(t))?;
            writer.write_event(Event::Text(BytesText::new(text)))?;
            writer.write_event(Event::End(BytesEnd::new("t")))?;
            writer.write_event(Event::End(BytesEnd::new("is")))?;
        }
        CellContent::Number(n) => {
            writer.write_event(Event::Start(start))?;
            writer.write_event(Event::Start(BytesStart::new("v")))?;
            writer.write_event(Event::Text(BytesText::new(&n.to_string())))?;
            writer.write_event(Event::End(BytesEnd::new("v")))?;
        }
        CellContent::Formula(formula) => {
            writer.write_event(Event::Start(start))?;
            writer.write_event(Event::Start(BytesStart::new("f")))?;
            writer.write_event(Event::Text(BytesText::new(
                formula.strip_prefix('=').unwrap_or(formula),
            )))?;
            writer.write_event(Event::End(BytesEnd::new("f")))?;
        }
    }

    writer.write_event(Event::End(BytesEnd::new("c")))?;
    Ok(())
}

fn needs_space_preserve(text: &str) -> bool {
    text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace)
}

fn row_number(e: &BytesStart<'_>) -> Result<Option<u32>, PackageError> {
    Ok(attribute(e, b"r")?.and_then(|r| r.trim().parse().ok()))
}

fn cell_column(e: &BytesStart<'_>) -> Result<Option<u32>, PackageError> {
    Ok(attribute(e, b"r")?
        .and_then(|r| CellRef::parse(&r))
        .map(|cell| cell.col))
}

/// 書き換える行は spans を外す（列範囲が変わりうるため）
fn row_without_spans(e: &BytesStart<'_>) -> Result<BytesStart<'static>, PackageError> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut row = BytesStart::new(name);
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == b"spans" {
            continue;
        }
        row.push_attribute((attr.key.as_ref(), attr.value.as_ref()));
    }
    Ok(row)
}

/// `<drawing r:id="..."/>` の rId
pub fn drawing_rel_id(xml: &[u8]) -> Result<Option<String>, PackageError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"drawing" => {
                for attr in e.attributes() {
                    let attr = attr?;
                    if attr.key.local_name().as_ref() == b"id" && attr.key.prefix().is_some() {
                        return Ok(Some(attr.unescape_value()?.into_owned()));
                    }
                }
                return Ok(None);
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
        buf.clear();
    }
}

/// worksheet に `<drawing r:id>` を要素順を守って差し込む
pub fn insert_drawing(xml: &[u8], rel_id: &str) -> Result<Vec<u8>, PackageError> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 64));
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut prefix = String::from("r");
    let mut inserted = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(ref e) if depth == 0 && e.local_name().as_ref() == b"worksheet" => {
                let (root, rel_prefix) = worksheet_with_rel_ns(e)?;
                prefix = rel_prefix;
                writer.write_event(Event::Start(root))?;
                depth += 1;
            }
            Event::Start(ref e) => {
                if depth == 1 && !inserted && AFTER_DRAWING.contains(&e.local_name().as_ref()) {
                    write_drawing(&mut writer, &prefix, rel_id)?;
                    inserted = true;
                }
                writer.write_event(Event::Start(e.to_owned()))?;
                depth += 1;
            }
            Event::Empty(ref e) => {
                if depth == 1 && !inserted && AFTER_DRAWING.contains(&e.local_name().as_ref()) {
                    write_drawing(&mut writer, &prefix, rel_id)?;
                    inserted = true;
                }
                writer.write_event(Event::Empty(e.to_owned()))?;
            }
            Event::End(ref e) => {
                if depth == 1 && !inserted {
                    write_drawing(&mut writer, &prefix, rel_id)?;
                    inserted = true;
                }
                writer.write_event(Event::End(e.to_owned()))?;
                depth = depth.saturating_sub(1);
            }
            ev => writer.write_event(ev.into_owned())?,
        }
        buf.clear();
    }

    if !inserted {
        return Err(PackageError::Invalid("worksheet 要素がありません".to_string()));
    }
    Ok(writer.into_inner())
}

fn write_drawing(writer: &mut Writer<Vec<u8>>, prefix: &str, rel_id: &str) -> Result<(), PackageError> {
    let mut drawing = BytesStart::new("drawing");
    let key = format!("{}:id", prefix);
    drawing.push_attribute((key.as_str(), rel_id));
    writer.write_event(Event::Empty(drawing))?;
    Ok(())
}

/// relationships 名前空間の接頭辞を探し、無ければ xmlns:r を足す
fn worksheet_with_rel_ns(e: &BytesStart<'_>) -> Result<(BytesStart<'static>, String), PackageError> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut root = BytesStart::new(name);
    let mut prefix = None;

    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        if let Some(declared) = key.strip_prefix("xmlns:") {
            if prefix.is_none() && attr.unescape_value()? == REL_NS {
                prefix = Some(declared.to_string());
            }
        }
        root.push_attribute((attr.key.as_ref(), attr.value.as_ref()));
    }

    let prefix = match prefix {
        Some(prefix) => prefix,
        None => {
            root.push_attribute(("xmlns:r", REL_NS));
            "r".to_string()
        }
    };
    Ok((root, prefix))
}
