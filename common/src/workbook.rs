//! スペック表（xlsx）の読み込み
//!
//! calamine でキャッシュ値（数式の計算結果）を読み込み、シートごとの
//! セル範囲として保持する。読み込み後は変更しない。

use crate::cell::CellRef;
use crate::error::{Error, Result};
use crate::types::{MeasurementValue, SheetRef};
use calamine::{Data, Range, Reader, Xlsx};
use std::io::Cursor;

/// スペック表の1シート
#[derive(Debug, Clone)]
pub struct SpecSheet {
    sheet: SheetRef,
    cells: Range<Data>,
}

impl SpecSheet {
    pub fn new(sheet: SheetRef, cells: Range<Data>) -> Self {
        Self { sheet, cells }
    }

    pub fn name(&self) -> &str {
        &self.sheet.name
    }

    pub fn sheet_ref(&self) -> &SheetRef {
        &self.sheet
    }

    pub fn cell(&self, cell: CellRef) -> Option<&Data> {
        self.cells.get_value((cell.row, cell.col))
    }

    /// セルの表示文字列（空セルは空文字）
    pub fn text(&self, cell: CellRef) -> String {
        self.cell(cell).map(cell_text).unwrap_or_default()
    }

    /// 寸法値として読む。空・空白のみは None
    pub fn value(&self, cell: CellRef) -> Option<MeasurementValue> {
        self.cell(cell).and_then(cell_value)
    }

    /// 最終使用行（0始まり）。空シートは None
    pub fn last_row(&self) -> Option<u32> {
        self.cells.end().map(|(row, _)| row)
    }

    /// 最終使用列（0始まり）
    pub fn last_col(&self) -> Option<u32> {
        self.cells.end().map(|(_, col)| col)
    }
}

/// スペック表ブック
#[derive(Debug, Clone, Default)]
pub struct SpecWorkbook {
    sheets: Vec<SpecSheet>,
}

impl SpecWorkbook {
    /// xlsx のバイト列から全シートを読み込む
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))
            .map_err(|e| Error::malformed("スペック表", e))?;

        let mut sheets = Vec::new();
        for (index, name) in workbook.sheet_names().into_iter().enumerate() {
            let cells = workbook
                .worksheet_range(&name)
                .map_err(|e| Error::malformed(format!("スペック表 シート'{}'", name), e))?;
            sheets.push(SpecSheet::new(SheetRef::new(index, name), cells));
        }

        Ok(Self { sheets })
    }

    pub fn from_sheets(sheets: Vec<SpecSheet>) -> Self {
        Self { sheets }
    }

    pub fn sheets(&self) -> &[SpecSheet] {
        &self.sheets
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// SheetRef が指すシート（位置と名前の両方が一致するもの）
    pub fn sheet(&self, sheet: &SheetRef) -> Option<&SpecSheet> {
        self.sheets
            .get(sheet.index)
            .filter(|s| s.name() == sheet.name)
            .or_else(|| self.sheet_by_name(&sheet.name))
    }

    pub fn sheet_by_name(&self, name: &str) -> Option<&SpecSheet> {
        self.sheets.iter().find(|s| s.name() == name)
    }
}

/// セルの表示文字列
pub fn cell_text(data: &Data) -> String {
    match data {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        other => other.to_string(),
    }
}

/// セルを寸法値に変換する。数値は数値のまま、それ以外は文字列として保持
pub fn cell_value(data: &Data) -> Option<MeasurementValue> {
    match data {
        Data::Empty => None,
        Data::Float(f) => Some(MeasurementValue::Number(*f)),
        Data::Int(i) => Some(MeasurementValue::Number(*i as f64)),
        Data::DateTime(dt) => Some(MeasurementValue::Number(dt.as_f64())),
        Data::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(MeasurementValue::Text(trimmed.to_string()))
            }
        }
        other => {
            let text = cell_text(other);
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(MeasurementValue::Text(trimmed.to_string()))
            }
        }
    }
}
