//! レイアウト設定モジュール
//!
//! スペック表とQCシート様式のセル位置の取り決め。
//! どちらも設定ファイルから上書きできる（未指定の項目は既定値）。

use crate::cell::{column_name, CellRef};
use serde::{Deserialize, Serialize};

/// xlsx の最終行（1始まり）
pub const MAX_ROW: u32 = 1_048_576;

/// 計測部位ラベルを読む列
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelColumn {
    /// A列（英語ラベルのみの旧レイアウト）
    A,
    /// B列（英語行と韓国語行が交互に並ぶレイアウト）
    #[default]
    B,
}

impl LabelColumn {
    /// 0始まりの列番号
    pub fn index(&self) -> u32 {
        match self {
            LabelColumn::A => 0,
            LabelColumn::B => 1,
        }
    }
}

impl std::str::FromStr for LabelColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A" | "1" => Ok(LabelColumn::A),
            "B" | "2" => Ok(LabelColumn::B),
            _ => Err(format!("Unknown label column: {}. Use A or B", s)),
        }
    }
}

/// スペック表の構造
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecLayout {
    /// STYLE NO が書かれたセル
    pub marker_cell: CellRef,
    /// サイズ見出し行（1始まり）
    pub header_row: u32,
    /// データ開始行（1始まり）
    pub first_data_row: u32,
    pub label_column: LabelColumn,
}

impl Default for SpecLayout {
    fn default() -> Self {
        Self {
            marker_cell: CellRef::new(0, 0),
            header_row: 2,
            first_data_row: 3,
            label_column: LabelColumn::default(),
        }
    }
}

/// QCシート様式の構造
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateLayout {
    /// STYLE NO 記入セル
    pub style_cell: CellRef,
    /// サイズ記入セル
    pub size_cell: CellRef,
    /// 計測表の開始行（1始まり）
    pub anchor_row: u32,
    /// 様式上の計測表の最終行（目安。これを超えても書き込みは続ける）
    pub table_end_row: u32,
    /// 部位名の列（0始まり）
    pub label_col: u32,
    /// スペック値の列
    pub spec_col: u32,
    /// 実測値の列（検品担当者が手入力する。書き込まない）
    pub actual_col: u32,
    /// 差分式の列
    pub delta_col: u32,
    /// ロゴ画像の左上セル
    pub image_anchor: CellRef,
}

impl Default for TemplateLayout {
    fn default() -> Self {
        Self {
            style_cell: CellRef::new(5, 1),
            size_cell: CellRef::new(5, 6),
            anchor_row: 9,
            table_end_row: 37,
            label_col: 0,
            spec_col: 1,
            actual_col: 2,
            delta_col: 3,
            image_anchor: CellRef::new(1, 5),
        }
    }
}

impl TemplateLayout {
    /// 差分式 `IF(C9="","",IFERROR(C9-B9,""))`（先頭の `=` なし）
    pub fn delta_formula(&self, row: u32) -> String {
        let actual = format!("{}{}", column_name(self.actual_col), row);
        let spec = format!("{}{}", column_name(self.spec_col), row);
        format!(
            r#"IF({actual}="","",IFERROR({actual}-{spec},""))"#,
            actual = actual,
            spec = spec
        )
    }

    /// i番目（0始まり）の計測値を書く行（1始まり）。シートの最終行を超えるなら None
    pub fn entry_row(&self, index: usize) -> Option<u32> {
        u32::try_from(index)
            .ok()
            .and_then(|i| self.anchor_row.checked_add(i))
            .filter(|row| *row <= MAX_ROW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_formula_default_columns() {
        let layout = TemplateLayout::default();
        assert_eq!(layout.delta_formula(9), r#"IF(C9="","",IFERROR(C9-B9,""))"#);
        assert_eq!(layout.delta_formula(13), r#"IF(C13="","",IFERROR(C13-B13,""))"#);
    }

    #[test]
    fn test_default_template_cells() {
        let layout = TemplateLayout::default();
        assert_eq!(layout.style_cell.to_a1(), "B6");
        assert_eq!(layout.size_cell.to_a1(), "G6");
        assert_eq!(layout.image_anchor.to_a1(), "F2");
        assert_eq!(layout.entry_row(0), Some(9));
        assert_eq!(layout.entry_row(4), Some(13));
    }

    #[test]
    fn test_entry_row_stops_at_sheet_limit() {
        let layout = TemplateLayout {
            anchor_row: MAX_ROW - 1,
            ..Default::default()
        };
        assert_eq!(layout.entry_row(1), Some(MAX_ROW));
        assert_eq!(layout.entry_row(2), None);

        let layout = TemplateLayout {
            anchor_row: u32::MAX,
            ..Default::default()
        };
        assert_eq!(layout.entry_row(0), None);
        assert_eq!(layout.entry_row(1), None);
    }

    #[test]
    fn test_layout_partial_json_uses_defaults() {
        let layout: TemplateLayout =
            serde_json::from_str(r#"{"style_cell":"C5","anchor_row":11}"#).unwrap();
        assert_eq!(layout.style_cell, CellRef::new(4, 2));
        assert_eq!(layout.anchor_row, 11);
        assert_eq!(layout.size_cell.to_a1(), "G6");
    }

    #[test]
    fn test_label_column_from_str() {
        assert_eq!("a".parse::<LabelColumn>().unwrap(), LabelColumn::A);
        assert_eq!("2".parse::<LabelColumn>().unwrap(), LabelColumn::B);
        assert!("C".parse::<LabelColumn>().is_err());
    }
}
