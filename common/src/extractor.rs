//! 計測値抽出モジュール
//!
//! 見出し行からサイズ列を探し、3行目以降を上から順に読んで
//! （部位名, 寸法）のペアを取り出す。
//!
//! 韓国語ラベルは「英語行の直後に韓国語行」という並びを前提にしている。
//! 並びが崩れていても検証はしない（値がずれて対応付けられる）。

use crate::cell::CellRef;
use crate::error::{Error, Result};
use crate::layout::SpecLayout;
use crate::types::{Language, MeasurementEntry, ScanStats};
use crate::workbook::SpecSheet;
use std::collections::HashMap;

/// サイズ見出しの照合方法
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SizeMatch {
    /// 前後の空白を除いて完全一致
    #[default]
    Exact,
    /// 大文字小文字を区別しない
    IgnoreCase,
}

/// 抽出オプション
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    pub size_match: SizeMatch,
}

/// 抽出結果
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub entries: Vec<MeasurementEntry>,
    /// サイズ列（0始まり）
    pub size_col: u32,
    pub stats: ScanStats,
}

/// ラテン文字を含むか
pub fn has_latin(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_alphabetic())
}

/// ハングルを含むか（字母・互換字母・音節）
pub fn has_hangul(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(c,
            '\u{1100}'..='\u{11FF}'
            | '\u{3130}'..='\u{318F}'
            | '\u{A960}'..='\u{A97F}'
            | '\u{AC00}'..='\u{D7AF}'
            | '\u{D7B0}'..='\u{D7FF}')
    })
}

/// 見出し行の「サイズ名 → 列」対応表。同じ名前は左の列を優先
pub fn size_columns(sheet: &SpecSheet, layout: &SpecLayout) -> Vec<(String, u32)> {
    let Some(last_col) = sheet.last_col() else {
        return Vec::new();
    };
    let header = layout.header_row.saturating_sub(1);

    let mut seen = HashMap::new();
    let mut columns = Vec::new();
    for col in 0..=last_col {
        let text = sheet.text(CellRef::new(header, col)).trim().to_string();
        if text.is_empty() {
            continue;
        }
        if seen.insert(text.clone(), col).is_none() {
            columns.push((text, col));
        }
    }
    columns
}

/// サイズ列を探す
pub fn find_size_column(
    sheet: &SpecSheet,
    size: &str,
    layout: &SpecLayout,
    size_match: SizeMatch,
) -> Result<u32> {
    let size = size.trim();
    let columns = size_columns(sheet, layout);

    let found = columns.iter().find(|(label, _)| match size_match {
        SizeMatch::Exact => label == size,
        SizeMatch::IgnoreCase => label.to_lowercase() == size.to_lowercase(),
    });

    match found {
        Some((_, col)) => Ok(*col),
        None => Err(Error::SizeColumnNotFound {
            size: size.to_string(),
            sheet: sheet.name().to_string(),
            available: columns.into_iter().map(|(label, _)| label).collect(),
        }),
    }
}

/// 行カーソルの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairState {
    /// 次の行をラベル行として読む
    AwaitingLabel,
    /// 直前の英語行とペアにした韓国語行。読まずに1行進める
    ConsumedPair,
}

/// 1行分の判定結果
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    /// ラベルか値が空
    Blank,
    /// 言語フィルタで除外
    Filtered,
    /// この行のラベルで出力
    Emit(String),
    /// 次の行（韓国語）のラベルで出力し、次の行を消費する
    EmitPaired(String),
}

/// ラベル行1行の判定。`next_label` は直下の行のラベル（最終行なら None）
pub fn classify_row(
    label: &str,
    has_value: bool,
    next_label: Option<&str>,
    language: Language,
) -> RowOutcome {
    let label = label.trim();
    if label.is_empty() || !has_value {
        return RowOutcome::Blank;
    }

    match language {
        Language::English => {
            if has_latin(label) {
                RowOutcome::Emit(label.to_string())
            } else {
                RowOutcome::Filtered
            }
        }
        Language::Korean => {
            let paired = next_label
                .map(str::trim)
                .filter(|next| has_hangul(next));
            match paired {
                Some(next) if has_latin(label) => RowOutcome::EmitPaired(next.to_string()),
                _ if has_hangul(label) => RowOutcome::Emit(label.to_string()),
                _ => RowOutcome::Filtered,
            }
        }
    }
}

/// サイズ列が決まったシートを走査する
pub fn walk_rows(
    sheet: &SpecSheet,
    size_col: u32,
    language: Language,
    layout: &SpecLayout,
) -> (Vec<MeasurementEntry>, ScanStats) {
    let mut entries = Vec::new();
    let mut stats = ScanStats::default();

    let Some(last_row) = sheet.last_row() else {
        return (entries, stats);
    };
    let label_col = layout.label_column.index();
    let label_at = |row: u32| sheet.text(CellRef::new(row, label_col));

    let mut state = PairState::AwaitingLabel;
    let mut row = layout.first_data_row.saturating_sub(1);

    while row <= last_row {
        stats.rows_scanned += 1;

        if state == PairState::ConsumedPair {
            state = PairState::AwaitingLabel;
            row += 1;
            continue;
        }

        let label = label_at(row);
        let value = sheet.value(CellRef::new(row, size_col));
        let next_label = (row < last_row).then(|| label_at(row + 1));

        match classify_row(&label, value.is_some(), next_label.as_deref(), language) {
            RowOutcome::Blank => stats.blank_rows += 1,
            RowOutcome::Filtered => stats.language_filtered += 1,
            RowOutcome::Emit(text) => {
                if let Some(value) = value {
                    entries.push(MeasurementEntry { label: text, value });
                }
            }
            RowOutcome::EmitPaired(text) => {
                if let Some(value) = value {
                    entries.push(MeasurementEntry { label: text, value });
                }
                stats.pairs_consumed += 1;
                state = PairState::ConsumedPair;
            }
        }
        row += 1;
    }

    (entries, stats)
}

/// 計測値を抽出する。1件も取れなければ診断情報付きで失敗
pub fn extract(
    sheet: &SpecSheet,
    size: &str,
    language: Language,
    layout: &SpecLayout,
    options: &ExtractOptions,
) -> Result<Extraction> {
    let size_col = find_size_column(sheet, size, layout, options.size_match)?;
    let (entries, stats) = walk_rows(sheet, size_col, language, layout);

    if entries.is_empty() {
        return Err(Error::NoMeasurementsExtracted {
            sheet: sheet.name().to_string(),
            size: size.trim().to_string(),
            stats,
        });
    }

    Ok(Extraction {
        entries,
        size_col,
        stats,
    })
}
