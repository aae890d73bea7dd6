//! エラー型定義
//!
//! どのエラーも利用者が対処できる種類のもので、メッセージを組み立てるのに
//! 必要な文脈（スタイル番号・サイズ・シート名・走査行数）を保持する。

use crate::types::{ScanStats, SheetCandidate};
use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("STYLE NO '{style}' に一致するシートがありません（{sheets_checked}シートを確認）")]
    StyleNotFound { style: String, sheets_checked: usize },

    #[error("シート '{expected}' が見つかりません")]
    SheetNotFound { expected: String },

    #[error("STYLE NO '{style}' に一致するシートが{}件あります: {}", .candidates.len(), candidate_names(.candidates))]
    AmbiguousStyle {
        style: String,
        candidates: Vec<SheetCandidate>,
    },

    #[error("シート '{sheet}' のヘッダー行にサイズ '{size}' がありません（候補: {}）", .available.join(", "))]
    SizeColumnNotFound {
        size: String,
        sheet: String,
        available: Vec<String>,
    },

    #[error(
        "シート '{sheet}' のサイズ '{size}' から計測値を抽出できませんでした（{}行走査, 空欄{}行, 言語除外{}行）",
        .stats.rows_scanned, .stats.blank_rows, .stats.language_filtered
    )]
    NoMeasurementsExtracted {
        sheet: String,
        size: String,
        stats: ScanStats,
    },

    #[error("QCシート様式がありません")]
    TemplateMissing,

    #[error("ファイルを読み込めません（{document}）: {reason}")]
    MalformedDocument { document: String, reason: String },

    #[error("QCシート様式を作成できません: {0}")]
    ScaffoldFailed(String),

    #[error("画像を埋め込めません: {0}")]
    UnsupportedImage(String),

    #[error("入力が不正です: {0}")]
    InvalidQuery(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn malformed(document: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::MalformedDocument {
            document: document.into(),
            reason: reason.to_string(),
        }
    }
}

fn candidate_names(candidates: &[SheetCandidate]) -> String {
    candidates
        .iter()
        .map(|c| c.sheet.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SheetRef;

    #[test]
    fn test_error_display_style_not_found() {
        let error = Error::StyleNotFound {
            style: "AB12345".to_string(),
            sheets_checked: 3,
        };
        let display = format!("{}", error);
        assert!(display.contains("AB12345"));
        assert!(display.contains("3シート"));
    }

    #[test]
    fn test_error_display_ambiguous_lists_sheets() {
        let error = Error::AmbiguousStyle {
            style: "TO11".to_string(),
            candidates: vec![
                SheetCandidate {
                    sheet: SheetRef::new(0, "JXFTO11"),
                    marker: "STYLE NO: JXFTO11".to_string(),
                },
                SheetCandidate {
                    sheet: SheetRef::new(2, "KXFTO11"),
                    marker: "STYLE NO: KXFTO11".to_string(),
                },
            ],
        };
        let display = format!("{}", error);
        assert!(display.contains("2件"));
        assert!(display.contains("JXFTO11, KXFTO11"));
    }

    #[test]
    fn test_error_display_no_measurements_has_stats() {
        let error = Error::NoMeasurementsExtracted {
            sheet: "Sheet1".to_string(),
            size: "M".to_string(),
            stats: ScanStats {
                rows_scanned: 12,
                blank_rows: 4,
                language_filtered: 8,
                pairs_consumed: 0,
            },
        };
        let display = format!("{}", error);
        assert!(display.contains("12行走査"));
        assert!(display.contains("言語除外8行"));
    }

    #[test]
    fn test_error_from_io() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let error: Error = io_error.into();
        assert!(matches!(error, Error::Io(_)));
    }

    #[test]
    fn test_error_debug() {
        let error = Error::InvalidQuery("テスト".to_string());
        let debug = format!("{:?}", error);
        assert!(debug.contains("InvalidQuery"));
        assert!(debug.contains("テスト"));
    }
}
