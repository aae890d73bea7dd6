//! エラーケーステスト
//!
//! エラーメッセージに対処に必要な情報が含まれることを確認

use qc_sheet::error::QcSheetError;
use qc_sheet_common::{Error, ScanStats, SheetCandidate, SheetRef};

/// QcSheetErrorのDisplay実装確認
#[test]
fn test_error_display() {
    let errors = vec![
        QcSheetError::Config("テスト設定エラー".to_string()),
        QcSheetError::FileNotFound("spec/a.xlsx".to_string()),
        QcSheetError::StoreEmpty("spec".to_string()),
        QcSheetError::InvalidCategory("pdf".to_string()),
        QcSheetError::UnsupportedFile("logo.gif".to_string()),
        QcSheetError::Prompt("interrupted".to_string()),
    ];

    for err in errors {
        let display = format!("{}", err);
        assert!(!display.is_empty(), "エラーメッセージが空: {:?}", err);
    }
}

#[test]
fn test_store_empty_suggests_upload() {
    let err = QcSheetError::StoreEmpty("template".to_string());
    assert!(err.to_string().contains("qc-sheet upload template"));
}

/// 共通エラーはそのまま表示される
#[test]
fn test_core_error_is_transparent() {
    let core = Error::StyleNotFound {
        style: "JXFTO99".to_string(),
        sheets_checked: 3,
    };
    let expected = core.to_string();
    let err: QcSheetError = core.into();
    assert_eq!(err.to_string(), expected);
    assert!(expected.contains("JXFTO99"));
    assert!(expected.contains('3'));
}

#[test]
fn test_ambiguous_style_lists_candidates() {
    let err = Error::AmbiguousStyle {
        style: "TO11".to_string(),
        candidates: vec![
            SheetCandidate {
                sheet: SheetRef::new(0, "A"),
                marker: "STYLE NO: JXFTO11".to_string(),
            },
            SheetCandidate {
                sheet: SheetRef::new(2, "C"),
                marker: "STYLE NO: KXFTO11".to_string(),
            },
        ],
    };
    let message = err.to_string();
    assert!(message.contains("2件"));
    assert!(message.contains('A'));
    assert!(message.contains('C'));
}

#[test]
fn test_no_measurements_shows_stats() {
    let err = Error::NoMeasurementsExtracted {
        sheet: "TO11".to_string(),
        size: "M".to_string(),
        stats: ScanStats {
            rows_scanned: 12,
            blank_rows: 4,
            language_filtered: 8,
            pairs_consumed: 0,
        },
    };
    let message = err.to_string();
    assert!(message.contains("12行走査"));
    assert!(message.contains("言語除外8行"));
}

#[test]
fn test_size_column_lists_available() {
    let err = Error::SizeColumnNotFound {
        size: "XXL".to_string(),
        sheet: "TO11".to_string(),
        available: vec!["S".to_string(), "M".to_string()],
    };
    assert!(err.to_string().contains("S, M"));
}
