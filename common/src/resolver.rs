//! スタイル解決モジュール
//!
//! スペック表の各シートのマーカーセル（A1）から STYLE NO を読み取り、
//! 指定されたスタイル番号の計測表があるシートを特定する。
//!
//! 一致しなければ失敗する。先頭シートへの代替は `Fallback::FirstSheet` を
//! 明示したときだけで、その場合も警告付きの結果を返す。

use crate::error::{Error, Result};
use crate::layout::SpecLayout;
use crate::types::{SheetCandidate, SheetRef};
use crate::workbook::{SpecSheet, SpecWorkbook};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// 照合方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchMode {
    /// マーカーから取り出したトークンと完全一致（大文字小文字は区別しない）
    #[default]
    ExactToken,
    /// マーカー文字列のどこかに含まれていれば一致
    Substring,
    /// スタイル番号の末尾n文字と同名のシート
    SheetSuffix(usize),
}

/// シート名照合で使う末尾の文字数
pub const DEFAULT_SUFFIX_LEN: usize = 4;

impl std::str::FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exact" | "token" => Ok(MatchMode::ExactToken),
            "substring" | "contains" => Ok(MatchMode::Substring),
            "suffix" | "sheet" => Ok(MatchMode::SheetSuffix(DEFAULT_SUFFIX_LEN)),
            _ => Err(format!("Unknown match mode: {}. Use exact, substring or suffix", s)),
        }
    }
}

/// 一致しなかったときの扱い
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fallback {
    /// StyleNotFound で失敗する
    #[default]
    Fail,
    /// 先頭シートを警告付きで返す
    FirstSheet,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    pub mode: MatchMode,
    pub fallback: Fallback,
}

/// 成功扱いだが利用者に伝えるべきこと
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveWarning {
    /// 一致するシートがなく先頭シートを使った
    FellBackToFirstSheet { style: String, sheet: String },
}

impl std::fmt::Display for ResolveWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveWarning::FellBackToFirstSheet { style, sheet } => write!(
                f,
                "STYLE NO '{}' に一致するシートがないため先頭シート '{}' を使用しました",
                style, sheet
            ),
        }
    }
}

/// 解決結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub sheet: SheetRef,
    pub warning: Option<ResolveWarning>,
}

lazy_static::lazy_static! {
    static ref STYLE_NO_RE: Regex =
        Regex::new(r"(?i)STYLE\s*NO\.?\s*[:：]?\s*([A-Z0-9][A-Z0-9\-]*)").unwrap();
}

/// マーカー文字列から STYLE NO のトークンを取り出す
pub fn style_token(marker: &str) -> Option<&str> {
    STYLE_NO_RE
        .captures(marker)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str())
}

/// シートのマーカー文字列
pub fn marker_text(sheet: &SpecSheet, layout: &SpecLayout) -> String {
    sheet.text(layout.marker_cell).trim().to_string()
}

/// シート名照合で探すシート名（末尾n文字）
pub fn suffix_sheet_name(style: &str, len: usize) -> String {
    let chars: Vec<char> = style.trim().chars().collect();
    let start = chars.len().saturating_sub(len);
    chars[start..].iter().collect()
}

fn marker_matches(marker: &str, style: &str, mode: MatchMode) -> bool {
    match mode {
        MatchMode::ExactToken => {
            style_token(marker).is_some_and(|token| token.eq_ignore_ascii_case(style))
        }
        MatchMode::Substring => marker.to_lowercase().contains(&style.to_lowercase()),
        MatchMode::SheetSuffix(_) => false,
    }
}

/// 一致する全シートを列挙する（曖昧なときの選択肢）
pub fn candidates(
    workbook: &SpecWorkbook,
    style: &str,
    mode: MatchMode,
    layout: &SpecLayout,
) -> Vec<SheetCandidate> {
    let style = style.trim();
    if style.is_empty() {
        return Vec::new();
    }

    if let MatchMode::SheetSuffix(len) = mode {
        let expected = suffix_sheet_name(style, len);
        return workbook
            .sheet_by_name(&expected)
            .map(|sheet| SheetCandidate {
                sheet: sheet.sheet_ref().clone(),
                marker: marker_text(sheet, layout),
            })
            .into_iter()
            .collect();
    }

    workbook
        .sheets()
        .iter()
        .filter_map(|sheet| {
            let marker = marker_text(sheet, layout);
            marker_matches(&marker, style, mode).then(|| SheetCandidate {
                sheet: sheet.sheet_ref().clone(),
                marker,
            })
        })
        .collect()
}

/// スタイル番号に対応するシートを1つに決める
pub fn resolve(
    workbook: &SpecWorkbook,
    style: &str,
    options: &ResolveOptions,
    layout: &SpecLayout,
) -> Result<Resolved> {
    let style = style.trim();
    if style.is_empty() {
        return Err(Error::InvalidQuery("STYLE NO が空です".into()));
    }

    let mut found = candidates(workbook, style, options.mode, layout);

    match found.len() {
        1 => {
            let candidate = found.remove(0);
            Ok(Resolved {
                sheet: candidate.sheet,
                warning: None,
            })
        }
        0 => not_found(workbook, style, options),
        _ => Err(Error::AmbiguousStyle {
            style: style.to_string(),
            candidates: found,
        }),
    }
}

fn not_found(workbook: &SpecWorkbook, style: &str, options: &ResolveOptions) -> Result<Resolved> {
    if options.fallback == Fallback::FirstSheet {
        if let Some(first) = workbook.sheets().first() {
            return Ok(Resolved {
                sheet: first.sheet_ref().clone(),
                warning: Some(ResolveWarning::FellBackToFirstSheet {
                    style: style.to_string(),
                    sheet: first.name().to_string(),
                }),
            });
        }
    }

    match options.mode {
        MatchMode::SheetSuffix(len) => Err(Error::SheetNotFound {
            expected: suffix_sheet_name(style, len),
        }),
        MatchMode::ExactToken | MatchMode::Substring => Err(Error::StyleNotFound {
            style: style.to_string(),
            sheets_checked: workbook.sheets().len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::SpecBook;

    fn workbook(sheets: &[(&'static str, &'static str)]) -> SpecWorkbook {
        let mut book = SpecBook::new();
        for (name, marker) in sheets {
            book = book.sheet(*name, *marker, &["", "PART", "M"], &[]);
        }
        SpecWorkbook::from_bytes(&book.build()).unwrap()
    }

    fn exact() -> ResolveOptions {
        ResolveOptions::default()
    }

    #[test]
    fn test_style_token_variants() {
        assert_eq!(style_token("STYLE NO: JXFTO11"), Some("JXFTO11"));
        assert_eq!(style_token("style no：jxfto11"), Some("jxfto11"));
        assert_eq!(style_token("STYLE NO.JXFTO11 / SS25"), Some("JXFTO11"));
        assert_eq!(style_token("STYLENO JXFTO11"), Some("JXFTO11"));
        assert_eq!(style_token("STYLE NO: JXFTO11X"), Some("JXFTO11X"));
        assert_eq!(style_token("SEASON: SS25"), None);
    }

    #[test]
    fn test_exact_token_finds_only_matching_sheet() {
        let wb = workbook(&[
            ("S1", "STYLE NO: JXFTO10"),
            ("S2", "STYLE NO: JXFTO11"),
            ("S3", "STYLE NO: JXFTO12"),
        ]);
        let resolved = resolve(&wb, "jxfto11", &exact(), &SpecLayout::default()).unwrap();
        assert_eq!(resolved.sheet, SheetRef::new(1, "S2"));
        assert_eq!(resolved.warning, None);
    }

    #[test]
    fn test_exact_token_independent_of_sheet_order() {
        let wb = workbook(&[
            ("S3", "STYLE NO: JXFTO12"),
            ("S2", "STYLE NO: JXFTO11"),
            ("S1", "STYLE NO: JXFTO10"),
        ]);
        let resolved = resolve(&wb, "JXFTO11", &exact(), &SpecLayout::default()).unwrap();
        assert_eq!(resolved.sheet.name, "S2");
    }

    #[test]
    fn test_exact_token_does_not_match_prefix() {
        let wb = workbook(&[("S1", "STYLE NO: JXFTO11X")]);
        let result = resolve(&wb, "JXFTO11", &exact(), &SpecLayout::default());
        assert!(matches!(result, Err(Error::StyleNotFound { .. })));
    }

    #[test]
    fn test_style_not_found_never_picks_a_sheet() {
        let wb = workbook(&[("S1", "STYLE NO: JXFTO11"), ("S2", "STYLE NO: JXFTO12")]);
        let err = resolve(&wb, "AB12345", &exact(), &SpecLayout::default()).unwrap_err();
        match err {
            Error::StyleNotFound {
                style,
                sheets_checked,
            } => {
                assert_eq!(style, "AB12345");
                assert_eq!(sheets_checked, 2);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_substring_ambiguous_lists_candidates() {
        let wb = workbook(&[
            ("S1", "STYLE NO: JXFTO11"),
            ("S2", "STYLE NO: KXFTO11 (JXFTO11 rev)"),
            ("S3", "STYLE NO: JXFTO12"),
        ]);
        let options = ResolveOptions {
            mode: MatchMode::Substring,
            ..Default::default()
        };
        let err = resolve(&wb, "jxfto11", &options, &SpecLayout::default()).unwrap_err();
        match err {
            Error::AmbiguousStyle { candidates, .. } => {
                let names: Vec<&str> = candidates.iter().map(|c| c.sheet.name.as_str()).collect();
                assert_eq!(names, vec!["S1", "S2"]);
                assert_eq!(candidates[1].marker, "STYLE NO: KXFTO11 (JXFTO11 rev)");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_substring_single_match() {
        let wb = workbook(&[("S1", "JXFTO11 MEN'S TEE"), ("S2", "STYLE NO: JXFTO12")]);
        let options = ResolveOptions {
            mode: MatchMode::Substring,
            ..Default::default()
        };
        let resolved = resolve(&wb, "JXFTO11", &options, &SpecLayout::default()).unwrap();
        assert_eq!(resolved.sheet.name, "S1");
    }

    #[test]
    fn test_sheet_suffix_lookup() {
        let wb = workbook(&[("TO10", ""), ("TO11", "")]);
        let options = ResolveOptions {
            mode: MatchMode::SheetSuffix(4),
            ..Default::default()
        };
        let resolved = resolve(&wb, "JXFTO11", &options, &SpecLayout::default()).unwrap();
        assert_eq!(resolved.sheet, SheetRef::new(1, "TO11"));

        let err = resolve(&wb, "JXFTO99", &options, &SpecLayout::default()).unwrap_err();
        assert!(matches!(err, Error::SheetNotFound { expected } if expected == "TO99"));
    }

    #[test]
    fn test_suffix_sheet_name_short_style() {
        assert_eq!(suffix_sheet_name("JXFTO11", 4), "TO11");
        assert_eq!(suffix_sheet_name("T11", 4), "T11");
        assert_eq!(suffix_sheet_name("가나다라마", 2), "라마");
    }

    #[test]
    fn test_fallback_first_sheet_warns() {
        let wb = workbook(&[("S1", "STYLE NO: JXFTO11"), ("S2", "STYLE NO: JXFTO12")]);
        let options = ResolveOptions {
            mode: MatchMode::ExactToken,
            fallback: Fallback::FirstSheet,
        };
        let resolved = resolve(&wb, "AB12345", &options, &SpecLayout::default()).unwrap();
        assert_eq!(resolved.sheet.name, "S1");
        assert!(matches!(
            resolved.warning,
            Some(ResolveWarning::FellBackToFirstSheet { .. })
        ));

        // 一致するときは警告なし
        let resolved = resolve(&wb, "JXFTO12", &options, &SpecLayout::default()).unwrap();
        assert_eq!(resolved.sheet.name, "S2");
        assert!(resolved.warning.is_none());
    }

    #[test]
    fn test_empty_style_is_invalid() {
        let wb = workbook(&[("S1", "STYLE NO: JXFTO11")]);
        let result = resolve(&wb, "  ", &exact(), &SpecLayout::default());
        assert!(matches!(result, Err(Error::InvalidQuery(_))));
    }

    #[test]
    fn test_match_mode_from_str() {
        assert_eq!("exact".parse::<MatchMode>().unwrap(), MatchMode::ExactToken);
        assert_eq!("SUBSTRING".parse::<MatchMode>().unwrap(), MatchMode::Substring);
        assert_eq!(
            "suffix".parse::<MatchMode>().unwrap(),
            MatchMode::SheetSuffix(DEFAULT_SUFFIX_LEN)
        );
        assert!("fuzzy".parse::<MatchMode>().is_err());
    }
}
