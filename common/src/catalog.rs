//! スタイル一覧
//!
//! スペック表の全シートのマーカーセルから STYLE NO を拾い出す。

use crate::layout::SpecLayout;
use crate::resolver::{marker_text, style_token};
use crate::types::SheetRef;
use crate::workbook::SpecWorkbook;
use serde::Serialize;

/// マーカーに STYLE NO があったシート
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyleMarker {
    pub style: String,
    pub sheet: SheetRef,
}

/// ブック内の STYLE NO をシート順に列挙する（マーカーのないシートは飛ばす）
pub fn discover_styles(workbook: &SpecWorkbook, layout: &SpecLayout) -> Vec<StyleMarker> {
    workbook
        .sheets()
        .iter()
        .filter_map(|sheet| {
            let marker = marker_text(sheet, layout);
            style_token(&marker).map(|token| StyleMarker {
                style: token.to_uppercase(),
                sheet: sheet.sheet_ref().clone(),
            })
        })
        .collect()
}
