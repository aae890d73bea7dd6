//! QC Sheet Common Library
//!
//! サイズスペック表（xlsx）からQCシートを作るための中核処理。
//! ファイルの保存場所は扱わず、バイト列だけを受け渡しする。

pub mod cell;
pub mod catalog;
pub mod composer;
pub mod error;
pub mod extractor;
pub mod layout;
pub mod pipeline;
pub mod resolver;
pub mod types;
pub mod workbook;

#[cfg(feature = "excel")]
pub mod scaffold;

#[cfg(test)]
mod fixtures;

pub use catalog::{discover_styles, StyleMarker};
pub use cell::CellRef;
pub use composer::{compose, LogoFormat, LogoImage};
pub use error::{Error, Result};
pub use extractor::{extract, ExtractOptions, Extraction, PairState, SizeMatch};
pub use layout::{LabelColumn, SpecLayout, TemplateLayout};
pub use pipeline::{
    compose_output, extract_measurements, generate, generate_with_sheet, resolve_style,
    GenerateOptions, GeneratedSheet,
};
pub use resolver::{
    candidates, resolve, Fallback, MatchMode, ResolveOptions, ResolveWarning, Resolved,
    DEFAULT_SUFFIX_LEN,
};
pub use types::{
    Language, MeasurementEntry, MeasurementValue, ScanStats, SheetCandidate, SheetRef, StyleQuery,
};
pub use workbook::{SpecSheet, SpecWorkbook};

#[cfg(feature = "excel")]
pub use scaffold::scaffold_template;
