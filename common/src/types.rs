//! QCシート生成で共有される型
//!
//! - SheetRef / SheetCandidate: スタイル解決の結果
//! - MeasurementEntry: 抽出された（部位名, 寸法）
//! - Language: ラベル言語の選択

use serde::{Deserialize, Serialize};
use std::fmt;

/// ラベル言語
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// 英語ラベル（ラテン文字を含む行）
    #[default]
    English,
    /// 韓国語ラベル（英語行の直後の行、または単独のハングル行）
    Korean,
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" | "eng" | "english" | "영어" | "英語" => Ok(Language::English),
            "ko" | "kr" | "kor" | "korean" | "한국어" | "韓国語" => Ok(Language::Korean),
            _ => Err(format!("Unknown language: {}. Use en or ko", s)),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::English => write!(f, "en"),
            Language::Korean => write!(f, "ko"),
        }
    }
}

/// スペック表内のシート参照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetRef {
    /// ブック内の0始まりの位置
    pub index: usize,
    pub name: String,
}

impl SheetRef {
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }
}

/// 曖昧一致したときの候補（シート名＋マーカー文字列）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetCandidate {
    pub sheet: SheetRef,
    pub marker: String,
}

/// 寸法値（セルの型をそのまま保持）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MeasurementValue {
    Number(f64),
    Text(String),
}

impl MeasurementValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            MeasurementValue::Number(n) => Some(*n),
            MeasurementValue::Text(_) => None,
        }
    }
}

impl fmt::Display for MeasurementValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasurementValue::Number(n) => write!(f, "{}", n),
            MeasurementValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for MeasurementValue {
    fn from(n: f64) -> Self {
        MeasurementValue::Number(n)
    }
}

impl From<&str> for MeasurementValue {
    fn from(s: &str) -> Self {
        MeasurementValue::Text(s.to_string())
    }
}

/// 計測部位と寸法のペア
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementEntry {
    pub label: String,
    pub value: MeasurementValue,
}

impl MeasurementEntry {
    pub fn new(label: impl Into<String>, value: impl Into<MeasurementValue>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// 行走査の統計（抽出失敗時の切り分け用）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    /// 走査したデータ行数（ペアとして消費した行を含む）
    pub rows_scanned: usize,
    /// ラベルまたは値が空でスキップした行数
    pub blank_rows: usize,
    /// 言語フィルタで除外した行数
    pub language_filtered: usize,
    /// 英語行＋韓国語行のペアとして消費した組数
    pub pairs_consumed: usize,
}

/// 生成リクエスト（STYLE NO・サイズ・言語）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleQuery {
    pub style: String,
    pub size: String,
    pub language: Language,
}

impl StyleQuery {
    pub fn new(style: impl Into<String>, size: impl Into<String>, language: Language) -> Self {
        Self {
            style: style.into(),
            size: size.into(),
            language,
        }
    }

    /// 出力ファイル名 `QC_{style}_{size}.xlsx`
    pub fn output_file_name(&self) -> String {
        format!("QC_{}_{}.xlsx", self.style.trim(), self.size.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_str() {
        assert_eq!("en".parse::<Language>().unwrap(), Language::English);
        assert_eq!("KO".parse::<Language>().unwrap(), Language::Korean);
        assert_eq!("한국어".parse::<Language>().unwrap(), Language::Korean);
        assert!("fr".parse::<Language>().is_err());
    }

    #[test]
    fn test_measurement_value_display() {
        assert_eq!(MeasurementValue::Number(102.0).to_string(), "102");
        assert_eq!(MeasurementValue::Number(50.5).to_string(), "50.5");
        assert_eq!(MeasurementValue::from("1/2").to_string(), "1/2");
    }

    #[test]
    fn test_measurement_value_json_untagged() {
        let entries = vec![
            MeasurementEntry::new("Chest", 102.0),
            MeasurementEntry::new("Sleeve", "+/- 1"),
        ];
        let json = serde_json::to_string(&entries).unwrap();
        assert_eq!(
            json,
            r#"[{"label":"Chest","value":102.0},{"label":"Sleeve","value":"+/- 1"}]"#
        );
    }

    #[test]
    fn test_output_file_name() {
        let query = StyleQuery::new("JXFTO11", "M", Language::English);
        assert_eq!(query.output_file_name(), "QC_JXFTO11_M.xlsx");
    }
}
