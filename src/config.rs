use crate::error::{QcSheetError, Result};
use qc_sheet_common::{
    GenerateOptions, LabelColumn, Language, MatchMode, SpecLayout, TemplateLayout,
    DEFAULT_SUFFIX_LEN,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 保存先を上書きする環境変数
pub const STORE_ENV: &str = "QC_SHEET_STORE";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// スペック表・様式・画像の保存先
    pub store_root: Option<PathBuf>,
    pub language: Language,
    pub match_mode: MatchMode,
    /// シート名照合の末尾文字数
    pub suffix_len: usize,
    pub label_column: LabelColumn,
    pub spec_layout: SpecLayout,
    pub template_layout: TemplateLayout,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default_config())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| QcSheetError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("qc-sheet").join("config.json"))
    }

    fn default_config() -> Self {
        Self {
            store_root: None,
            language: Language::English,
            match_mode: MatchMode::ExactToken,
            suffix_len: DEFAULT_SUFFIX_LEN,
            label_column: LabelColumn::B,
            spec_layout: SpecLayout::default(),
            template_layout: TemplateLayout::default(),
        }
    }

    /// 保存先（--store > 環境変数 > 設定ファイル > ~/.local/share/qc-sheet）
    pub fn resolve_store_root(&self, cli_store: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(path) = cli_store {
            return Ok(path);
        }
        // 環境変数を優先
        if let Ok(path) = std::env::var(STORE_ENV) {
            if !path.trim().is_empty() {
                return Ok(PathBuf::from(path));
            }
        }
        if let Some(path) = &self.store_root {
            return Ok(path.clone());
        }

        let data = dirs::data_dir()
            .ok_or_else(|| QcSheetError::Config("データディレクトリが見つかりません".into()))?;
        Ok(data.join("qc-sheet"))
    }

    /// 設定値から生成オプションを組み立てる（suffix モードは suffix_len を反映）
    pub fn generate_options(&self) -> GenerateOptions {
        let mode = match self.match_mode {
            MatchMode::SheetSuffix(_) => MatchMode::SheetSuffix(self.suffix_len),
            other => other,
        };

        let mut options = GenerateOptions {
            spec_layout: self.spec_layout.clone(),
            template_layout: self.template_layout.clone(),
            ..Default::default()
        };
        options.resolve.mode = mode;
        options.spec_layout.label_column = self.label_column;
        options
    }

    pub fn set_store_root(&mut self, path: PathBuf) -> Result<()> {
        self.store_root = Some(path);
        self.save()
    }

    pub fn set_language(&mut self, language: Language) -> Result<()> {
        self.language = language;
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"language":"korean"}"#).unwrap();
        assert_eq!(config.language, Language::Korean);
        assert_eq!(config.suffix_len, DEFAULT_SUFFIX_LEN);
        assert_eq!(config.label_column, LabelColumn::B);
        assert_eq!(config.template_layout.anchor_row, 9);
    }

    #[test]
    fn test_generate_options_applies_suffix_len() {
        let config = Config {
            match_mode: MatchMode::SheetSuffix(4),
            suffix_len: 6,
            label_column: LabelColumn::A,
            ..Default::default()
        };
        let options = config.generate_options();
        assert_eq!(options.resolve.mode, MatchMode::SheetSuffix(6));
        assert_eq!(options.spec_layout.label_column, LabelColumn::A);
    }

    #[test]
    fn test_cli_store_wins() {
        let config = Config {
            store_root: Some(PathBuf::from("/from/config")),
            ..Default::default()
        };
        let root = config
            .resolve_store_root(Some(PathBuf::from("/from/cli")))
            .unwrap();
        assert_eq!(root, PathBuf::from("/from/cli"));
    }

    #[test]
    fn test_config_round_trip_json() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.match_mode, config.match_mode);
        assert_eq!(back.template_layout, config.template_layout);
    }
}
