use thiserror::Error;

#[derive(Error, Debug)]
pub enum QcSheetError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("{0} が登録されていません。`qc-sheet upload {0} <FILE>` で登録してください")]
    StoreEmpty(String),

    #[error("不明な種別です: {0}（spec / template / image のいずれか）")]
    InvalidCategory(String),

    #[error("対応していないファイル形式です: {0}")]
    UnsupportedFile(String),

    #[error("選択がキャンセルされました: {0}")]
    Prompt(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] qc_sheet_common::Error),
}

pub type Result<T> = std::result::Result<T, QcSheetError>;
