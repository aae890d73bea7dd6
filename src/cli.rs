use crate::store::Category;
use clap::{Parser, Subcommand};
use qc_sheet_common::{LabelColumn, Language, MatchMode};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "qc-sheet")]
#[command(about = "サイズスペック表からQCシート（検品表）を生成するツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 保管庫フォルダ（環境変数 QC_SHEET_STORE / 設定ファイルより優先）
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// スペック表・様式・ロゴ画像を保管庫に登録
    Upload {
        /// 種別 (spec/template/image)
        #[arg(required = true)]
        category: Category,

        /// 登録するファイル
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// 登録済みファイルの一覧
    List {
        /// 種別（省略時はすべて）
        category: Option<Category>,
    },

    /// 登録済みファイルを削除
    Delete {
        /// 種別 (spec/template/image)
        #[arg(required = true)]
        category: Category,

        /// ファイル名
        #[arg(required = true)]
        name: String,
    },

    /// スペック表に含まれる STYLE NO の一覧
    Catalog {
        /// スペック表（保管庫の名前またはパス）
        #[arg(long)]
        spec: Option<String>,
    },

    /// 計測値を抽出して表示（QCシートは作らない）
    Extract {
        #[command(flatten)]
        target: TargetArgs,

        /// JSONで出力
        #[arg(long)]
        json: bool,
    },

    /// QCシートを生成
    Generate {
        #[command(flatten)]
        target: TargetArgs,

        /// QCシート様式（保管庫の名前またはパス。省略時は登録済みの様式）
        #[arg(long)]
        template: Option<String>,

        /// ロゴ画像（保管庫の名前またはパス）
        #[arg(long)]
        image: Option<String>,

        /// 出力ファイル/ディレクトリ（デフォルト: ./QC_{STYLE}_{SIZE}.xlsx）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 空のQCシート様式を作成
    TemplateInit {
        /// 出力ファイル
        #[arg(short, long, default_value = "qc_template.xlsx")]
        output: PathBuf,

        /// 作成した様式を保管庫に登録
        #[arg(long)]
        install: bool,
    },

    /// 設定の表示・変更
    Config {
        /// 現在の設定を表示
        #[arg(long)]
        show: bool,

        /// 保管庫フォルダを設定
        #[arg(long)]
        set_store_root: Option<PathBuf>,

        /// 既定のラベル言語を設定 (en/ko)
        #[arg(long)]
        set_language: Option<Language>,
    },
}

/// 抽出対象の指定（extract / generate 共通）
#[derive(clap::Args, Debug, Clone)]
pub struct TargetArgs {
    /// STYLE NO（例: JXFTO11）
    #[arg(short = 's', long, required = true)]
    pub style: String,

    /// サイズ（例: M, 95）
    #[arg(short = 'z', long, required = true)]
    pub size: String,

    /// スペック表（保管庫の名前またはパス。省略時は選択）
    #[arg(long)]
    pub spec: Option<String>,

    /// ラベル言語 (en/ko)。省略時は設定ファイルの値
    #[arg(short, long)]
    pub lang: Option<Language>,

    /// 照合方式 (exact/substring/suffix)
    #[arg(short, long)]
    pub mode: Option<MatchMode>,

    /// suffix 方式で使う末尾の文字数
    #[arg(long)]
    pub suffix_len: Option<usize>,

    /// 一致するシートがなければ先頭シートを使う（警告を表示）
    #[arg(long)]
    pub fallback_first_sheet: bool,

    /// サイズ見出しの大文字小文字を区別しない
    #[arg(long)]
    pub ignore_size_case: bool,

    /// 計測部位ラベルの列 (A/B)
    #[arg(long)]
    pub label_column: Option<LabelColumn>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_generate() {
        let cli = Cli::try_parse_from([
            "qc-sheet",
            "generate",
            "--style",
            "JXFTO11",
            "--size",
            "M",
            "--lang",
            "ko",
            "--mode",
            "suffix",
            "--suffix-len",
            "6",
            "--image",
            "logo.png",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Generate { target, image, .. } => {
                assert_eq!(target.style, "JXFTO11");
                assert_eq!(target.lang, Some(Language::Korean));
                assert_eq!(target.mode, Some(MatchMode::SheetSuffix(4)));
                assert_eq!(target.suffix_len, Some(6));
                assert_eq!(image.as_deref(), Some("logo.png"));
            }
            _ => panic!("generate expected"),
        }
    }

    #[test]
    fn test_parse_upload_category() {
        let cli = Cli::try_parse_from(["qc-sheet", "upload", "image", "a.png", "b.png"]).unwrap();
        match cli.command {
            Commands::Upload { category, files } => {
                assert_eq!(category, Category::Image);
                assert_eq!(files.len(), 2);
            }
            _ => panic!("upload expected"),
        }

        assert!(Cli::try_parse_from(["qc-sheet", "upload", "pdf", "a.pdf"]).is_err());
    }
}
