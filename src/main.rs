use clap::Parser;
use qc_sheet::{cli, commands, config, error, store};
use cli::{Cli, Commands};
use commands::GenerateInputs;
use config::Config;
use error::Result;
use store::DirStore;

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let root = config.resolve_store_root(cli.store.clone())?;
    let mut store = DirStore::new(&root);
    if cli.verbose {
        println!("  保管庫: {}", root.display());
    }

    match cli.command {
        Commands::Upload { category, files } => {
            let stored = commands::upload(&mut store, category, &files)?;
            println!("\n✅ {}件を登録しました", stored.len());
        }

        Commands::List { category } => {
            commands::list(&store, category)?;
        }

        Commands::Delete { category, name } => {
            commands::delete(&mut store, category, &name)?;
        }

        Commands::Catalog { spec } => {
            let catalog = commands::catalog(&store, spec.as_deref(), &config)?;
            commands::print_catalog(&catalog);
        }

        Commands::Extract { target, json } => {
            let report = commands::extract(&store, &target, &config, cli.verbose)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                commands::print_extract(&report, cli.verbose);
            }
        }

        Commands::Generate { target, template, image, output } => {
            println!("📋 qc-sheet - QCシート生成\n");
            let inputs = GenerateInputs {
                template: template.as_deref(),
                image: image.as_deref(),
                output: output.as_deref(),
            };
            commands::generate(&store, &target, &inputs, &config, cli.verbose)?;
            println!("\n✅ 完了");
        }

        Commands::TemplateInit { output, install } => {
            commands::template_init(&mut store, &output, install, &config)?;
        }

        Commands::Config { show, set_store_root, set_language } => {
            let mut config = config;

            if let Some(path) = set_store_root {
                config.set_store_root(path)?;
                println!("✔ 保管庫を設定しました");
            }

            if let Some(language) = set_language {
                config.set_language(language)?;
                println!("✔ 既定の言語を設定しました");
            }

            if show {
                println!("設定: {}", Config::config_path()?.display());
                println!("  保管庫: {}", config.resolve_store_root(None)?.display());
                println!("  言語: {}", config.language);
                println!("  照合方式: {:?}", config.match_mode);
                println!("  末尾文字数: {}", config.suffix_len);
                println!("  ラベル列: {:?}", config.label_column);
                println!(
                    "  様式: 書き込み開始 {}行目 / STYLE {} / SIZE {}",
                    config.template_layout.anchor_row,
                    config.template_layout.style_cell.to_a1(),
                    config.template_layout.size_cell.to_a1()
                );
            }
        }
    }

    Ok(())
}
