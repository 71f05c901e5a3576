use crate::llm::LlmConfig;
use clap::Parser;
use std::path::PathBuf;

/// Classify a scraped product file into the catalog.
#[derive(Debug, Parser)]
#[command(name = "catalog-classifier", version)]
pub struct Cli {
    /// JSON file with a `products` object mapping ids to scraped products.
    pub input: PathBuf,

    /// Directory holding arvore_categorias.json, products.json and marcas.json.
    #[arg(long, env = "CATALOG_DIR", default_value = "app/database")]
    pub catalog_dir: PathBuf,

    /// Also write plain-text logs to this file.
    #[arg(long, env = "LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Do not contact the model server before processing.
    #[arg(long, env = "SKIP_LLM_CHECK")]
    pub skip_llm_check: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub input: PathBuf,
    pub catalog_dir: PathBuf,
    pub log_file: Option<PathBuf>,
    pub check_llm: bool,
    pub llm: LlmConfig,
}

impl Cli {
    pub fn into_config(self) -> AppConfig {
        AppConfig {
            input: self.input,
            catalog_dir: self.catalog_dir,
            log_file: self.log_file,
            check_llm: !self.skip_llm_check,
            llm: LlmConfig::from_env(),
        }
    }
}
