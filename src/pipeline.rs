use crate::brand::{BrandResolution, resolve_brand};
use crate::catalog::{Catalog, FileBackend};
use crate::config::AppConfig;
use crate::dedupe::{DuplicateRule, find_duplicate};
use crate::llm::{LlmError, LlmOracle, OllamaClient};
use crate::metrics::{Outcome, time_stage};
use crate::models::{ProcessSummary, ProcessedProduct, ProductRecord};
use crate::parse::{CategoryResponse, ParseError, parse_category_response};
use crate::prompts::category_prompt;
use eyre::WrapErr;
use serde_json::{Map, Value};
use std::{fs, path::Path};
use thiserror::Error;
use tracing::{debug, error, info, warn};

const PROGRESS_EVERY: usize = 100;

/// A file-level failure. Nothing in the file was processed.
#[derive(Debug, Error)]
#[error("stage `{stage}` failed: {message}")]
pub struct PipelineError {
    stage: &'static str,
    message: String,
}

impl PipelineError {
    pub fn invalid_input(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn detail(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Error)]
pub enum FlattenError {
    #[error("product is not a JSON object")]
    NotAnObject,
    #[error("price is not numeric: {0}")]
    InvalidPrice(String),
}

/// Why a single record was not committed. Never aborts the file.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("invalid record: {0}")]
    Flatten(#[from] FlattenError),
    #[error("failed to build prompt: {0}")]
    Prompt(#[from] serde_json::Error),
    #[error("llm request failed: {0}")]
    Oracle(#[from] LlmError),
    #[error("invalid category info: {0}")]
    Parse(#[from] ParseError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Added {
        product: ProcessedProduct,
        category_path: Vec<String>,
    },
    Duplicate {
        product: ProcessedProduct,
        rule: DuplicateRule,
        existing: usize,
    },
}

pub struct Pipeline {
    catalog: Catalog,
    oracle: Box<dyn LlmOracle>,
}

impl Pipeline {
    pub fn new(catalog: Catalog, oracle: Box<dyn LlmOracle>) -> Self {
        Self { catalog, oracle }
    }

    /// Opens the on-disk catalog and the model client. Any failure here is a
    /// file-level precondition: nothing has been written yet.
    pub fn from_config(config: &AppConfig) -> eyre::Result<Self> {
        let backend = FileBackend::open(&config.catalog_dir).wrap_err_with(|| {
            format!(
                "cannot open catalog directory {}",
                config.catalog_dir.display()
            )
        })?;
        let catalog = Catalog::load(backend).wrap_err("cannot load catalog")?;
        let client = OllamaClient::new(config.llm.clone()).wrap_err("cannot configure LLM")?;
        if config.check_llm {
            client.probe().wrap_err_with(|| {
                format!("LLM unavailable at {}", config.llm.base_url)
            })?;
        }
        info!(
            target = "catalog.pipeline",
            model = %config.llm.model,
            base_url = %config.llm.base_url,
            catalog_dir = %config.catalog_dir.display(),
            categories = catalog.categories().roots().len(),
            products = catalog.products().len(),
            brands = catalog.brands().len(),
            "pipeline_ready"
        );
        Ok(Self::new(catalog, Box::new(client)))
    }

    #[cfg(test)]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Processes one input file. Always returns a summary; file-level
    /// failures come back with `success == false`.
    pub fn process_file(&mut self, path: &Path) -> ProcessSummary {
        info!(target = "catalog.pipeline", path = %path.display(), "processing_file");
        match read_products(path) {
            Ok(products) => self.process(&products),
            Err(err) => {
                let message = format!("Error processing file: {}", err.detail());
                error!(
                    target = "catalog.pipeline",
                    stage = err.stage(),
                    error = %err,
                    "file_rejected"
                );
                ProcessSummary::failed(message)
            }
        }
    }

    /// Runs every record in input order. A failing record is counted and
    /// skipped; it never stops the loop.
    pub fn process(&mut self, products: &Map<String, Value>) -> ProcessSummary {
        let total = products.len();
        info!(target = "catalog.pipeline", total, "products_found");

        let mut summary = ProcessSummary {
            total,
            success: true,
            ..ProcessSummary::default()
        };

        for (position, (id, raw)) in products.iter().enumerate() {
            let name = raw.get("name").and_then(Value::as_str).unwrap_or("Unknown");
            info!(
                target = "catalog.pipeline",
                position = position + 1,
                total,
                id = %id,
                name,
                "record_started"
            );

            match self.process_record(id, raw) {
                Ok(RecordOutcome::Added {
                    product,
                    category_path,
                }) => {
                    summary.processed += 1;
                    crate::metrics::record_outcome(Outcome::Added);
                    info!(
                        target = "catalog.pipeline",
                        nombre = %product.nombre,
                        marca = %product.marca,
                        category = %category_path.join(" > "),
                        url = %product.url,
                        imagen = %product.imagen,
                        "record_added"
                    );
                }
                Ok(RecordOutcome::Duplicate {
                    product,
                    rule,
                    existing,
                }) => {
                    summary.skipped += 1;
                    crate::metrics::record_outcome(Outcome::Duplicate);
                    info!(
                        target = "catalog.pipeline",
                        nombre = %product.nombre,
                        ?rule,
                        existing,
                        "record_skipped_duplicate"
                    );
                }
                Err(err) => {
                    summary.errors += 1;
                    crate::metrics::record_outcome(Outcome::Error);
                    error!(target = "catalog.pipeline", id = %id, error = %err, "record_failed");
                }
            }

            if (position + 1) % PROGRESS_EVERY == 0 {
                info!(
                    target = "catalog.pipeline",
                    done = position + 1,
                    total,
                    processed = summary.processed,
                    skipped = summary.skipped,
                    errors = summary.errors,
                    "progress"
                );
            }
        }

        info!(
            target = "catalog.pipeline",
            processed = summary.processed,
            skipped = summary.skipped,
            errors = summary.errors,
            "processing_complete"
        );
        summary
    }

    /// Brand resolution must run before the categorization prompt is built:
    /// the prompt carries the resolved brand.
    pub fn process_record(&mut self, id: &str, raw: &Value) -> Result<RecordOutcome, RecordError> {
        let mut record = flatten_record(id, raw)?;

        let timer = time_stage("resolve_brand");
        let resolution = resolve_brand(&record, self.oracle.as_ref(), &mut self.catalog);
        timer.finish();
        if let BrandResolution::Fallback { reason, .. } = &resolution {
            debug!(target = "catalog.pipeline", id = %id, reason = %reason, "brand_kept_from_record");
        }
        debug!(target = "catalog.pipeline", id = %id, brand = resolution.brand(), "brand_attached");
        record.brand = resolution.into_brand();

        let prompt = category_prompt(&record)?;
        let timer = time_stage("categorize");
        let response = self.oracle.invoke(&prompt)?;
        timer.finish();

        let CategoryResponse {
            category_path,
            mut processed_product,
        } = parse_category_response(&response)?;
        backfill_scraped_fields(&mut processed_product, &record);

        if let Some(found) = find_duplicate(&processed_product, self.catalog.products()) {
            return Ok(RecordOutcome::Duplicate {
                product: processed_product,
                rule: found.rule,
                existing: found.index,
            });
        }

        if !category_path.is_empty()
            && let Err(err) = self.catalog.upsert_category(&category_path)
        {
            warn!(target = "catalog.store", error = %err, "category_store_flush_failed");
        }
        if let Err(err) = self.catalog.append_product(processed_product.clone()) {
            warn!(target = "catalog.store", error = %err, "product_store_flush_failed");
        }

        Ok(RecordOutcome::Added {
            product: processed_product,
            category_path,
        })
    }
}

fn read_products(path: &Path) -> Result<Map<String, Value>, PipelineError> {
    let contents = fs::read_to_string(path)
        .map_err(|err| PipelineError::invalid_input("read_input", err.to_string()))?;
    let document: Value = serde_json::from_str(&contents)
        .map_err(|err| PipelineError::invalid_input("decode_input", err.to_string()))?;
    let Value::Object(mut document) = document else {
        return Err(PipelineError::invalid_input(
            "decode_input",
            "input file must be a JSON object",
        ));
    };
    match document.remove("products") {
        Some(Value::Object(products)) => Ok(products),
        Some(_) => Err(PipelineError::invalid_input(
            "decode_input",
            "'products' must be an object keyed by product id",
        )),
        None => Err(PipelineError::invalid_input(
            "decode_input",
            "Input file must contain a 'products' dictionary",
        )),
    }
}

/// Lifts the nested scrape fields onto a flat record. Missing text fields
/// become empty strings and a missing price becomes zero.
pub fn flatten_record(id: &str, raw: &Value) -> Result<ProductRecord, FlattenError> {
    let object = raw.as_object().ok_or(FlattenError::NotAnObject)?;
    let original = raw.pointer("/metadata/original_data/original_data");
    let original_text = |key: &str| text(original.and_then(|data| data.get(key)));

    let price = match object.get("price") {
        Some(Value::Object(price)) => numeric(price.get("current"))?,
        other => numeric(other)?,
    };

    Ok(ProductRecord {
        id: id.to_string(),
        name: text(object.get("name")),
        brand: text(object.get("brand")),
        description: text(object.get("description")),
        price,
        unit: original_text("price_per_unit"),
        store: text(object.get("store")),
        url: original_text("url"),
        image: original_text("image_url"),
    })
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        _ => String::new(),
    }
}

fn numeric(value: Option<&Value>) -> Result<f64, FlattenError> {
    match value {
        None | Some(Value::Null) => Ok(0.0),
        Some(Value::Number(number)) => number
            .as_f64()
            .ok_or_else(|| FlattenError::InvalidPrice(number.to_string())),
        Some(Value::String(text)) => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|price| price.is_finite())
            .ok_or_else(|| FlattenError::InvalidPrice(text.clone())),
        Some(other) => Err(FlattenError::InvalidPrice(other.to_string())),
    }
}

/// The scraper is authoritative for unit, url and image; the model often
/// leaves them out.
fn backfill_scraped_fields(product: &mut ProcessedProduct, record: &ProductRecord) {
    for (field, scraped) in [
        (&mut product.unidad, &record.unit),
        (&mut product.url, &record.url),
        (&mut product.imagen, &record.image),
    ] {
        if field.trim().is_empty() {
            field.clone_from(scraped);
        }
    }
}
