use crate::catalog::Catalog;
use crate::llm::LlmOracle;
use crate::models::ProductRecord;
use crate::parse::parse_brand_response;
use crate::prompts::brand_prompt;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// The retailer's own label. Any brand mentioning it collapses to it.
pub const PRIVATE_LABEL: &str = "ALCAMPO";

/// Descriptors the retailer puts in front of the real product name.
const NAME_PREFIXES: [&str; 3] = ["PRODUCTO ECONÓMICO", "ECOLÓGICO", "BABY"];

/// Alias → canonical, checked in order.
const BRAND_CORRECTIONS: [(&str, &str); 8] = [
    ("NESTLE", "NESTLÉ"),
    ("NESLTÉ", "NESTLÉ"),
    ("ALCAMPO BABY", "ALCAMPO"),
    ("ALCAMPO BABY ECOLÓGICO", "ALCAMPO"),
    ("PRODUCTO ECONÓMICO ALCAMPO", "ALCAMPO"),
    ("YOGOLINO DE NESTLÉ", "NESTLÉ"),
    ("NATIVA DE NESTLÉ", "NESTLÉ"),
    ("AUCHAN", "ALCAMPO"),
];

static ARTICLES: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ["EL", "LA", "LOS", "LAS"].into_iter().collect());

/// Maps a raw brand onto its canonical spelling: exact or prefix match in the
/// correction table first, then the private-label substring rule.
pub fn normalize_brand(brand: &str) -> String {
    let brand = brand.trim().to_uppercase();

    for (alias, canonical) in BRAND_CORRECTIONS {
        if brand == alias
            || brand
                .strip_prefix(alias)
                .is_some_and(|rest| rest.starts_with(' '))
        {
            return canonical.to_string();
        }
    }

    if brand.contains(PRIVATE_LABEL) {
        return PRIVATE_LABEL.to_string();
    }

    brand
}

pub fn is_private_label(brand: &str) -> bool {
    normalize_brand(brand) == PRIVATE_LABEL
}

/// First token of the uppercased name once the retailer's descriptor
/// prefixes are removed. Empty when the name has no tokens left.
pub fn brand_candidate(name: &str) -> String {
    let mut name = name.trim().to_uppercase();
    for prefix in NAME_PREFIXES {
        if let Some(rest) = name.strip_prefix(prefix) {
            name = rest.trim().to_string();
        }
    }
    name.split_whitespace().next().unwrap_or_default().to_string()
}

fn needs_oracle(candidate: &str) -> bool {
    candidate.chars().count() < 2 || ARTICLES.contains(candidate)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrandSource {
    ProductName,
    Oracle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrandResolution {
    Resolved { brand: String, source: BrandSource },
    /// No brand could be derived; the record keeps whatever it came with.
    Fallback { brand: String, reason: String },
}

impl BrandResolution {
    pub fn brand(&self) -> &str {
        match self {
            BrandResolution::Resolved { brand, .. } | BrandResolution::Fallback { brand, .. } => {
                brand
            }
        }
    }

    pub fn into_brand(self) -> String {
        match self {
            BrandResolution::Resolved { brand, .. } | BrandResolution::Fallback { brand, .. } => {
                brand
            }
        }
    }
}

/// Resolves the canonical brand for `product`, registering it in the brand
/// store when it is new. Never fails: problems end in
/// [`BrandResolution::Fallback`].
pub fn resolve_brand(
    product: &ProductRecord,
    oracle: &dyn LlmOracle,
    catalog: &mut Catalog,
) -> BrandResolution {
    let mut candidate = brand_candidate(&product.name);
    let mut source = BrandSource::ProductName;

    if needs_oracle(&candidate) {
        match ask_oracle(product, oracle) {
            Ok(marca) => {
                candidate = marca;
                source = BrandSource::Oracle;
            }
            Err(reason) => warn!(
                target = "catalog.brand",
                product_id = %product.id,
                candidate = %candidate,
                reason = %reason,
                "brand_oracle_failed_keeping_candidate"
            ),
        }
    }

    let brand = normalize_brand(&candidate);
    if brand.is_empty() {
        let reason = format!("no brand derivable from name {:?}", product.name);
        warn!(
            target = "catalog.brand",
            product_id = %product.id,
            fallback = %product.brand,
            "brand_resolution_fallback"
        );
        return BrandResolution::Fallback {
            brand: product.brand.clone(),
            reason,
        };
    }

    match catalog.add_brand(&brand) {
        Ok(true) => info!(target = "catalog.brand", brand = %brand, "brand_added"),
        Ok(false) => {}
        Err(err) => warn!(
            target = "catalog.brand",
            brand = %brand,
            error = %err,
            "brand_store_flush_failed"
        ),
    }

    debug!(target = "catalog.brand", product_id = %product.id, brand = %brand, ?source, "brand_resolved");
    BrandResolution::Resolved { brand, source }
}

fn ask_oracle(product: &ProductRecord, oracle: &dyn LlmOracle) -> Result<String, String> {
    let prompt = brand_prompt(product).map_err(|err| err.to_string())?;
    let raw = oracle.invoke(&prompt).map_err(|err| err.to_string())?;
    parse_brand_response(&raw)
        .map(|response| response.marca)
        .map_err(|err| err.to_string())
}
