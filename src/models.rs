use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// A scraped product after its nested pricing and metadata fields have been
/// flattened. The brand is rewritten once the resolver has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: String,
    pub name: String,
    pub brand: String,
    pub description: String,
    pub price: f64,
    pub unit: String,
    pub store: String,
    pub url: String,
    pub image: String,
}

/// Validated catalog entry produced by the categorization model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedProduct {
    pub nombre: String,
    pub marca: String,
    pub precio: f64,
    pub descripcion: String,
    #[serde(default)]
    pub unidad: String,
    pub tienda: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub imagen: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryNode {
    pub id: String,
    pub nombre: String,
    pub descripcion: String,
    #[serde(default)]
    pub subcategorias: Vec<CategoryNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandEntry {
    pub nombre: String,
    pub descripcion: String,
}

impl BrandEntry {
    pub fn new(nombre: &str) -> Self {
        Self {
            nombre: nombre.to_string(),
            descripcion: format!("Marca: {nombre}"),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CategoryFile {
    #[serde(default)]
    pub categorias: Vec<CategoryNode>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ProductFile {
    #[serde(default)]
    pub products: Vec<ProcessedProduct>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BrandFile {
    #[serde(default)]
    pub marcas: Vec<BrandEntry>,
}

/// Outcome of one `process_file` call. Always produced, even when the file
/// itself could not be read.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessSummary {
    pub total: usize,
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl ProcessSummary {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            errors: 1,
            success: false,
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failed_summary_shape() {
        let summary = ProcessSummary::failed("boom");
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(
            value,
            json!({
                "total": 0,
                "processed": 0,
                "skipped": 0,
                "errors": 1,
                "success": false,
                "error": "boom",
            })
        );
    }

    #[test]
    fn successful_summary_omits_error() {
        let summary = ProcessSummary {
            total: 2,
            processed: 1,
            skipped: 1,
            errors: 0,
            success: true,
            error: None,
        };
        let value = serde_json::to_value(&summary).unwrap();
        assert!(value.get("error").is_none());
    }

    #[test]
    fn category_node_without_children_deserializes() {
        let node: CategoryNode = serde_json::from_value(json!({
            "id": "1",
            "nombre": "Lácteos",
            "descripcion": "Categoría de Lácteos",
        }))
        .unwrap();
        assert!(node.subcategorias.is_empty());
    }
}
