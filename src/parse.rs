use crate::models::ProcessedProduct;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

pub const MAX_CATEGORY_DEPTH: usize = 3;

const FENCE: &str = "```";
const REQUIRED_PRODUCT_FIELDS: [&str; 5] = ["nombre", "marca", "precio", "descripcion", "tienda"];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("response contains no JSON payload")]
    Empty,
    #[error("invalid json: {0}")]
    InvalidJson(String),
    #[error("response is not a JSON object")]
    NotAnObject,
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
    #[error("price is not numeric: {0}")]
    InvalidPrice(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrandResponse {
    pub marca: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryResponse {
    pub category_path: Vec<String>,
    pub processed_product: ProcessedProduct,
}

/// Locates the JSON text inside a model response: the body of the first
/// fenced block (language tag dropped, closing fence optional), or the whole
/// trimmed response when there is no fence.
pub fn extract_json_payload(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(start) = trimmed.find(FENCE) else {
        return trimmed;
    };
    let after = &trimmed[start + FENCE.len()..];
    let tag_len = after
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(after.len());
    let body = &after[tag_len..];
    let body = match body.find(FENCE) {
        Some(end) => &body[..end],
        None => body,
    };
    body.trim()
}

fn embedded_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn decode_object(raw: &str) -> Result<Map<String, Value>, ParseError> {
    let payload = extract_json_payload(raw);
    let value = match serde_json::from_str::<Value>(payload) {
        Ok(value) => value,
        Err(err) => {
            let fallback = embedded_object(raw.trim())
                .and_then(|text| serde_json::from_str::<Value>(text).ok());
            match fallback {
                Some(value) => value,
                None if payload.is_empty() && raw.trim().is_empty() => {
                    return Err(ParseError::Empty);
                }
                None => return Err(ParseError::InvalidJson(err.to_string())),
            }
        }
    };
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ParseError::NotAnObject),
    }
}

/// Parses the answer to a brand prompt: `{"marca": "<name>"}`.
pub fn parse_brand_response(raw: &str) -> Result<BrandResponse, ParseError> {
    let map = decode_object(raw)?;
    match map.get("marca") {
        Some(Value::String(marca)) => Ok(BrandResponse {
            marca: marca.trim().to_string(),
        }),
        Some(_) => Err(ParseError::WrongType {
            field: "marca",
            expected: "a string",
        }),
        None => Err(ParseError::MissingField("marca")),
    }
}

/// Parses the answer to a categorization prompt.
///
/// `precio` is coerced to a finite float; `unidad`, `url` and `imagen` default
/// to empty strings when absent. Keys outside the product schema are dropped.
pub fn parse_category_response(raw: &str) -> Result<CategoryResponse, ParseError> {
    let map = decode_object(raw)?;

    let path = map
        .get("category_path")
        .ok_or(ParseError::MissingField("category_path"))?;
    let product = map
        .get("processed_product")
        .ok_or(ParseError::MissingField("processed_product"))?;

    let category_path = category_path(path)?;
    let product = product.as_object().ok_or(ParseError::WrongType {
        field: "processed_product",
        expected: "an object",
    })?;

    if let Some(missing) = REQUIRED_PRODUCT_FIELDS
        .into_iter()
        .find(|field| !product.contains_key(*field))
    {
        return Err(ParseError::MissingField(missing));
    }

    let processed_product = ProcessedProduct {
        nombre: text_field(product, "nombre")?,
        marca: text_field(product, "marca")?,
        precio: coerce_price(&product["precio"])?,
        descripcion: text_field(product, "descripcion")?,
        unidad: text_field(product, "unidad")?,
        tienda: text_field(product, "tienda")?,
        url: text_field(product, "url")?,
        imagen: text_field(product, "imagen")?,
    };

    Ok(CategoryResponse {
        category_path,
        processed_product,
    })
}

/// Blank levels are dropped; an empty path is valid and commits the
/// product without a category node.
fn category_path(value: &Value) -> Result<Vec<String>, ParseError> {
    const EXPECTED: ParseError = ParseError::WrongType {
        field: "category_path",
        expected: "an array of strings",
    };

    let items = value.as_array().ok_or(EXPECTED)?;
    let mut path = Vec::with_capacity(items.len());
    for item in items {
        let level = item.as_str().ok_or(EXPECTED)?.trim();
        if !level.is_empty() {
            path.push(level.to_string());
        }
    }

    if path.len() > MAX_CATEGORY_DEPTH {
        warn!(
            target = "catalog.parse",
            depth = path.len(),
            dropped = ?&path[MAX_CATEGORY_DEPTH..],
            "category_path_truncated"
        );
        path.truncate(MAX_CATEGORY_DEPTH);
    }
    Ok(path)
}

fn text_field(object: &Map<String, Value>, field: &'static str) -> Result<String, ParseError> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(text)) => Ok(text.clone()),
        Some(Value::Number(number)) => Ok(number.to_string()),
        Some(Value::Bool(flag)) => Ok(flag.to_string()),
        Some(_) => Err(ParseError::WrongType {
            field,
            expected: "text",
        }),
    }
}

fn coerce_price(value: &Value) -> Result<f64, ParseError> {
    let price = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    price
        .filter(|price| price.is_finite())
        .ok_or_else(|| ParseError::InvalidPrice(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATEGORY_JSON: &str = r#"{
        "category_path": ["Lácteos", "Yogures", "Yogures naturales"],
        "processed_product": {
            "nombre": "Yogur natural",
            "marca": "ALCAMPO",
            "precio": 1.25,
            "descripcion": "Pack de 4",
            "unidad": "1.25 €/kg",
            "tienda": "Alcampo",
            "url": "https://example.com/yogur",
            "imagen": "https://example.com/yogur.jpg"
        }
    }"#;

    #[test]
    fn fenced_brand_response() {
        let parsed = parse_brand_response("```json\n{\"marca\": \"Nestlé\"}\n```").unwrap();
        assert_eq!(
            parsed,
            BrandResponse {
                marca: "Nestlé".into()
            }
        );
    }

    #[test]
    fn plain_text_is_rejected() {
        assert!(matches!(
            parse_brand_response("not json"),
            Err(ParseError::InvalidJson(_))
        ));
        assert_eq!(parse_brand_response("   "), Err(ParseError::Empty));
    }

    #[test]
    fn unterminated_fence_from_stop_sequence() {
        let parsed = parse_brand_response("```\n{\"marca\": \"Danone\"}").unwrap();
        assert_eq!(parsed.marca, "Danone");
    }

    #[test]
    fn trailing_fence_and_surrounding_prose() {
        assert_eq!(
            parse_brand_response("{\"marca\": \"Pascual\"}\n```").unwrap().marca,
            "Pascual"
        );
        assert_eq!(
            parse_brand_response("Claro, aquí está: {\"marca\": \"Danone\"} Espero que ayude.")
                .unwrap()
                .marca,
            "Danone"
        );
    }

    #[test]
    fn brand_must_be_a_string() {
        assert_eq!(
            parse_brand_response("{\"marca\": 42}"),
            Err(ParseError::WrongType {
                field: "marca",
                expected: "a string",
            })
        );
        assert_eq!(
            parse_brand_response("{\"brand\": \"X\"}"),
            Err(ParseError::MissingField("marca"))
        );
        assert_eq!(
            parse_brand_response("[\"marca\"]"),
            Err(ParseError::NotAnObject)
        );
    }

    #[test]
    fn payload_extraction_drops_language_tag() {
        assert_eq!(extract_json_payload("```JSON\n{}\n```"), "{}");
        assert_eq!(extract_json_payload("Respuesta:\n```\n{\"a\":1}\n```\nFin"), "{\"a\":1}");
        assert_eq!(extract_json_payload("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn category_response_full() {
        let raw = format!("```json\n{CATEGORY_JSON}\n```");
        let parsed = parse_category_response(&raw).unwrap();
        assert_eq!(
            parsed.category_path,
            vec!["Lácteos", "Yogures", "Yogures naturales"]
        );
        assert_eq!(parsed.processed_product.precio, 1.25);
        assert_eq!(parsed.processed_product.tienda, "Alcampo");
    }

    #[test]
    fn optional_fields_default_to_empty() {
        let raw = r#"{"category_path": ["Bebidas"], "processed_product": {
            "nombre": "Agua", "marca": "FONT VELLA", "precio": "0.45",
            "descripcion": "1.5L", "tienda": "Alcampo"}}"#;
        let parsed = parse_category_response(raw).unwrap();
        let product = parsed.processed_product;
        assert_eq!(product.precio, 0.45);
        assert_eq!(product.unidad, "");
        assert_eq!(product.url, "");
        assert_eq!(product.imagen, "");
    }

    #[test]
    fn missing_required_field_fails() {
        let raw = r#"{"category_path": ["Bebidas"], "processed_product": {
            "nombre": "Agua", "marca": "FONT VELLA", "precio": 1, "descripcion": ""}}"#;
        assert_eq!(
            parse_category_response(raw),
            Err(ParseError::MissingField("tienda"))
        );
    }

    #[test]
    fn non_numeric_price_fails() {
        for price in ["\"gratis\"", "null", "[1]", "\"NaN\""] {
            let raw = format!(
                r#"{{"category_path": ["Bebidas"], "processed_product": {{
                "nombre": "Agua", "marca": "X", "precio": {price},
                "descripcion": "", "tienda": "Alcampo"}}}}"#
            );
            assert!(
                matches!(
                    parse_category_response(&raw),
                    Err(ParseError::InvalidPrice(_))
                ),
                "price {price} should be rejected"
            );
        }
    }

    #[test]
    fn category_path_shape_is_checked() {
        let product = r#""processed_product": {"nombre": "A", "marca": "B", "precio": 1,
            "descripcion": "", "tienda": "C"}"#;
        let not_list = format!(r#"{{"category_path": "Bebidas", {product}}}"#);
        assert!(matches!(
            parse_category_response(&not_list),
            Err(ParseError::WrongType {
                field: "category_path",
                ..
            })
        ));
        let mixed = format!(r#"{{"category_path": ["Bebidas", 3], {product}}}"#);
        assert!(matches!(
            parse_category_response(&mixed),
            Err(ParseError::WrongType { .. })
        ));
        let deep = format!(r#"{{"category_path": ["a", "b", "c", "d"], {product}}}"#);
        assert_eq!(
            parse_category_response(&deep).unwrap().category_path,
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn empty_brand_string_is_accepted() {
        assert_eq!(parse_brand_response(r#"{"marca": "  "}"#).unwrap().marca, "");
    }

    #[test]
    fn empty_or_blank_category_path_is_accepted() {
        let product = r#""processed_product": {"nombre": "A", "marca": "B", "precio": 1,
            "descripcion": "", "tienda": "C"}"#;
        let empty = format!(r#"{{"category_path": [], {product}}}"#);
        assert!(parse_category_response(&empty).unwrap().category_path.is_empty());
        let blanks = format!(r#"{{"category_path": [" ", "Bebidas", ""], {product}}}"#);
        assert_eq!(
            parse_category_response(&blanks).unwrap().category_path,
            vec!["Bebidas"]
        );
    }

    #[test]
    fn processed_product_must_be_object() {
        let raw = r#"{"category_path": ["a"], "processed_product": "Agua"}"#;
        assert_eq!(
            parse_category_response(raw),
            Err(ParseError::WrongType {
                field: "processed_product",
                expected: "an object",
            })
        );
    }
}
