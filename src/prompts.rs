use crate::models::ProductRecord;
use crate::parse::MAX_CATEGORY_DEPTH;
use serde_json::json;

pub fn brand_prompt(product: &ProductRecord) -> serde_json::Result<String> {
    let record = serde_json::to_string(product)?;
    Ok(format!(
        r#"Analiza este producto y extrae la marca real según estas reglas:

REGLAS:
1. Ignora prefijos como "PRODUCTO ECONÓMICO" o descriptores similares
2. Si el producto es de marca blanca de Alcampo, la marca es "Alcampo"
3. Devuelve SOLO un JSON con el formato exacto mostrado abajo
4. La marca debe ser el nombre oficial de la empresa/marca

FORMATO DE RESPUESTA (EXACTO):
{{
    "marca": "nombre_de_la_marca"
}}

PRODUCTO:
{record}

IMPORTANTE: DEVUELVE SOLO EL JSON CON LA MARCA REAL"#
    ))
}

/// Must only be built once the record carries its resolved brand, since the
/// brand is echoed back in `processed_product.marca`.
pub fn category_prompt(product: &ProductRecord) -> serde_json::Result<String> {
    let expected = serde_json::to_string_pretty(&json!({
        "category_path": ["Categoría 1", "Subcategoría", "Sub-subcategoría"],
        "processed_product": {
            "nombre": product.name,
            "marca": product.brand,
            "precio": product.price,
            "descripcion": product.description,
            "unidad": product.unit,
            "tienda": product.store,
            "url": product.url,
            "imagen": product.image,
        }
    }))?;

    Ok(format!(
        r#"Por favor, analiza el siguiente producto y devuelve una categorización jerárquica en formato JSON.

Producto: {name}
Marca: {brand}
Descripción: {description}
Precio: {price}
Unidad: {unit}
Tienda: {store}
URL: {url}
Imagen: {image}

Reglas:
1. Crea una jerarquía de categorías relevante y específica para este producto
2. Usa máximo {depth} niveles de profundidad
3. Todas las categorías deben estar en español
4. La respuesta debe ser un objeto JSON con esta estructura:

{expected}

Responde SOLO con el JSON, sin texto adicional."#,
        name = product.name,
        brand = product.brand,
        description = product.description,
        price = product.price,
        unit = product.unit,
        store = product.store,
        url = product.url,
        image = product.image,
        depth = MAX_CATEGORY_DEPTH,
    ))
}
