use crate::brand::{is_private_label, normalize_brand};
use crate::models::ProcessedProduct;

/// Descriptors stripped from private-label names before comparing them.
/// Each is checked once, in order, against the lowercased name.
const PRIVATE_LABEL_NAME_PREFIXES: [&str; 6] = [
    "producto económico",
    "producto economico",
    "ecológico",
    "ecologico",
    "baby",
    "alcampo",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateRule {
    NameBrandStore,
    Url,
    PrivateLabelName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateMatch {
    /// Position of the matching product in the store.
    pub index: usize,
    pub rule: DuplicateRule,
}

struct Key {
    name: String,
    brand: String,
    store: String,
    url: String,
    private_label: bool,
}

impl Key {
    fn of(product: &ProcessedProduct) -> Self {
        let brand = normalize_brand(&product.marca);
        Self {
            name: product.nombre.trim().to_lowercase(),
            private_label: is_private_label(&brand),
            brand: brand.to_lowercase(),
            store: product.tienda.trim().to_lowercase(),
            url: product.url.trim().to_lowercase(),
        }
    }

    fn matches(&self, other: &Key) -> Option<DuplicateRule> {
        if self.name == other.name && self.brand == other.brand && self.store == other.store {
            return Some(DuplicateRule::NameBrandStore);
        }
        if !self.url.is_empty() && self.url == other.url {
            return Some(DuplicateRule::Url);
        }
        if self.private_label
            && other.private_label
            && self.store == other.store
            && similar_names(&self.name, &other.name)
        {
            return Some(DuplicateRule::PrivateLabelName);
        }
        None
    }
}

/// Private-label names differ across scrape sources only by descriptor
/// prefixes; compares what is left once those are removed.
pub fn similar_names(a: &str, b: &str) -> bool {
    core_name(a) == core_name(b)
}

fn core_name(name: &str) -> &str {
    let mut name = name.trim();
    for prefix in PRIVATE_LABEL_NAME_PREFIXES {
        if let Some(rest) = name.strip_prefix(prefix) {
            name = rest.trim();
        }
    }
    name
}

/// First stored product `candidate` duplicates, if any.
pub fn find_duplicate(
    candidate: &ProcessedProduct,
    existing: &[ProcessedProduct],
) -> Option<DuplicateMatch> {
    let key = Key::of(candidate);
    existing.iter().enumerate().find_map(|(index, product)| {
        key.matches(&Key::of(product))
            .map(|rule| DuplicateMatch { index, rule })
    })
}

#[allow(dead_code)]
pub fn is_duplicate(candidate: &ProcessedProduct, existing: &[ProcessedProduct]) -> bool {
    find_duplicate(candidate, existing).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(nombre: &str, marca: &str, tienda: &str, url: &str) -> ProcessedProduct {
        ProcessedProduct {
            nombre: nombre.into(),
            marca: marca.into(),
            precio: 1.0,
            descripcion: String::new(),
            unidad: String::new(),
            tienda: tienda.into(),
            url: url.into(),
            imagen: String::new(),
        }
    }

    #[test]
    fn name_brand_store_match_ignores_case_and_whitespace() {
        let stored = vec![product("Leche Entera", "Pascual", "Alcampo", "")];
        let candidate = product("  leche entera ", "PASCUAL", "alcampo ", "");
        assert_eq!(
            find_duplicate(&candidate, &stored),
            Some(DuplicateMatch {
                index: 0,
                rule: DuplicateRule::NameBrandStore,
            })
        );
    }

    #[test]
    fn brand_aliases_are_normalized_before_comparing() {
        let stored = vec![product("Papilla", "NESTLÉ", "Alcampo", "")];
        assert!(is_duplicate(
            &product("Papilla", "nestle", "Alcampo", ""),
            &stored
        ));
    }

    #[test]
    fn rule_one_is_symmetric() {
        let a = product("Agua mineral", "Font Vella", "Alcampo", "");
        let b = product("AGUA MINERAL ", "FONT VELLA", " ALCAMPO", "");
        assert!(is_duplicate(&a, std::slice::from_ref(&b)));
        assert!(is_duplicate(&b, std::slice::from_ref(&a)));
    }

    #[test]
    fn different_store_is_not_a_duplicate() {
        let stored = vec![product("Leche", "Pascual", "Alcampo", "")];
        assert!(!is_duplicate(&product("Leche", "Pascual", "Carrefour", ""), &stored));
    }

    #[test]
    fn url_is_an_identity_key() {
        let stored = vec![product("Leche", "Pascual", "Alcampo", "https://shop/p/1")];
        let renamed = product("Leche semidesnatada", "Otra", "Otra tienda", " HTTPS://shop/P/1 ");
        assert_eq!(
            find_duplicate(&renamed, &stored).map(|found| found.rule),
            Some(DuplicateRule::Url)
        );
    }

    #[test]
    fn empty_urls_never_match() {
        let stored = vec![product("Leche", "Pascual", "Alcampo", "")];
        assert!(!is_duplicate(&product("Zumo", "Don Simón", "Alcampo", ""), &stored));
    }

    #[test]
    fn private_label_names_match_after_prefix_strip() {
        let stored = vec![product("Producto económico yogur natural", "Alcampo", "Alcampo", "")];
        let candidate = product("Yogur natural", "AUCHAN", "alcampo", "");
        assert_eq!(
            find_duplicate(&candidate, &stored).map(|found| found.rule),
            Some(DuplicateRule::PrivateLabelName)
        );
    }

    #[test]
    fn prefix_similarity_requires_private_label_on_both_sides() {
        let stored = vec![product("Ecológico yogur", "Danone", "Alcampo", "")];
        assert!(!is_duplicate(&product("yogur", "Alcampo", "Alcampo", ""), &stored));
    }

    #[test]
    fn similar_names_strips_each_prefix_once() {
        assert!(similar_names("baby alcampo papilla", "papilla"));
        assert!(similar_names("ecologico leche", "leche"));
        assert!(!similar_names("baby baby papilla", "papilla"));
    }
}
