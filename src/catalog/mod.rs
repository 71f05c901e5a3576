pub mod category_tree;
pub mod storage;

pub use category_tree::CategoryTree;
pub use storage::{FileBackend, StorageBackend, StoreError, StoreKind};

#[cfg(test)]
pub use storage::MemoryBackend;

use crate::models::{BrandEntry, BrandFile, CategoryFile, ProcessedProduct, ProductFile};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// A failed flush is reported, but the in-memory collection keeps the change.
pub struct Catalog {
    backend: Box<dyn StorageBackend>,
    categories: CategoryTree,
    products: Vec<ProcessedProduct>,
    brands: Vec<BrandEntry>,
}

impl Catalog {
    /// Loads every store, starting from an empty document for stores that
    /// have never been written.
    pub fn load(backend: impl StorageBackend + 'static) -> Result<Self, StoreError> {
        let categories: CategoryFile = read_document(&backend, StoreKind::Categories)?;
        let products: ProductFile = read_document(&backend, StoreKind::Products)?;
        let brands: BrandFile = read_document(&backend, StoreKind::Brands)?;

        debug!(
            target = "catalog.store",
            categories = categories.categorias.len(),
            products = products.products.len(),
            brands = brands.marcas.len(),
            "catalog_loaded"
        );

        Ok(Self {
            backend: Box::new(backend),
            categories: CategoryTree::new(categories.categorias),
            products: products.products,
            brands: brands.marcas,
        })
    }

    pub fn categories(&self) -> &CategoryTree {
        &self.categories
    }

    pub fn products(&self) -> &[ProcessedProduct] {
        &self.products
    }

    pub fn brands(&self) -> &[BrandEntry] {
        &self.brands
    }

    pub fn has_brand(&self, nombre: &str) -> bool {
        self.brands.iter().any(|brand| brand.nombre == nombre)
    }

    /// Registers a brand the first time it is seen and flushes the brand
    /// store. Returns `Ok(false)` when the brand was already known.
    pub fn add_brand(&mut self, nombre: &str) -> Result<bool, StoreError> {
        if self.has_brand(nombre) {
            return Ok(false);
        }
        self.brands.push(BrandEntry::new(nombre));
        self.flush(StoreKind::Brands)?;
        Ok(true)
    }

    /// Upserts a category path and flushes the category store.
    pub fn upsert_category<S: AsRef<str>>(&mut self, path: &[S]) -> Result<usize, StoreError> {
        let created = self.categories.upsert(path);
        self.flush(StoreKind::Categories)?;
        Ok(created)
    }

    pub fn append_product(&mut self, product: ProcessedProduct) -> Result<(), StoreError> {
        self.products.push(product);
        self.flush(StoreKind::Products)
    }

    pub fn flush(&self, kind: StoreKind) -> Result<(), StoreError> {
        let contents = match kind {
            StoreKind::Categories => encode(
                kind,
                &CategoryFileRef {
                    categorias: self.categories.roots(),
                },
            )?,
            StoreKind::Products => encode(
                kind,
                &ProductFileRef {
                    products: &self.products,
                },
            )?,
            StoreKind::Brands => encode(
                kind,
                &BrandFileRef {
                    marcas: &self.brands,
                },
            )?,
        };
        self.backend.write(kind, &contents)?;
        debug!(target = "catalog.store", store = kind.file_name(), "store_flushed");
        Ok(())
    }
}

#[derive(Serialize)]
struct CategoryFileRef<'a> {
    categorias: &'a [crate::models::CategoryNode],
}

#[derive(Serialize)]
struct ProductFileRef<'a> {
    products: &'a [ProcessedProduct],
}

#[derive(Serialize)]
struct BrandFileRef<'a> {
    marcas: &'a [BrandEntry],
}

fn read_document<T>(backend: &dyn StorageBackend, kind: StoreKind) -> Result<T, StoreError>
where
    T: DeserializeOwned + Default,
{
    match backend.read(kind)? {
        Some(contents) if !contents.trim().is_empty() => serde_json::from_str(&contents)
            .map_err(|source| StoreError::Decode {
                store: kind.file_name(),
                source,
            }),
        _ => Ok(T::default()),
    }
}

fn encode<T: Serialize>(kind: StoreKind, document: &T) -> Result<String, StoreError> {
    serde_json::to_string_pretty(document).map_err(|source| StoreError::Encode {
        store: kind.file_name(),
        source,
    })
}
