use crate::models::CategoryNode;
use tracing::info;

/// Hierarchical taxonomy persisted as `{"categorias": [...]}`.
///
/// Node ids follow the catalog's legacy scheme: a first-level node gets its
/// 1-based position among its siblings, a node at depth `d > 1` gets
/// `"1.2.….d"`. Deeper ids therefore do not identify a node uniquely; they are
/// kept as opaque labels so existing catalog files stay compatible.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryTree {
    roots: Vec<CategoryNode>,
}

impl CategoryTree {
    pub fn new(roots: Vec<CategoryNode>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[CategoryNode] {
        &self.roots
    }

    /// Ensures every level of `path` exists, matching names case-insensitively
    /// and creating the missing tail. Returns the number of nodes created.
    /// Existing nodes are never renamed, renumbered or removed.
    pub fn upsert<S: AsRef<str>>(&mut self, path: &[S]) -> usize {
        let mut current = &mut self.roots;
        let mut created = 0;

        for (index, level) in path.iter().enumerate() {
            let level = level.as_ref();
            let depth = index + 1;
            let key = level.to_lowercase();

            let position = match current
                .iter()
                .position(|node| node.nombre.to_lowercase() == key)
            {
                Some(position) => position,
                None => {
                    current.push(CategoryNode {
                        id: node_id(current.len(), depth),
                        nombre: level.to_string(),
                        descripcion: format!("Categoría de {level}"),
                        subcategorias: Vec::new(),
                    });
                    created += 1;
                    info!(
                        target = "catalog.categories",
                        path = %display_path(&path[..depth]),
                        "category_created"
                    );
                    current.len() - 1
                }
            };
            current = &mut current[position].subcategorias;
        }

        created
    }

    /// Looks up a node by its name path, case-insensitively.
    #[cfg(test)]
    pub fn find<S: AsRef<str>>(&self, path: &[S]) -> Option<&CategoryNode> {
        let (last, parents) = path.split_last()?;
        let mut siblings = &self.roots;
        for level in parents {
            siblings = &find_sibling(siblings, level.as_ref())?.subcategorias;
        }
        find_sibling(siblings, last.as_ref())
    }
}

#[cfg(test)]
fn find_sibling<'a>(siblings: &'a [CategoryNode], name: &str) -> Option<&'a CategoryNode> {
    let key = name.to_lowercase();
    siblings
        .iter()
        .find(|node| node.nombre.to_lowercase() == key)
}

fn node_id(sibling_count: usize, depth: usize) -> String {
    if depth <= 1 {
        return (sibling_count + 1).to_string();
    }
    (1..=depth)
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

fn display_path<S: AsRef<str>>(path: &[S]) -> String {
    path.iter()
        .map(|level| level.as_ref())
        .collect::<Vec<_>>()
        .join(" > ")
}
