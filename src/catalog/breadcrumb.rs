use uuid::Uuid;

use crate::catalog::models::{Category, Crumb};

/// Breadcrumb trail for a category, root first and ending with the category itself.
///
/// Ancestors come from the materialised `path`; ids the lookup cannot
/// resolve (deleted categories) are skipped rather than failing the trail.
pub fn breadcrumb<'a, F>(category: &'a Category, lookup: F) -> Vec<Crumb>
where
    F: Fn(Uuid) -> Option<&'a Category>,
{
    category
        .path
        .iter()
        .filter(|id| **id != category.id)
        .filter_map(|id| lookup(*id))
        .chain(std::iter::once(category))
        .map(|c| Crumb {
            id: c.id,
            name: c.name.clone(),
            slug: c.slug.clone(),
        })
        .collect()
}
