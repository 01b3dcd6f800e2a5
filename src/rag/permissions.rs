//! Department-scoped document visibility

use crate::models::Department;
use crate::models::Document;

/// Documents visible to `department`: its own plus the shared unit's, in input order
pub fn filter_permitted(documents: &[Document], department: Department) -> Vec<&Document> {
    documents
        .iter()
        .filter(|doc| is_permitted(doc, department))
        .collect()
}

pub fn is_permitted(document: &Document, department: Department) -> bool {
    document.department.is_shared() || document.department == department
}
