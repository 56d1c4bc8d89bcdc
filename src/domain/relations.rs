use crate::domain::model::{Document, Identifier, RelationType};

/// Child DTIDs of a document in document order. Missing relations yield none.
pub fn extract_children(document: &Document) -> Vec<Identifier> {
    document
        .relations
        .iter()
        .flatten()
        .filter(|relation| relation.relation_type == RelationType::Child)
        .map(|relation| relation.target.clone())
        .collect()
}
