//! Default `_id` generation
//!
//! Documents inserted without an `_id`, and upserts whose filter does not
//! pin one, get an ObjectId hex string generated on the client.

use bson::{Bson, Document, oid::ObjectId};

/// A fresh document id.
pub fn new_id() -> Bson {
    Bson::String(ObjectId::new().to_hex())
}

/// Give `doc` an `_id` unless it already has one.
///
/// # Returns
/// The document's `_id`, existing or generated. Calling this twice yields
/// the same value.
pub fn set_default_id_for_insert(doc: &mut Document) -> Bson {
    if let Some(id) = doc.get("_id") {
        return id.clone();
    }
    let id = new_id();
    doc.insert("_id", id.clone());
    id
}

/// Pin the `_id` a document created by an upsert-update will get.
///
/// Does nothing when the filter names `_id` or when an update operator
/// already sets it. Otherwise adds `$setOnInsert._id`.
pub fn set_default_id_for_update_upsert(filter: &Document, update: &mut Document) {
    if filter.contains_key("_id") {
        return;
    }

    let already_set = update
        .iter()
        .filter(|(op, _)| op.starts_with('$'))
        .any(|(_, fields)| {
            fields
                .as_document()
                .is_some_and(|fields| fields.contains_key("_id"))
        });
    if already_set {
        return;
    }

    match update.get_mut("$setOnInsert") {
        Some(Bson::Document(on_insert)) => {
            on_insert.insert("_id", new_id());
        }
        _ => {
            let mut on_insert = Document::new();
            on_insert.insert("_id", new_id());
            update.insert("$setOnInsert", on_insert);
        }
    }
}

/// Pin the `_id` a document created by an upsert-replace will get.
pub fn set_default_id_for_replace_upsert(filter: &Document, replacement: &mut Document) {
    if filter.contains_key("_id") {
        return;
    }
    set_default_id_for_insert(replacement);
}
