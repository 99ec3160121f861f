//! Image metadata, ancestry and repository image records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The fields of an image metadata document the store interprets.
///
/// The document itself is stored verbatim; only `id` and `parent` are read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageMetadata {
    pub id: String,
    pub parent: Option<String>,
}

impl ImageMetadata {
    /// Parse the interpreted fields out of a raw metadata document.
    ///
    /// An absent, `null` or empty `parent` means the image is a root.
    pub fn from_json(body: &[u8]) -> crate::Result<Self> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| crate::Error::InvalidImageJson(e.to_string()))?;
        let object = value.as_object().ok_or_else(|| {
            crate::Error::InvalidImageJson("expected a JSON object".to_string())
        })?;

        let id = match object.get("id") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::String(_)) | None | Some(Value::Null) => {
                return Err(crate::Error::MissingImageId);
            }
            Some(_) => {
                return Err(crate::Error::InvalidImageJson(
                    "`id` must be a string".to_string(),
                ));
            }
        };

        let parent = match object.get("parent") {
            None | Some(Value::Null) => None,
            Some(Value::String(p)) if p.is_empty() => None,
            Some(Value::String(p)) => Some(p.clone()),
            Some(_) => {
                return Err(crate::Error::InvalidImageJson(
                    "`parent` must be a string".to_string(),
                ));
            }
        };

        Ok(Self { id, parent })
    }
}

/// Lineage of an image, newest first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ancestry(Vec<String>);

impl Ancestry {
    /// Ancestry of an image without a parent.
    pub fn root(id: impl Into<String>) -> Self {
        Self(vec![id.into()])
    }

    /// Ancestry of `id` whose parent has `parent` as its ancestry.
    pub fn descend(id: impl Into<String>, parent: &Ancestry) -> Self {
        let mut ids = Vec::with_capacity(parent.0.len() + 1);
        ids.push(id.into());
        ids.extend(parent.0.iter().cloned());
        Self(ids)
    }

    /// Decode a stored ancestry document.
    pub fn from_json(body: &[u8]) -> crate::Result<Self> {
        let ancestry: Self = serde_json::from_slice(body)
            .map_err(|e| crate::Error::InvalidAncestry(e.to_string()))?;
        if ancestry.0.is_empty() {
            return Err(crate::Error::InvalidAncestry(
                "ancestry cannot be empty".to_string(),
            ));
        }
        Ok(ancestry)
    }

    /// Encode for storage.
    pub fn to_json(&self) -> crate::Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| crate::Error::Serialization(e.to_string()))
    }

    pub fn ids(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Validate a batch of repository image records.
///
/// The body must be a JSON array whose elements are objects carrying a string
/// `id`. Other fields are preserved untouched.
pub fn validate_image_records(body: &[u8]) -> crate::Result<Vec<Value>> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| crate::Error::InvalidImageRecord(e.to_string()))?;
    let Value::Array(records) = value else {
        return Err(crate::Error::InvalidImageRecord(
            "expected a JSON array".to_string(),
        ));
    };

    for (index, record) in records.iter().enumerate() {
        let has_id = record
            .as_object()
            .and_then(|object| object.get("id"))
            .is_some_and(Value::is_string);
        if !has_id {
            return Err(crate::Error::InvalidImageRecord(format!(
                "record {index} must be an object with a string `id`"
            )));
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_reads_id_and_parent() {
        let meta = ImageMetadata::from_json(br#"{"id":"B","parent":"A","os":"linux"}"#).unwrap();
        assert_eq!(meta.id, "B");
        assert_eq!(meta.parent.as_deref(), Some("A"));
    }

    #[test]
    fn metadata_empty_or_null_parent_is_root() {
        let meta = ImageMetadata::from_json(br#"{"id":"A","parent":""}"#).unwrap();
        assert_eq!(meta.parent, None);
        let meta = ImageMetadata::from_json(br#"{"id":"A","parent":null}"#).unwrap();
        assert_eq!(meta.parent, None);
    }

    #[test]
    fn metadata_requires_id() {
        assert!(matches!(
            ImageMetadata::from_json(br#"{"parent":"A"}"#),
            Err(crate::Error::MissingImageId)
        ));
        assert!(matches!(
            ImageMetadata::from_json(br#"{"id":42}"#),
            Err(crate::Error::InvalidImageJson(_))
        ));
    }

    #[test]
    fn metadata_rejects_non_objects() {
        assert!(ImageMetadata::from_json(b"[]").is_err());
        assert!(ImageMetadata::from_json(b"not json").is_err());
    }

    #[test]
    fn ancestry_descends_newest_first() {
        let a = Ancestry::root("A");
        let b = Ancestry::descend("B", &a);
        let c = Ancestry::descend("C", &b);
        assert_eq!(c.ids(), ["C", "B", "A"]);
        assert_eq!(c.to_json().unwrap(), br#"["C","B","A"]"#);
    }

    #[test]
    fn ancestry_decode_rejects_garbage() {
        assert!(Ancestry::from_json(b"{}").is_err());
        assert!(Ancestry::from_json(b"[]").is_err());
        assert_eq!(Ancestry::from_json(br#"["A"]"#).unwrap(), Ancestry::root("A"));
    }

    #[test]
    fn image_records_require_string_ids() {
        let records = validate_image_records(br#"[{"id":"A","Tag":"latest"},{"id":"B"}]"#).unwrap();
        assert_eq!(records.len(), 2);
        assert!(validate_image_records(br#"[{"id":1}]"#).is_err());
        assert!(validate_image_records(br#"["A"]"#).is_err());
        assert!(validate_image_records(br#"{"id":"A"}"#).is_err());
    }
}
