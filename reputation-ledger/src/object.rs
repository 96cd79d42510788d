//! Object-kind resolution

use crate::types::{ObjectId, ObjectKind};

/// Maps an opaque object ID to the kind of content it names
pub trait ObjectKindResolver: Send + Sync {
    /// Kind of the object, `None` when it cannot be determined
    fn kind_of(&self, object_id: &ObjectId) -> Option<ObjectKind>;
}

/// Reads the kind out of IDs built by [`ObjectId::encode`]
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodedIdResolver;

impl ObjectKindResolver for EncodedIdResolver {
    fn kind_of(&self, object_id: &ObjectId) -> Option<ObjectKind> {
        object_id.encoded_kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_resolver() {
        let resolver = EncodedIdResolver;
        let tag = ObjectId::encode(ObjectKind::Tag, 12);

        assert_eq!(resolver.kind_of(&tag), Some(ObjectKind::Tag));
        assert_eq!(resolver.kind_of(&ObjectId::new("")), None);
    }
}
