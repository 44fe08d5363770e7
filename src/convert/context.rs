use crate::host::{DocumentId, ElementId, GraphicsStyleId, MaterialId};

/// Where converted geometry is going and how it should be attributed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionContext {
    pub document: Option<DocumentId>,
    pub element: Option<ElementId>,
    pub material: Option<MaterialId>,
    pub graphics_style: Option<GraphicsStyleId>,
    /// One entry per source face; overrides `material` where set.
    pub face_materials: Vec<Option<MaterialId>>,
}

impl ConversionContext {
    #[must_use]
    pub fn for_document(document: DocumentId) -> Self {
        Self {
            document: Some(document),
            ..Self::default()
        }
    }

    /// Context for `document` derived from this one. Graphics attribute ids
    /// belong to a document and do not carry over to another one.
    #[must_use]
    pub fn entering(&self, document: DocumentId) -> Self {
        if self.document == Some(document) {
            return self.clone();
        }
        Self::for_document(document)
    }

    #[must_use]
    pub fn face_material(&self, face: usize) -> Option<MaterialId> {
        self.face_materials.get(face).copied().flatten().or(self.material)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switching_documents_resets_attributes() {
        let mut context = ConversionContext::for_document(DocumentId(1));
        context.material = Some(MaterialId(7));
        context.graphics_style = Some(GraphicsStyleId(9));
        assert_eq!(context.entering(DocumentId(1)), context);
        let other = context.entering(DocumentId(2));
        assert_eq!(other.document, Some(DocumentId(2)));
        assert_eq!(other.material, None);
        assert_eq!(other.graphics_style, None);
    }

    #[test]
    fn face_materials_fall_back_to_context_material() {
        let context = ConversionContext {
            material: Some(MaterialId(1)),
            face_materials: vec![None, Some(MaterialId(2))],
            ..ConversionContext::default()
        };
        assert_eq!(context.face_material(0), Some(MaterialId(1)));
        assert_eq!(context.face_material(1), Some(MaterialId(2)));
        assert_eq!(context.face_material(5), Some(MaterialId(1)));
    }
}
