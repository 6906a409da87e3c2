use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::{DocumentBackend, PageRef, PagedDocument, SubstituteError};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Bound on Parent hops, so a cyclic page tree cannot loop forever.
const MAX_TREE_DEPTH: usize = 64;

/// A PDF loaded through `lopdf`, with its page object ids in page order.
#[derive(Debug, Clone)]
pub struct PdfDocument {
    doc: Document,
    page_ids: Vec<ObjectId>,
}

impl PdfDocument {
    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn page_ids(&self) -> &[ObjectId] {
        &self.page_ids
    }
}

impl PagedDocument for PdfDocument {
    fn page_count(&self) -> usize {
        self.page_ids.len()
    }
}

/// `DocumentBackend` that reads and writes PDF files with `lopdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfBackend;

impl DocumentBackend for PdfBackend {
    type Document = PdfDocument;

    fn open(&self, path: &Path) -> Result<PdfDocument, SubstituteError> {
        let doc = Document::load(path).map_err(|e| SubstituteError::DocumentLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        Ok(PdfDocument { doc, page_ids })
    }

    fn assemble(
        &self,
        base: &PdfDocument,
        substitute: &PdfDocument,
        pages: &[PageRef],
    ) -> Result<Vec<u8>, SubstituteError> {
        let mut out = build_document(base, substitute, pages)?;
        let mut bytes = Vec::new();
        out.save_to(&mut bytes)
            .map_err(|e| SubstituteError::Assemble { reason: e.to_string() })?;
        Ok(bytes)
    }
}

impl From<lopdf::Error> for SubstituteError {
    fn from(e: lopdf::Error) -> Self {
        SubstituteError::Assemble { reason: e.to_string() }
    }
}

/// Build the output document: the base document with its page tree replaced
/// by a flat list of `pages`.
fn build_document(base: &PdfDocument, substitute: &PdfDocument, pages: &[PageRef]) -> Result<Document, SubstituteError> {
    let mut out = base.doc.clone();

    // Move the substitute into an id range the base does not use.
    let mut donor = substitute.doc.clone();
    donor.renumber_objects_with(out.max_id + 1);
    let donor_page_ids: Vec<ObjectId> = donor.get_pages().into_values().collect();

    let mut kids: Vec<ObjectId> = Vec::with_capacity(pages.len());
    for page in pages {
        let id = match *page {
            PageRef::Base(i) => {
                let id = lookup_page(&base.page_ids, i)?;
                pin_inherited_attributes(&mut out, id)?;
                id
            }
            PageRef::Substitute(i) => {
                let id = lookup_page(&donor_page_ids, i)?;
                pin_inherited_attributes(&mut donor, id)?;
                id
            }
        };
        kids.push(id);
    }

    let donor_max_id = donor.max_id;
    out.objects.extend(donor.objects);
    out.max_id = out.max_id.max(donor_max_id);

    let root_id = page_tree_root(&out)?;
    {
        let root = out.get_object_mut(root_id)?.as_dict_mut()?;
        root.set("Kids", Object::Array(kids.iter().map(|&id| Object::Reference(id)).collect()));
        root.set("Count", Object::Integer(kids.len() as i64));
    }
    for &id in &kids {
        out.get_object_mut(id)?.as_dict_mut()?.set("Parent", Object::Reference(root_id));
    }

    // Drops the replaced page's own objects and the substitute's unused ones.
    out.prune_objects();
    out.renumber_objects();
    Ok(out)
}

fn lookup_page(page_ids: &[ObjectId], index: usize) -> Result<ObjectId, SubstituteError> {
    page_ids.get(index).copied().ok_or_else(|| SubstituteError::Assemble {
        reason: format!("page index {} not in document ({} pages)", index, page_ids.len()),
    })
}

fn page_tree_root(doc: &Document) -> lopdf::Result<ObjectId> {
    let catalog_id = doc.trailer.get(b"Root")?.as_reference()?;
    doc.get_object(catalog_id)?.as_dict()?.get(b"Pages")?.as_reference()
}

fn parent_of(node: &Dictionary) -> Option<ObjectId> {
    node.get(b"Parent").and_then(|p| p.as_reference()).ok()
}

/// Copy attributes the page inherits from its ancestors onto the page itself,
/// so it renders the same under a different parent.
fn pin_inherited_attributes(doc: &mut Document, page_id: ObjectId) -> lopdf::Result<()> {
    let page = doc.get_object(page_id)?.as_dict()?;
    let mut missing: Vec<&[u8]> = INHERITABLE_KEYS.iter().copied().filter(|key| !page.has(key)).collect();
    let mut parent = parent_of(page);

    let mut inherited: Vec<(Vec<u8>, Object)> = Vec::new();
    let mut depth = 0;
    while let Some(node_id) = parent {
        if missing.is_empty() || depth >= MAX_TREE_DEPTH {
            break;
        }
        let node = doc.get_object(node_id)?.as_dict()?;
        missing.retain(|key| match node.get(key) {
            Ok(value) => {
                inherited.push((key.to_vec(), value.clone()));
                false
            }
            Err(_) => true,
        });
        parent = parent_of(node);
        depth += 1;
    }

    if inherited.is_empty() {
        return Ok(());
    }
    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    for (key, value) in inherited {
        page.set(key, value);
    }
    Ok(())
}
