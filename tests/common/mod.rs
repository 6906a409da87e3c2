#![allow(dead_code)]

use std::path::Path;

use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use pdf_page_swap::{DocumentBackend, PdfBackend};

pub const A4: [i64; 4] = [0, 0, 595, 842];
pub const LETTER: [i64; 4] = [0, 0, 612, 792];

fn rect(values: [i64; 4]) -> Object {
    Object::Array(values.iter().map(|&v| Object::Integer(v)).collect())
}

/// Write a PDF with one page per label. Each page shows its label, so pages
/// can be told apart after a round trip. Resources and MediaBox live on the
/// page tree root and are inherited by every page.
pub fn write_pdf(path: &Path, labels: &[&str], page_size: [i64; 4]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for label in labels {
        let content = format!("BT /F1 24 Tf 72 700 Td ({}) Tj ET", label);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => Object::Integer(labels.len() as i64),
        "Resources" => resources_id,
        "MediaBox" => rect(page_size),
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

/// Like `write_pdf`, but pages sit under two intermediate page tree nodes and
/// the MediaBox is only set on the root.
pub fn write_nested_pdf(path: &Path, labels: &[&str], page_size: [i64; 4]) {
    write_nested_pdf_with(path, labels, page_size, Dictionary::new());
}

/// Nested page tree whose intermediate nodes carry `Rotate` and `CropBox`.
pub fn write_rotated_pdf(path: &Path, labels: &[&str], page_size: [i64; 4], crop_box: [i64; 4], rotate: i64) {
    let branch_attrs = dictionary! {
        "CropBox" => rect(crop_box),
        "Rotate" => Object::Integer(rotate),
    };
    write_nested_pdf_with(path, labels, page_size, branch_attrs);
}

fn write_nested_pdf_with(path: &Path, labels: &[&str], page_size: [i64; 4], branch_attrs: Dictionary) {
    let mut doc = Document::with_version("1.5");
    let root_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let split = labels.len() / 2;
    let mut branches: Vec<Object> = Vec::new();
    for chunk in [&labels[..split], &labels[split..]] {
        let branch_id = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::new();
        for label in chunk {
            let content = format!("BT /F1 12 Tf 72 700 Td ({}) Tj ET", label);
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => branch_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }
        let mut branch = dictionary! {
            "Type" => "Pages",
            "Parent" => root_id,
            "Kids" => kids,
            "Count" => Object::Integer(chunk.len() as i64),
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        };
        for (key, value) in branch_attrs.iter() {
            branch.set(key.clone(), value.clone());
        }
        doc.objects.insert(branch_id, Object::Dictionary(branch));
        branches.push(Object::Reference(branch_id));
    }

    let root = dictionary! {
        "Type" => "Pages",
        "Kids" => branches,
        "Count" => Object::Integer(labels.len() as i64),
        "MediaBox" => rect(page_size),
    };
    doc.objects.insert(root_id, Object::Dictionary(root));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => root_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

/// Labels of every page of the PDF at `path`, in page order.
pub fn page_labels(path: &Path) -> Vec<String> {
    let pdf = PdfBackend.open(path).unwrap();
    pdf.page_ids()
        .iter()
        .map(|&id| {
            let content = pdf.document().get_page_content(id).unwrap();
            let text = String::from_utf8_lossy(&content).to_string();
            let start = text.find('(').expect("label start") + 1;
            let end = text[start..].find(')').expect("label end") + start;
            text[start..end].to_string()
        })
        .collect()
}

/// Rectangle stored directly on each page under `key` (MediaBox, CropBox), if any.
pub fn page_rects(path: &Path, key: &[u8]) -> Vec<Option<Vec<i64>>> {
    let pdf = PdfBackend.open(path).unwrap();
    pdf.page_ids()
        .iter()
        .map(|&id| {
            let page = pdf.document().get_object(id).unwrap().as_dict().unwrap();
            page.get(key).ok().and_then(|obj| obj.as_array().ok()).map(|items| {
                items.iter().map(|v| v.as_i64().unwrap()).collect()
            })
        })
        .collect()
}

pub fn page_media_boxes(path: &Path) -> Vec<Option<Vec<i64>>> {
    page_rects(path, b"MediaBox")
}

/// `Rotate` stored directly on each page, if any.
pub fn page_rotations(path: &Path) -> Vec<Option<i64>> {
    let pdf = PdfBackend.open(path).unwrap();
    pdf.page_ids()
        .iter()
        .map(|&id| {
            let page = pdf.document().get_object(id).unwrap().as_dict().unwrap();
            page.get(b"Rotate").ok().and_then(|obj| obj.as_i64().ok())
        })
        .collect()
}
