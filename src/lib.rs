use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

pub mod pdf;

pub use pdf::{PdfBackend, PdfDocument};

/// Which of the two requested page positions a check refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageRole {
    /// Position in the base document that gets replaced.
    Target,
    /// Position in the substitute document that supplies the new page.
    Replacement,
}

impl PageRole {
    /// Name of the document the position is checked against.
    pub fn document(self) -> &'static str {
        match self {
            PageRole::Target => "base",
            PageRole::Replacement => "substitute",
        }
    }
}

impl fmt::Display for PageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageRole::Target => f.write_str("target page"),
            PageRole::Replacement => f.write_str("replacement page"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SubstituteError {
    #[error("DocumentLoad: {}: {reason}", .path.display())]
    DocumentLoad { path: PathBuf, reason: String },
    #[error("OutOfRange: {role} {position} is out of range, {} PDF has {page_count} pages", .role.document())]
    OutOfRange { role: PageRole, position: usize, page_count: usize },
    #[error("OutputAliasesInput: {} is also an input file", .path.display())]
    OutputAliasesInput { path: PathBuf },
    #[error("Assemble: {reason}")]
    Assemble { reason: String },
    #[error("Write: {}: {reason}", .path.display())]
    Write { path: PathBuf, reason: String },
}

impl SubstituteError {
    /// Short label used in log events, matching the message prefix.
    pub fn label(&self) -> &'static str {
        match self {
            SubstituteError::DocumentLoad { .. } => "DocumentLoad",
            SubstituteError::OutOfRange { .. } => "OutOfRange",
            SubstituteError::OutputAliasesInput { .. } => "OutputAliasesInput",
            SubstituteError::Assemble { .. } => "Assemble",
            SubstituteError::Write { .. } => "Write",
        }
    }

    /// Process exit code for the `pdfswap` binary. 2 is left to usage errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            SubstituteError::DocumentLoad { .. } => 1,
            SubstituteError::OutOfRange { .. } => 3,
            SubstituteError::OutputAliasesInput { .. } => 4,
            SubstituteError::Assemble { .. } => 5,
            SubstituteError::Write { .. } => 6,
        }
    }
}

/// A page of the output, addressed by 0-based index into one of the two inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRef {
    Base(usize),
    Substitute(usize),
}

/// Page-addressable view of a loaded document.
pub trait PagedDocument {
    fn page_count(&self) -> usize;
}

/// Loads documents and serializes page sequences drawn from them.
///
/// `substitute_with` only talks to the container format through this trait,
/// so the substitution itself can run against in-memory documents.
pub trait DocumentBackend {
    type Document: PagedDocument;

    /// Open the document at `path`. Failures are `SubstituteError::DocumentLoad`.
    fn open(&self, path: &Path) -> Result<Self::Document, SubstituteError>;

    /// Serialize `pages`, in order, into a new container document.
    fn assemble(
        &self,
        base: &Self::Document,
        substitute: &Self::Document,
        pages: &[PageRef],
    ) -> Result<Vec<u8>, SubstituteError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubstituteRequest {
    pub base: PathBuf,
    pub substitute: PathBuf,
    /// 1-based page of `base` to replace.
    pub target_page: usize,
    /// 1-based page of `substitute` to put in its place.
    pub replacement_page: usize,
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubstituteReport {
    pub output: PathBuf,
    pub base_page_count: usize,
    pub substitute_page_count: usize,
    pub target_page: usize,
    pub replacement_page: usize,
    pub bytes: usize,
    pub sha256: String,
}

impl SubstituteReport {
    /// Summary of a finished substitution that wrote `bytes` to `request.output`.
    pub fn new(request: &SubstituteRequest, base_page_count: usize, substitute_page_count: usize, bytes: &[u8]) -> Self {
        SubstituteReport {
            output: request.output.clone(),
            base_page_count,
            substitute_page_count,
            target_page: request.target_page,
            replacement_page: request.replacement_page,
            bytes: bytes.len(),
            sha256: sha256_hex(bytes),
        }
    }
}

/// Convert a 1-based page position to a 0-based index into a document of
/// `page_count` pages.
pub fn page_index(role: PageRole, position: usize, page_count: usize) -> Result<usize, SubstituteError> {
    if position < 1 || position > page_count {
        return Err(SubstituteError::OutOfRange { role, position, page_count });
    }
    Ok(position - 1)
}

/// Output page sequence: every base page in order, except `target_index`
/// which comes from the substitute document.
pub fn plan_pages(base_page_count: usize, target_index: usize, replacement_index: usize) -> Vec<PageRef> {
    let mut pages = Vec::with_capacity(base_page_count);
    for i in 0..base_page_count {
        if i == target_index {
            pages.push(PageRef::Substitute(replacement_index));
        } else {
            pages.push(PageRef::Base(i));
        }
    }
    pages
}

/// Replace one page of a PDF with a page taken from another PDF.
///
/// Pages are numbered from 1. Both inputs are left untouched; `output` is
/// created or overwritten.
pub fn substitute(
    base: &Path,
    substitute: &Path,
    target_page: usize,
    replacement_page: usize,
    output: &Path,
) -> Result<SubstituteReport, SubstituteError> {
    let request = SubstituteRequest {
        base: base.to_path_buf(),
        substitute: substitute.to_path_buf(),
        target_page,
        replacement_page,
        output: output.to_path_buf(),
    };
    substitute_with(&PdfBackend, &request)
}

/// Run a substitution against any document backend.
/// - Loads base, then substitute.
/// - Validates the target position, then the replacement position.
/// - Nothing is written unless every check passes.
pub fn substitute_with<B: DocumentBackend>(
    backend: &B,
    request: &SubstituteRequest,
) -> Result<SubstituteReport, SubstituteError> {
    let base = backend.open(&request.base)?;
    let substitute = backend.open(&request.substitute)?;

    let pages = validate_request(request, base.page_count(), substitute.page_count())?;
    let bytes = backend.assemble(&base, &substitute, &pages)?;
    write_atomic(&request.output, &bytes)?;

    Ok(SubstituteReport::new(request, base.page_count(), substitute.page_count(), &bytes))
}

/// Check a request against the page counts of its loaded documents and
/// return the output page sequence.
/// - Target position first, then replacement position.
/// - Then the output path must not resolve to either input.
pub fn validate_request(
    request: &SubstituteRequest,
    base_page_count: usize,
    substitute_page_count: usize,
) -> Result<Vec<PageRef>, SubstituteError> {
    let target_index = page_index(PageRole::Target, request.target_page, base_page_count)?;
    let replacement_index = page_index(PageRole::Replacement, request.replacement_page, substitute_page_count)?;
    ensure_output_is_not_input(request)?;
    Ok(plan_pages(base_page_count, target_index, replacement_index))
}

/// Reject an output path that resolves to one of the input files.
/// An output that does not exist yet cannot alias an existing input.
pub fn ensure_output_is_not_input(request: &SubstituteRequest) -> Result<(), SubstituteError> {
    let output = match std::fs::canonicalize(&request.output) {
        Ok(p) => p,
        Err(_) => return Ok(()),
    };
    for input in [&request.base, &request.substitute] {
        if std::fs::canonicalize(input).map(|p| p == output).unwrap_or(false) {
            return Err(SubstituteError::OutputAliasesInput { path: request.output.clone() });
        }
    }
    Ok(())
}

/// Write `bytes` to `path` through a temp file in the same directory, then
/// rename it into place. On failure `path` keeps its previous content.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SubstituteError> {
    let write_err = |reason: String| SubstituteError::Write { path: path.to_path_buf(), reason };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| write_err(e.to_string()))?;
    tmp.write_all(bytes).map_err(|e| write_err(e.to_string()))?;
    tmp.as_file().sync_all().map_err(|e| write_err(e.to_string()))?;
    tmp.persist(path).map_err(|e| write_err(e.error.to_string()))?;
    Ok(())
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
