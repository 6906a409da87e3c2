use std::path::{Path, PathBuf};

use clap::Parser;
use pdf_page_swap::{
    validate_request, write_atomic, DocumentBackend, PagedDocument, PdfBackend, PdfDocument, SubstituteError, SubstituteReport,
    SubstituteRequest,
};

/// Replace one page of a PDF with a page taken from another PDF.
#[derive(Debug, Parser)]
#[command(name = "pdfswap", version)]
struct Cli {
    /// PDF whose page is replaced
    base: PathBuf,
    /// PDF that supplies the replacement page
    substitute: PathBuf,
    /// Page of BASE to replace (first page is 1)
    target_page: usize,
    /// Page of SUBSTITUTE to use (first page is 1)
    replacement_page: usize,
    /// Where to write the result; overwritten if it exists
    output: PathBuf,
}

impl From<Cli> for SubstituteRequest {
    fn from(cli: Cli) -> Self {
        SubstituteRequest {
            base: cli.base,
            substitute: cli.substitute,
            target_page: cli.target_page,
            replacement_page: cli.replacement_page,
            output: cli.output,
        }
    }
}

/// Log the failed step and exit with the error's code.
fn fail(tool: &str, err: SubstituteError) -> ! {
    let mut event = serde_json::json!({
        "tool": tool,
        "error": err.label(),
        "message": err.to_string(),
        "error_code": err.exit_code()
    });
    // Range failures also name the document and its page count so the caller can retry.
    if let SubstituteError::OutOfRange { role, position, page_count } = &err {
        event["role"] = serde_json::json!(role);
        event["document"] = serde_json::json!(role.document());
        event["position"] = serde_json::json!(position);
        event["page_count"] = serde_json::json!(page_count);
    }
    eprintln!("{}", event);
    std::process::exit(err.exit_code());
}

fn open_logged(backend: &PdfBackend, role: &str, path: &Path) -> PdfDocument {
    match backend.open(path) {
        Ok(doc) => {
            eprintln!(
                "{}",
                serde_json::json!({
                    "tool": "open_document",
                    "role": role,
                    "file": path,
                    "pages": doc.page_count()
                })
            );
            doc
        }
        Err(e) => fail("open_document", e),
    }
}

fn main() {
    let request: SubstituteRequest = Cli::parse().into();
    let backend = PdfBackend;

    // 1) Open both documents, base first
    let base = open_logged(&backend, "base", &request.base);
    let substitute = open_logged(&backend, "substitute", &request.substitute);

    // 2) Validate positions and output path
    let pages = match validate_request(&request, base.page_count(), substitute.page_count()) {
        Ok(pages) => pages,
        Err(e) => fail("validate_request", e),
    };
    eprintln!(
        "{}",
        serde_json::json!({
            "tool": "validate_request",
            "status": "ok",
            "target_page": request.target_page,
            "replacement_page": request.replacement_page
        })
    );

    // 3) Assemble the output document in memory
    let bytes = match backend.assemble(&base, &substitute, &pages) {
        Ok(bytes) => bytes,
        Err(e) => fail("assemble", e),
    };
    eprintln!(
        "{}",
        serde_json::json!({
            "tool": "assemble",
            "pages": pages.len(),
            "bytes": bytes.len()
        })
    );

    // 4) Write atomically
    if let Err(e) = write_atomic(&request.output, &bytes) {
        fail("write_output", e);
    }
    let report = SubstituteReport::new(&request, base.page_count(), substitute.page_count(), &bytes);
    eprintln!(
        "{}",
        serde_json::json!({
            "tool": "write_output",
            "status": "ok",
            "report": report
        })
    );
    println!("PDF written to {}", report.output.display());
}
