//! Office format collaborators for docfill.
//!
//! - [`docx::DocxExtractor`] reads body text out of `.docx` templates (zip + quick-xml)
//! - [`docx::DocxRenderer`] writes filled text back out as a minimal `.docx`
//! - [`sheet::SpreadsheetParser`] turns `.xlsx`/`.xls`/`.ods`/`.csv` rows into records
//! - [`convert::LibreOfficeConverter`] converts rendered documents to PDF via `soffice`
//!
//! **Prerequisites**: `soffice` (LibreOffice) for PDF conversion only.

pub mod convert;
pub mod docx;
pub mod sheet;

use std::sync::Arc;

use docfill_core::backend::{Converter, Passthrough};
use docfill_core::config::EngineConfig;
use docfill_core::pipeline::Pipeline;

pub use convert::LibreOfficeConverter;
pub use docx::{DocxExtractor, DocxRenderer};
pub use sheet::SpreadsheetParser;

/// Build a pipeline wired with the Office collaborators.
///
/// With `convert_to_pdf` set, single-record outputs go through LibreOffice;
/// otherwise the rendered `.docx` is delivered as is.
pub fn office_pipeline(config: EngineConfig, convert_to_pdf: bool) -> Pipeline {
    let converter: Arc<dyn Converter> = if convert_to_pdf {
        Arc::new(LibreOfficeConverter::new(&config))
    } else {
        Arc::new(Passthrough::for_renderer(&DocxRenderer))
    };

    Pipeline::new(
        config,
        Arc::new(SpreadsheetParser),
        Arc::new(DocxRenderer),
        converter,
    )
    .with_extractor(Arc::new(DocxExtractor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use docfill_core::backend::DocumentRenderer;
    use docfill_core::record::Record;
    use std::io::{Cursor, Read};

    fn pipeline_in(dir: &std::path::Path) -> Pipeline {
        office_pipeline(
            EngineConfig {
                storage_dir: dir.join("templates"),
                scratch_dir: dir.join("scratch"),
                ..EngineConfig::default()
            },
            false,
        )
    }

    fn template_docx() -> Vec<u8> {
        DocxRenderer
            .render("Hello {{ name }}, balance {{balance}}.")
            .unwrap()
    }

    #[tokio::test]
    async fn test_docx_batch_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_in(dir.path());

        let extraction = pipeline.extract(&template_docx(), "docx").unwrap();
        assert_eq!(extraction.placeholders, vec!["name", "balance"]);

        let delivery = pipeline
            .generate_batch(
                &extraction.template_ref,
                b"name,balance\nAnn,10\n,0\nBo!,5\n",
                "csv",
            )
            .await
            .unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(delivery.bytes)).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names, ["Ann.docx", "Bo_.docx"]);

        let mut inner = Vec::new();
        archive
            .by_name("Ann.docx")
            .unwrap()
            .read_to_end(&mut inner)
            .unwrap();
        let text = docfill_core::backend::TextExtractor::extract(&DocxExtractor, &inner).unwrap();
        assert_eq!(text.trim(), "Hello Ann, balance 10.");
    }

    #[tokio::test]
    async fn test_docx_single_without_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_in(dir.path());
        let extraction = pipeline.extract(&template_docx(), "docx").unwrap();

        let record: Record = [("name", "Ann"), ("balance", "10")].into_iter().collect();
        let delivery = pipeline
            .generate(&extraction.template_ref, record)
            .await
            .unwrap();
        assert_eq!(delivery.file_name, "filled.docx");
        assert_eq!(delivery.content_type, docx::DOCX_CONTENT_TYPE);
    }
}
