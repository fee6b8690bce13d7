//! Request orchestration.
//!
//! Every request runs through a small state machine:
//!
//! ```text
//! extract:  Uploaded -> Extracted
//! single:   Extracted -> Filled -> Substituted -> Converted -> Delivered
//! batch:    Extracted -> Expanded -> Packaged -> Delivered
//! ```
//!
//! `Extracted` is where stored templates live: a generate request starts there by
//! loading the template by reference, never by re-extracting it. Any stage can move
//! to `Failed`, which is terminal. Everything a request builds (filled text, artifacts,
//! the container, conversion scratch space) is owned by that request's call frame, so
//! failing drops it and nothing half-built is ever returned.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::artifacts::{Delivery, GeneratedArtifact};
use crate::backend::{
    Converter, DocumentRenderer, PlainTextExtractor, TabularParser, TextExtractor,
};
use crate::batch::BatchExpander;
use crate::config::EngineConfig;
use crate::error::{DocfillError, Result};
use crate::package::{ArtifactPackager, CONTAINER_CONTENT_TYPE};
use crate::record::Record;
use crate::scanner;
use crate::store::TemplateStore;
use crate::substitute::TokenTable;

/// File stem used for single-record outputs.
const SINGLE_OUTPUT_STEM: &str = "filled";
/// File name of batch containers.
const BATCH_OUTPUT_NAME: &str = "documents.zip";

/// Which workflow a request follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Extract,
    Single,
    Batch,
}

/// Lifecycle stage of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Uploaded,
    Extracted,
    Filled,
    Substituted,
    Converted,
    Expanded,
    Packaged,
    Delivered,
    Failed,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Delivered | Stage::Failed)
    }

    /// Whether `flow` allows moving from `self` to `next`.
    pub fn can_advance(self, next: Stage, flow: Flow) -> bool {
        use Stage::*;
        if next == Failed {
            return !self.is_terminal();
        }
        match flow {
            Flow::Extract => matches!((self, next), (Uploaded, Extracted)),
            Flow::Single => matches!(
                (self, next),
                (Extracted, Filled)
                    | (Filled, Substituted)
                    | (Substituted, Converted)
                    | (Converted, Delivered)
            ),
            Flow::Batch => matches!(
                (self, next),
                (Extracted, Expanded) | (Expanded, Packaged) | (Packaged, Delivered)
            ),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Bookkeeping for one request: id, flow, and current stage.
#[derive(Debug)]
pub struct RequestRun {
    id: String,
    flow: Flow,
    stage: Stage,
}

impl RequestRun {
    pub fn start(flow: Flow) -> Self {
        let stage = match flow {
            Flow::Extract => Stage::Uploaded,
            Flow::Single | Flow::Batch => Stage::Extracted,
        };
        let id = Uuid::new_v4().simple().to_string();
        tracing::debug!(request = %id, ?flow, %stage, "request started");
        Self { id, flow, stage }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn advance(&mut self, next: Stage) -> Result<()> {
        if !self.stage.can_advance(next, self.flow) {
            return Err(DocfillError::InvalidTransition {
                from: self.stage.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!(request = %self.id, from = %self.stage, to = %next, "stage transition");
        self.stage = next;
        Ok(())
    }

    /// Record the outcome of the request; any error moves it to `Failed`.
    fn finish<T>(&mut self, result: &Result<T>) {
        match result {
            Ok(_) => tracing::info!(request = %self.id, flow = ?self.flow, stage = %self.stage, "request completed"),
            Err(err) => {
                let from = self.stage;
                if !from.is_terminal() {
                    self.stage = Stage::Failed;
                }
                tracing::warn!(request = %self.id, flow = ?self.flow, %from, error = %err, "request failed");
            }
        }
    }
}

/// Result of the extract operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extraction {
    /// Placeholder names in document order, duplicates included.
    pub placeholders: Vec<String>,
    /// Reference for subsequent generate calls.
    pub template_ref: String,
}

/// Replace non-breaking spaces and trim, so scanning and filling see the same text.
pub fn normalize_extracted(text: &str) -> String {
    text.replace('\u{a0}', " ").trim().to_string()
}

fn normalize_format(format: &str) -> String {
    format.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Sequences extraction, substitution, expansion, packaging, and conversion.
pub struct Pipeline {
    config: EngineConfig,
    store: TemplateStore,
    extractors: Vec<Arc<dyn TextExtractor>>,
    parser: Arc<dyn TabularParser>,
    renderer: Arc<dyn DocumentRenderer>,
    converter: Arc<dyn Converter>,
    packager: ArtifactPackager,
}

impl Pipeline {
    /// Build a pipeline. Plain-text templates are always accepted; register more
    /// template formats with [`Pipeline::with_extractor`].
    pub fn new(
        config: EngineConfig,
        parser: Arc<dyn TabularParser>,
        renderer: Arc<dyn DocumentRenderer>,
        converter: Arc<dyn Converter>,
    ) -> Self {
        let store = TemplateStore::new(&config);
        Self {
            config,
            store,
            extractors: vec![Arc::new(PlainTextExtractor)],
            parser,
            renderer,
            converter,
            packager: ArtifactPackager::new(),
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractors.push(extractor);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    pub fn converter(&self) -> &dyn Converter {
        self.converter.as_ref()
    }

    /// Template formats accepted by [`Pipeline::extract`].
    pub fn template_formats(&self) -> Vec<&'static str> {
        self.extractors.iter().map(|e| e.format()).collect()
    }

    /// Extract: store an uploaded template and report its placeholders.
    pub fn extract(&self, bytes: &[u8], format: &str) -> Result<Extraction> {
        let mut run = RequestRun::start(Flow::Extract);
        let result = self.extract_inner(&mut run, bytes, format);
        run.finish(&result);
        result
    }

    fn extract_inner(&self, run: &mut RequestRun, bytes: &[u8], format: &str) -> Result<Extraction> {
        let format = normalize_format(format);
        let extractor = self
            .extractors
            .iter()
            .find(|e| e.format() == format)
            .ok_or_else(|| DocfillError::UnsupportedFormat {
                format: format.clone(),
                supported: self.template_formats().join(", "),
            })?;
        if bytes.is_empty() {
            return Err(DocfillError::InputValidation("template file is empty".into()));
        }

        let text = normalize_extracted(&extractor.extract(bytes)?);
        let placeholders = scanner::scan(&text);
        let template = self.store.put(bytes, &format, &text)?;
        run.advance(Stage::Extracted)?;

        tracing::info!(
            template = %template.reference,
            placeholders = placeholders.len(),
            "extracted template"
        );
        Ok(Extraction {
            placeholders,
            template_ref: template.reference,
        })
    }

    /// Distinct placeholder names of a stored template, in first-appearance order.
    pub fn placeholders(&self, reference: &str) -> Result<Vec<String>> {
        require_reference(reference)?;
        let template = self.store.get(reference)?;
        Ok(scanner::distinct(&template.text))
    }

    /// Generate (single): fill one record, render, convert, deliver.
    pub async fn generate(&self, reference: &str, record: Record) -> Result<Delivery> {
        let mut run = RequestRun::start(Flow::Single);
        let result = self.generate_inner(&mut run, reference, record).await;
        run.finish(&result);
        result
    }

    async fn generate_inner(
        &self,
        run: &mut RequestRun,
        reference: &str,
        record: Record,
    ) -> Result<Delivery> {
        require_reference(reference)?;
        let template = self.store.get(reference)?;

        let table = TokenTable::new(template.text);
        let missing = table.missing(&record);
        if !missing.is_empty() {
            tracing::debug!(request = %run.id(), ?missing, "placeholders left unfilled");
        }
        run.advance(Stage::Filled)?;

        let filled = table.render(&record);
        let artifact = GeneratedArtifact::new(
            format!("{SINGLE_OUTPUT_STEM}.{}", self.renderer.extension()),
            self.renderer.render(&filled)?,
        );
        run.advance(Stage::Substituted)?;

        let timeout = self.config.conversion_timeout();
        let converted =
            match tokio::time::timeout(timeout, self.converter.convert(artifact)).await {
                Ok(Ok(converted)) => converted,
                Ok(Err(DocfillError::Conversion(msg))) => return Err(DocfillError::Conversion(msg)),
                Ok(Err(e)) => {
                    return Err(DocfillError::Conversion(format!(
                        "{} converter: {e}",
                        self.converter.name()
                    )))
                }
                Err(_) => {
                    return Err(DocfillError::Conversion(format!(
                        "{} converter timed out after {}s",
                        self.converter.name(),
                        timeout.as_secs()
                    )))
                }
            };
        run.advance(Stage::Converted)?;

        run.advance(Stage::Delivered)?;
        Ok(Delivery {
            request_id: run.id().to_string(),
            file_name: converted.name,
            content_type: self.converter.content_type(),
            bytes: converted.content,
        })
    }

    /// Generate (batch): parse tabular data, expand every usable row, package.
    pub async fn generate_batch(
        &self,
        reference: &str,
        data: &[u8],
        format: &str,
    ) -> Result<Delivery> {
        let mut run = RequestRun::start(Flow::Batch);
        let result = self.generate_batch_inner(&mut run, reference, data, format).await;
        run.finish(&result);
        result
    }

    async fn generate_batch_inner(
        &self,
        run: &mut RequestRun,
        reference: &str,
        data: &[u8],
        format: &str,
    ) -> Result<Delivery> {
        let format = normalize_format(format);
        if !self.parser.supports(&format) {
            return Err(DocfillError::UnsupportedFormat {
                format,
                supported: self.parser.formats().join(", "),
            });
        }
        require_reference(reference)?;
        if data.is_empty() {
            return Err(DocfillError::InputValidation("tabular data is empty".into()));
        }
        let template = self.store.get(reference)?;

        let rows = self.parser.parse(data, &format)?;
        tracing::debug!(request = %run.id(), rows = rows.len(), "parsed tabular data");

        let expander = BatchExpander::new(&self.config, Arc::clone(&self.renderer));
        let artifacts = expander.expand(&template, rows).await?;
        run.advance(Stage::Expanded)?;

        let container = self.packager.pack(&artifacts)?;
        drop(artifacts);
        run.advance(Stage::Packaged)?;

        tracing::info!(request = %run.id(), entries = container.len(), "batch packaged");
        run.advance(Stage::Delivered)?;
        Ok(Delivery {
            request_id: run.id().to_string(),
            file_name: BATCH_OUTPUT_NAME.to_string(),
            content_type: CONTAINER_CONTENT_TYPE,
            bytes: container.into_bytes(),
        })
    }
}

fn require_reference(reference: &str) -> Result<()> {
    if reference.trim().is_empty() {
        return Err(DocfillError::InputValidation("missing template reference".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Passthrough, PlainTextRenderer};
    use async_trait::async_trait;
    use std::io::{Cursor, Read};
    use std::time::Duration;

    /// `name,balance` lines, first line is the header.
    struct LineParser;

    impl TabularParser for LineParser {
        fn formats(&self) -> &'static [&'static str] {
            &["csv"]
        }

        fn parse(&self, bytes: &[u8], _format: &str) -> Result<Vec<Record>> {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| DocfillError::TabularParse(e.to_string()))?;
            let mut lines = text.lines();
            let header: Vec<&str> = lines.next().unwrap_or_default().split(',').collect();
            Ok(lines
                .map(|line| header.iter().copied().zip(line.split(',')).collect())
                .collect())
        }
    }

    struct FailingConverter;

    #[async_trait]
    impl Converter for FailingConverter {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn target_extension(&self) -> &'static str {
            "pdf"
        }
        fn content_type(&self) -> &'static str {
            "application/pdf"
        }
        async fn convert(&self, _artifact: GeneratedArtifact) -> Result<GeneratedArtifact> {
            Err(DocfillError::Conversion("engine crashed".into()))
        }
    }

    struct SlowConverter;

    #[async_trait]
    impl Converter for SlowConverter {
        fn name(&self) -> &'static str {
            "slow"
        }
        fn target_extension(&self) -> &'static str {
            "pdf"
        }
        fn content_type(&self) -> &'static str {
            "application/pdf"
        }
        async fn convert(&self, artifact: GeneratedArtifact) -> Result<GeneratedArtifact> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(artifact)
        }
    }

    fn pipeline_with(dir: &std::path::Path, converter: Arc<dyn Converter>) -> Pipeline {
        let config = EngineConfig {
            storage_dir: dir.join("templates"),
            scratch_dir: dir.join("scratch"),
            conversion_timeout_secs: 1,
            ..EngineConfig::default()
        };
        Pipeline::new(
            config,
            Arc::new(LineParser),
            Arc::new(PlainTextRenderer),
            converter,
        )
    }

    fn pipeline(dir: &std::path::Path) -> Pipeline {
        pipeline_with(dir, Arc::new(Passthrough::for_renderer(&PlainTextRenderer)))
    }

    const TEMPLATE: &[u8] = "\u{a0} Hello {{ name }}, balance {{balance}}.\n".as_bytes();

    #[test]
    fn test_stage_transitions() {
        assert!(Stage::Uploaded.can_advance(Stage::Extracted, Flow::Extract));
        assert!(Stage::Extracted.can_advance(Stage::Filled, Flow::Single));
        assert!(Stage::Extracted.can_advance(Stage::Expanded, Flow::Batch));
        assert!(!Stage::Extracted.can_advance(Stage::Expanded, Flow::Single));
        assert!(!Stage::Filled.can_advance(Stage::Converted, Flow::Single));
        assert!(Stage::Packaged.can_advance(Stage::Failed, Flow::Batch));
        assert!(!Stage::Failed.can_advance(Stage::Delivered, Flow::Batch));
        assert!(!Stage::Delivered.can_advance(Stage::Failed, Flow::Single));
    }

    #[test]
    fn test_request_run_rejects_skipped_stage() {
        let mut run = RequestRun::start(Flow::Single);
        assert_eq!(run.stage(), Stage::Extracted);
        let err = run.advance(Stage::Converted).unwrap_err();
        assert!(matches!(err, DocfillError::InvalidTransition { .. }));
        run.finish::<()>(&Err(err));
        assert_eq!(run.stage(), Stage::Failed);
    }

    #[test]
    fn test_extract_scans_normalized_text() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path());
        let extraction = p.extract(TEMPLATE, ".TXT").unwrap();
        assert_eq!(extraction.placeholders, vec!["name", "balance"]);
        let stored = p.store().get(&extraction.template_ref).unwrap();
        assert_eq!(stored.text, "Hello {{ name }}, balance {{balance}}.");
    }

    #[test]
    fn test_extract_unsupported_format() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path());
        let result = p.extract(b"%PDF-1.7", "pdf");
        assert!(matches!(result, Err(DocfillError::UnsupportedFormat { .. })));
        assert!(p.store().list().unwrap().is_empty());
    }

    #[test]
    fn test_extract_empty_upload() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path());
        assert!(matches!(
            p.extract(b"", "txt"),
            Err(DocfillError::InputValidation(_))
        ));
    }

    #[test]
    fn test_extraction_serializes_camel_case() {
        let extraction = Extraction {
            placeholders: vec!["name".into()],
            template_ref: "abc".into(),
        };
        let json = serde_json::to_value(&extraction).unwrap();
        assert_eq!(json["templateRef"], "abc");
    }

    #[test]
    fn test_placeholders_are_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path());
        let extraction = p.extract(b"{{b}} {{a}} {{ b }}", "txt").unwrap();
        assert_eq!(extraction.placeholders, vec!["b", "a", "b"]);
        assert_eq!(
            p.placeholders(&extraction.template_ref).unwrap(),
            vec!["b", "a"]
        );
    }

    #[tokio::test]
    async fn test_generate_single() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path());
        let extraction = p.extract(TEMPLATE, "txt").unwrap();
        let record: Record = [("name", "Ann"), ("balance", "10")].into_iter().collect();

        let delivery = p.generate(&extraction.template_ref, record).await.unwrap();
        assert_eq!(delivery.file_name, "filled.txt");
        assert_eq!(delivery.bytes, b"Hello Ann, balance 10.");
    }

    #[tokio::test]
    async fn test_generate_reuses_template_reference() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path());
        let extraction = p.extract(TEMPLATE, "txt").unwrap();

        let first = p
            .generate(&extraction.template_ref, [("name", "Ann")].into_iter().collect())
            .await
            .unwrap();
        let second = p
            .generate(&extraction.template_ref, [("name", "Bo")].into_iter().collect())
            .await
            .unwrap();
        assert_eq!(first.bytes, b"Hello Ann, balance {{balance}}.");
        assert_eq!(second.bytes, b"Hello Bo, balance {{balance}}.");
        assert_ne!(first.request_id, second.request_id);
    }

    #[tokio::test]
    async fn test_generate_unknown_template() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path());
        let result = p
            .generate("0123456789abcdef0123456789abcdef", Record::new())
            .await;
        assert!(matches!(result, Err(DocfillError::TemplateNotFound(_))));
    }

    #[tokio::test]
    async fn test_generate_missing_reference() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path());
        let result = p.generate("  ", Record::new()).await;
        assert!(matches!(result, Err(DocfillError::InputValidation(_))));
    }

    #[tokio::test]
    async fn test_generate_conversion_failure() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline_with(dir.path(), Arc::new(FailingConverter));
        let extraction = p.extract(TEMPLATE, "txt").unwrap();
        let result = p.generate(&extraction.template_ref, Record::new()).await;
        assert!(matches!(result, Err(DocfillError::Conversion(msg)) if msg == "engine crashed"));
    }

    #[tokio::test]
    async fn test_generate_conversion_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline_with(dir.path(), Arc::new(SlowConverter));
        let extraction = p.extract(TEMPLATE, "txt").unwrap();
        let result = p.generate(&extraction.template_ref, Record::new()).await;
        assert!(matches!(result, Err(DocfillError::Conversion(msg)) if msg.contains("timed out")));
    }

    #[tokio::test]
    async fn test_generate_batch() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path());
        let extraction = p.extract(TEMPLATE, "txt").unwrap();
        let data = b"name,balance\nAnn,10\n,0\nBo!,5\n";

        let delivery = p
            .generate_batch(&extraction.template_ref, data, "csv")
            .await
            .unwrap();
        assert_eq!(delivery.content_type, "application/zip");

        let mut archive = zip::ZipArchive::new(Cursor::new(delivery.bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        let mut names = Vec::new();
        for i in 0..archive.len() {
            names.push(archive.by_index(i).unwrap().name().to_string());
        }
        assert_eq!(names, ["Ann.txt", "Bo_.txt"]);

        let mut body = String::new();
        archive
            .by_name("Bo_.txt")
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "Hello Bo!, balance 5.");
    }

    #[tokio::test]
    async fn test_generate_batch_no_valid_rows() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path());
        let extraction = p.extract(TEMPLATE, "txt").unwrap();
        let result = p
            .generate_batch(&extraction.template_ref, b"name,balance\n,1\n ,2\n", "csv")
            .await;
        assert!(matches!(result, Err(DocfillError::NoValidRecords { rows: 2, .. })));
    }

    #[tokio::test]
    async fn test_generate_batch_rejects_format_before_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path());
        let result = p.generate_batch("not-a-ref", b"x", "numbers").await;
        assert!(matches!(result, Err(DocfillError::UnsupportedFormat { .. })));
    }
}
