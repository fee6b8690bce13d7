//! Batch expansion: one template, many records, one artifact per usable row.
//!
//! Rows whose naming field is missing or blank are skipped silently. Only a batch in
//! which *every* row is skipped is an error ([`DocfillError::NoValidRecords`]).
//!
//! Surviving rows are filled concurrently (bounded by
//! [`EngineConfig::max_concurrency`]) against a single shared [`TokenTable`]. Each
//! task reports its slot index, and the expander waits for all of them before
//! returning, so the artifact sequence always follows input row order no matter
//! which task finishes first.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::artifacts::GeneratedArtifact;
use crate::backend::DocumentRenderer;
use crate::config::EngineConfig;
use crate::error::{DocfillError, Result};
use crate::record::Record;
use crate::store::Template;
use crate::substitute::TokenTable;

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_name(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Hands out unique file names within one container.
///
/// The first `Ann` becomes `Ann.docx`; later ones become `Ann_2.docx`, `Ann_3.docx`.
#[derive(Debug, Default)]
struct NameAllocator {
    taken: HashSet<String>,
}

impl NameAllocator {
    fn allocate(&mut self, base: &str, extension: &str) -> String {
        let mut candidate = format!("{base}.{extension}");
        let mut n = 2;
        while self.taken.contains(&candidate) {
            candidate = format!("{base}_{n}.{extension}");
            n += 1;
        }
        self.taken.insert(candidate.clone());
        candidate
    }
}

/// Fills one template once per record.
pub struct BatchExpander {
    naming_field: String,
    concurrency: usize,
    renderer: Arc<dyn DocumentRenderer>,
}

impl BatchExpander {
    pub fn new(config: &EngineConfig, renderer: Arc<dyn DocumentRenderer>) -> Self {
        Self {
            naming_field: config.naming_field.clone(),
            concurrency: config.concurrency(),
            renderer,
        }
    }

    /// Expand `template` against `rows`, returning artifacts in row order.
    pub async fn expand(
        &self,
        template: &Template,
        rows: Vec<Record>,
    ) -> Result<Vec<GeneratedArtifact>> {
        let total = rows.len();
        let extension = self.renderer.extension();
        let mut names = NameAllocator::default();
        let mut jobs = Vec::with_capacity(total);

        for (index, record) in rows.into_iter().enumerate() {
            let Some(raw) = record
                .get(&self.naming_field)
                .filter(|v| !v.trim().is_empty())
            else {
                tracing::debug!(row = index + 1, field = %self.naming_field, "skipping row with blank naming field");
                continue;
            };
            let file_name = names.allocate(&sanitize_name(raw), extension);
            jobs.push((file_name, record));
        }

        if jobs.is_empty() {
            return Err(DocfillError::NoValidRecords {
                rows: total,
                field: self.naming_field.clone(),
            });
        }
        if jobs.len() < total {
            tracing::info!(
                kept = jobs.len(),
                skipped = total - jobs.len(),
                "filtered rows with blank naming field"
            );
        }

        let table = Arc::new(TokenTable::new(template.text.as_str()));
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let count = jobs.len();

        for (slot, (file_name, record)) in jobs.into_iter().enumerate() {
            let table = Arc::clone(&table);
            let renderer = Arc::clone(&self.renderer);
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| DocfillError::Other(e.into()))?;
                let filled = table.render(&record);
                let content = renderer.render(&filled)?;
                Ok::<_, DocfillError>((slot, GeneratedArtifact::new(file_name, content)))
            });
        }

        // Barrier: every task must finish before anything is emitted. Returning early
        // on an error drops the JoinSet, which aborts the tasks still running.
        let mut slots: Vec<Option<GeneratedArtifact>> = (0..count).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            let (slot, artifact) = joined
                .map_err(|e| DocfillError::Other(anyhow::anyhow!("row task failed: {e}")))??;
            slots[slot] = Some(artifact);
        }

        Ok(slots.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::PlainTextRenderer;

    struct DocxLike;

    impl DocumentRenderer for DocxLike {
        fn extension(&self) -> &'static str {
            "docx"
        }

        fn content_type(&self) -> &'static str {
            "application/octet-stream"
        }

        fn render(&self, text: &str) -> Result<Vec<u8>> {
            Ok(text.as_bytes().to_vec())
        }
    }

    struct Failing;

    impl DocumentRenderer for Failing {
        fn extension(&self) -> &'static str {
            "bin"
        }

        fn content_type(&self) -> &'static str {
            "application/octet-stream"
        }

        fn render(&self, _text: &str) -> Result<Vec<u8>> {
            Err(DocfillError::Render("boom".into()))
        }
    }

    fn template(text: &str) -> Template {
        Template {
            reference: "0123456789abcdef0123456789abcdef".into(),
            text: text.into(),
        }
    }

    fn row(pairs: &[(&str, &str)]) -> Record {
        pairs.iter().copied().collect()
    }

    fn expander(renderer: Arc<dyn DocumentRenderer>, concurrency: usize) -> BatchExpander {
        let config = EngineConfig {
            max_concurrency: concurrency,
            ..EngineConfig::default()
        };
        BatchExpander::new(&config, renderer)
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("Bo!"), "Bo_");
        assert_eq!(sanitize_name("Ann-Marie_2"), "Ann-Marie_2");
        assert_eq!(sanitize_name("a b/c.d"), "a_b_c_d");
        assert_eq!(sanitize_name("Åse"), "_se");
        assert_eq!(sanitize_name("../etc"), "___etc");
    }

    #[tokio::test]
    async fn test_expand_filters_and_names() {
        let rows = vec![
            row(&[("name", "Ann"), ("balance", "10")]),
            row(&[("name", ""), ("balance", "0")]),
            row(&[("name", "Bo!"), ("balance", "5")]),
        ];
        let artifacts = expander(Arc::new(DocxLike), 4)
            .expand(&template("Hello {{ name }}, balance {{balance}}."), rows)
            .await
            .unwrap();

        let names: Vec<_> = artifacts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["Ann.docx", "Bo_.docx"]);
        assert_eq!(artifacts[0].content, b"Hello Ann, balance 10.");
        assert_eq!(artifacts[1].content, b"Hello Bo!, balance 5.");
    }

    #[tokio::test]
    async fn test_expand_all_blank_fails() {
        let rows = vec![
            row(&[("name", "  "), ("balance", "1")]),
            row(&[("balance", "2")]),
        ];
        let result = expander(Arc::new(PlainTextRenderer), 2)
            .expand(&template("{{balance}}"), rows)
            .await;
        assert!(matches!(
            result,
            Err(DocfillError::NoValidRecords { rows: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_expand_empty_batch_fails() {
        let result = expander(Arc::new(PlainTextRenderer), 2)
            .expand(&template("{{name}}"), Vec::new())
            .await;
        assert!(matches!(
            result,
            Err(DocfillError::NoValidRecords { rows: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_expand_preserves_order_under_concurrency() {
        let rows: Vec<_> = (0..200)
            .map(|i| {
                let name = format!("row{i:03}");
                let n = i.to_string();
                row(&[("name", name.as_str()), ("n", n.as_str())])
            })
            .collect();
        let artifacts = expander(Arc::new(PlainTextRenderer), 16)
            .expand(&template("#{{n}}"), rows)
            .await
            .unwrap();

        assert_eq!(artifacts.len(), 200);
        for (i, artifact) in artifacts.iter().enumerate() {
            assert_eq!(artifact.name, format!("row{i:03}.txt"));
            assert_eq!(artifact.content, format!("#{i}").into_bytes());
        }
    }

    #[tokio::test]
    async fn test_expand_never_exceeds_row_count() {
        let rows = vec![
            row(&[("name", "a")]),
            row(&[("other", "x")]),
            row(&[("name", "b")]),
        ];
        let total = rows.len();
        let artifacts = expander(Arc::new(PlainTextRenderer), 1)
            .expand(&template("{{name}}"), rows)
            .await
            .unwrap();
        assert!(artifacts.len() <= total);
        assert!(artifacts.iter().all(|a| !a.stem().trim().is_empty()));
    }

    #[tokio::test]
    async fn test_expand_disambiguates_duplicate_names() {
        let rows = vec![
            row(&[("name", "Ann")]),
            row(&[("name", "Ann")]),
            row(&[("name", "Ann?")]),
            row(&[("name", "Ann_2")]),
        ];
        let artifacts = expander(Arc::new(PlainTextRenderer), 2)
            .expand(&template("{{name}}"), rows)
            .await
            .unwrap();
        let names: Vec<_> = artifacts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["Ann.txt", "Ann_2.txt", "Ann_.txt", "Ann_2_2.txt"]);
    }

    #[tokio::test]
    async fn test_expand_custom_naming_field() {
        let config = EngineConfig {
            naming_field: "client".into(),
            ..EngineConfig::default()
        };
        let artifacts = BatchExpander::new(&config, Arc::new(PlainTextRenderer))
            .expand(
                &template("{{client}}"),
                vec![row(&[("client", "Acme Inc.")]), row(&[("name", "ignored")])],
            )
            .await
            .unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].name, "Acme_Inc_.txt");
    }

    #[tokio::test]
    async fn test_expand_render_failure_aborts_batch() {
        let result = expander(Arc::new(Failing), 2)
            .expand(&template("{{name}}"), vec![row(&[("name", "Ann")])])
            .await;
        assert!(matches!(result, Err(DocfillError::Render(_))));
    }
}
