//! Package assembly engine.
//!
//! Drains the work queue one content unit at a time: resolve the
//! repository, classify every listed file, copy admitted files into the
//! archive, then scan the content document for word-list, stimulus, and
//! tutorial references and feed them back into the queue. Per-unit
//! failures are logged as severe and the run moves on.

use std::time::Instant;

use anyhow::{anyhow, Context, Result};

use crate::adapters::{ArchiveSink, AttachmentRegistry, ItemBank, ItemBankError};
use crate::core::classifier::{AdmitReason, Classifier};
use crate::core::content_doc::{ContentDoc, DocRoot};
use crate::core::queue::WorkQueue;
use crate::core::rename::RenameRecord;
use crate::domain::{ContentId, ContentKind, ManifestGraph, ManifestNode, Role, EMPTY_MANIFEST};
use crate::progress::{format_elapsed, ProgressLog, Severity};

pub const MANIFEST_NAME: &str = "imsmanifest.xml";

#[derive(Debug, Clone)]
pub struct PackageOptions {
    /// Repository namespace the content projects live under.
    pub namespace: String,
    pub include_tutorials: bool,
    pub include_import_zip: bool,
    pub rename_glossary_audio: bool,
    pub include_manifest: bool,
    /// When set, only assets with this extension are written. The
    /// content document and metadata.xml always go in.
    pub file_type_filter: Option<String>,
}

impl Default for PackageOptions {
    fn default() -> Self {
        Self {
            namespace: "itemreviewapp".to_string(),
            include_tutorials: true,
            include_import_zip: false,
            rename_glossary_audio: false,
            include_manifest: true,
            file_type_filter: None,
        }
    }
}

/// Final counts reported after the queue drains.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageSummary {
    pub items: usize,
    pub word_lists: usize,
    pub stimuli: usize,
    pub tutorials: usize,
    pub errors: usize,
    pub elapsed_ms: u64,
    /// At least one admitted audio blob had a container format that
    /// disagrees with its extension; the caller should run the recode
    /// pass over the finished archive.
    pub recode_needed: bool,
}

/// Assembles one package from seed ids and the item bank.
pub struct PackageBuilder<B, R, S> {
    bank: B,
    registry: R,
    sink: S,
    options: PackageOptions,
    queue: WorkQueue,
    manifest: ManifestGraph,
    item_count: usize,
    wit_count: usize,
    stim_count: usize,
    tutorial_count: usize,
    recode_needed: bool,
}

impl<B, R, S> PackageBuilder<B, R, S>
where
    B: ItemBank,
    R: AttachmentRegistry,
    S: ArchiveSink,
{
    pub fn new(bank: B, registry: R, sink: S, options: PackageOptions) -> Self {
        Self {
            bank,
            registry,
            sink,
            options,
            queue: WorkQueue::new(),
            manifest: ManifestGraph::new(),
            item_count: 0,
            wit_count: 0,
            stim_count: 0,
            tutorial_count: 0,
            recode_needed: false,
        }
    }

    /// Seed one id. Returns false for a duplicate.
    pub fn add_id(&mut self, id: ContentId) -> bool {
        self.queue.enqueue(id)
    }

    /// Seed a batch of ids, returning how many were newly admitted.
    pub fn add_ids(&mut self, ids: impl IntoIterator<Item = ContentId>) -> usize {
        self.queue.load(ids)
    }

    /// Drain the queue, write the manifest, and close the archive.
    pub async fn produce(&mut self, log: &mut ProgressLog) -> Result<PackageSummary> {
        let start = Instant::now();

        while let Some(id) = self.queue.dequeue() {
            tracing::info!("{}", id);
            if let Err(e) = self.package_one(&id, log).await {
                match e.downcast_ref::<ItemBankError>() {
                    Some(ItemBankError::NotFound(_)) => {
                        log.log(
                            Severity::Severe,
                            &id.canonical(),
                            "Item not found in item bank.",
                            "",
                        );
                        tracing::warn!("Item not found: {}", id);
                    }
                    _ => {
                        log.log(
                            Severity::Severe,
                            &id.canonical(),
                            "Exception",
                            &format!("{:#}", e),
                        );
                    }
                }
            }
            tracing::info!(
                "Completed: {} of {} items. Elapsed: {}",
                self.queue.dequeued_count(),
                self.queue.distinct_count(),
                format_elapsed(start.elapsed().as_millis() as u64)
            );
        }

        if self.options.include_manifest {
            tracing::info!("Writing package manifest.");
            let xml = self.manifest.to_xml()?;
            self.sink.add_file(MANIFEST_NAME, xml.as_bytes())?;
        } else {
            tracing::info!("Including an empty manifest file.");
            self.sink.add_file(MANIFEST_NAME, EMPTY_MANIFEST.as_bytes())?;
        }
        self.sink.finish()?;

        Ok(PackageSummary {
            items: self.item_count,
            word_lists: self.wit_count,
            stimuli: self.stim_count,
            tutorials: self.tutorial_count,
            errors: log.error_count(),
            elapsed_ms: start.elapsed().as_millis() as u64,
            recode_needed: self.recode_needed,
        })
    }

    async fn package_one(&mut self, id: &ContentId, log: &mut ProgressLog) -> Result<()> {
        let key = id.canonical();
        let project = self.bank.project_id(&self.options.namespace, &key).await?;
        let listing = self.bank.list_tree(&project).await?;

        let doc_name = id.content_file_name();
        let doc_entry = match listing.iter().find(|e| e.path == doc_name) {
            Some(entry) => entry.clone(),
            None => {
                log.log(Severity::Severe, &key, "Item has no content file.", &doc_name);
                tracing::warn!("No content file found for {}", id);
                return Ok(());
            }
        };
        let doc_bytes = self.bank.read_blob(&project, &doc_entry.blob_id).await?;
        let doc = ContentDoc::parse(&doc_bytes)
            .with_context(|| format!("malformed content document {}", doc_name))?;

        // Items may point to a renderer spec (GAX) document which can
        // reference image assets not named in the content itself.
        let renderer = match doc.renderer_spec_file() {
            Some(name) if id.role == Role::Item => {
                let name = name.to_string();
                log.log(
                    Severity::Message,
                    &key,
                    &format!("RendererSpec filename: {}", name),
                    "",
                );
                let entry = listing.iter().find(|e| e.path == name).ok_or_else(|| {
                    anyhow!("renderer spec {} not in repository listing", name)
                })?;
                let bytes = self.bank.read_blob(&project, &entry.blob_id).await?;
                Some(
                    ContentDoc::parse(&bytes)
                        .with_context(|| format!("malformed renderer spec {}", name))?,
                )
            }
            _ => None,
        };

        let attachments = match id.kind {
            ContentKind::Item | ContentKind::Tutorial => {
                self.registry.attachments(id.id).await?
            }
            ContentKind::WordList => Vec::new(),
        };

        let mut node = ManifestNode::for_id(id);
        let folder = id.archive_folder();
        let classifier = Classifier::new(
            id,
            &doc,
            renderer.as_ref(),
            &attachments,
            self.options.include_import_zip,
        );
        let mut renames: Vec<RenameRecord> = Vec::new();

        for entry in &listing {
            let name = entry.path.as_str();
            if Classifier::is_excluded(id, name) {
                log.log(
                    Severity::Message,
                    &key,
                    &format!("Will not add the following object: {}", name),
                    "",
                );
                continue;
            }
            // The content document is buffered and written after the
            // loop so recorded renames can be substituted into it.
            if name.eq_ignore_ascii_case(&doc_name) {
                continue;
            }
            tracing::debug!(file = name, "classifying");

            let result = classifier.classify(name, log);
            if !result.admitted {
                continue;
            }

            let bytes = self.bank.read_blob(&project, &entry.blob_id).await?;

            let mut out_name = name.to_string();
            if id.kind == ContentKind::WordList && result.reason == AdmitReason::ContentReferenced
            {
                let followup = classifier.word_list_followup(
                    name,
                    &bytes,
                    self.options.rename_glossary_audio,
                    log,
                );
                if followup.extension_mismatch {
                    self.recode_needed = true;
                }
                if let Some(rename) = followup.rename {
                    out_name = rename.new_name.clone();
                    renames.push(rename);
                }
            }

            if let Some(ref filter) = self.options.file_type_filter {
                let wanted = format!(".{}", filter.to_ascii_lowercase());
                if out_name != "metadata.xml"
                    && !out_name.to_ascii_lowercase().ends_with(&wanted)
                {
                    continue;
                }
            }

            self.sink.add_file(&format!("{}{}", folder, out_name), &bytes)?;
            if out_name == "metadata.xml" {
                node.set_metadata();
            } else {
                node.add_asset(&out_name);
            }
        }

        // Write the content document with any renames substituted.
        let mut text = doc.text().to_string();
        if self.options.rename_glossary_audio {
            for rename in &renames {
                text = text.replace(&rename.old_name, &rename.new_name);
            }
        }
        self.sink
            .add_file(&format!("{}{}", folder, doc_name), text.as_bytes())?;

        let (wits, stims, tuts) = self
            .extract_dependencies(id, &doc, &mut node, log)
            .context("Expected content missing from item xml.")?;

        self.manifest.push(node);

        let mut added = String::new();
        if wits > 0 {
            added.push_str(&format!(" +{} WIT", wits));
        }
        if stims > 0 {
            added.push_str(&format!(" +{} Stimulus", stims));
        }
        if tuts > 0 {
            added.push_str(&format!(" +{} Tutorial", tuts));
        }
        if !added.is_empty() {
            tracing::info!("{}", added.trim_start());
        }
        Ok(())
    }

    /// Scan the content document for dependency references, enqueue the
    /// new ids, and attach the manifest edges.
    fn extract_dependencies(
        &mut self,
        id: &ContentId,
        doc: &ContentDoc,
        node: &mut ManifestNode,
        log: &mut ProgressLog,
    ) -> Result<(usize, usize, usize)> {
        let key = id.canonical();
        let root = doc
            .root()
            .ok_or_else(|| anyhow!("document has no item or passage element"))?;
        let mut wits = 0;
        let mut stims = 0;
        let mut tuts = 0;

        match root {
            DocRoot::Item => {
                let bank_key = doc.bank_key()?;

                let declared = doc.type_attr();
                if declared.eq_ignore_ascii_case("tut") {
                    self.tutorial_count += 1;
                } else if declared.eq_ignore_ascii_case("wordList") {
                    self.wit_count += 1;
                } else {
                    self.item_count += 1;
                }

                for wit in doc.word_lists() {
                    let wit_id = ContentId::new(
                        Role::Item,
                        wit.bank_key()?,
                        wit.id()?,
                        ContentKind::WordList,
                    );
                    log.log(
                        Severity::Message,
                        &key,
                        "Item depends on WordList",
                        &wit_id.canonical(),
                    );
                    if self.queue.enqueue(wit_id) {
                        wits += 1;
                    }
                    node.word_list = Some(wit_id.canonical());
                }

                if let Some(raw) = doc.stimulus_id() {
                    let stim_num: u32 = raw
                        .parse()
                        .with_context(|| format!("bad stimulus reference '{}'", raw))?;
                    let stim_id =
                        ContentId::new(Role::Stim, bank_key, stim_num, ContentKind::Item);
                    log.log(
                        Severity::Message,
                        &key,
                        "Item depends on stimulus",
                        &stim_id.canonical(),
                    );
                    if self.queue.enqueue(stim_id) {
                        stims += 1;
                    }
                    node.stimulus = Some(stim_id.canonical());
                }

                if self.options.include_tutorials {
                    if let Some(tut) = doc.tutorial() {
                        let tut_id = ContentId::new(
                            Role::Item,
                            tut.bank_key()?,
                            tut.id()?,
                            ContentKind::Tutorial,
                        );
                        log.log(
                            Severity::Message,
                            &key,
                            "Item depends on tutorial",
                            &tut_id.canonical(),
                        );
                        if self.queue.enqueue(tut_id) {
                            tuts += 1;
                        }
                        node.tutorial = Some(tut_id.canonical());
                    }
                }
            }
            DocRoot::Passage => {
                self.stim_count += 1;

                for wit in doc.word_lists() {
                    let wit_id = ContentId::new(
                        Role::Item,
                        wit.bank_key()?,
                        wit.id()?,
                        ContentKind::WordList,
                    );
                    log.log(
                        Severity::Message,
                        &key,
                        "Stim depends on WordList",
                        &wit_id.canonical(),
                    );
                    if self.queue.enqueue(wit_id) {
                        wits += 1;
                    }
                    node.word_list = Some(wit_id.canonical());
                }
            }
        }

        Ok((wits, stims, tuts))
    }
}
