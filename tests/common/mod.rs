//! Shared test doubles: a scripted completion service and an in-memory
//! document extractor.

#![allow(dead_code)]

use async_trait::async_trait;
use ddr_report::{
    Completion, CompletionRequest, CompletionService, DdrError, DocumentExtractor, PageImage,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// What the scripted service answers when a rule matches.
#[derive(Clone, Debug)]
pub enum Reply {
    /// Fixed text.
    Text(String),
    /// `ECHO:` followed by the submitted prompt.
    Echo,
    /// `OCR:` followed by the first inline image decoded as UTF-8.
    ImageText,
    /// A `ServiceFailed` error with this message.
    Fail(String),
}

/// Completion service answering by prompt substring. Rules are checked in
/// insertion order; unmatched prompts are echoed.
pub struct ScriptedService {
    rules: Vec<(String, Reply)>,
    calls: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedService {
    pub fn echo() -> Self {
        Self {
            rules: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on(mut self, needle: &str, reply: Reply) -> Self {
        self.rules.push((needle.to_string(), reply));
        self
    }

    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionService for ScriptedService {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, DdrError> {
        self.calls.lock().unwrap().push(request.clone());

        let reply = self
            .rules
            .iter()
            .find(|(needle, _)| request.prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or(Reply::Echo);

        match reply {
            Reply::Text(text) => Ok(Completion::from_text(text)),
            Reply::Echo => Ok(Completion::from_text(format!("ECHO:{}", request.prompt))),
            Reply::ImageText => {
                let bytes = request
                    .images
                    .first()
                    .map(|i| i.data.clone())
                    .unwrap_or_default();
                Ok(Completion::from_text(format!(
                    "OCR:{}",
                    String::from_utf8_lossy(&bytes)
                )))
            }
            Reply::Fail(message) => Err(DdrError::ServiceFailed {
                service: "scripted".into(),
                message,
            }),
        }
    }
}

/// Extractor serving fixed page texts per path. Rendered "images" are the
/// page text bytes, so [`Reply::ImageText`] can read them back.
#[derive(Default)]
pub struct FakeExtractor {
    documents: HashMap<PathBuf, Vec<String>>,
    renders: Mutex<Vec<PathBuf>>,
}

impl FakeExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, path: impl Into<PathBuf>, pages: &[&str]) -> Self {
        self.documents
            .insert(path.into(), pages.iter().map(|p| p.to_string()).collect());
        self
    }

    /// Paths passed to `render_pages`, in call order.
    pub fn renders(&self) -> Vec<PathBuf> {
        self.renders.lock().unwrap().clone()
    }

    fn pages(&self, path: &Path) -> Result<&Vec<String>, DdrError> {
        self.documents
            .get(path)
            .ok_or_else(|| DdrError::FileNotFound {
                path: path.to_path_buf(),
            })
    }
}

#[async_trait]
impl DocumentExtractor for FakeExtractor {
    async fn page_texts(&self, path: &Path) -> Result<Vec<String>, DdrError> {
        self.pages(path).cloned()
    }

    async fn render_pages(&self, path: &Path) -> Result<Vec<PageImage>, DdrError> {
        self.renders.lock().unwrap().push(path.to_path_buf());
        Ok(self
            .pages(path)?
            .iter()
            .enumerate()
            .map(|(i, text)| PageImage {
                page_num: i + 1,
                png: text.as_bytes().to_vec(),
            })
            .collect())
    }
}
