//! Test doubles shared by the unit tests.

use crate::catalogue::CatalogueRecord;
use crate::provider::{ChatRequest, ChatResponse, Provider, ProviderError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn record(id: &str, name: &str, category: &str) -> CatalogueRecord {
    let mut record = CatalogueRecord::new(id);
    record.name = name.to_string();
    record.category_path = category.to_string();
    record
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

/// Embeds text as the occurrence count of each keyword, one component per
/// keyword. Distances are easy to reason about by hand.
pub struct KeywordProvider {
    keywords: Vec<String>,
    embed_calls: AtomicUsize,
}

impl KeywordProvider {
    pub fn new(keywords: &[&str]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            embed_calls: AtomicUsize::new(0),
        }
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for KeywordProvider {
    async fn chat<'a>(
        &'a self,
        _request: ChatRequest,
        _callback: Box<dyn FnMut(ChatResponse) + Send + 'a>,
    ) -> Result<()> {
        Err(ProviderError::Unsupported("chat completion"))
    }

    async fn embed(&self, text: &str, _model: &str) -> Result<Vec<f32>> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        let mut vector = vec![0.0; self.keywords.len()];
        for token in tokens(text) {
            if let Some(slot) = self.keywords.iter().position(|k| *k == token) {
                vector[slot] += 1.0;
            }
        }
        Ok(vector)
    }
}

/// Returns `wide`-length vectors for texts containing `marker` and
/// `narrow`-length ones otherwise.
pub struct SplitDimensionProvider {
    narrow: usize,
    wide: usize,
    marker: String,
}

impl SplitDimensionProvider {
    pub fn new(narrow: usize, wide: usize, marker: &str) -> Self {
        Self {
            narrow,
            wide,
            marker: marker.to_string(),
        }
    }
}

#[async_trait]
impl Provider for SplitDimensionProvider {
    async fn chat<'a>(
        &'a self,
        _request: ChatRequest,
        _callback: Box<dyn FnMut(ChatResponse) + Send + 'a>,
    ) -> Result<()> {
        Err(ProviderError::Unsupported("chat completion"))
    }

    async fn embed(&self, text: &str, _model: &str) -> Result<Vec<f32>> {
        let len = if text.contains(&self.marker) {
            self.wide
        } else {
            self.narrow
        };
        Ok(vec![1.0; len])
    }
}

/// Answers chat requests from a fixed script, one entry per call.
///
/// `Err` entries become API errors. Once the script runs out every call
/// fails. Answers are streamed in two chunks.
pub struct ScriptedChat {
    replies: Mutex<VecDeque<std::result::Result<String, String>>>,
    requests: Mutex<Vec<ChatRequest>>,
    delay: Option<Duration>,
}

impl ScriptedChat {
    pub fn new<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = std::result::Result<&'static str, &'static str>>,
    {
        Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Sleeps before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedChat {
    async fn chat<'a>(
        &'a self,
        request: ChatRequest,
        mut callback: Box<dyn FnMut(ChatResponse) + Send + 'a>,
    ) -> Result<()> {
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Ok(content)) => {
                let split = content
                    .char_indices()
                    .nth(content.chars().count() / 2)
                    .map_or(content.len(), |(i, _)| i);
                let (head, tail) = content.split_at(split);
                for (chunk, done) in [(head, false), (tail, true)] {
                    callback(ChatResponse {
                        model: model.clone(),
                        content: chunk.to_string(),
                        done,
                    });
                }
                Ok(())
            }
            Some(Err(message)) => Err(ProviderError::Api(message)),
            None => Err(ProviderError::Other("script exhausted".to_string())),
        }
    }

    async fn embed(&self, _text: &str, _model: &str) -> Result<Vec<f32>> {
        Err(ProviderError::Unsupported("embeddings"))
    }
}
