//! End-to-end query handling: transcript (or audio) in, rendered products
//! out.
//!
//! ```text
//! audio ─► Transcriber ─► refine_query ─► SearchEngine ─► ResultShaper ─► ImageGuard
//! ```
//!
//! Every stage degrades instead of failing, so a query always produces a
//! well-formed (possibly empty) [`QueryOutcome`].

use crate::config::Config;
use crate::embedder::Embedder;
use crate::images::{ImageGuard, Placeholder};
use crate::index::{self, IndexError};
use crate::refine::{self, refine_query, QueryRefiner};
use crate::search::{SearchEngine, SearchError};
use crate::shape::{ProductResult, ResultShaper};
use crate::transcribe::{AudioClip, Transcriber};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

pub const NO_IMAGE_TITLE: &str = "No Image Available";
pub const NO_IMAGE_CAPTION: &str = "No images available for this product.";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to load catalogue index: {0}")]
    Index(#[from] IndexError),

    #[error("Failed to render placeholder image: {0}")]
    Placeholder(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// One image slot of a product's gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GalleryItem {
    pub title: String,
    pub caption: String,
    /// The image URL, or the placeholder `data:` URI
    pub src: String,
}

/// A product ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedProduct {
    pub product: ProductResult,
    /// Never empty
    pub gallery: Vec<GalleryItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryOutcome {
    pub transcript: String,
    pub query: String,
    /// Set when refinement fell back to the raw transcript or the query ran
    /// out of time.
    pub degraded: bool,
    pub products: Vec<RenderedProduct>,
}

impl QueryOutcome {
    fn empty(transcript: String, query: String, degraded: bool) -> Self {
        Self {
            transcript,
            query,
            degraded,
            products: Vec::new(),
        }
    }
}

/// Runs queries against a loaded catalogue index.
#[derive(Clone)]
pub struct SearchPipeline {
    refiner: Arc<dyn QueryRefiner>,
    engine: SearchEngine,
    shaper: ResultShaper,
    images: ImageGuard,
    transcriber: Option<Transcriber>,
    refine_timeout: Duration,
    query_timeout: Duration,
}

impl SearchPipeline {
    pub fn new(
        refiner: Arc<dyn QueryRefiner>,
        engine: SearchEngine,
        shaper: ResultShaper,
        images: ImageGuard,
    ) -> Self {
        Self {
            refiner,
            engine,
            shaper,
            images,
            transcriber: None,
            refine_timeout: Duration::from_secs(30),
            query_timeout: Duration::from_secs(120),
        }
    }

    /// Wires the configured capabilities around the persisted index.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let catalogue = index::load(&config.storage.index_path, &config.storage.records_path).await?;
        info!(
            records = catalogue.len(),
            dimension = catalogue.dimension().unwrap_or(0),
            "Loaded catalogue index"
        );

        let engine = SearchEngine::new(Embedder::from_config(config), catalogue, config.search.top_k);
        let placeholder = Arc::new(Placeholder::render()?);

        Ok(Self::new(
            refine::from_config(config),
            engine,
            ResultShaper::from_config(config),
            ImageGuard::from_config(&config.images, placeholder),
        )
        .with_refine_timeout(config.llm.timeout())
        .with_query_timeout(config.pipeline.query_timeout()))
    }

    pub fn with_transcriber(mut self, transcriber: Transcriber) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn with_refine_timeout(mut self, timeout: Duration) -> Self {
        self.refine_timeout = timeout;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn engine(&self) -> &SearchEngine {
        &self.engine
    }

    /// Searches for a typed or already transcribed request.
    pub async fn search_text(&self, transcript: &str) -> QueryOutcome {
        let deadline = Instant::now() + self.query_timeout;
        let transcript = transcript.to_string();
        self.within_deadline(deadline, transcript.clone(), self.run(transcript)).await
    }

    /// Transcribes `clip` and searches for what was said. Without a
    /// transcriber the transcript is empty and so is the result.
    ///
    /// Transcription and search share one query budget; if it runs out after
    /// transcription the outcome still carries the transcript.
    pub async fn search_audio(&self, clip: &AudioClip) -> QueryOutcome {
        let deadline = Instant::now() + self.query_timeout;
        let transcript = match &self.transcriber {
            Some(transcriber) => match tokio::time::timeout_at(deadline, transcriber.transcribe(clip)).await {
                Ok(transcript) => transcript,
                Err(_) => {
                    warn!(timeout = ?self.query_timeout, "Query timed out during transcription");
                    return QueryOutcome::empty(String::new(), String::new(), true);
                }
            },
            None => {
                warn!("No transcriber configured, ignoring audio");
                String::new()
            }
        };
        self.within_deadline(deadline, transcript.clone(), self.run(transcript)).await
    }

    async fn within_deadline<F>(&self, deadline: Instant, transcript: String, query: F) -> QueryOutcome
    where
        F: Future<Output = QueryOutcome>,
    {
        match tokio::time::timeout_at(deadline, query).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(timeout = ?self.query_timeout, "Query timed out, returning no results");
                QueryOutcome::empty(transcript, String::new(), true)
            }
        }
    }

    async fn run(&self, transcript: String) -> QueryOutcome {
        let refinement = refine_query(self.refiner.as_ref(), &transcript, self.refine_timeout).await;
        let query = refinement.query;

        let hits = match self.engine.retrieve(&query).await {
            Ok(hits) => hits,
            Err(SearchError::IndexIncompatible { index, query: dimension }) => {
                warn!(
                    index,
                    query = dimension,
                    "Index was built with a different embedding model; rebuild it"
                );
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "Search failed");
                Vec::new()
            }
        };

        let records: Vec<_> = hits.into_iter().map(|(_, record)| record).collect();
        let products = self.shaper.shape(&records).await;
        let products = self.render(products).await;

        info!(%query, products = products.len(), degraded = refinement.degraded, "Query answered");
        QueryOutcome {
            transcript,
            query,
            degraded: refinement.degraded,
            products,
        }
    }

    /// Builds galleries. All image checks of the result set share one
    /// concurrency budget.
    async fn render(&self, products: Vec<ProductResult>) -> Vec<RenderedProduct> {
        let urls: Vec<String> = products.iter().flat_map(|p| p.images.iter().cloned()).collect();
        let mut checked = self.images.check_all(&urls).await.into_iter();

        products
            .into_iter()
            .map(|product| {
                let gallery = if product.images.is_empty() {
                    vec![GalleryItem {
                        title: NO_IMAGE_TITLE.to_string(),
                        caption: NO_IMAGE_CAPTION.to_string(),
                        src: self.images.placeholder().data_uri().to_string(),
                    }]
                } else {
                    checked
                        .by_ref()
                        .take(product.images.len())
                        .map(|src| GalleryItem {
                            title: String::new(),
                            caption: String::new(),
                            src,
                        })
                        .collect()
                };
                RenderedProduct { product, gallery }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityError;
    use crate::catalogue::CatalogueRecord;
    use crate::images::{ImageFetchError, ImageFetcher};
    use crate::index::IndexBuilder;
    use crate::provider::HashingProvider;
    use crate::refine::RuleRefiner;
    use crate::shape::{PassthroughPrettifier, Prettifier, NOT_AVAILABLE};
    use crate::testing::KeywordProvider;
    use crate::transcribe::{SpeechModel, SpeechModelHandle, SpeechModelLoader};
    use async_trait::async_trait;
    use serde_json::Value;

    struct DeadLinks;

    #[async_trait]
    impl ImageFetcher for DeadLinks {
        async fn fetch(&self, _url: &str) -> crate::images::Result<Vec<u8>> {
            Err(ImageFetchError::Status(404))
        }
    }

    struct SlowPrettifier;

    #[async_trait]
    impl Prettifier for SlowPrettifier {
        fn name(&self) -> &str {
            "slow"
        }

        async fn prettify(&self, _input: &Value) -> std::result::Result<Vec<Value>, CapabilityError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    fn catalogue() -> Vec<CatalogueRecord> {
        let mut shoes = CatalogueRecord::new("s1");
        shoes.name = "Red running shoes".into();
        shoes.category_path = "Footwear / Shoes".into();
        shoes.retail_price = 1999.0;
        shoes.images = vec![
            "http://img/a.jpg".into(),
            "http://img/b.jpg".into(),
            "http://img/a.jpg".into(),
        ];

        let mut bag = CatalogueRecord::new("b1");
        bag.name = "Leather bag".into();
        bag.category_path = "Bags".into();

        vec![shoes, bag]
    }

    async fn pipeline(prettifier: Arc<dyn Prettifier>) -> SearchPipeline {
        let embedder = Embedder::new(Arc::new(KeywordProvider::new(&["shoes", "bag", "red"])), "kw");
        let index = IndexBuilder::new(embedder.clone()).build(catalogue()).await.unwrap();
        let placeholder = Arc::new(Placeholder::render().unwrap());

        SearchPipeline::new(
            Arc::new(RuleRefiner::new()),
            SearchEngine::new(embedder, index, 2),
            ResultShaper::new(prettifier, Duration::from_secs(5)),
            ImageGuard::new(Arc::new(DeadLinks), placeholder, Duration::from_secs(1)),
        )
    }

    #[tokio::test]
    async fn test_text_query_renders_products() {
        let pipeline = pipeline(Arc::new(PassthroughPrettifier::new("INR"))).await;
        let outcome = pipeline.search_text("um I want some red shoes please").await;
        let placeholder = pipeline.images.placeholder().data_uri().to_string();

        assert_eq!(outcome.query, "red, shoes");
        assert!(!outcome.degraded);
        assert_eq!(outcome.products.len(), 2);

        let shoes = &outcome.products[0];
        assert_eq!(shoes.product.name, "Red running shoes");
        assert_eq!(shoes.product.price, "INR 1999");
        assert_eq!(shoes.product.images, ["http://img/a.jpg", "http://img/b.jpg"]);
        assert_eq!(shoes.gallery.len(), 2);
        assert!(shoes.gallery.iter().all(|item| item.src == placeholder && item.title.is_empty()));

        let bag = &outcome.products[1];
        assert_eq!(
            bag.gallery,
            vec![GalleryItem {
                title: NO_IMAGE_TITLE.into(),
                caption: NO_IMAGE_CAPTION.into(),
                src: placeholder,
            }]
        );
    }

    #[tokio::test]
    async fn test_blank_transcript_gives_empty_outcome() {
        let pipeline = pipeline(Arc::new(PassthroughPrettifier::new("INR"))).await;
        let outcome = pipeline.search_text("   ").await;

        assert_eq!(outcome.query, "");
        assert!(outcome.products.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_timeout_returns_nothing() {
        let pipeline = pipeline(Arc::new(SlowPrettifier))
            .await
            .with_query_timeout(Duration::from_secs(7));

        let outcome = pipeline.search_text("red shoes").await;
        assert!(outcome.products.is_empty());
        assert!(outcome.degraded);
        assert_eq!(outcome.transcript, "red shoes");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_prettifier_within_budget_degrades_fields() {
        let mut pipeline = pipeline(Arc::new(SlowPrettifier)).await;
        pipeline.shaper = ResultShaper::new(Arc::new(SlowPrettifier), Duration::from_secs(1));

        let outcome = pipeline.search_text("red shoes").await;
        assert_eq!(outcome.products.len(), 2);
        assert!(outcome.products.iter().all(|p| p.product.name == NOT_AVAILABLE));
    }

    #[tokio::test]
    async fn test_incompatible_index_gives_empty_result() {
        let mut pipeline = pipeline(Arc::new(PassthroughPrettifier::new("INR"))).await;
        let index = (*pipeline.engine.index()).clone();
        pipeline.engine = SearchEngine::new(
            Embedder::new(Arc::new(HashingProvider::new(16)), "hashing"),
            index,
            2,
        );

        let outcome = pipeline.search_text("red shoes").await;
        assert!(outcome.products.is_empty());
    }

    #[tokio::test]
    async fn test_audio_without_transcriber() {
        let pipeline = pipeline(Arc::new(PassthroughPrettifier::new("INR"))).await;
        let outcome = pipeline.search_audio(&AudioClip::mono(vec![0.5; 160], 16_000)).await;

        assert_eq!(outcome.transcript, "");
        assert!(outcome.products.is_empty());
    }

    struct FixedSpeech(&'static str);

    #[async_trait]
    impl SpeechModel for FixedSpeech {
        async fn transcribe(&self, _waveform: &[f32]) -> std::result::Result<String, CapabilityError> {
            Ok(self.0.to_string())
        }
    }

    #[async_trait]
    impl SpeechModelLoader for FixedSpeech {
        async fn load(&self) -> crate::transcribe::Result<Arc<dyn SpeechModel>> {
            Ok(Arc::new(FixedSpeech(self.0)))
        }
    }

    fn transcriber(said: &'static str) -> Transcriber {
        let handle = SpeechModelHandle::new(Arc::new(FixedSpeech(said)));
        Transcriber::new(Arc::new(handle), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_audio_query_uses_transcript() {
        let pipeline = pipeline(Arc::new(PassthroughPrettifier::new("INR")))
            .await
            .with_transcriber(transcriber("um I want some red shoes please"));
        let outcome = pipeline.search_audio(&AudioClip::mono(vec![0.5; 160], 16_000)).await;

        assert_eq!(outcome.transcript, "um I want some red shoes please");
        assert_eq!(outcome.query, "red, shoes");
        assert_eq!(outcome.products[0].product.name, "Red running shoes");
    }

    #[tokio::test(start_paused = true)]
    async fn test_audio_timeout_keeps_transcript() {
        let pipeline = pipeline(Arc::new(SlowPrettifier))
            .await
            .with_transcriber(transcriber("red shoes"))
            .with_query_timeout(Duration::from_secs(7));
        let outcome = pipeline.search_audio(&AudioClip::mono(vec![0.5; 160], 16_000)).await;

        assert!(outcome.degraded);
        assert!(outcome.products.is_empty());
        assert_eq!(outcome.transcript, "red shoes");
    }
}
