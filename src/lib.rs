//! shopvox - voice-driven product search
//!
//! Convenience wrapper crate that re-exports the retrieval pipeline from
//! `shopvox-core`.
//!
//! # Quick Start
//!
//! ```no_run
//! use shopvox::{Config, SearchPipeline};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_default();
//! let pipeline = SearchPipeline::from_config(&config).await?;
//!
//! let outcome = pipeline.search_text("I need some red running shoes under 2000 rupees").await;
//! for rendered in outcome.products {
//!     println!("{} - {}", rendered.product.name, rendered.product.price);
//! }
//! # Ok(())
//! # }
//! ```

pub use shopvox_core::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use shopvox_core::{
        CatalogueRecord, Config, ProductResult, QueryOutcome, RenderedProduct, SearchPipeline,
    };
}
