use shopvox_core::config::{Config, EmbeddingBackend, StorageConfig};
use shopvox_core::index::{self, IndexBuilder, IndexError};
use shopvox_core::provider::HashingProvider;
use shopvox_core::{normalize_rows, read_catalogue, CatalogueFormat, Embedder, SearchPipeline};
use std::path::Path;
use std::sync::Arc;

const HEADER: [&str; 13] = [
    "uniq_id",
    "product_name",
    "product_category_tree",
    "retail_price",
    "discounted_price",
    "image",
    "description",
    "brand",
    "product_specifications",
    "product_rating",
    "overall_rating",
    "is_FK_Advantage_product",
    "product_url",
];

fn write_catalogue(path: &Path) {
    let mut writer = csv::Writer::from_path(path).unwrap();
    writer.write_record(HEADER).unwrap();
    writer
        .write_record([
            "shoe-1",
            "Red Running Shoes",
            "[\"Footwear >> Men's Footwear >> Sports Shoes\"]",
            "2,999",
            "1499",
            "[\"http://img.example/shoe-1.jpg\", \"http://img.example/shoe-2.jpg\", \"http://img.example/shoe-1.jpg\"]",
            "Lightweight red running shoes with a cushioned sole",
            "Sprintex",
            "{\"product_specification\"=>[{\"key\"=>\"Color\", \"value\"=>\"Red\"}, {\"key\"=>\"Outer Material\", \"value\"=>\"Mesh\"}]}",
            "4.2",
            "No rating available",
            "true",
            "http://shop.example/shoe-1",
        ])
        .unwrap();
    writer
        .write_record([
            "bag-1",
            "Leather Laptop Bag",
            "[\"Bags, Wallets & Belts >> Laptop Bags\"]",
            "3,499",
            "",
            "[]",
            "Brown leather messenger bag that fits 15 inch laptops",
            "Hidecraft",
            "",
            "No rating available",
            "No rating available",
            "false",
            "http://shop.example/bag-1",
        ])
        .unwrap();
    writer
        .write_record([
            "bottle-1",
            "Steel Water Bottle",
            "[\"Kitchen & Dining >> Bottles\"]",
            "not a price",
            "399",
            "",
            "",
            "",
            "{\"product_specification\"=>{\"key\"=>\"Capacity\", \"value\"=>\"1 L\"}}",
            "",
            "",
            "",
            "http://shop.example/bottle-1",
        ])
        .unwrap();
    writer.flush().unwrap();
}

fn storage(dir: &Path) -> StorageConfig {
    StorageConfig {
        index_path: dir.join("catalogue.index").display().to_string(),
        records_path: dir.join("catalogue_records.json").display().to_string(),
    }
}

fn config(dir: &Path, dimensions: usize) -> Config {
    let mut config = Config::default();
    config.storage = storage(dir);
    config.embedding.backend = EmbeddingBackend::Hashing { dimensions };
    config.images.verify = false;
    config
}

async fn build(config: &Config, catalogue: &Path) -> Result<usize, IndexError> {
    let normalized = normalize_rows(read_catalogue(catalogue, None).unwrap());
    let builder = IndexBuilder::new(Embedder::from_config(config)).with_concurrency(2);
    let (_, report) = builder.build_and_persist(normalized.records, &config.storage).await?;
    Ok(report.records)
}

#[tokio::test]
async fn test_catalogue_to_rendered_products() {
    let dir = tempfile::tempdir().unwrap();
    let catalogue = dir.path().join("flipkart.csv");
    write_catalogue(&catalogue);

    let rows = read_catalogue(&catalogue, Some(CatalogueFormat::Csv)).unwrap();
    let normalized = normalize_rows(rows);
    assert_eq!(normalized.records.len(), 3);
    assert_eq!(normalized.issues.len(), 1);
    assert_eq!(normalized.records[2].retail_price, 0.0);
    assert_eq!(normalized.records[2].brand, "Unknown");

    let config = config(dir.path(), 128);
    assert_eq!(build(&config, &catalogue).await.unwrap(), 3);

    let pipeline = SearchPipeline::from_config(&config).await.unwrap();
    let outcome = pipeline
        .search_text("I'm looking for red running shoes for jogging")
        .await;

    assert_eq!(outcome.query, "red, running, shoes, for jogging");
    assert!(!outcome.degraded);
    assert_eq!(outcome.products.len(), 3);

    let top = &outcome.products[0];
    assert_eq!(top.product.name, "Red Running Shoes");
    assert_eq!(top.product.price, "INR 1499");
    assert_eq!(top.product.category, "Footwear / Men's Footwear / Sports Shoes");
    assert_eq!(top.product.specifications, "Color: Red\nOuter Material: Mesh");
    assert_eq!(
        top.product.images,
        ["http://img.example/shoe-1.jpg", "http://img.example/shoe-2.jpg"]
    );
    assert_eq!(top.gallery.len(), 2);
    assert_eq!(top.gallery[0].src, "http://img.example/shoe-1.jpg");

    for rendered in &outcome.products[1..] {
        if rendered.product.images.is_empty() {
            assert_eq!(rendered.gallery.len(), 1);
            assert_eq!(rendered.gallery[0].title, "No Image Available");
            assert!(rendered.gallery[0].src.starts_with("data:image/png;base64,"));
        }
    }
}

#[tokio::test]
async fn test_empty_transcript_returns_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let catalogue = dir.path().join("flipkart.csv");
    write_catalogue(&catalogue);

    let config = config(dir.path(), 64);
    build(&config, &catalogue).await.unwrap();

    let pipeline = SearchPipeline::from_config(&config).await.unwrap();
    let outcome = pipeline.search_text("  ").await;
    assert_eq!(outcome.query, "");
    assert!(outcome.products.is_empty());
}

#[tokio::test]
async fn test_changing_embedding_dimension_requires_fresh_index() {
    let dir = tempfile::tempdir().unwrap();
    let catalogue = dir.path().join("flipkart.csv");
    write_catalogue(&catalogue);

    build(&config(dir.path(), 64), &catalogue).await.unwrap();

    let wider = config(dir.path(), 96);
    let result = build(&wider, &catalogue).await;
    assert!(matches!(
        result,
        Err(IndexError::DimensionMismatch { expected: 64, actual: 96 })
    ));

    let storage = storage(dir.path());
    index::remove(&storage.index_path, &storage.records_path).await.unwrap();
    assert_eq!(build(&wider, &catalogue).await.unwrap(), 3);
    assert_eq!(
        index::persisted_dimension(&storage.index_path).await.unwrap(),
        Some(96)
    );
}

#[tokio::test]
async fn test_reloaded_index_answers_like_the_built_one() {
    let dir = tempfile::tempdir().unwrap();
    let catalogue = dir.path().join("flipkart.csv");
    write_catalogue(&catalogue);
    let config = config(dir.path(), 128);

    let records = normalize_rows(read_catalogue(&catalogue, None).unwrap()).records;
    let embedder = Embedder::new(Arc::new(HashingProvider::new(128)), "hashing");
    let (built, _) = IndexBuilder::new(embedder.clone())
        .build_and_persist(records, &config.storage)
        .await
        .unwrap();
    let loaded = index::load(&config.storage.index_path, &config.storage.records_path)
        .await
        .unwrap();

    let query = embedder.embed("leather laptop bag").await.unwrap();
    let expected = built.vectors().search(&query, 3).unwrap();
    assert_eq!(loaded.vectors().search(&query, 3).unwrap(), expected);
    assert_eq!(loaded.records().get(expected[0].0).unwrap().id, "bag-1");
}
