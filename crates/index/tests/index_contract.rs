use covermatch_core::{AgeRange, ProductId, ProductRecord};
use covermatch_index::{
    connect_read_only, connect_with_settings, migrations, CandidateIndex, CoarseFilters,
    InMemoryIndex, SqlProductIndex,
};

fn record(id: &str, company: &str, min_age: u32, max_age: u32) -> ProductRecord {
    let mut record = ProductRecord::new(id, format!("{id}-plan"), company);
    record.eligibility.age_range = AgeRange { min: min_age, max: max_age };
    record
}

async fn sqlite_index() -> SqlProductIndex {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("run migrations");
    SqlProductIndex::new(pool)
}

async fn seed(index: &dyn CandidateIndex) {
    for seeded in [
        record("a", "平安", 0, 65),
        record("b", "众安", 18, 40),
        record("c", "平安", 0, 100),
    ] {
        index.upsert(seeded).await.expect("upsert");
    }
}

async fn assert_contract(index: &dyn CandidateIndex) {
    seed(index).await;

    // Upserting the same id again replaces rather than duplicates.
    let mut replacement = record("a", "平安健康", 0, 70);
    replacement.name = "updated".to_string();
    index.upsert(replacement.clone()).await.expect("re-upsert");
    index.upsert(replacement.clone()).await.expect("idempotent re-upsert");

    let all = index.query(&CoarseFilters::default()).await.expect("query all");
    assert_eq!(all.len(), 3);
    let ids: Vec<&str> = all.iter().map(|record| record.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert_eq!(all[0].name, "updated");

    // Coarse age filter keeps only covering ranges.
    let seniors = index
        .query(&CoarseFilters { age: Some(68), ..CoarseFilters::default() })
        .await
        .expect("query by age");
    let ids: Vec<&str> = seniors.iter().map(|record| record.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c"]);

    // Company filter is a loose match and may over-include variants.
    let by_company = index
        .query(&CoarseFilters { companies: vec!["平安".to_string()], ..CoarseFilters::default() })
        .await
        .expect("query by company");
    assert_eq!(by_company.len(), 2);

    let limited = index
        .query(&CoarseFilters { limit: Some(1), ..CoarseFilters::default() })
        .await
        .expect("query with limit");
    assert_eq!(limited.len(), 1);

    // Bulk lookup preserves request order and skips unknown ids.
    let fetched = index
        .get_by_ids(&[
            ProductId("c".to_string()),
            ProductId("missing".to_string()),
            ProductId("a".to_string()),
        ])
        .await
        .expect("bulk lookup");
    let ids: Vec<&str> = fetched.iter().map(|record| record.id.as_str()).collect();
    assert_eq!(ids, vec!["c", "a"]);
}

#[tokio::test]
async fn in_memory_index_honors_the_contract() {
    assert_contract(&InMemoryIndex::default()).await;
}

#[tokio::test]
async fn sqlite_index_honors_the_contract() {
    assert_contract(&sqlite_index().await).await;
}

#[tokio::test]
async fn sqlite_round_trips_the_full_canonical_record() {
    let index = sqlite_index().await;
    let mut seeded = record("full", "泰康", 0, 65);
    seeded.premium_by_age_bracket.insert(30, 1_500.0);
    seeded.tags = vec!["家庭".to_string()];
    seeded.extraction_quality = 0.8;
    index.upsert(seeded.clone()).await.expect("upsert");

    let fetched = index.get_by_ids(&[seeded.id.clone()]).await.expect("lookup");
    assert_eq!(fetched, vec![seeded]);
}

#[tokio::test]
async fn read_only_pool_serves_queries_but_rejects_writes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}", dir.path().join("catalog.db").display());

    let writer_pool = connect_with_settings(&url, 1, 30).await.expect("connect");
    migrations::run_pending(&writer_pool).await.expect("run migrations");
    let writer = SqlProductIndex::new(writer_pool.clone());
    writer.upsert(record("seeded", "平安", 0, 65)).await.expect("upsert");
    writer_pool.close().await;

    let reader_pool = connect_read_only(&url, 1, 30).await.expect("connect read-only");
    let reader = SqlProductIndex::new(reader_pool);

    let all = reader.query(&CoarseFilters::default()).await.expect("query");
    assert_eq!(all.len(), 1);
    assert!(reader.upsert(record("blocked", "众安", 0, 65)).await.is_err());
}
