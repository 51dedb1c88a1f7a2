//! API integration tests
//!
//! Require a running server backed by a seeded search cluster.

use reqwest::Client;
use serde_json::Value;

const BASE_URL: &str = "http://localhost:8080/api/v1";

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_species_count_leaderboard() {
    let client = Client::new();

    let response = client
        .get(format!("{}/user-statistics/species-count", BASE_URL))
        .query(&[("take", "10")])
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    let records = body["records"].as_array().expect("No records in response");
    assert!(records.len() <= 10);

    // Leaderboard order: speciesCount desc, then userId asc.
    let mut previous: Option<(i64, i64)> = None;
    for record in records {
        let species = record["speciesCount"].as_i64().expect("speciesCount");
        let user = record["userId"].as_i64().expect("userId");
        if let Some((prev_species, prev_user)) = previous {
            assert!(
                species < prev_species || (species == prev_species && user > prev_user),
                "records out of leaderboard order"
            );
        }
        previous = Some((species, user));
    }
}

#[tokio::test]
#[ignore]
async fn test_species_count_skip_beyond_total() {
    let client = Client::new();

    let response = client
        .get(format!("{}/user-statistics/species-count", BASE_URL))
        .query(&[("skip", "100000000")])
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["records"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
#[ignore]
async fn test_area_species_count_requires_area_type() {
    let client = Client::new();

    let response = client
        .get(format!("{}/user-statistics/area-species-count", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore]
async fn test_area_species_count_breakdown() {
    let client = Client::new();

    let response = client
        .get(format!("{}/user-statistics/area-species-count", BASE_URL))
        .query(&[("areaType", "province"), ("take", "5")])
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    for record in body["records"].as_array().expect("No records in response") {
        let by_feature = record["speciesCountByFeatureId"]
            .as_object()
            .expect("missing area breakdown");
        // Areas can share species; each per-area count is bounded by the
        // user's cross-area total.
        let total = record["speciesCount"].as_i64().expect("speciesCount");
        for count in by_feature.values() {
            assert!(count.as_i64().expect("area count") <= total);
        }
    }
}

#[tokio::test]
#[ignore]
async fn test_malformed_id_list_is_rejected() {
    let client = Client::new();

    let response = client
        .get(format!("{}/user-statistics/species-count", BASE_URL))
        .query(&[("taxonIds", "1,notanumber")])
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);
}
