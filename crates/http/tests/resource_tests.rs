//! Integration tests for generic collection access

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use vetdesk_core::MemoryCredentialStore;
use vetdesk_http::{ApiClient, QueryParams, Resource};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct Animal {
    id: u32,
    name: String,
    species: String,
}

#[derive(Serialize)]
struct NewAnimal<'a> {
    name: &'a str,
    species: &'a str,
}

fn animals(server: &MockServer) -> Resource<Animal> {
    let store = Arc::new(MemoryCredentialStore::with_tokens("a1", "r1"));
    ApiClient::new(server.uri(), store)
        .unwrap()
        .resource("animals")
}

#[tokio::test]
async fn test_list_sends_query_and_reads_page() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/animals/"))
        .and(query_param("search", "rex"))
        .and(query_param("page", "2"))
        .and(header("authorization", "Bearer a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 11,
            "next": null,
            "previous": "http://clinic.test/animals/?page=1",
            "results": [{ "id": 11, "name": "Rex", "species": "dog" }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let page = animals(&mock_server)
        .list(&QueryParams::new().search("rex").page(2))
        .await
        .unwrap();

    assert_eq!(page.count, 11);
    assert!(!page.has_next());
    assert_eq!(page.results[0].name, "Rex");
}

#[tokio::test]
async fn test_get_create_update_delete() {
    let mock_server = MockServer::start().await;
    let rex = json!({ "id": 1, "name": "Rex", "species": "dog" });

    Mock::given(method("GET"))
        .and(path("/animals/1/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": rex })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/animals/"))
        .and(body_json(json!({ "name": "Rex", "species": "dog" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(&rex))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/animals/1/"))
        .and(body_json(json!({ "name": "Rexy" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "id": 1, "name": "Rexy", "species": "dog" }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/animals/1/"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let animals = animals(&mock_server);

    let fetched = animals.get(1).await.unwrap();
    assert_eq!(fetched.species, "dog");

    let created = animals
        .create(&NewAnimal {
            name: "Rex",
            species: "dog",
        })
        .await
        .unwrap();
    assert_eq!(created, fetched);

    let renamed = animals.update(1, &json!({ "name": "Rexy" })).await.unwrap();
    assert_eq!(renamed.name, "Rexy");

    animals.delete(1).await.unwrap();
}
