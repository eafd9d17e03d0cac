use std::path::Path;

use anyhow::Result;
use meshdex::CatalogBuilder;
use meshdex::client::ApiClient;
use meshdex::config::{DataDir, DescriptorField, SearchOptions, ServiceOptions};
use meshdex::queue::UploadQueue;
use meshdex::server::{AppState, create_app};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TRIANGLE: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

fn mesh(fourier: f64, zernike: f64) -> Value {
    json!({
        "num_vertices": 3,
        "num_faces": 1,
        "fourier_coefficients": [fourier],
        "zernike_moments": [zernike],
    })
}

async fn descriptor_service() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/calculate-descriptors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": {
                "chair.obj": mesh(0.0, 0.0),
                "table.obj": mesh(4.0, 4.0),
                "query.obj": mesh(1.0, 1.0),
            }
        })))
        .mount(&server)
        .await;
    server
}

/// Serves a fresh catalogue on a random local port
async fn serve(service: &MockServer, data: &Path) -> Result<ApiClient> {
    let catalog = CatalogBuilder::new(DataDir::new(data))
        .service(ServiceOptions {
            descriptor_service: service.uri(),
            descriptor_field: DescriptorField::Files,
            descriptor_timeout: 10,
        })
        .open()
        .await?;
    let app = create_app(AppState::new(catalog, SearchOptions::default()), 16 * 1024 * 1024);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move { axum::serve(listener, app).await });
    ApiClient::new(&format!("http://{addr}"))
}

fn queue(dir: &Path, names: &[&str], category: &str) -> Result<UploadQueue> {
    let mut queue = UploadQueue::new(None);
    queue.set_category(Some(category.to_string()));
    for name in names {
        let file = dir.join(name);
        std::fs::write(&file, TRIANGLE)?;
        queue.push(file);
    }
    Ok(queue)
}

#[tokio::test]
async fn round_trip_through_server() -> Result<()> {
    let service = descriptor_service().await;
    let data = tempfile::tempdir()?;
    let files = tempfile::tempdir()?;
    let client = serve(&service, data.path()).await?;

    assert!(client.documents().await?.is_empty());

    let outcome = client.upload(&queue(files.path(), &["chair.obj"], "3d#printing")?).await?;
    assert_eq!(outcome.files, vec!["chair.obj"]);
    client.upload(&queue(files.path(), &["table.obj"], "3d")?).await?;

    let printing = client.documents_by_category("3d#printing").await?;
    assert_eq!(printing.len(), 1);
    assert_eq!(printing[0].filename, "chair.obj");
    let plain = client.documents_by_category("3d").await?;
    assert_eq!(plain.len(), 1);
    assert_eq!(plain[0].filename, "table.obj");
    assert!(client.documents_by_category("a/b?c").await?.is_empty());
    assert_eq!(client.documents().await?.len(), 2);

    assert_eq!(client.download("chair.obj").await?, TRIANGLE.as_bytes());

    let query = files.path().join("query.obj");
    std::fs::write(&query, TRIANGLE)?;
    let hits = client.search(&query, Some(1)).await?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].filename, "chair.obj");

    assert_eq!(client.delete("chair.obj").await?, "Image 'chair.obj' deleted successfully");
    let err = client.delete("chair.obj").await.unwrap_err();
    assert!(err.to_string().contains("Image 'chair.obj' not found"));

    assert_eq!(client.delete_all().await?, "All images deleted successfully");
    assert!(client.documents().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn documents_not_found_is_empty() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/images"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"message": "No files found"})),
        )
        .mount(&server)
        .await;

    let client = ApiClient::new(&server.uri())?;
    assert!(client.documents().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn parses_documents() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/images/category/furniture"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "images": [{
                "id": 1,
                "filename": "chair.obj",
                "category": "furniture",
                "uploadDate": "2025-01-01T00:00:00.000Z",
                "thumbnail": "chair.png",
                "characteristics": {"error": "Empty file"},
            }]
        })))
        .mount(&server)
        .await;

    let client = ApiClient::new(&server.uri())?;
    let docs = client.documents_by_category("furniture").await?;
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].thumbnail.as_deref(), Some("chair.png"));
    assert_eq!(docs[0].characteristics.as_ref().and_then(|c| c.error()), Some("Empty file"));
    Ok(())
}

#[tokio::test]
async fn server_errors_carry_message() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "message": "Something went wrong",
            "error": "Error calculating characteristics: Bad Gateway",
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/download/lamp.obj"))
        .respond_with(ResponseTemplate::new(404).set_body_string("plain text"))
        .mount(&server)
        .await;

    let files = tempfile::tempdir()?;
    let client = ApiClient::new(&server.uri())?;

    let err = client.upload(&queue(files.path(), &["chair.obj"], "furniture")?).await.unwrap_err();
    assert!(err.to_string().contains("500"));
    assert!(err.to_string().contains("Something went wrong"));

    let err = client.download("lamp.obj").await.unwrap_err();
    assert!(err.to_string().contains("plain text"));
    Ok(())
}
