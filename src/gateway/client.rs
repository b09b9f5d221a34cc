use crate::gateway::{BackendGateway, config};
use crate::http::build_client;
use crate::models::{BookMetadata, ListingReceipt, PdfFetch, SellerIdentity};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Connection failure or a non-2xx status.
    #[error("request failed: {0}")]
    Transport(String),
    /// 2xx response whose decoded body carried an `error` field. The
    /// embedded message is what the operator eventually sees.
    #[error("{0}")]
    Backend(String),
    #[error("invalid response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    root: String,
    http: Client,
}

impl BackendClient {
    pub fn new() -> Self {
        Self::with_root(config::BACKEND_ROOT.clone())
    }

    pub fn with_root(root: impl Into<String>) -> Self {
        Self {
            root: root.into().trim_end_matches('/').to_string(),
            http: build_client(),
        }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T, GatewayError> {
        let response = self
            .http
            .get(format!("{}/{endpoint}", self.root))
            .query(query)
            .send()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;
        decode(response).await
    }

    async fn acknowledge(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<(), GatewayError> {
        let response = self
            .http
            .get(format!("{}/{endpoint}", self.root))
            .query(query)
            .send()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Transport(format!("HTTP {status}")));
        }
        let text = response
            .text()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;
        if text.trim().is_empty() {
            return Ok(());
        }
        let body: Value =
            serde_json::from_str(&text).map_err(|err| GatewayError::Decode(err.to_string()))?;
        if let Some(message) = embedded_error(&body) {
            return Err(GatewayError::Backend(message));
        }
        Ok(())
    }
}

impl Default for BackendClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackendGateway for BackendClient {
    async fn fetch_pdf(&self, book_url: &str) -> Result<PdfFetch, GatewayError> {
        self.fetch("get-book-pdf", &[("book_url", book_url)]).await
    }

    async fn search_metadata(&self, title: &str) -> Result<BookMetadata, GatewayError> {
        self.fetch("search-book", &[("title", title)]).await
    }

    async fn generate_description(&self, book: &BookMetadata) -> Result<String, GatewayError> {
        let params = flatten_metadata(book)?;
        let response = self
            .http
            .get(format!("{}/generate-description", self.root))
            .query(&params)
            .send()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;
        let payload: DescriptionPayload = decode(response).await?;
        Ok(payload.description)
    }

    async fn get_identity(&self) -> Result<SellerIdentity, GatewayError> {
        self.fetch("get-user", &[]).await
    }

    async fn create_listing(
        &self,
        shop_id: &str,
        title: &str,
        description: &str,
    ) -> Result<ListingReceipt, GatewayError> {
        self.fetch(
            "create-listing",
            &[
                ("shop_id", shop_id),
                ("title", title),
                ("description", description),
            ],
        )
        .await
    }

    async fn upload_image(
        &self,
        shop_id: &str,
        listing_id: &str,
        image_url: &str,
    ) -> Result<(), GatewayError> {
        self.acknowledge(
            "upload-listing-image",
            &[
                ("shop_id", shop_id),
                ("listing_id", listing_id),
                ("image_url", image_url),
            ],
        )
        .await
    }

    async fn upload_file(
        &self,
        shop_id: &str,
        listing_id: &str,
        file_name: &str,
    ) -> Result<(), GatewayError> {
        self.acknowledge(
            "upload-listing-file",
            &[
                ("shop_id", shop_id),
                ("listing_id", listing_id),
                ("file_name", file_name),
            ],
        )
        .await
    }

    async fn delete_temp_file(&self, file_name: &str) -> Result<(), GatewayError> {
        self.acknowledge("delete-pdf", &[("file_name", file_name)])
            .await
    }

    async fn refresh_access_token(&self) -> Result<(), GatewayError> {
        self.acknowledge("refresh", &[]).await
    }
}

#[derive(serde::Deserialize)]
struct DescriptionPayload {
    description: String,
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
    let status = response.status();
    if !status.is_success() {
        return Err(GatewayError::Transport(format!("HTTP {status}")));
    }
    let body: Value = response
        .json()
        .await
        .map_err(|err| GatewayError::Decode(err.to_string()))?;
    if let Some(message) = embedded_error(&body) {
        return Err(GatewayError::Backend(message));
    }
    serde_json::from_value(body).map_err(|err| GatewayError::Decode(err.to_string()))
}

fn embedded_error(body: &Value) -> Option<String> {
    let field = body.get("error")?;
    Some(match field {
        Value::String(message) => message.clone(),
        other => other.to_string(),
    })
}

/// The description endpoint takes the metadata flattened into top-level
/// query parameters: scalars as their string form, `null`s omitted, and
/// array fields repeating the key once per element.
fn flatten_metadata(book: &BookMetadata) -> Result<Vec<(String, String)>, GatewayError> {
    let encoded = serde_json::to_value(book).map_err(|err| GatewayError::Decode(err.to_string()))?;
    let Value::Object(fields) = encoded else {
        return Err(GatewayError::Decode(
            "metadata did not serialize to an object".into(),
        ));
    };
    let mut params = Vec::new();
    for (key, field) in fields {
        match field {
            Value::Null => {}
            Value::Array(items) => {
                for item in items {
                    params.push((key.clone(), scalar_string(&item)));
                }
            }
            other => params.push((key, scalar_string(&other))),
        }
    }
    Ok(params)
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_book() -> BookMetadata {
        BookMetadata {
            title: "X".into(),
            authors: vec!["A".into(), "B".into()],
            cover_image: Some("http://img/1.png".into()),
            publish_year: Some(1999),
            ..BookMetadata::default()
        }
    }

    #[test]
    fn flatten_repeats_array_keys_and_drops_nulls() {
        let params = flatten_metadata(&sample_book()).expect("flatten");
        let authors: Vec<&str> = params
            .iter()
            .filter(|(key, _)| key == "authors")
            .map(|(_, value)| value.as_str())
            .collect();
        assert_eq!(authors, vec!["A", "B"]);
        assert!(params.iter().any(|(key, value)| key == "title" && value == "X"));
        assert!(
            params
                .iter()
                .any(|(key, value)| key == "publish_year" && value == "1999")
        );
        assert!(!params.iter().any(|(key, _)| key == "isbn_10"));
    }

    #[tokio::test]
    async fn fetch_pdf_decodes_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get-book-pdf"))
            .and(query_param("book_url", "https://pdfdrive.com/x.html"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"title": "X", "pdf": "x.pdf"})),
            )
            .mount(&server)
            .await;

        let fetched = BackendClient::with_root(server.uri())
            .fetch_pdf("https://pdfdrive.com/x.html")
            .await
            .expect("fetch_pdf");
        assert_eq!(fetched.title, "X");
        assert_eq!(fetched.pdf, "x.pdf");
        assert!(fetched.cover_image.is_none());
    }

    #[tokio::test]
    async fn error_field_maps_to_backend_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get-book-pdf"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"error": "download failed"})),
            )
            .mount(&server)
            .await;

        let err = BackendClient::with_root(server.uri())
            .fetch_pdf("https://pdfdrive.com/x.html")
            .await
            .expect_err("should fail");
        assert!(matches!(err, GatewayError::Backend(message) if message == "download failed"));
    }

    #[tokio::test]
    async fn non_success_status_maps_to_transport() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search-book"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = BackendClient::with_root(server.uri())
            .search_metadata("X")
            .await
            .expect_err("should fail");
        assert!(matches!(err, GatewayError::Transport(_)));
    }

    #[tokio::test]
    async fn search_decodes_full_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search-book"))
            .and(query_param("title", "X"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "title": "X",
                "authors": ["A"],
                "cover_image": "http://img/1.png",
                "publish_year": 1999,
                "subjects": ["Fiction"],
            })))
            .mount(&server)
            .await;

        let book = BackendClient::with_root(server.uri())
            .search_metadata("X")
            .await
            .expect("search");
        assert_eq!(book.authors, vec!["A"]);
        assert_eq!(book.cover_image.as_deref(), Some("http://img/1.png"));
        assert_eq!(book.subjects, vec!["Fiction"]);
    }

    #[tokio::test]
    async fn description_request_flattens_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/generate-description"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"description": "D"})))
            .mount(&server)
            .await;

        let description = BackendClient::with_root(server.uri())
            .generate_description(&sample_book())
            .await
            .expect("describe");
        assert_eq!(description, "D");

        let requests = server.received_requests().await.expect("requests");
        let pairs: Vec<(String, String)> = requests[0]
            .url
            .query_pairs()
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        let authors: Vec<&str> = pairs
            .iter()
            .filter(|(key, _)| key == "authors")
            .map(|(_, value)| value.as_str())
            .collect();
        assert_eq!(authors, vec!["A", "B"]);
        assert!(pairs.iter().any(|(key, value)| key == "title" && value == "X"));
        assert!(!pairs.iter().any(|(key, _)| key == "isbn_13"));
    }

    #[tokio::test]
    async fn create_listing_sends_exact_params_and_normalizes_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/create-listing"))
            .and(query_param("shop_id", "shop-1"))
            .and(query_param("title", "X"))
            .and(query_param("description", "D"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"listing_id": 4242})))
            .mount(&server)
            .await;

        let receipt = BackendClient::with_root(server.uri())
            .create_listing("shop-1", "X", "D")
            .await
            .expect("create");
        assert_eq!(receipt.listing_id, "4242");
    }

    #[tokio::test]
    async fn uploads_and_delete_hit_their_endpoints() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/upload-listing-image"))
            .and(query_param("shop_id", "shop-1"))
            .and(query_param("listing_id", "9"))
            .and(query_param("image_url", "http://img/1.png"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/upload-listing-file"))
            .and(query_param("file_name", "x.pdf"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/delete-pdf"))
            .and(query_param("file_name", "x.pdf"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = BackendClient::with_root(server.uri());
        client
            .upload_image("shop-1", "9", "http://img/1.png")
            .await
            .expect("image");
        client
            .upload_file("shop-1", "9", "x.pdf")
            .await
            .expect("file");
        client.delete_temp_file("x.pdf").await.expect("delete");
    }

    #[tokio::test]
    async fn refresh_surfaces_embedded_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/refresh"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"error": "token expired"})),
            )
            .mount(&server)
            .await;

        let err = BackendClient::with_root(server.uri())
            .refresh_access_token()
            .await
            .expect_err("should fail");
        assert!(matches!(err, GatewayError::Backend(message) if message == "token expired"));
    }

    #[tokio::test]
    async fn identity_probe_passes_through_error_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get-user"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"error": "no access token"})),
            )
            .mount(&server)
            .await;

        let err = BackendClient::with_root(server.uri())
            .get_identity()
            .await
            .expect_err("should fail");
        assert!(matches!(err, GatewayError::Backend(message) if message == "no access token"));
    }
}
