pub mod client;
pub mod config;

use crate::models::{BookMetadata, ListingReceipt, PdfFetch, SellerIdentity};
use async_trait::async_trait;

pub use client::{BackendClient, GatewayError};

/// One operation per backend endpoint, pure request/response mapping.
/// Ordering, delays, and error policy all live in the orchestrator; the
/// trait seam lets tests substitute a recording fake.
#[async_trait]
pub trait BackendGateway: Send + Sync {
    async fn fetch_pdf(&self, book_url: &str) -> Result<PdfFetch, GatewayError>;

    async fn search_metadata(&self, title: &str) -> Result<BookMetadata, GatewayError>;

    async fn generate_description(&self, book: &BookMetadata) -> Result<String, GatewayError>;

    async fn get_identity(&self) -> Result<SellerIdentity, GatewayError>;

    async fn create_listing(
        &self,
        shop_id: &str,
        title: &str,
        description: &str,
    ) -> Result<ListingReceipt, GatewayError>;

    async fn upload_image(
        &self,
        shop_id: &str,
        listing_id: &str,
        image_url: &str,
    ) -> Result<(), GatewayError>;

    async fn upload_file(
        &self,
        shop_id: &str,
        listing_id: &str,
        file_name: &str,
    ) -> Result<(), GatewayError>;

    async fn delete_temp_file(&self, file_name: &str) -> Result<(), GatewayError>;

    async fn refresh_access_token(&self) -> Result<(), GatewayError>;
}
