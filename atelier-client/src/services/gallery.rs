use atelier_model::{
    Artwork, ArtworkId, Gallery, GalleryId, NewArtwork, NewGallery, Page, PageRequest,
};

use crate::api_routes::{fill, gallery};
use crate::errors::ApiResult;
use crate::infrastructure::ApiClient;

#[derive(Debug, Clone)]
pub struct GalleryService {
    client: ApiClient,
}

impl GalleryService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn list_galleries(&self, page: PageRequest) -> ApiResult<Page<Gallery>> {
        self.client
            .get_with_query(gallery::COLLECTION, &page.query_pairs())
            .await
    }

    pub async fn gallery(&self, id: GalleryId) -> ApiResult<Gallery> {
        let path = fill(gallery::ITEM, &[("id", id.to_string().as_str())]);
        self.client.get(&path).await
    }

    pub async fn artworks(
        &self,
        gallery_id: GalleryId,
        page: PageRequest,
    ) -> ApiResult<Page<Artwork>> {
        let path = fill(gallery::ARTWORKS, &[("id", gallery_id.to_string().as_str())]);
        self.client.get_with_query(&path, &page.query_pairs()).await
    }

    pub async fn create_gallery(&self, new_gallery: &NewGallery) -> ApiResult<Gallery> {
        self.client.post(gallery::COLLECTION, new_gallery).await
    }

    pub async fn add_artwork(
        &self,
        gallery_id: GalleryId,
        artwork: &NewArtwork,
    ) -> ApiResult<Artwork> {
        let path = fill(gallery::ARTWORKS, &[("id", gallery_id.to_string().as_str())]);
        self.client.post(&path, artwork).await
    }

    /// Remove an artwork. The server answers 204.
    pub async fn delete_artwork(
        &self,
        gallery_id: GalleryId,
        artwork_id: ArtworkId,
    ) -> ApiResult<()> {
        let path = fill(
            gallery::ARTWORK_ITEM,
            &[
                ("id", gallery_id.to_string().as_str()),
                ("artwork_id", artwork_id.to_string().as_str()),
            ],
        );
        self.client.delete(&path).await
    }
}
