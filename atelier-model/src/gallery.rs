//! Galleries and the artworks they hold.

use chrono::{DateTime, Utc};

use crate::ids::{ArtworkId, GalleryId, UserId};
use crate::wallet::Money;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum GalleryVisibility {
    #[default]
    Public,
    SubscribersOnly,
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Gallery {
    pub id: GalleryId,
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub description: Option<String>,
    pub owner_id: UserId,
    #[cfg_attr(feature = "serde", serde(default))]
    pub artwork_count: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub visibility: GalleryVisibility,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Artwork {
    pub id: ArtworkId,
    pub gallery_id: GalleryId,
    pub title: String,
    pub artist: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub medium: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub price: Option<Money>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct NewGallery {
    pub name: String,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub description: Option<String>,
    pub visibility: GalleryVisibility,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct NewArtwork {
    pub title: String,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub medium: Option<String>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub price: Option<Money>,
    /// URL of an image the server already stores.
    pub image_url: String,
}
