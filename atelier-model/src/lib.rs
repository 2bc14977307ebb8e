//! Core data model definitions shared across Atelier crates.
#![allow(missing_docs)]

pub mod error;
pub mod gallery;
pub mod ids;
pub mod page;
pub mod prelude;
pub mod profile;
pub mod scan;
pub mod session;
pub mod wallet;

// Intentionally curated re-exports for downstream consumers.
pub use error::{ModelError, Result as ModelResult};
pub use gallery::{Artwork, Gallery, GalleryVisibility, NewArtwork, NewGallery};
pub use ids::{ArtworkId, GalleryId, TransactionId, UserId};
pub use page::{Page, PageRequest};
pub use profile::{
    ProfileUpdate, Subscription, SubscriptionPlan, SubscriptionStatus,
    UserProfile, UserRole,
};
pub use scan::{ScanApproval, ScanResult, ScanToken};
pub use session::SessionTokens;
pub use wallet::{
    Money, Transaction, TransactionKind, TransactionPage, TransactionStatus,
    WalletBalance, WithdrawalMethod, WithdrawalReceipt, WithdrawalRequest,
};
