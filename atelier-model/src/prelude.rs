//! Convenience re-exports for client code.

pub use crate::gallery::{Artwork, Gallery, NewArtwork, NewGallery};
pub use crate::ids::{ArtworkId, GalleryId, TransactionId, UserId};
pub use crate::page::{Page, PageRequest};
pub use crate::profile::{ProfileUpdate, Subscription, SubscriptionPlan, UserProfile};
pub use crate::scan::{ScanApproval, ScanResult, ScanToken};
pub use crate::session::SessionTokens;
pub use crate::wallet::{
    Money, TransactionPage, WalletBalance, WithdrawalMethod, WithdrawalReceipt,
    WithdrawalRequest,
};
