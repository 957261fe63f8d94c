pub mod user;
pub mod listing;
pub mod booking;
pub mod review;

pub use user::{User, UserSummary};
pub use listing::{Listing, ListingPatch, ListingPayload, ListingResponse, ListingSummary, PropertyType};
pub use booking::{Booking, BookingPatch, BookingPayload, BookingResponse, BookingStatus};
pub use review::{Review, ReviewPatch, ReviewPayload, ReviewResponse};
