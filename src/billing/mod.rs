//! Billing-entry retrieval and flattening.

pub mod fetcher;
pub mod normalize;
pub mod types;
pub mod window;

pub use fetcher::{PaginatedFetcher, BILLING_PAGE_SIZE};
pub use normalize::{normalize, NormalizedRow, COLUMNS, PRIMARY_KEY};
pub use types::{BillingEntry, BillingPage, EntryType, Money, OfferRef, OrderRef, Tax};
pub use window::{day_bounds, DateWindow, DayOrder, WindowPolicy};
