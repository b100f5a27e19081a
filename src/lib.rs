// Module declarations
pub mod api;
pub mod asset;
pub mod cache;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod feed;
pub mod logging;
pub mod memory;
pub mod pager;

pub use api::{CatalogSource, HttpCatalog, Item, PageRequest, RawAsset};
pub use asset::{Asset, AssetImage};
pub use cache::AssetCache;
pub use config::Config;
pub use error::FetchError;
pub use feed::{Feed, FeedEvent};
pub use memory::{FixedBudget, MemoryBudget, SystemBudget};
