pub mod adapters;
pub mod auth;
pub mod discovery;
pub mod endpoint;
pub mod error;
pub mod jf2;
pub mod merge;
pub mod normalize;
pub mod registry;
pub mod router;
pub mod store;

pub use adapters::{Adapter, AdapterError, Operation};
pub use adapters::feeds::FeedAdapter;
pub use auth::{Auth, Grant, TokenTable};
pub use discovery::{DiscoveredFeed, FeedDiscovery};
pub use endpoint::{EndpointHandler, EndpointRequest, EndpointResponse, Method};
pub use error::{ErrorCode, ErrorResponse, MicrosubError};
pub use jf2::{Card, Channel, Content, Entry, FeedRef, Paging, Preview, SearchResults, Timeline};
pub use merge::TimelineQuery;
pub use registry::{AdapterInfo, Registry};
pub use router::{Router, SyncReport};
pub use store::FeedStore;

#[cfg(feature = "adapter-feeds")]
pub use discovery::http::HttpDiscovery;
