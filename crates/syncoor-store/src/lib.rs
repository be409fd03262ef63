mod error;
mod hub;
mod store;
mod types;

pub use error::StoreError;
pub use hub::{Event, EventData, SSEHub};
pub use store::TestStore;
pub use types::{
    ClientConfig, CompleteRequest, KeepaliveRequest, ProgressPoint, TestData, TestDetail,
    TestSummary,
};
