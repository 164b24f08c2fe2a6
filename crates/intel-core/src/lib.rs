pub mod error;
pub mod normalize;
pub mod traits;
pub mod types;

pub use error::*;
pub use normalize::{normalize_market_intelligence, CasePayload, IntelligenceNormalizer};
pub use traits::*;
pub use types::*;
