//! Cluster-based recommendation
//!
//! [`assets`] loads the fitted scaler, cluster centroids and reference
//! dataset once at startup. [`engine`] answers song and user queries against
//! them, or reports itself unavailable when loading failed.

pub mod assets;
pub mod engine;

pub use assets::{AssetError, KMeansModel, RecommendationAssets, ReferenceDataset, ReferenceRow, StandardScaler};
pub use engine::{
    Candidate, EngineState, Recommendation, RecommendError, RecommendationEngine,
    UserRecommendation, MAX_LIMIT, MIN_LIMIT,
};
