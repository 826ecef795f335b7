pub mod channel;
pub mod factcheck;
pub mod generator;
pub mod notify;
pub mod pipeline;
pub mod report;
pub mod scheduler;
pub mod storage;
pub mod transcript;
pub mod virality;
pub mod youtube;

pub use factcheck::MarketDataClient;
pub use generator::OpenAiModel;
pub use notify::TelegramNotifier;
pub use pipeline::{Collaborators, Pipeline, RunSummary};
pub use storage::SqliteStore;
pub use transcript::{TranscriptService, extract_video_id};
pub use virality::ViralityClassifier;
pub use youtube::YouTubeClient;
