pub mod backlinks;
pub mod job_queue;
pub mod jobs;
pub mod seo_provider;

pub use backlinks::BacklinkService;
pub use job_queue::{InngestClient, JobEvent, JobQueue};
pub use jobs::JobExecutor;
pub use seo_provider::{DataForSeoClient, SeoDataProvider};
