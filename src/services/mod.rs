pub mod auth;
pub mod error;
pub mod media;
pub mod object_store;
pub mod prober;
pub mod remuxer;
pub mod resolver;
pub mod stager;
pub mod thumbnail;
pub mod upload_pipeline;
pub mod video_store;
