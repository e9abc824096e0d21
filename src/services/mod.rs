pub mod keys;
pub mod media_tools;
pub mod object_store;
pub mod playback;
pub mod staging;
pub mod upload_service;
pub mod video_store;
