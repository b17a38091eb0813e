pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod geometry;
pub mod mask_sync;
pub mod platform;
pub mod processing;
pub mod tasks {
    pub mod loader;
    pub mod mask_worker;
    pub mod thumbnails;
    pub mod viewer;
}
pub mod thumbnail_cache;
pub mod timers;
pub mod viewport;
