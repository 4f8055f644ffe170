#![allow(async_fn_in_trait)]
pub mod asset;
pub mod bands;
pub mod error;
pub mod pipeline;
pub mod preview;
pub mod process_request;
pub mod raster;
pub mod requester;
pub mod run_config;
pub mod session;
pub mod stac_record;
pub mod tool;
pub mod workspace;
