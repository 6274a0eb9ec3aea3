pub mod asset;
pub mod bar;
pub mod request_params;
pub mod timeframe;
