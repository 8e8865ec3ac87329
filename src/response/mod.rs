//! Response handling module - base64 data URIs and image processing

pub mod base64;
pub mod image;
