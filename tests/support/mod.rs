#![allow(dead_code)]

pub mod mock_api;
pub mod mock_client;
