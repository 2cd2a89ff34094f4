#![allow(dead_code)]

pub mod mock_server;

pub use mock_server::{collect, spawn_server};
