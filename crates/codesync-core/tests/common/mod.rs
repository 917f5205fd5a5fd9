#![allow(dead_code)]

pub mod archive;
pub mod archive_server;
