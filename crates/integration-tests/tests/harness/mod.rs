#![allow(dead_code)]

pub mod config;
