mod common;

mod config;
mod leak_detection;
mod lifecycle;
