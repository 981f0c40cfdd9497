pub mod binding;
pub mod chart;
pub mod colour;
pub mod commands;
pub mod components;
pub mod config;
pub mod coordinator;
pub mod events;
pub mod geometry;
pub mod loading;
pub mod registry;
pub mod selector;
pub mod surface;
pub mod transition;
pub mod views;
