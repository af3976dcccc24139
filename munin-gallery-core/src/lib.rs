#![doc = "munin-gallery-core: ingestion pipeline for the munin plugin gallery."]

//! This crate contains the logic that turns upstream plugin repositories into a
//! catalog of plugin records: acquiring the repositories, discovering plugin
//! files, extracting metadata from their source text and scheduling that work
//! across a pool of workers.
//!
//! Rendering the website from the catalog is not part of this crate; finished
//! records are handed to a [`contract::CatalogSink`].
//!
//! # Usage
//! Build a [`config::RunConfig`], create a [`pipeline::Pipeline`] from it and
//! run it into any sink (for example [`statistics::CatalogStatistics`]).

pub mod config;
pub mod contract;
pub mod discovery;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod plugin;
pub mod render;
pub mod repository;
pub mod source;
pub mod statistics;
