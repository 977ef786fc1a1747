#![doc = "okh-gen: core logic library for OKH manifest generation."]

//! This crate contains the generation engine and BOM normalization pipelines
//! for producing structured OKH manifests from open-hardware repository
//! snapshots. Platform extraction, NLP/LLM layer implementations and all
//! CLI/HTTP surfaces live in their own crates and plug in through the traits
//! in [`contract`].
//!
//! # Usage
//! Construct a [`engine::GenerationEngine`] from an [`config::EngineConfig`]
//! and a set of layers, then call `generate_manifest` with a
//! [`project::ProjectData`] snapshot.

pub mod bom;
pub mod config;
pub mod contract;
pub mod engine;
pub mod layers;
pub mod load_config;
pub mod project;
pub mod quality;
