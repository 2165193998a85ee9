//! `lockscan` — find dependency manifests and lockfiles, group them into
//! subprojects, and resolve each subproject's dependency graph.
//!
//! # Flow
//! 1. Walk the project, pruning paths rejected by the ignore file ([`ignore`], [`targets`]).
//! 2. Keep the files some matcher recognizes and group them into [`subproject::Subproject`]s ([`matcher`]).
//! 3. Resolve every subproject through lockfile [`parsers`] or a dynamic resolver ([`resolve`]).
//! 4. Collect the result in a [`resolve::ResolutionOutcome`], grouped by ecosystem.

pub mod error;
pub mod ignore;
pub mod matcher;
pub mod models;
pub mod parsers;
pub mod resolve;
pub mod subproject;
pub mod targets;
