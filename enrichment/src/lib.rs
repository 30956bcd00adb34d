//! # Bindery Enrichment
//!
//! The ENRICHED stage: cross-chunk aggregation, canonical resolution with
//! saga rollback, and pass-2 relationship extraction.
//!
//! Canonical-entity creation is the one place the pipeline writes rows
//! that later steps depend on by identity, so the resolver returns an
//! explicit [`SagaLog`] of created ids. The workflow threads that log
//! through the stage and, on failure, deletes exactly those ids in
//! reverse order — the workflow, not the database, is the authority on
//! what to roll back.

pub mod aggregate;
pub mod relationships;
pub mod resolver;
pub mod saga;

pub use aggregate::{aggregate_mentions, AggregatedEntity};
pub use relationships::RelationshipExtractor;
pub use resolver::{CanonicalResolver, ResolutionPlan};
pub use saga::SagaLog;
