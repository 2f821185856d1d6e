//! # podloop
//!
//! A level-triggered reconciliation loop for Kubernetes pods: a filtered
//! list+watch stream is mirrored into a local indexer, every observed change
//! becomes a deduplicated key on a rate-limited work queue, and a pool of
//! workers reconciles each key against the cached state through a pluggable
//! policy.

pub mod controller;
pub mod error;
pub mod k8s;
