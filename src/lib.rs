//! Asthma Intake - Pediatric respiratory symptom intake chatbot
//!
//! This crate implements a multi-turn intake conversation for a messaging
//! platform skill: it collects symptoms turn by turn, runs a deferred AI
//! analysis through a queue and callback, and screens the result with a
//! rule-based asthma predictive index.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
