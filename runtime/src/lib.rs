// Copyright 2026 Quizchain Contributors
// SPDX-License-Identifier: Apache-2.0

//! Quizchain runtime library — walks chains of web quiz pages in a headless
//! browser, mining each page for an answer and a submission endpoint.
//!
//! This library crate exposes the core modules for integration testing.

pub mod acquisition;
pub mod chain;
pub mod cli;
pub mod config;
pub mod error;
pub mod renderer;
pub mod resolver;
pub mod rest;
pub mod signals;
pub mod snapshot;
pub mod submit;
