// ABOUTME: Shared helper modules for integration tests
// ABOUTME: Re-exports the axum request helper
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rapport Project

#![allow(dead_code)]

pub mod axum_test;
