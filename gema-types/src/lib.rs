// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Common types for the gEMA control plane.
//!
//! These are the types that cross the HTTP boundary: configuration payloads
//! submitted by clients, the records the server keeps about configurations
//! and simulations, and the option catalog snapshot.

pub mod catalog;
pub mod config;
pub mod simulation;
