// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Constrained value types.
//!
//! Each type checks its range at construction time, so a value that reaches
//! a transport is already known to be representable on the wire.
//!
//! # Types
//!
//! - [`HsvColor`] - Wire HSV triple (Hue 0-360, Saturation 0-100, Value 0-100)
//! - [`Level`] - Platform-facing normalized level (0.0-1.0)

mod hsv;
mod level;

pub use hsv::{HsvColor, split_hsv};
pub use level::Level;
