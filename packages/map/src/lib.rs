#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Map presentation for the incident map.
//!
//! Pure rendering logic: danger zone color buckets, equal-area radii and
//! zoom-dependent opacity ([`zones`]), incident marker styling and popups
//! ([`markers`]), list panel entries ([`list`]), legends ([`legend`]), and
//! the [`surface::MapSurface`] abstraction the client draws onto.

pub mod html;
pub mod legend;
pub mod list;
pub mod markers;
pub mod surface;
pub mod zones;

pub use surface::{DEFAULT_VIEW, LayerCollection, LayerId, MapSurface, MapView, Popup};
