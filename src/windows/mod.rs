//! Assetto Corsa shared memory access
//!
//! The simulation exposes three named file mappings while it runs. This module
//! maps them read-only; decoding and consistency checks live in
//! [`crate::shm`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use trailbreak::shm::{MappedRegion, PHYSICS_LEN};
//! use trailbreak::windows::Segment;
//!
//! let physics = Segment::open("Local\\acpmf_physics", PHYSICS_LEN)?;
//! let mut page = vec![0u8; PHYSICS_LEN];
//! physics.copy_into(&mut page);
//! ```

mod segment;

pub use segment::Segment;
