//! Mach-O and fat container handling.
//!
//! [`BinaryContainer`] parses and patches the executable; [`SliceSigner`]
//! runs the two-pass signature over each of its slices.

pub mod container;
pub mod signer;

pub use container::{ArchSlice, BinaryContainer, FieldDescriptor};
pub use signer::{SignedSliceReport, SigningMaterial, SliceSigner};
