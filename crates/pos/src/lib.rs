//! Point-of-sale barcode resolution.
//!
//! The scanning pipeline calls [`resolve_by_barcode`] directly with whatever
//! [`BarcodeLookup`](varscan_catalog::BarcodeLookup) the host wired in; an
//! ambiguous scan comes back as a normal [`Resolution::Ambiguous`] result for
//! the terminal to turn into a variant picker.

pub mod resolver;

pub use resolver::{Resolution, VariantChoice, resolve_by_barcode};
