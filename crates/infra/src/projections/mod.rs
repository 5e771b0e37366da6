//! Read models built from catalog events.

mod barcode_index;

pub use barcode_index::BarcodeIndex;
