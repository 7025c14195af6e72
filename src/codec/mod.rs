//! Codec module - TLV payload encoding and typed messages.
//!
//! - [`PayloadEncoder`] / [`PayloadDecoder`] - the field-level TLV codec
//! - [`messages`] - one builder or decoder per request, response, and event
//!
//! # Example
//!
//! ```
//! use spectra_client::codec::messages::CreateFigure;
//!
//! let payload = CreateFigure::new("Test", 800, 600).encode();
//! let decoded = CreateFigure::decode(&payload);
//! assert_eq!(decoded.title, "Test");
//! assert_eq!((decoded.width, decoded.height), (800, 600));
//! ```

pub mod messages;
mod tlv;

pub use tlv::{PayloadDecoder, PayloadEncoder, FIELD_HEADER_SIZE};
