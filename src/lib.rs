//! # spectra-client
//!
//! Rust client runtime for the Spectra rendering daemon.
//!
//! A [`Session`] talks to the daemon over a Unix domain socket using a
//! 40-byte binary header followed by a TLV payload. Everything a client
//! needs sits on top of that one connection:
//!
//! - **Requests**: figure, axes and series management, property updates,
//!   window control, with responses matched to requests by id
//! - **Events**: window closed, animation ticks and blob release,
//!   dispatched whenever they arrive, even in the middle of a request
//! - **Data plane**: inline float arrays, shared-memory blobs for large
//!   series, and chunked transfers above the chunk size
//! - **Animation**: daemon-clocked ticks ([`animation::BackendAnimator`])
//!   or client-paced loops on live threads ([`Session::spawn_live`])
//!
//! The daemon is started on demand (see [`launcher`]).
//!
//! ## Example
//!
//! ```ignore
//! use spectra_client::codec::messages::{AddSeries, CreateAxes, CreateFigure};
//! use spectra_client::Session;
//!
//! fn main() -> spectra_client::Result<()> {
//!     spectra_client::logging::init_from_env();
//!
//!     let session = Session::builder().connect()?;
//!     let fig = session.create_figure(&CreateFigure::new("Demo", 800, 600))?;
//!     let axes = session.create_axes(&CreateAxes {
//!         figure_id: fig,
//!         rows: 1,
//!         cols: 1,
//!         index: 1,
//!         is_3d: false,
//!     })?;
//!     let series = session.add_series(&AddSeries {
//!         figure_id: fig,
//!         axes_index: axes,
//!         series_type: "line".into(),
//!         label: "y = x²".into(),
//!     })?;
//!
//!     let x: Vec<f32> = (0..100).map(|i| i as f32 / 10.0).collect();
//!     let y: Vec<f32> = x.iter().map(|v| v * v).collect();
//!     session.set_xy(fig, series, &x, &y)?;
//!
//!     session.wait_for_close()
//! }
//! ```

pub mod animation;
pub mod blob;
pub mod chunk;
pub mod codec;
pub mod config;
pub mod data;
pub mod error;
pub mod launcher;
pub mod logging;
pub mod protocol;
pub mod session;
pub mod transport;

pub use config::{LaunchConfig, SessionConfig};
pub use error::{Result, SpectraError};
pub use session::{FigureInfo, Session, SessionBuilder, SessionState};
