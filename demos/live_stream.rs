//! Client-paced streaming on a live thread.
//!
//! Appends a noisy random walk at 60 fps until the window is closed.

use std::sync::Arc;

use spectra_client::animation::LiveOptions;
use spectra_client::codec::messages::{AddSeries, CreateAxes, CreateFigure};
use spectra_client::Session;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    spectra_client::logging::init_from_env();

    let session = Arc::new(Session::builder().connect()?);
    let fig = session.create_figure(&CreateFigure::new("live stream", 1024, 400))?;
    let axes = session.create_axes(&CreateAxes {
        figure_id: fig,
        rows: 1,
        cols: 1,
        index: 1,
        is_3d: false,
    })?;
    let series = session.add_series(&AddSeries {
        figure_id: fig,
        axes_index: axes,
        series_type: "line".into(),
        label: "walk".into(),
    })?;
    session.show(fig)?;

    let mut value = 0.0f32;
    let mut seed = 0x2545_f491_u32;
    let handle = session.spawn_live_with(LiveOptions::new(60.0).watch_figure(fig), move |session, frame| {
        // xorshift32
        seed ^= seed << 13;
        seed ^= seed >> 17;
        seed ^= seed << 5;
        value += (seed as f32 / u32::MAX as f32) - 0.5;
        session.append_data(fig, series, &[frame.t as f32, value])
    })?;

    session.wait_for_close()?;
    handle.stop();
    Ok(())
}
