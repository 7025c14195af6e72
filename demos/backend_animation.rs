//! Daemon-clocked animation.
//!
//! The daemon sends ANIM_TICK events at 30 fps for five seconds; each tick
//! arrives on a channel and the main thread answers it with new data.

use std::time::Duration;

use spectra_client::animation::{ipc_sleep, BackendAnimator};
use spectra_client::codec::messages::{AddSeries, CreateAxes, CreateFigure};
use spectra_client::Session;

const POINTS: usize = 400;

fn wave(t: f32) -> Vec<f32> {
    (0..POINTS)
        .flat_map(|i| {
            let x = i as f32 / POINTS as f32 * std::f32::consts::TAU;
            [x, (x + t * 2.0).sin()]
        })
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    spectra_client::logging::init_from_env();

    let session = Session::builder().connect()?;
    let fig = session.create_figure(&CreateFigure::new("travelling wave", 800, 450))?;
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
        label: "wave".into(),
    })?;
    session.set_data(fig, series, &wave(0.0))?;
    session.show(fig)?;

    let mut anim = BackendAnimator::new(fig, 30.0).duration(5.0);
    let ticks = anim.start_channel(&session)?;

    // Ticks are read off the socket by requests and drains; ipc_sleep
    // pumps them into the channel between frames.
    while session.is_figure_visible(fig) {
        ipc_sleep(&session, Duration::from_millis(10))?;
        if let Some(tick) = ticks.try_iter().last() {
            session.set_data(fig, series, &wave(tick.t))?;
        }
    }

    anim.stop(&session)?;
    Ok(())
}
