//! Basic line plot.
//!
//! Connects to the daemon (starting it if needed), draws `sin(x)` in a
//! single subplot and blocks until the window is closed.
//!
//! ```text
//! SPECTRA_LOG=debug cargo run --example basic_line
//! ```

use spectra_client::codec::messages::{AddSeries, CreateAxes, CreateFigure, UpdateProperty};
use spectra_client::Session;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    spectra_client::logging::init_from_env();

    let session = Session::builder().connect()?;
    let fig = session.create_figure(&CreateFigure::new("sin(x)", 960, 540))?;
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
        label: "sin".into(),
    })?;

    let x: Vec<f32> = (0..1000).map(|i| i as f32 * 0.01).collect();
    let y: Vec<f32> = x.iter().map(|v| v.sin()).collect();
    session.set_xy(fig, series, &x, &y)?;

    session.update_batch(&[
        UpdateProperty::new(fig, "xlabel").axes(axes).text("x"),
        UpdateProperty::new(fig, "ylabel").axes(axes).text("sin(x)"),
        UpdateProperty::new(fig, "grid").axes(axes).flag(true),
    ])?;

    session.show(fig)?;
    session.wait_for_close()?;
    Ok(())
}
