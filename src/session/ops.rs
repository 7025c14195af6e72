//! Typed figure, axes, series and data operations.

use tracing::debug;

use super::Session;
use crate::chunk::ChunkPlan;
use crate::codec::messages::{
    encode_figure_id, encode_reconnect, encode_remove_series, encode_show, encode_update_batch,
    AddSeries, AppendData, AxesCreated, CreateAxes, CreateFigure, DataSource, FigureCreated,
    FigureList, SeriesAdded, SetData, Snapshot, UpdateProperty,
};
use crate::data::{f32_to_le_bytes, interleave_xy, interleave_xyz};
use crate::error::{Result, SpectraError};
use crate::protocol::msg_type;
use crate::transport::Channel;

const F32_SIZE: usize = std::mem::size_of::<f32>();

/// How one set-data write travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataPath {
    Inline,
    SharedMemory,
    Chunked,
}

fn element_count(raw: &[u8]) -> Result<u32> {
    if raw.len() % F32_SIZE != 0 {
        return Err(SpectraError::Protocol(format!(
            "Raw data of {} bytes is not a whole number of f32 values",
            raw.len()
        )));
    }
    u32::try_from(raw.len() / F32_SIZE).map_err(|_| {
        SpectraError::Protocol(format!("Raw data of {} bytes is too large", raw.len()))
    })
}

impl<C: Channel> Session<C> {
    // ------------------------------------------------------------------
    // Figures
    // ------------------------------------------------------------------

    /// Create a figure and start tracking it. Returns the figure id.
    pub fn create_figure(&self, req: &CreateFigure) -> Result<u64> {
        let frame = self.request(msg_type::REQ_CREATE_FIGURE, &req.encode())?;
        let figure_id = FigureCreated::decode(frame.payload()).figure_id;
        self.figures_mut().insert(figure_id, &req.title);
        debug!(figure_id, title = %req.title, "figure created");
        Ok(figure_id)
    }

    /// Remove a figure from the daemon's model.
    pub fn destroy_figure(&self, figure_id: u64) -> Result<()> {
        self.request(msg_type::REQ_DESTROY_FIGURE, &encode_figure_id(figure_id))?;
        self.figures_mut().remove(figure_id);
        self.remove_tick_listener(figure_id);
        Ok(())
    }

    /// Open a window for the figure.
    pub fn show(&self, figure_id: u64) -> Result<()> {
        self.show_in_window(figure_id, 0)
    }

    /// Show the figure in an existing window. 0 asks for a new one.
    pub fn show_in_window(&self, figure_id: u64, window_id: u64) -> Result<()> {
        self.request(msg_type::REQ_SHOW, &encode_show(figure_id, window_id))?;
        self.figures_mut().mark_shown(figure_id);
        Ok(())
    }

    /// Close the figure's window but keep the figure.
    pub fn close_figure(&self, figure_id: u64) -> Result<()> {
        self.request(msg_type::REQ_CLOSE_FIGURE, &encode_figure_id(figure_id))?;
        self.figures_mut().mark_closed(figure_id);
        Ok(())
    }

    /// Figure ids the daemon holds for this session.
    pub fn list_figures(&self) -> Result<Vec<u64>> {
        let frame = self.request(msg_type::REQ_LIST_FIGURES, &[])?;
        Ok(FigureList::decode(frame.payload()).figure_ids)
    }

    /// The daemon's model revision and figure ids.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let frame = self.request(msg_type::REQ_GET_SNAPSHOT, &[])?;
        Ok(Snapshot::decode(frame.payload()))
    }

    /// Re-attach to a daemon session and restore its figures.
    ///
    /// Reopens the transport and handshakes first if the connection is
    /// down. `session_id` 0 means the current session. Returns the figure
    /// ids from the snapshot; they are registered as already shown.
    pub fn reconnect(&self, session_id: u64, token: &str) -> Result<Vec<u64>> {
        let current = {
            let mut conn = self.conn.lock();
            if !conn.is_open() {
                self.handshake(&mut conn)?;
            }
            conn.session_id
        };

        let target = if session_id != 0 { session_id } else { current };
        let frame = self.request(msg_type::REQ_RECONNECT, &encode_reconnect(target, token))?;

        let figure_ids = if frame.msg_type() == msg_type::RESP_SNAPSHOT {
            Snapshot::decode(frame.payload()).figure_ids
        } else {
            Vec::new()
        };
        {
            let mut figures = self.figures_mut();
            for &id in &figure_ids {
                figures.restore(id);
            }
        }
        debug!(session_id = target, figures = figure_ids.len(), "session restored");
        Ok(figure_ids)
    }

    // ------------------------------------------------------------------
    // Axes and series
    // ------------------------------------------------------------------

    /// Returns the new axes index.
    pub fn create_axes(&self, req: &CreateAxes) -> Result<u32> {
        let frame = self.request(msg_type::REQ_CREATE_AXES, &req.encode())?;
        Ok(AxesCreated::decode(frame.payload()).axes_index)
    }

    /// Returns the new series index.
    pub fn add_series(&self, req: &AddSeries) -> Result<u32> {
        let frame = self.request(msg_type::REQ_ADD_SERIES, &req.encode())?;
        Ok(SeriesAdded::decode(frame.payload()).series_index)
    }

    pub fn remove_series(&self, figure_id: u64, series_index: u32) -> Result<()> {
        self.request(
            msg_type::REQ_REMOVE_SERIES,
            &encode_remove_series(figure_id, series_index),
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Data
    // ------------------------------------------------------------------

    fn data_path(&self, bytes: usize) -> DataPath {
        if ChunkPlan::needs_chunking(bytes, self.config.chunk_size) {
            DataPath::Chunked
        } else if self.config.shm_enabled && bytes >= self.config.shm_threshold {
            DataPath::SharedMemory
        } else {
            DataPath::Inline
        }
    }

    /// Replace a series' values.
    ///
    /// Small writes go inline, large ones through shared memory (falling
    /// back to inline when unavailable), and writes above the chunk size
    /// as a chunked transfer.
    pub fn set_data(&self, figure_id: u64, series_index: u32, values: &[f32]) -> Result<()> {
        if self.data_path(values.len() * F32_SIZE) == DataPath::Inline {
            let msg = SetData::new(figure_id, series_index, DataSource::Floats(values));
            return self.send_set_data(&msg);
        }
        self.set_data_raw(figure_id, series_index, &f32_to_le_bytes(values))
    }

    /// [`set_data`](Self::set_data) for values already packed as
    /// little-endian `f32` bytes.
    pub fn set_data_raw(&self, figure_id: u64, series_index: u32, raw: &[u8]) -> Result<()> {
        let count = element_count(raw)?;
        match self.data_path(raw.len()) {
            DataPath::Chunked => self.send_chunked(figure_id, series_index, raw),
            DataPath::SharedMemory => self.send_shared(figure_id, series_index, raw, count),
            DataPath::Inline => {
                let data = DataSource::Raw { bytes: raw, count };
                self.send_set_data(&SetData::new(figure_id, series_index, data))
            }
        }
    }

    /// Set `(x, y)` pairs, interleaved.
    pub fn set_xy(&self, figure_id: u64, series_index: u32, x: &[f32], y: &[f32]) -> Result<()> {
        self.set_data(figure_id, series_index, &interleave_xy(x, y)?)
    }

    /// Set `(x, y, z)` triples, interleaved.
    pub fn set_xyz(
        &self,
        figure_id: u64,
        series_index: u32,
        x: &[f32],
        y: &[f32],
        z: &[f32],
    ) -> Result<()> {
        self.set_data(figure_id, series_index, &interleave_xyz(x, y, z)?)
    }

    fn send_set_data(&self, msg: &SetData<'_>) -> Result<()> {
        self.request(msg_type::REQ_SET_DATA, &msg.encode())?;
        Ok(())
    }

    fn send_shared(&self, figure_id: u64, series_index: u32, raw: &[u8], count: u32) -> Result<()> {
        self.blobs.cleanup_expired();
        let Some(blob) = self.blobs.create_blob(raw) else {
            let data = DataSource::Raw { bytes: raw, count };
            return self.send_set_data(&SetData::new(figure_id, series_index, data));
        };

        let data = DataSource::Shm {
            name: blob.name(),
            count,
        };
        let result = self.send_set_data(&SetData::new(figure_id, series_index, data));
        if result.is_err() {
            // The daemon never saw it, so no BLOB_RELEASE will come.
            self.blobs.release_blob(blob.name());
        }
        result
    }

    fn send_chunked(&self, figure_id: u64, series_index: u32, raw: &[u8]) -> Result<()> {
        let plan = ChunkPlan::new(raw.len(), self.config.chunk_size, F32_SIZE)?;
        debug!(
            figure_id,
            series_index,
            chunks = plan.chunk_count(),
            total = plan.total_count(),
            "sending chunked transfer"
        );
        // One lock hold for the whole transfer: the receiver rejects chunks
        // interleaved with other writes to the series.
        let payloads = plan.chunks().map(|chunk| {
            let data = DataSource::Raw {
                bytes: &raw[chunk.range.clone()],
                count: chunk.element_count(F32_SIZE),
            };
            SetData::new(figure_id, series_index, data)
                .chunk(chunk.info)
                .encode()
        });
        self.request_sequence(msg_type::REQ_SET_DATA, payloads)
    }

    /// Append values to a series (streaming). Always inline.
    pub fn append_data(&self, figure_id: u64, series_index: u32, values: &[f32]) -> Result<()> {
        let msg = AppendData {
            figure_id,
            series_index,
            data: DataSource::Floats(values),
        };
        self.request(msg_type::REQ_APPEND_DATA, &msg.encode())?;
        Ok(())
    }

    /// [`append_data`](Self::append_data) for pre-packed `f32` bytes.
    pub fn append_data_raw(&self, figure_id: u64, series_index: u32, raw: &[u8]) -> Result<()> {
        let count = element_count(raw)?;
        let msg = AppendData {
            figure_id,
            series_index,
            data: DataSource::Raw { bytes: raw, count },
        };
        self.request(msg_type::REQ_APPEND_DATA, &msg.encode())?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    pub fn update_property(&self, update: &UpdateProperty) -> Result<()> {
        self.request(msg_type::REQ_UPDATE_PROPERTY, &update.encode())?;
        Ok(())
    }

    /// Send several property updates in one message. Empty is a no-op.
    pub fn update_batch(&self, updates: &[UpdateProperty]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        self.request(msg_type::REQ_UPDATE_BATCH, &encode_update_batch(updates))?;
        Ok(())
    }
}
