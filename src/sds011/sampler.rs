/// Async task feeding decoded particulate readings into the smoothing buffers
use log::debug;
use tokio::sync::mpsc;

use crate::buffer::SharedBuffer;
use crate::sds011::frame;

/// Consumes serial byte runs until the channel closes.
///
/// Each run is validated independently; malformed runs are dropped without
/// comment since the line carries continuous noise between frames. The
/// sampler is the sole writer of both buffers.
pub async fn run(mut runs: mpsc::Receiver<Vec<u8>>, pm25: SharedBuffer, pm10: SharedBuffer) {
    while let Some(run) = runs.recv().await {
        if let Some(reading) = frame::try_decode(&run) {
            pm25.lock().await.add(reading.pm25);
            pm10.lock().await.add(reading.pm10);

            debug!(
                "SDS011 reading: PM2.5 {:.1} µg/m³, PM10 {:.1} µg/m³",
                reading.pm25, reading.pm10
            );
        }
    }

    debug!("Serial run channel closed, sampler stopping");
}
