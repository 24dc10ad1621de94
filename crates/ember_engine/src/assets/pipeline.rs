//! Asynchronous load pipeline
//!
//! Blocking file I/O and decode run on a small pool of worker threads;
//! results travel back to the main thread by value over a channel and are
//! drained exactly once per frame. No registry, slot, or view structure is
//! ever touched from a worker — the only cross-thread traffic is the
//! request and its result buffer.

use crate::assets::loader::{ImageData, LoaderError, ResourceLoader};
use crate::resources::registry::Handle;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Suffix order for the six cube map faces: right, left, up, down,
/// front, back.
pub const CUBE_FACE_SUFFIXES: [&str; 6] = ["_r", "_l", "_u", "_d", "_f", "_b"];

/// A unit of work for the worker pool
#[derive(Debug)]
pub enum LoadRequest {
    /// Load and decode a single 2D image
    Image {
        /// Resource name as registered in the texture registry
        name: String,
        /// Slot the result will be swapped into
        handle: Handle,
    },
    /// Load six conventionally-suffixed face images into one cube map
    CubeMap {
        /// Base resource name (faces are `<name>_r`, `<name>_l`, ...)
        name: String,
        /// Slot the result will be swapped into
        handle: Handle,
    },
}

/// Decoded result data produced by a worker
#[derive(Debug)]
pub enum LoadPayload {
    /// A single 2D image
    Image(ImageData),
    /// Six faces of equal size concatenated in [`CUBE_FACE_SUFFIXES`] order
    CubeMap {
        /// Per-face width
        width: u32,
        /// Per-face height
        height: u32,
        /// Channel count (4 after decode)
        channels: u8,
        /// Concatenated face pixels
        pixels: Vec<u8>,
    },
}

/// Completion record delivered back to the main thread
#[derive(Debug)]
pub struct LoadCompletion {
    /// Resource name the request was issued for
    pub name: String,
    /// Slot the request was issued for
    pub handle: Handle,
    /// Decoded payload or the load failure
    pub result: Result<LoadPayload, LoaderError>,
}

/// Worker pool plus the two channels tying it to the main thread
pub struct LoadPipeline {
    request_tx: Option<flume::Sender<LoadRequest>>,
    completion_rx: flume::Receiver<LoadCompletion>,
    workers: Vec<JoinHandle<()>>,
}

impl LoadPipeline {
    /// Spin up `worker_count` loader threads (minimum 1)
    pub fn new(worker_count: usize, loader: Arc<dyn ResourceLoader>) -> Self {
        let (request_tx, request_rx) = flume::unbounded::<LoadRequest>();
        let (completion_tx, completion_rx) = flume::unbounded::<LoadCompletion>();

        let workers = (0..worker_count.max(1))
            .map(|_| {
                let request_rx = request_rx.clone();
                let completion_tx = completion_tx.clone();
                let loader = Arc::clone(&loader);
                std::thread::spawn(move || {
                    while let Ok(request) = request_rx.recv() {
                        let completion = run_request(loader.as_ref(), request);
                        if completion_tx.send(completion).is_err() {
                            break;
                        }
                    }
                })
            })
            .collect();

        log::info!("Load pipeline started with {} worker(s)", worker_count.max(1));
        Self {
            request_tx: Some(request_tx),
            completion_rx,
            workers,
        }
    }

    /// Queue a request for the worker pool
    ///
    /// Returns `false` if the pipeline has already shut down.
    pub fn submit(&self, request: LoadRequest) -> bool {
        match &self.request_tx {
            Some(tx) => tx.send(request).is_ok(),
            None => false,
        }
    }

    /// Drain every completion currently queued, applying `apply` to each
    ///
    /// Must only be called from the owning (main/render) thread; this is
    /// the single point where load results become visible to the engine.
    /// Returns the number of completions processed.
    pub fn drain(&self, mut apply: impl FnMut(LoadCompletion)) -> usize {
        let mut drained = 0;
        while let Ok(completion) = self.completion_rx.try_recv() {
            apply(completion);
            drained += 1;
        }
        drained
    }

    /// Close the request channel and join every worker
    pub fn shutdown(&mut self) {
        if self.request_tx.take().is_some() {
            for worker in self.workers.drain(..) {
                let _ = worker.join();
            }
            log::info!("Load pipeline shut down");
        }
    }
}

impl Drop for LoadPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Execute one request on a worker thread
fn run_request(loader: &dyn ResourceLoader, request: LoadRequest) -> LoadCompletion {
    match request {
        LoadRequest::Image { name, handle } => {
            let result = loader.load_image(&name).map(LoadPayload::Image);
            LoadCompletion { name, handle, result }
        }
        LoadRequest::CubeMap { name, handle } => {
            let result = load_cube_faces(loader, &name);
            LoadCompletion { name, handle, result }
        }
    }
}

/// Load the six faces of a cube map and concatenate their pixels
///
/// A resolution or channel-count mismatch between faces is a hard failure;
/// faces decoded before the mismatch are dropped on the floor (they are
/// plain memory, nothing is partially acquired on a worker).
fn load_cube_faces(loader: &dyn ResourceLoader, name: &str) -> Result<LoadPayload, LoaderError> {
    let mut expected: Option<(u32, u32, u8)> = None;
    let mut pixels = Vec::new();

    for suffix in CUBE_FACE_SUFFIXES {
        let face_name = format!("{name}{suffix}");
        let face = loader.load_image(&face_name)?;
        match expected {
            None => {
                expected = Some((face.width, face.height, face.channels));
                pixels.reserve(face.data.len() * 6);
            }
            Some((width, height, channels)) => {
                if face.width != width || face.height != height || face.channels != channels {
                    return Err(LoaderError::CubeFaceMismatch {
                        name: name.to_string(),
                        face: face_name,
                        width,
                        height,
                        channels,
                        face_width: face.width,
                        face_height: face.height,
                        face_channels: face.channels,
                    });
                }
            }
        }
        pixels.extend_from_slice(&face.data);
    }

    let (width, height, channels) = expected.unwrap_or((0, 0, 0));
    Ok(LoadPayload::CubeMap {
        width,
        height,
        channels,
        pixels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::material::MaterialConfig;
    use std::collections::HashMap;
    use std::time::{Duration, Instant};

    /// Loader serving canned images from memory
    struct StaticLoader {
        images: HashMap<String, ImageData>,
    }

    impl StaticLoader {
        fn new(images: impl IntoIterator<Item = (String, ImageData)>) -> Self {
            Self {
                images: images.into_iter().collect(),
            }
        }
    }

    impl ResourceLoader for StaticLoader {
        fn load_image(&self, name: &str) -> Result<ImageData, LoaderError> {
            self.images
                .get(name)
                .cloned()
                .ok_or_else(|| LoaderError::NotFound(name.to_string()))
        }

        fn load_material(&self, name: &str) -> Result<MaterialConfig, LoaderError> {
            Err(LoaderError::NotFound(name.to_string()))
        }
    }

    fn pixel(width: u32, height: u32) -> ImageData {
        ImageData {
            data: vec![255; (width * height * 4) as usize],
            width,
            height,
            channels: 4,
        }
    }

    fn drain_one(pipeline: &LoadPipeline) -> LoadCompletion {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let mut out = None;
            pipeline.drain(|c| out = Some(c));
            if let Some(c) = out {
                return c;
            }
            assert!(Instant::now() < deadline, "load pipeline timed out");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_image_request_completes_with_payload() {
        let loader = Arc::new(StaticLoader::new([("brick".to_string(), pixel(2, 2))]));
        let pipeline = LoadPipeline::new(1, loader);
        assert!(pipeline.submit(LoadRequest::Image {
            name: "brick".to_string(),
            handle: Handle::DEFAULT,
        }));

        let completion = drain_one(&pipeline);
        assert_eq!(completion.name, "brick");
        match completion.result {
            Ok(LoadPayload::Image(img)) => {
                assert_eq!((img.width, img.height), (2, 2));
            }
            other => panic!("unexpected completion: {other:?}"),
        }
    }

    #[test]
    fn test_missing_image_completes_with_error() {
        let loader = Arc::new(StaticLoader::new([]));
        let pipeline = LoadPipeline::new(1, loader);
        pipeline.submit(LoadRequest::Image {
            name: "missing".to_string(),
            handle: Handle::DEFAULT,
        });

        let completion = drain_one(&pipeline);
        assert!(matches!(completion.result, Err(LoaderError::NotFound(_))));
    }

    #[test]
    fn test_cube_map_concatenates_six_faces() {
        let faces = CUBE_FACE_SUFFIXES
            .iter()
            .map(|s| (format!("sky{s}"), pixel(4, 4)));
        let pipeline = LoadPipeline::new(2, Arc::new(StaticLoader::new(faces)));
        pipeline.submit(LoadRequest::CubeMap {
            name: "sky".to_string(),
            handle: Handle::DEFAULT,
        });

        let completion = drain_one(&pipeline);
        match completion.result {
            Ok(LoadPayload::CubeMap {
                width,
                height,
                channels,
                pixels,
            }) => {
                assert_eq!((width, height, channels), (4, 4, 4));
                assert_eq!(pixels.len(), 4 * 4 * 4 * 6);
            }
            other => panic!("unexpected completion: {other:?}"),
        }
    }

    #[test]
    fn test_cube_map_face_mismatch_is_hard_failure() {
        let mut faces: Vec<(String, ImageData)> = CUBE_FACE_SUFFIXES
            .iter()
            .map(|s| (format!("sky{s}"), pixel(4, 4)))
            .collect();
        faces[3].1 = pixel(8, 8); // "_d" face disagrees

        let pipeline = LoadPipeline::new(1, Arc::new(StaticLoader::new(faces)));
        pipeline.submit(LoadRequest::CubeMap {
            name: "sky".to_string(),
            handle: Handle::DEFAULT,
        });

        let completion = drain_one(&pipeline);
        assert!(matches!(
            completion.result,
            Err(LoaderError::CubeFaceMismatch { .. })
        ));
    }

    #[test]
    fn test_shutdown_joins_workers_and_rejects_submissions() {
        let mut pipeline = LoadPipeline::new(2, Arc::new(StaticLoader::new([])));
        pipeline.shutdown();
        assert!(!pipeline.submit(LoadRequest::Image {
            name: "late".to_string(),
            handle: Handle::DEFAULT,
        }));
    }
}
