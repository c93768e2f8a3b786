//! Error Log Tests
//!
//! A failed load pass reports through the `log` facade only; these tests
//! capture the emitted lines.

use std::sync::{Arc, Mutex, OnceLock};

use myth_gltfio::assets::{Asset, BufferBinding, HostBuffer, ResourceBinder};
use myth_gltfio::renderer::{BufferDescriptor, BufferUploader, IndexBufferHandle, VertexBufferHandle};

struct CaptureLogger {
    lines: Mutex<Vec<(log::Level, String)>>,
}

impl log::Log for CaptureLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

fn logger() -> &'static CaptureLogger {
    static LOGGER: OnceLock<&'static CaptureLogger> = OnceLock::new();
    LOGGER.get_or_init(|| {
        let logger: &'static CaptureLogger = Box::leak(Box::new(CaptureLogger {
            lines: Mutex::new(Vec::new()),
        }));
        log::set_logger(logger).expect("logger already installed");
        log::set_max_level(log::LevelFilter::Trace);
        logger
    })
}

fn error_logged(message: &str) -> bool {
    logger()
        .lines
        .lock()
        .unwrap()
        .iter()
        .any(|(level, line)| *level == log::Level::Error && line == message)
}

#[derive(Default)]
struct CountingUploader {
    count: Mutex<usize>,
}

impl BufferUploader for CountingUploader {
    fn set_vertex_buffer_at(&self, _buffer: VertexBufferHandle, _slot: usize, _descriptor: BufferDescriptor) {
        *self.count.lock().unwrap() += 1;
    }

    fn set_index_buffer(&self, _buffer: IndexBufferHandle, _descriptor: BufferDescriptor) {
        *self.count.lock().unwrap() += 1;
    }
}

#[test]
fn malformed_binding_is_logged() {
    logger();
    let uploader = Arc::new(CountingUploader::default());
    let binder = ResourceBinder::new(Arc::clone(&uploader), ".");
    let uri = "data:application/octet-stream;base64,AAECAw==";
    let asset = Asset {
        bindings: vec![BufferBinding::new(uri, 0, 4)],
        ..Default::default()
    };

    assert!(!binder.load_resources(&asset));
    assert!(error_logged(&format!("Malformed binding: {uri}")));
    assert_eq!(*uploader.count.lock().unwrap(), 0);
}

#[test]
fn unresolvable_resource_is_logged() {
    logger();
    let binder = ResourceBinder::new(CountingUploader::default(), ".");
    let asset = Asset {
        bindings: vec![BufferBinding::new("ftp://host/mesh.bin", 0, 4).bind_animation(HostBuffer::default())],
        ..Default::default()
    };

    assert!(!binder.load_resources(&asset));
    assert!(error_logged("Unable to obtain resource: ftp://host/mesh.bin"));
}
