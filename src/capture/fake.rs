//! In-memory capture provider for tests. Counts live streams so tests can
//! check that hardware is released on every path.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;

use super::device::{
    CaptureProvider, DeviceInfo, DeviceKind, FacingMode, FrameFormat, LiveStream,
    ProviderFailure, RawFrame, StreamConstraints, StreamSettings,
};

pub(crate) struct FakeCaptureProvider {
    devices: Mutex<Result<Vec<DeviceInfo>, ProviderFailure>>,
    request_failure: Mutex<Option<ProviderFailure>>,
    grant: (u32, u32),
    permission_delay: Option<Duration>,
    frames_on_start: bool,
    requests: AtomicUsize,
    live: Arc<AtomicUsize>,
    max_live: Arc<AtomicUsize>,
    last_stream: Mutex<Weak<FakeStream>>,
}

impl FakeCaptureProvider {
    fn build(devices: Result<Vec<DeviceInfo>, ProviderFailure>) -> Self {
        Self {
            devices: Mutex::new(devices),
            request_failure: Mutex::new(None),
            grant: (640, 480),
            permission_delay: None,
            frames_on_start: true,
            requests: AtomicUsize::new(0),
            live: Arc::new(AtomicUsize::new(0)),
            max_live: Arc::new(AtomicUsize::new(0)),
            last_stream: Mutex::new(Weak::new()),
        }
    }

    pub fn with_camera() -> Self {
        Self::build(Ok(vec![rear_camera()]))
    }

    pub fn with_devices(devices: Vec<DeviceInfo>) -> Self {
        Self::build(Ok(devices))
    }

    pub fn without_devices() -> Self {
        Self::build(Ok(Vec::new()))
    }

    pub fn enumeration_fails(failure: ProviderFailure) -> Self {
        Self::build(Err(failure))
    }

    pub fn failing_with(self, failure: ProviderFailure) -> Self {
        *self.request_failure.lock().unwrap() = Some(failure);
        self
    }

    pub fn granting(mut self, width: u32, height: u32) -> Self {
        self.grant = (width, height);
        self
    }

    pub fn with_permission_delay(mut self, delay: Duration) -> Self {
        self.permission_delay = Some(delay);
        self
    }

    pub fn without_frames(mut self) -> Self {
        self.frames_on_start = false;
        self
    }

    pub fn detach_all(&self) {
        *self.devices.lock().unwrap() = Ok(Vec::new());
    }

    pub fn set_request_failure(&self, failure: Option<ProviderFailure>) {
        *self.request_failure.lock().unwrap() = failure;
    }

    /// Deliver a frame to the most recently granted stream.
    pub fn publish_frame(&self) {
        if let Some(stream) = self.last_stream.lock().unwrap().upgrade() {
            let (w, h) = self.grant;
            *stream.frame.lock().unwrap() = Some(gradient_frame(w, h));
        }
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn live_streams(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn max_live_streams(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureProvider for FakeCaptureProvider {
    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, ProviderFailure> {
        self.devices.lock().unwrap().clone()
    }

    async fn request_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Arc<dyn LiveStream>, ProviderFailure> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.request_failure.lock().unwrap().clone() {
            return Err(failure);
        }

        let (w, h) = self.grant;
        let now_live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(now_live, Ordering::SeqCst);

        let stream = Arc::new(FakeStream {
            settings: StreamSettings {
                device_id: "cam-rear".into(),
                width: w,
                height: h,
                facing: Some(constraints.facing),
            },
            frame: Mutex::new(self.frames_on_start.then(|| gradient_frame(w, h))),
            stopped: AtomicBool::new(false),
            live: Arc::clone(&self.live),
        });
        *self.last_stream.lock().unwrap() = Arc::downgrade(&stream);

        // Hardware is already held while the permission prompt is pending;
        // dropping this future drops the stream and releases it.
        if let Some(delay) = self.permission_delay {
            tokio::time::sleep(delay).await;
        }

        Ok(stream)
    }
}

pub(crate) struct FakeStream {
    settings: StreamSettings,
    frame: Mutex<Option<RawFrame>>,
    stopped: AtomicBool,
    live: Arc<AtomicUsize>,
}

impl LiveStream for FakeStream {
    fn settings(&self) -> StreamSettings {
        self.settings.clone()
    }

    fn latest_frame(&self) -> Option<RawFrame> {
        if self.stopped.load(Ordering::SeqCst) {
            return None;
        }
        self.frame.lock().unwrap().clone()
    }

    fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_live(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst)
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        self.stop();
    }
}

pub(crate) fn rear_camera() -> DeviceInfo {
    DeviceInfo {
        device_id: "cam-rear".into(),
        label: "Back Camera".into(),
        kind: DeviceKind::VideoInput,
        facing: Some(FacingMode::Environment),
    }
}

pub(crate) fn gradient_frame(width: u32, height: u32) -> RawFrame {
    let mut data = Vec::with_capacity(width as usize * height as usize * 3);
    for y in 0..height {
        for x in 0..width {
            data.push((x * 255 / width.max(1)) as u8);
            data.push((y * 255 / height.max(1)) as u8);
            data.push(128);
        }
    }
    RawFrame {
        width,
        height,
        format: FrameFormat::Rgb8,
        data,
    }
}
