// Test mocks for the resolver pipeline.
//
// Three mocks matching the three trait boundaries:
// - MockTransport (HttpTransport): URL → scripted response sequence
// - MockSearcher (WebSearcher): query → result URLs
// - MockExtractor (StructuredExtractor): fixed profile or error, records requests
//
// Plus in-memory PNG builders for logo comparison tests.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use crate::discovery::{SearchQuery, WebSearcher};
use crate::extraction::{CompanyProfile, ExtractionRequest, StructuredExtractor};
use crate::transport::{HttpTransport, TransportError, TransportResponse};

// ---------------------------------------------------------------------------
// MockTransport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum MockResponse {
    Ok {
        status: u16,
        content_type: Option<String>,
        body: Vec<u8>,
    },
    Fail(TransportError),
    Delayed(Duration, Box<MockResponse>),
}

impl MockResponse {
    pub fn html(body: &str) -> Self {
        MockResponse::Ok {
            status: 200,
            content_type: Some("text/html; charset=utf-8".to_string()),
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn image(bytes: Vec<u8>) -> Self {
        MockResponse::Ok {
            status: 200,
            content_type: Some("image/png".to_string()),
            body: bytes,
        }
    }

    pub fn status(status: u16) -> Self {
        MockResponse::Ok {
            status,
            content_type: Some("text/html".to_string()),
            body: Vec::new(),
        }
    }

    pub fn delayed(delay: Duration, then: MockResponse) -> Self {
        MockResponse::Delayed(delay, Box::new(then))
    }
}

/// Scripted transport. The nth request to a URL gets the nth registered
/// response; the last one repeats. Unregistered URLs fail with a
/// non-transient error. Tracks how many requests are in flight at once.
#[derive(Default)]
pub struct MockTransport {
    routes: HashMap<String, Vec<MockResponse>>,
    calls: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Decrements the in-flight count even when the request future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_page(self, url: &str, html: &str) -> Self {
        self.on_sequence(url, vec![MockResponse::html(html)])
    }

    pub fn on_image(self, url: &str, bytes: Vec<u8>) -> Self {
        self.on_sequence(url, vec![MockResponse::image(bytes)])
    }

    pub fn on_status(self, url: &str, status: u16) -> Self {
        self.on_sequence(url, vec![MockResponse::status(status)])
    }

    pub fn on_error(self, url: &str, error: TransportError) -> Self {
        self.on_sequence(url, vec![MockResponse::Fail(error)])
    }

    pub fn on_delayed(self, url: &str, delay: Duration, then: MockResponse) -> Self {
        self.on_sequence(url, vec![MockResponse::delayed(delay, then)])
    }

    pub fn on_sequence(mut self, url: &str, responses: Vec<MockResponse>) -> Self {
        self.routes.insert(url.to_string(), responses);
        self
    }

    /// Number of requests made to `url` so far.
    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    /// Highest number of requests observed in flight at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        let nth = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(url.to_string()).or_insert(0);
            *count += 1;
            *count - 1
        };
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let Some(responses) = self.routes.get(url).filter(|r| !r.is_empty()) else {
            return Err(TransportError::Request(format!(
                "MockTransport: no response registered for {url}"
            )));
        };
        let mut response = responses[nth.min(responses.len() - 1)].clone();

        loop {
            match response {
                MockResponse::Delayed(delay, then) => {
                    tokio::time::sleep(delay).await;
                    response = *then;
                }
                MockResponse::Fail(err) => return Err(err),
                MockResponse::Ok {
                    status,
                    content_type,
                    body,
                } => {
                    return Ok(TransportResponse {
                        status,
                        content_type,
                        body,
                    })
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MockSearcher
// ---------------------------------------------------------------------------

/// Query-keyed searcher. Unregistered queries return no results.
#[derive(Default)]
pub struct MockSearcher {
    results: HashMap<String, Vec<String>>,
    failure: Option<String>,
    delay: Option<Duration>,
    queries: Mutex<Vec<SearchQuery>>,
}

impl MockSearcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_search(mut self, query: &str, urls: Vec<&str>) -> Self {
        self.results
            .insert(query.to_string(), urls.into_iter().map(str::to_string).collect());
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every query received, in order.
    pub fn queries(&self) -> Vec<SearchQuery> {
        self.queries.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl WebSearcher for MockSearcher {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<String>> {
        self.queries.lock().unwrap().push(query.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.failure {
            return Err(anyhow!("MockSearcher: {message}"));
        }
        Ok(self.results.get(&query.query).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

pub struct MockExtractor {
    outcome: std::result::Result<CompanyProfile, String>,
    requests: Mutex<Vec<ExtractionRequest>>,
}

impl MockExtractor {
    pub fn returning(profile: CompanyProfile) -> Self {
        Self {
            outcome: Ok(profile),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ExtractionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl StructuredExtractor for MockExtractor {
    async fn extract(&self, request: &ExtractionRequest) -> Result<CompanyProfile> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.outcome {
            Ok(profile) => Ok(profile.clone()),
            Err(message) => Err(anyhow!("{message}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Test images
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub enum Split {
    /// Black left half, white right half.
    Vertical,
    /// Black top half, white bottom half.
    Horizontal,
}

const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

fn encode_png(img: RgbaImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

pub fn solid_png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    encode_png(RgbaImage::from_pixel(width, height, Rgba(rgba)))
}

pub fn split_png(width: u32, height: u32, split: Split) -> Vec<u8> {
    encode_png(RgbaImage::from_fn(width, height, |x, y| {
        let dark = match split {
            Split::Vertical => x < width / 2,
            Split::Horizontal => y < height / 2,
        };
        if dark {
            BLACK
        } else {
            WHITE
        }
    }))
}

/// Black ellipse inscribed in a white `width × height` canvas.
pub fn circle_png(width: u32, height: u32) -> Vec<u8> {
    let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
    let (rx, ry) = (width as f64 * 0.4, height as f64 * 0.4);
    encode_png(RgbaImage::from_fn(width, height, |x, y| {
        let dx = (x as f64 + 0.5 - cx) / rx;
        let dy = (y as f64 + 0.5 - cy) / ry;
        if dx * dx + dy * dy <= 1.0 {
            BLACK
        } else {
            WHITE
        }
    }))
}
