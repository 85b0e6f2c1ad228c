// src/core/images.rs
use crossbeam_channel::{Receiver, Sender, TryIter, unbounded};
use image::RgbaImage;
use log::{debug, info};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("http error: {0}")]
    Http(ureq::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("decode error: {0}")]
    Decode(#[from] image::ImageError),
    #[error("timed out")]
    Timeout,
}

impl From<ureq::Error> for LoadError {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Timeout(_) => LoadError::Timeout,
            ureq::Error::Io(io) if io.kind() == std::io::ErrorKind::TimedOut => LoadError::Timeout,
            other => LoadError::Http(other),
        }
    }
}

/// Where an image url actually lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Http(String),
    File(PathBuf),
}

fn is_http(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Resolves `url` against `base`. Absolute http(s) and `file://` urls are
/// taken as-is; anything else is relative to `base`, which may itself be an
/// http prefix or a directory (empty means the working directory).
pub fn resolve_url(base: &str, url: &str) -> Source {
    let url = url.trim();
    if is_http(url) {
        return Source::Http(url.to_string());
    }
    if let Some(path) = url.strip_prefix("file://") {
        return Source::File(PathBuf::from(path));
    }
    let base = base.trim();
    if is_http(base) {
        return Source::Http(format!("{}/{}", base.trim_end_matches('/'), url.trim_start_matches('/')));
    }
    if base.is_empty() {
        Source::File(PathBuf::from(url))
    } else {
        Source::File(PathBuf::from(base).join(url))
    }
}

/// HTTP agent with a global per-request timeout.
pub fn get_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

pub fn load(agent: &ureq::Agent, base: &str, url: &str) -> Result<RgbaImage, LoadError> {
    let bytes = match resolve_url(base, url) {
        Source::Http(full) => agent.get(full.as_str()).call()?.into_body().read_to_vec()?,
        Source::File(path) => std::fs::read(path)?,
    };
    Ok(image::load_from_memory(&bytes)?.to_rgba8())
}

pub type LoadResult = (String, Result<RgbaImage, LoadError>);

#[derive(Debug, Clone)]
pub struct LoaderSettings {
    pub base_url: String,
    pub timeout: Duration,
    pub threads: usize,
}

/// Fixed pool of fetch/decode workers. Requests go in by url, results come
/// back tagged with the same url.
pub struct ImageLoader {
    jobs: Sender<String>,
    done: Receiver<LoadResult>,
    _workers: Vec<JoinHandle<()>>,
}

impl ImageLoader {
    pub fn spawn(settings: LoaderSettings) -> std::io::Result<Self> {
        let (jobs, job_rx) = unbounded::<String>();
        let (done_tx, done) = unbounded::<LoadResult>();
        let agent = get_agent(settings.timeout);
        let threads = settings.threads.max(1);

        let mut workers = Vec::with_capacity(threads);
        for i in 0..threads {
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            let agent = agent.clone();
            let base = settings.base_url.clone();
            let handle = thread::Builder::new()
                .name(format!("image-loader-{i}"))
                .spawn(move || {
                    for url in job_rx.iter() {
                        debug!("Loading {}", url);
                        let result = load(&agent, &base, &url);
                        if done_tx.send((url, result)).is_err() {
                            break;
                        }
                    }
                })?;
            workers.push(handle);
        }
        info!("Image loader started with {} worker(s), base '{}'.", threads, settings.base_url);
        Ok(Self { jobs, done, _workers: workers })
    }

    pub fn request(&self, url: String) {
        // Workers only exit once this sender is dropped.
        let _ = self.jobs.send(url);
    }

    /// Finished loads since the last call, without blocking.
    pub fn completed(&self) -> TryIter<'_, LoadResult> {
        self.done.try_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn resolves_relative_against_http_base() {
        assert_eq!(
            resolve_url("http://host:5000/", "/static/a.png"),
            Source::Http("http://host:5000/static/a.png".into())
        );
        assert_eq!(
            resolve_url("http://host:5000", "b.png"),
            Source::Http("http://host:5000/b.png".into())
        );
        assert_eq!(
            resolve_url("http://host/", "https://cdn/x.png"),
            Source::Http("https://cdn/x.png".into())
        );
    }

    #[test]
    fn resolves_files_and_plain_paths() {
        assert_eq!(resolve_url("http://h/", "file:///tmp/a.png"), Source::File("/tmp/a.png".into()));
        assert_eq!(resolve_url("", "a.png"), Source::File("a.png".into()));
        assert_eq!(resolve_url("assets", "a.png"), Source::File(PathBuf::from("assets").join("a.png")));
    }

    #[test]
    fn pool_decodes_files_and_reports_failures() {
        let dir = std::env::temp_dir().join(format!("bundlefeed-images-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let good = dir.join("good.png");
        RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 255])).save(&good).unwrap();
        std::fs::write(dir.join("bad.png"), b"not an image").unwrap();

        let loader = ImageLoader::spawn(LoaderSettings {
            base_url: dir.to_string_lossy().into_owned(),
            timeout: Duration::from_secs(1),
            threads: 2,
        })
        .unwrap();
        for url in ["good.png", "bad.png", "missing.png"] {
            loader.request(url.to_string());
        }

        let mut results = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(10);
        while results.len() < 3 && Instant::now() < deadline {
            results.extend(loader.completed());
            thread::sleep(Duration::from_millis(5));
        }
        results.sort_by(|a, b| a.0.cmp(&b.0));

        assert_eq!(results.len(), 3);
        assert!(matches!(results[0], (_, Err(LoadError::Decode(_)))));
        match &results[1] {
            (url, Ok(img)) => {
                assert_eq!(url, "good.png");
                assert_eq!(img.dimensions(), (3, 2));
            }
            other => panic!("unexpected {:?}", other.0),
        }
        assert!(matches!(results[2], (_, Err(LoadError::Io(_)))));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
