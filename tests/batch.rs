use std::cell::{Cell, RefCell};
use std::fs::{self, File};
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use zenodo_upload::api::{ApiClient, HttpResponse, Transport};
use zenodo_upload::progress::ProgressReader;
use zenodo_upload::upload::{RetryPolicy, Sleeper, Uploader};
use zenodo_upload::{AttemptError, UploadError};

/// Accepts every upload except those whose URL ends with `fail_suffix`.
struct Bucket {
    fail_suffix: &'static str,
    lookups: Cell<usize>,
    puts: RefCell<Vec<String>>,
}

impl Bucket {
    fn failing(fail_suffix: &'static str) -> Self {
        Bucket {
            fail_suffix,
            lookups: Cell::new(0),
            puts: RefCell::new(Vec::new()),
        }
    }

    fn puts_ending_with(&self, suffix: &str) -> usize {
        self.puts.borrow().iter().filter(|u| u.ends_with(suffix)).count()
    }
}

impl Transport for Bucket {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse, AttemptError> {
        assert!(url.ends_with("/deposit/depositions/77"));
        assert_eq!(query, &[("access_token", "tok")]);
        self.lookups.set(self.lookups.get() + 1);
        Ok(HttpResponse {
            status: 200,
            body: r#"{"links":{"bucket":"https://zenodo.test/api/files/b-1"}}"#.into(),
        })
    }

    fn put(
        &self,
        url: &str,
        query: &[(&str, &str)],
        mut body: ProgressReader<File>,
    ) -> Result<HttpResponse, AttemptError> {
        assert_eq!(query, &[("access_token", "tok")]);
        self.puts.borrow_mut().push(url.to_string());
        let mut sink = Vec::new();
        body.read_to_end(&mut sink)?;
        let status = if url.ends_with(self.fail_suffix) { 502 } else { 201 };
        Ok(HttpResponse {
            status,
            body: String::new(),
        })
    }
}

#[derive(Default)]
struct NoWait(RefCell<Vec<Duration>>);

impl Sleeper for &NoWait {
    fn sleep(&self, duration: Duration) {
        self.0.borrow_mut().push(duration);
    }
}

fn three_files(dir: &TempDir) -> Vec<PathBuf> {
    ["f1", "f2", "f3"]
        .iter()
        .map(|name| {
            let path = dir.path().join(name);
            fs::write(&path, name.repeat(100)).unwrap();
            path
        })
        .collect()
}

#[test]
fn exhausted_file_aborts_rest_of_batch() {
    let dir = TempDir::new().unwrap();
    let files = three_files(&dir);
    let client = ApiClient::new(Bucket::failing("/f2"), "https://zenodo.test/api", "tok");
    let waits = NoWait::default();
    let uploader = Uploader::new(&client, RetryPolicy::new(3)).with_sleeper(&waits);

    let err = uploader
        .upload_files_to_record("77", &files)
        .expect_err("second file must exhaust its retries");

    match err {
        UploadError::ExhaustedRetries { file, attempts, source } => {
            assert_eq!(file, files[1]);
            assert_eq!(attempts, 4);
            assert!(matches!(source, AttemptError::Status { status: 502, .. }));
        }
        other => panic!("unexpected error: {other}"),
    }

    let bucket = client.transport();
    assert_eq!(bucket.lookups.get(), 1);
    assert_eq!(bucket.puts_ending_with("/f1"), 1);
    assert_eq!(bucket.puts_ending_with("/f2"), 4);
    assert_eq!(bucket.puts_ending_with("/f3"), 0);
    assert_eq!(
        *waits.0.borrow(),
        vec![1, 2, 4].into_iter().map(Duration::from_secs).collect::<Vec<_>>()
    );
}

#[test]
fn full_batch_uploads_in_order() {
    let dir = TempDir::new().unwrap();
    let files = three_files(&dir);
    let client = ApiClient::new(Bucket::failing("/never"), "https://zenodo.test/api", "tok");
    let waits = NoWait::default();
    let uploader = Uploader::new(&client, RetryPolicy::new(3)).with_sleeper(&waits);

    let report = uploader.upload_files_to_record("77", &files).unwrap();
    assert_eq!(report.uploaded.len(), 3);
    assert_eq!(report.total_bytes(), 600);
    assert_eq!(
        *client.transport().puts.borrow(),
        vec![
            "https://zenodo.test/api/files/b-1/f1",
            "https://zenodo.test/api/files/b-1/f2",
            "https://zenodo.test/api/files/b-1/f3",
        ]
    );
    assert!(waits.0.borrow().is_empty());
}
