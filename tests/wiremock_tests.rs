//! Tests for the CDS client against a mock retrieve API.
//!
//! The client is blocking, so each call runs on a `spawn_blocking` thread
//! while the mock server keeps serving on the test runtime.

use std::path::PathBuf;
use std::time::Duration;

use cdsretrieve::{
    Area, Client, ClientOptions, Error, Request, Retriever, SEAS5_DATASET, Seas5Options, Summary,
    TargetMonths, YearRange, retrieve_seas5,
};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path},
};

const JOBS: &str = "/api/retrieve/v1/jobs";

fn options(server: &MockServer) -> ClientOptions {
    ClientOptions {
        source: format!("{}/api", server.uri()),
        key: Some("test-key".to_string()),
        poll_interval: Duration::from_millis(10),
        ..ClientOptions::default()
    }
}

fn seas5_request() -> Request {
    Request::new()
        .format("netcdf")
        .variable(["2m_temperature"])
        .year("1981")
        .month("05")
        .leadtime_month(["2", "3", "4"])
}

async fn mount_submit(server: &MockServer, job_id: &str, status: &str, times: u64) {
    Mock::given(method("POST"))
        .and(path(format!(
            "/api/retrieve/v1/processes/{SEAS5_DATASET}/execution"
        )))
        .and(header("PRIVATE-TOKEN", "test-key"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({ "jobID": job_id, "status": status })),
        )
        .expect(times)
        .mount(server)
        .await;
}

async fn mount_success(server: &MockServer, job_id: &str) {
    Mock::given(method("GET"))
        .and(path(format!("{JOBS}/{job_id}")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "jobID": job_id, "status": "successful" })),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{JOBS}/{job_id}/results")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "asset": {
                "value": {
                    "href": format!("{}/download/{job_id}.nc", server.uri()),
                    "file:size": 6
                }
            }
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/download/{job_id}.nc")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"netcdf".to_vec()))
        .mount(server)
        .await;
}

async fn retrieve_blocking(
    opts: ClientOptions,
    request: Request,
    target: PathBuf,
) -> Result<(), Error> {
    tokio::task::spawn_blocking(move || {
        let client = Client::new(opts)?;
        client.retrieve(SEAS5_DATASET, &request, &target)
    })
    .await
    .expect("blocking task panicked")
}

#[tokio::test]
async fn downloads_finished_job_to_target() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!(
            "/api/retrieve/v1/processes/{SEAS5_DATASET}/execution"
        )))
        .and(body_partial_json(json!({
            "inputs": { "year": "1981", "month": "05", "leadtime_month": ["2", "3", "4"] }
        })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({ "jobID": "job-1", "status": "accepted" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_success(&server, "job-1").await;

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("nested").join("198105.nc");

    retrieve_blocking(options(&server), seas5_request(), target.clone())
        .await
        .unwrap();

    assert_eq!(std::fs::read(&target).unwrap(), b"netcdf");
    assert!(!dir.path().join("nested").join("198105.nc.part").exists());
}

#[tokio::test]
async fn polls_until_job_succeeds() {
    let server = MockServer::start().await;
    mount_submit(&server, "job-2", "accepted", 1).await;

    Mock::given(method("GET"))
        .and(path(format!("{JOBS}/job-2")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "jobID": "job-2", "status": "running" })),
        )
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    mount_success(&server, "job-2").await;

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("198105.nc");

    retrieve_blocking(options(&server), seas5_request(), target.clone())
        .await
        .unwrap();

    assert!(target.exists());
}

#[tokio::test]
async fn failed_job_reports_server_message() {
    let server = MockServer::start().await;
    mount_submit(&server, "job-3", "failed", 1).await;

    Mock::given(method("GET"))
        .and(path(format!("{JOBS}/job-3/results")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "title": "The job has failed",
            "detail": "variable not available"
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("198105.nc");

    let err = retrieve_blocking(options(&server), seas5_request(), target.clone())
        .await
        .unwrap_err();

    match err {
        Error::JobFailed { job_id, message } => {
            assert_eq!(job_id, "job-3");
            assert_eq!(message, "The job has failed: variable not available");
        }
        other => panic!("expected JobFailed, got {other:?}"),
    }
    assert!(!target.exists());
}

#[tokio::test]
async fn results_without_asset_are_unexpected() {
    let server = MockServer::start().await;
    mount_submit(&server, "job-6", "successful", 1).await;

    Mock::given(method("GET"))
        .and(path(format!("{JOBS}/job-6/results")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "links": [] })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("198105.nc");
    let err = retrieve_blocking(options(&server), seas5_request(), target.clone())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UnexpectedResponse(ref m) if m.contains("job-6")));
    assert!(!target.exists());
}

#[tokio::test]
async fn blocked_target_leaves_no_part_file() {
    let server = MockServer::start().await;
    mount_submit(&server, "job-7", "successful", 1).await;
    mount_success(&server, "job-7").await;

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("198105.nc");
    std::fs::create_dir_all(target.join("occupied")).unwrap();

    let err = retrieve_blocking(options(&server), seas5_request(), target.clone())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Io(_)));
    assert!(!dir.path().join("198105.nc.part").exists());
}

#[tokio::test]
async fn rejected_credentials_surface_as_http_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "title": "Unauthorized" })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let err = retrieve_blocking(options(&server), seas5_request(), dir.path().join("x.nc"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Http(_)));
}

#[tokio::test]
async fn queued_job_times_out() {
    let server = MockServer::start().await;
    mount_submit(&server, "job-4", "accepted", 1).await;

    let mut opts = options(&server);
    opts.timeout = Some(Duration::ZERO);

    let dir = tempfile::tempdir().unwrap();
    let err = retrieve_blocking(opts, seas5_request(), dir.path().join("x.nc"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::JobTimeout(ref id) if id == "job-4"));
}

#[tokio::test]
async fn second_seas5_run_downloads_nothing() {
    let server = MockServer::start().await;
    // Three init months for JJA in a single year.
    mount_submit(&server, "job-5", "successful", 3).await;
    mount_success(&server, "job-5").await;

    let dir = tempfile::tempdir().unwrap();
    let mut seas5 = Seas5Options::new(
        vec!["2m_temperature".to_string()],
        TargetMonths::Consecutive(vec![6, 7, 8]),
        Area::from([70.0, -11.0, 30.0, 120.0]),
        dir.path(),
    );
    seas5.years = YearRange::new(1981, 1981).unwrap();

    let opts = options(&server);
    let (first, second) = tokio::task::spawn_blocking(move || {
        let client = Client::new(opts)?;
        let first = retrieve_seas5(&client, &seas5)?;
        let second = retrieve_seas5(&client, &seas5)?;
        Ok::<_, Error>((first, second))
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(first, Summary { requested: 3, skipped: 0 });
    assert_eq!(second, Summary { requested: 0, skipped: 3 });
    for name in ["198105.nc", "198104.nc", "198103.nc"] {
        assert!(dir.path().join(name).exists(), "{name} missing");
    }
}
