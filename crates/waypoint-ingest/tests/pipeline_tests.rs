// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ingestion runs against a mock image host and in-memory stores.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use image::{ImageFormat, Rgb, RgbImage};
use serde_json::json;
use waypoint_core::{ErrorKind, WaypointError};
use waypoint_ingest::pipeline::AGENT;
use waypoint_ingest::{Downloader, IngestPipeline, IngestSettings, ManifestItem, parse_manifest};
use waypoint_resilience::RetryPolicy;
use waypoint_test_utils::{InMemoryIndex, InMemoryObjectStorage, ScriptedLlm};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

struct Rig {
    llm: Arc<ScriptedLlm>,
    index: Arc<InMemoryIndex>,
    storage: Arc<InMemoryObjectStorage>,
    pipeline: IngestPipeline,
}

fn rig(settings: IngestSettings) -> Rig {
    let llm = Arc::new(ScriptedLlm::new());
    let index = Arc::new(InMemoryIndex::new());
    let storage = Arc::new(InMemoryObjectStorage::new());
    let retry = RetryPolicy {
        base_delay: Duration::from_millis(1),
        ..RetryPolicy::default()
    }
    .without_jitter();
    let downloader = Downloader::new(Duration::from_secs(5), retry).unwrap();
    let pipeline = IngestPipeline::new(
        downloader,
        llm.clone(),
        index.clone(),
        storage.clone(),
        settings,
    );
    Rig {
        llm,
        index,
        storage,
        pipeline,
    }
}

fn settings() -> IngestSettings {
    IngestSettings {
        batch_size: 2,
        cooldown: Duration::ZERO,
        max_concurrency: 2,
        max_width: 100,
        folder: "ingested".into(),
        ..IngestSettings::default()
    }
}

async fn serve_images(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/wide.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png(400, 200)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/small.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png(40, 30)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

fn description() -> serde_json::Value {
    json!({
        "description": "A misty alpine lake at dawn.",
        "alt_text": "Lake under mountains",
        "tags": ["lake", "dawn"]
    })
}

fn manifest(server: &MockServer) -> Vec<ManifestItem> {
    let doc = json!([
        {"url": format!("{}/wide.png", server.uri()), "title": "Misty Lake", "tags": ["Alps"], "provider": "unsplash"},
        {"url": format!("{}/gone.png", server.uri()), "title": "Missing"},
        {"url": format!("{}/small.png", server.uri()), "title": "Small Harbour", "alt": "Boats in a harbour"}
    ]);
    parse_manifest(&doc.to_string()).unwrap()
}

#[tokio::test]
async fn run_collects_successes_and_failures() {
    let server = MockServer::start().await;
    serve_images(&server).await;
    let rig = rig(settings());
    for _ in 0..3 {
        rig.llm.push_json(AGENT, &description()).await;
    }

    let report = rig.pipeline.run(&manifest(&server)).await;

    assert_eq!(report.batches, 2);
    assert_eq!(report.succeeded.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert!(!report.aborted);
    assert_eq!(report.failed[0].kind, ErrorKind::NotFound);
    assert!(report.failed[0].url.ends_with("/gone.png"));

    let media = rig.index.media().await;
    assert_eq!(media.len(), 2);
    let lake = media.iter().find(|m| m.title == "Misty Lake").unwrap();
    assert_eq!((lake.width, lake.height), (100, 50));
    assert_eq!(lake.alt_text, "Lake under mountains");
    assert_eq!(lake.semantic_tags, vec!["alps", "lake", "dawn"]);
    assert_eq!(lake.provider, "unsplash");
    assert!(lake.storage_path.starts_with("ingested/misty-lake-"));
    assert_eq!(
        lake.public_url,
        format!("https://storage.test/public/{}", lake.storage_path)
    );

    let harbour = media.iter().find(|m| m.title == "Small Harbour").unwrap();
    assert_eq!(harbour.alt_text, "Boats in a harbour");
    assert_eq!(harbour.provider, "manual");

    let objects = rig.storage.objects().await;
    assert_eq!(objects.len(), 2);
    assert!(objects.iter().all(|(_, bytes, mime)| mime == "image/jpeg" && bytes[..2] == [0xFF, 0xD8]));
    assert_eq!(rig.index.site_media().await.len(), 2);

    let requests = rig.llm.requests().await;
    assert!(requests.iter().all(|r| r.image.is_some() && r.json_output));
}

#[tokio::test]
async fn dual_write_can_be_disabled() {
    let server = MockServer::start().await;
    serve_images(&server).await;
    let rig = rig(IngestSettings {
        dual_write: false,
        ..settings()
    });
    rig.llm.push_text(AGENT, "Fishing boats moored at a stone quay.").await;

    let item = ManifestItem {
        url: format!("{}/small.png", server.uri()),
        title: "Quay".into(),
        tags: vec![],
        provider: "manual".into(),
        alt: None,
    };
    let asset = rig.pipeline.ingest_one(&item).await.unwrap();

    assert_eq!(asset.ai_description, "Fishing boats moored at a stone quay.");
    assert_eq!(asset.alt_text, "Quay");
    assert!(asset.id.is_some());
    assert!(rig.index.site_media().await.is_empty());
}

#[tokio::test]
async fn rejected_credentials_stop_the_run() {
    let server = MockServer::start().await;
    serve_images(&server).await;
    let rig = rig(IngestSettings {
        batch_size: 1,
        max_concurrency: 1,
        ..settings()
    });
    rig.llm
        .fail_all_with(|| WaypointError::Auth {
            service: "gemini".into(),
            message: "API key not valid".into(),
        })
        .await;

    let items = manifest(&server);
    let report = rig.pipeline.run(&items).await;

    assert!(report.aborted);
    assert_eq!(report.batches, 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].kind, ErrorKind::Auth);
    assert!(report.total() < items.len());
    assert!(rig.storage.objects().await.is_empty());
}

#[tokio::test]
async fn batches_wait_for_cooldown() {
    let server = MockServer::start().await;
    serve_images(&server).await;
    let rig = rig(IngestSettings {
        batch_size: 1,
        cooldown: Duration::from_millis(200),
        ..settings()
    });
    for _ in 0..2 {
        rig.llm.push_json(AGENT, &description()).await;
    }
    let items: Vec<ManifestItem> = manifest(&server)
        .into_iter()
        .filter(|i| !i.url.ends_with("/gone.png"))
        .collect();

    let started = std::time::Instant::now();
    let report = rig.pipeline.run(&items).await;

    assert!(report.is_clean());
    assert_eq!(report.batches, 2);
    assert!(started.elapsed() >= Duration::from_millis(200));
}
