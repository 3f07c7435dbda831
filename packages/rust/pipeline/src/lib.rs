//! Request resolution and orchestration for sourcemill.
//!
//! This crate ties the leaf components together:
//! - [`resolver`] — the raw request becomes validated, typed jobs
//! - [`orchestrator`] — jobs fan out onto a bounded worker pool and fan
//!   back in as one ordered, request-scoped [`IngestionResult`]

pub mod orchestrator;
pub mod resolver;

pub use orchestrator::{Pipeline, ProgressReporter, SilentProgress};
pub use resolver::{ResolvedJobs, resolve};

#[cfg(test)]
mod tests {
    use super::*;
    use sourcemill_shared::{
        AppConfig, IngestionRequest, PipelineConfig, SourceErrorKind, UploadedFile,
    };
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_pipeline() -> Pipeline {
        let mut config = PipelineConfig::from(&AppConfig::default());
        config.crawl.rate_limit_ms = 0;
        config.crawl.allow_private_hosts = true;
        config.request_timeout_secs = 30;
        Pipeline::new(config)
    }

    fn html_page(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .set_body_raw(body.to_string().into_bytes(), "text/html; charset=utf-8")
    }

    async fn mount_page(server: &MockServer, route: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(html_page(body))
            .mount(server)
            .await;
    }

    /// A minimal one-page PDF containing `text`.
    fn pdf_bytes(text: &str) -> Vec<u8> {
        use lopdf::content::{Content, Operation};
        use lopdf::{Document, Object, Stream, dictionary};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode content"),
        ));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("save PDF");
        bytes
    }

    #[tokio::test]
    async fn empty_request_yields_empty_result() {
        let result = test_pipeline()
            .run(IngestionRequest::default())
            .await
            .expect("run");
        assert!(result.items.is_empty());
        assert!(result.errors.is_empty());
        assert!(!result.timed_out);
    }

    #[tokio::test]
    async fn single_pdf_with_team_map() {
        let request = IngestionRequest {
            files: vec![UploadedFile {
                name: "notes.pdf".into(),
                bytes: pdf_bytes("Meeting notes body"),
                content_type: Some("application/pdf".into()),
            }],
            source_team_map: [("notes.pdf".to_string(), "team_1".to_string())]
                .into_iter()
                .collect(),
            max_pages: 10,
            ..Default::default()
        };

        let result = test_pipeline().run(request).await.expect("run");

        assert_eq!(result.items.len(), 1);
        assert!(result.errors.is_empty());
        assert_eq!(result.items[0].source_id, "notes.pdf");
        assert_eq!(result.items[0].team_id, "team_1");
        assert_eq!(result.items[0].title, "notes");
        assert!(result.items[0].content.contains("Meeting notes body"));
    }

    #[tokio::test]
    async fn corrupt_pdf_is_an_error_not_a_failure() {
        let request = IngestionRequest {
            files: vec![UploadedFile {
                name: "broken.pdf".into(),
                bytes: b"definitely not a pdf".to_vec(),
                content_type: Some("application/pdf".into()),
            }],
            max_pages: 10,
            ..Default::default()
        };

        let result = test_pipeline().run(request).await.expect("run");

        assert!(result.items.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].source_id, "broken.pdf");
        assert_eq!(result.errors[0].kind, SourceErrorKind::UnreadableSource);
    }

    #[tokio::test]
    async fn failing_url_never_blocks_its_sibling() {
        let good = MockServer::start().await;
        mount_page(
            &good,
            "/",
            "<html><head><title>Good</title></head><body><main><p>Alive.</p></main></body></html>",
        )
        .await;

        let bad = MockServer::start().await;
        // No mounts: the bad seed 404s.

        let request = IngestionRequest {
            url_lines: format!("{}\n{}", bad.uri(), good.uri()),
            max_pages: 3,
            ..Default::default()
        };

        let result = test_pipeline().run(request).await.expect("run");

        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, SourceErrorKind::UnreadableSource);
        assert!(result.errors[0].source_id.starts_with(&bad.uri()));

        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].title, "Good");
    }

    #[tokio::test]
    async fn items_follow_submission_order_not_completion_order() {
        let slow = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                html_page(
                    "<html><head><title>Slow</title></head><body><main><p>Slow body.</p></main></body></html>",
                )
                .set_delay(std::time::Duration::from_millis(400)),
            )
            .mount(&slow)
            .await;

        let fast = MockServer::start().await;
        mount_page(
            &fast,
            "/",
            "<html><head><title>Fast</title></head><body><main><p>Fast body.</p></main></body></html>",
        )
        .await;

        // The slow seed is listed first; it must still come out first.
        let request = IngestionRequest {
            url_lines: format!("{}\n{}", slow.uri(), fast.uri()),
            max_pages: 1,
            ..Default::default()
        };

        let result = test_pipeline().run(request).await.expect("run");

        assert_eq!(result.items.len(), 2);
        assert_eq!(result.items[0].title, "Slow");
        assert_eq!(result.items[1].title, "Fast");
    }

    #[tokio::test]
    async fn crawl_items_carry_page_urls_and_team() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/",
            r#"<html><head><title>Index</title></head><body><main>
                <p>Index body.</p><a href="/post">Post</a>
            </main></body></html>"#,
        )
        .await;
        mount_page(
            &server,
            "/post",
            "<html><head><title>Post</title></head><body><main><p>Post body.</p></main></body></html>",
        )
        .await;

        let seed = server.uri();
        let request = IngestionRequest {
            url_lines: seed.clone(),
            source_team_map: [(seed.clone(), "team_blog".to_string())].into_iter().collect(),
            max_pages: 5,
            ..Default::default()
        };

        let result = test_pipeline().run(request).await.expect("run");

        assert_eq!(result.items.len(), 2);
        for item in &result.items {
            assert_eq!(item.team_id, "team_blog");
        }
        // One item per captured page, keyed by the page URL, not the seed.
        assert!(result.items[1].source_id.ends_with("/post"));
    }

    #[tokio::test]
    async fn timeout_returns_partial_results() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/",
            r#"<html><head><title>Root</title></head><body><main>
                <p>Root body.</p><a href="/slow1">1</a><a href="/slow2">2</a>
            </main></body></html>"#,
        )
        .await;
        for route in ["/slow1", "/slow2"] {
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(
                    html_page(
                        "<html><head><title>Slow</title></head><body><main><p>Late.</p></main></body></html>",
                    )
                    .set_delay(std::time::Duration::from_millis(1500)),
                )
                .mount(&server)
                .await;
        }

        let mut config = PipelineConfig::from(&AppConfig::default());
        config.crawl.rate_limit_ms = 0;
        config.crawl.allow_private_hosts = true;
        config.request_timeout_secs = 1;
        let pipeline = Pipeline::new(config);

        let request = IngestionRequest {
            url_lines: server.uri(),
            max_pages: 10,
            ..Default::default()
        };

        let result = pipeline.run(request).await.expect("run");

        assert!(result.timed_out);
        // The root page completed before the deadline; the crawl stopped
        // at the cancellation check instead of fetching both slow pages.
        assert!(!result.items.is_empty());
        assert!(result.items.len() < 3);
        assert_eq!(result.items[0].title, "Root");
    }
}
