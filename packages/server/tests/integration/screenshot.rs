use serde_json::json;

use crate::common::{PNG_BYTES, TestApp, TestOptions, TestResponse, routes, token_for};

fn assert_stored_under(res: &TestResponse, caller: &str, owner: &str, ext: &str) {
    let name = res.file_name();
    let prefix = format!("{caller}/{owner}/");
    let rest = name
        .strip_prefix(&prefix)
        .unwrap_or_else(|| panic!("unexpected path {name}"));
    let (millis, got_ext) = rest.split_once('.').expect("path should carry an extension");
    assert!(
        !millis.is_empty() && millis.chars().all(|c| c.is_ascii_digit()),
        "unexpected timestamp in {name}"
    );
    assert_eq!(got_ext, ext);
}

mod direct_images {
    use super::*;

    #[tokio::test]
    async fn direct_png_is_stored_verbatim() {
        let app = TestApp::spawn().await;
        let token = token_for("user-1");

        let res = app.save(&token, "/image.png", "entity-42").await;

        assert_eq!(res.status, 200, "body: {}", res.body);
        assert_eq!(res.body["success"], true);
        assert_eq!(res.body["message"], "Screenshot saved successfully");
        assert_stored_under(&res, "user-1", "entity-42", "png");
        assert_eq!(app.stored_blob(res.file_name()).await.unwrap(), PNG_BYTES);
        assert_eq!(app.upstream.hit_count(), 1);
    }

    #[tokio::test]
    async fn extension_follows_image_content_type() {
        let app = TestApp::spawn().await;
        let token = token_for("user-1");

        let res = app.save(&token, "/image.webp", "entity-42").await;

        assert_eq!(res.status, 200, "body: {}", res.body);
        assert_stored_under(&res, "user-1", "entity-42", "webp");
    }

    #[tokio::test]
    async fn numeric_owner_id_is_accepted() {
        let app = TestApp::spawn().await;
        let token = token_for("user-1");

        let res = app
            .post_with_token(
                routes::SCREENSHOTS,
                &json!({"imageUrl": app.upstream.url("/image.png"), "interessentId": 7}),
                &token,
            )
            .await;

        assert_eq!(res.status, 200, "body: {}", res.body);
        assert_stored_under(&res, "user-1", "7", "png");
    }

    #[tokio::test]
    async fn repeated_saves_get_distinct_paths() {
        let app = TestApp::spawn().await;
        let token = token_for("user-1");

        let first = app.save(&token, "/image.png", "entity-42").await;
        let second = app.save(&token, "/image.png", "entity-42").await;

        assert_eq!(first.status, 200);
        assert_eq!(second.status, 200);
        assert_ne!(first.file_name(), second.file_name());
        assert_eq!(app.stored_file_count(), 2);
    }
}

mod html_pages {
    use super::*;

    #[tokio::test]
    async fn og_image_is_downloaded_with_page_as_referer() {
        let app = TestApp::spawn().await;
        let token = token_for("user-1");

        let res = app.save(&token, "/og-page", "entity-42").await;

        assert_eq!(res.status, 200, "body: {}", res.body);
        assert_stored_under(&res, "user-1", "entity-42", "png");
        assert_eq!(app.stored_blob(res.file_name()).await.unwrap(), PNG_BYTES);

        let hits = app.upstream.hits();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].path, "/og-page");
        assert_eq!(hits[1].path, "/hosted.png");
        assert_eq!(
            hits[1].referer.as_deref(),
            Some(app.upstream.url("/og-page").as_str())
        );
    }

    #[tokio::test]
    async fn root_relative_screenshot_markup_resolves_against_origin() {
        let app = TestApp::spawn().await;
        let token = token_for("user-1");

        let res = app.save(&token, "/relative-page", "entity-42").await;

        assert_eq!(res.status, 200, "body: {}", res.body);
        let hits = app.upstream.hits();
        assert_eq!(hits.last().unwrap().path, "/hosted.png");
    }

    #[tokio::test]
    async fn page_without_image_reports_no_image_found() {
        let app = TestApp::spawn().await;
        let token = token_for("user-1");

        let res = app.save(&token, "/blank-page", "entity-42").await;

        assert_eq!(res.status, 500);
        assert_eq!(res.body["success"], false);
        assert_eq!(res.body["error"], "No image found in the HTML page");
        assert_eq!(res.body["code"], "NO_IMAGE_FOUND");
        assert_eq!(app.stored_file_count(), 0);
    }

    #[tokio::test]
    async fn dead_extracted_link_reports_extraction_failure() {
        let app = TestApp::spawn().await;
        let token = token_for("user-1");

        let res = app.save(&token, "/dead-link-page", "entity-42").await;

        assert_eq!(res.status, 500);
        assert_eq!(res.body["code"], "EXTRACTION_FAILED");
        assert_eq!(app.stored_file_count(), 0);
    }
}

mod failures {
    use super::*;

    #[tokio::test]
    async fn missing_token_is_rejected_before_any_fetch() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::SCREENSHOTS,
                &json!({"imageUrl": app.upstream.url("/image.png"), "interessentId": "e"}),
            )
            .await;

        assert_eq!(res.status, 500);
        assert_eq!(res.body["success"], false);
        assert_eq!(res.body["error"], "Unauthorized");
        assert_eq!(app.upstream.hit_count(), 0);
    }

    #[tokio::test]
    async fn token_signed_with_another_secret_is_rejected() {
        let app = TestApp::spawn().await;
        let forged = {
            use jsonwebtoken::{EncodingKey, Header, encode};
            let claims = snapvault_server::identity::Claims {
                sub: "user-1".into(),
                exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
                email: None,
                aud: None,
            };
            encode(&Header::default(), &claims, &EncodingKey::from_secret(b"other"))
                .unwrap()
        };

        let res = app.save(&forged, "/image.png", "entity-42").await;

        assert_eq!(res.body["code"], "UNAUTHORIZED");
        assert_eq!(app.upstream.hit_count(), 0);
    }

    #[tokio::test]
    async fn missing_fields_are_bad_requests() {
        let app = TestApp::spawn().await;
        let token = token_for("user-1");

        for body in [
            json!({"interessentId": "entity-42"}),
            json!({"imageUrl": app.upstream.url("/image.png")}),
            json!({"imageUrl": "", "interessentId": "entity-42"}),
        ] {
            let res = app.post_with_token(routes::SCREENSHOTS, &body, &token).await;
            assert_eq!(res.status, 500);
            assert_eq!(res.body["code"], "BAD_REQUEST");
            assert_eq!(res.body["error"], "Missing imageUrl or interessentId");
        }
        assert_eq!(app.upstream.hit_count(), 0);
    }

    #[tokio::test]
    async fn upstream_404_reports_fetch_failure() {
        let app = TestApp::spawn().await;
        let token = token_for("user-1");

        let res = app.save(&token, "/nowhere.png", "entity-42").await;

        assert_eq!(res.body["code"], "FETCH_FAILED");
        assert_eq!(res.body["error"], "Failed to fetch URL: 404 Not Found");
    }

    #[tokio::test]
    async fn non_image_content_is_unsupported() {
        let app = TestApp::spawn().await;
        let token = token_for("user-1");

        let res = app.save(&token, "/document.pdf", "entity-42").await;

        assert_eq!(res.body["code"], "UNSUPPORTED_CONTENT");
        assert_eq!(
            res.body["error"],
            "URL does not point to an image or HTML page"
        );
    }

    #[tokio::test]
    async fn oversize_image_is_rejected_without_storing() {
        let app = TestApp::spawn().await;
        let token = token_for("user-1");

        let res = app.save(&token, "/oversize.png", "entity-42").await;

        assert_eq!(res.body["code"], "PAYLOAD_TOO_LARGE");
        assert_eq!(app.stored_file_count(), 0);
    }

    #[tokio::test]
    async fn metadata_failure_removes_the_stored_blob() {
        let app = TestApp::spawn_with(TestOptions {
            failing_metadata: true,
            ..Default::default()
        })
        .await;
        let token = token_for("user-1");

        let res = app.save(&token, "/image.png", "entity-42").await;

        assert_eq!(res.status, 500);
        assert_eq!(res.body["code"], "METADATA_FAILED");
        assert_eq!(app.upstream.hit_count(), 1);
        assert_eq!(app.stored_file_count(), 0);
    }
}

mod disconnects {
    use snapvault_server::metadata::MetadataStore;

    use super::*;

    #[tokio::test]
    async fn client_hanging_up_mid_save_still_leaves_a_complete_pair() {
        let app = TestApp::spawn_with(TestOptions {
            metadata_delay_ms: Some(300),
            ..Default::default()
        })
        .await;
        let token = token_for("user-1");

        let sent = app
            .client
            .post(format!("http://{}{}", app.addr, routes::SCREENSHOTS))
            .header("Authorization", format!("Bearer {token}"))
            .json(&json!({
                "imageUrl": app.upstream.url("/image.png"),
                "interessentId": "entity-42",
            }))
            .timeout(std::time::Duration::from_millis(100))
            .send()
            .await;
        assert!(sent.is_err(), "request should time out client-side");

        tokio::time::sleep(std::time::Duration::from_millis(800)).await;

        let records = app
            .metadata
            .list_for_owner("user-1", "entity-42")
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(app.stored_file_count(), 1);
        assert_eq!(
            app.stored_blob(&records[0].blob_path).await.unwrap(),
            PNG_BYTES
        );
    }
}

mod distinct_statuses {
    use super::*;

    async fn distinct_app() -> TestApp {
        TestApp::spawn_with(TestOptions {
            distinct_error_status: true,
            ..Default::default()
        })
        .await
    }

    #[tokio::test]
    async fn each_failure_kind_maps_to_its_own_status() {
        let app = distinct_app().await;
        let token = token_for("user-1");

        assert_eq!(app.save(&token, "/nowhere.png", "e").await.status, 502);
        assert_eq!(app.save(&token, "/document.pdf", "e").await.status, 415);
        assert_eq!(app.save(&token, "/blank-page", "e").await.status, 422);
        assert_eq!(app.save(&token, "/oversize.png", "e").await.status, 413);
        assert_eq!(app.save(&token, "/dead-link-page", "e").await.status, 502);
        assert_eq!(app.save("not-a-token", "/image.png", "e").await.status, 401);

        let res = app
            .post_with_token(routes::SCREENSHOTS, &json!({}), &token)
            .await;
        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn success_is_unaffected() {
        let app = distinct_app().await;
        let token = token_for("user-1");

        assert_eq!(app.save(&token, "/image.png", "e").await.status, 200);
    }
}

mod cors {
    use super::*;

    #[tokio::test]
    async fn preflight_allows_any_origin_and_client_headers() {
        let app = TestApp::spawn().await;

        let res = app
            .preflight(routes::SCREENSHOTS, "https://crm.example.com")
            .await;

        assert!(res.status < 300, "status: {}", res.status);
        assert_eq!(res.header("access-control-allow-origin"), Some("*"));
        let allowed = res
            .header("access-control-allow-headers")
            .unwrap_or_default()
            .to_ascii_lowercase();
        for name in ["authorization", "x-client-info", "apikey", "content-type"] {
            assert!(allowed.contains(name), "{name} missing from {allowed}");
        }
        assert_eq!(app.upstream.hit_count(), 0);
    }
}

mod retrieval {
    use super::*;

    #[tokio::test]
    async fn saved_screenshots_are_listed_newest_first() {
        let app = TestApp::spawn().await;
        let token = token_for("user-1");

        let first = app.save(&token, "/image.png", "entity-42").await;
        let second = app.save(&token, "/image.webp", "entity-42").await;
        app.save(&token, "/image.png", "other-entity").await;

        let res = app
            .get_with_token(&routes::owner_screenshots("entity-42"), &token)
            .await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["total"], 2);
        let attachments = res.body["attachments"].as_array().unwrap();
        assert_eq!(attachments[0]["blob_path"], second.file_name());
        assert_eq!(attachments[1]["blob_path"], first.file_name());
        assert_eq!(attachments[1]["content_type"], "image/png");
        assert_eq!(attachments[1]["size"], PNG_BYTES.len());
    }

    #[tokio::test]
    async fn other_callers_see_nothing() {
        let app = TestApp::spawn().await;
        app.save(&token_for("user-1"), "/image.png", "entity-42").await;

        let res = app
            .get_with_token(&routes::owner_screenshots("entity-42"), &token_for("user-2"))
            .await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["total"], 0);
    }

    #[tokio::test]
    async fn content_is_served_to_the_owner_only() {
        let app = TestApp::spawn().await;
        let token = token_for("user-1");
        app.save(&token, "/image.png", "entity-42").await;

        let list = app
            .get_with_token(&routes::owner_screenshots("entity-42"), &token)
            .await;
        let id = list.body["attachments"][0]["id"].as_str().unwrap().to_string();
        let path = routes::screenshot_content("entity-42", &id);

        let res = app.get_with_token(&path, &token).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.header("content-type"), Some("image/png"));
        assert_eq!(res.bytes, PNG_BYTES);

        let res = app.get_with_token(&path, &token_for("user-2")).await;
        assert_eq!(res.body["code"], "NOT_FOUND");

        let res = app
            .get_with_token(&routes::screenshot_content("other", &id), &token)
            .await;
        assert_eq!(res.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn listing_requires_a_token() {
        let app = TestApp::spawn().await;

        let res = app
            .get_without_token(&routes::owner_screenshots("entity-42"))
            .await;

        assert_eq!(res.body["error"], "Unauthorized");
    }

    #[tokio::test]
    async fn health_check_responds() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(routes::HEALTH).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.bytes, b"ok");
    }
}
