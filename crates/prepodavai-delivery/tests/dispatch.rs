// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery dispatcher behaviour against the mock channel and renderer.

use std::sync::Arc;
use std::time::Duration;

use prepodavai_core::{
    DeliveryChannel, DocumentRenderer, DocumentSource, GenerationOutput, GenerationType,
    PrepodavaiError,
};
use prepodavai_delivery::{DeliveryDispatcher, DeliveryOutcome, MAX_PHOTOS};
use prepodavai_test_utils::{
    Failure, MockChannel, MockRenderer, RenderMode, SentItem, TEST_CHAT_ID, TestHarness,
};
use serde_json::json;

async fn completed(harness: &TestHarness, output: GenerationOutput) -> String {
    let (generation_type, params) = match &output {
        GenerationOutput::Image { .. } => (
            GenerationType::ImageGeneration,
            json!({"prompt": "a volcano diagram"}),
        ),
        GenerationOutput::PhotoSet { .. } => (
            GenerationType::Photosession,
            json!({"photoUrl": "https://cdn.example/me.jpg", "style": "studio"}),
        ),
        GenerationOutput::Presentation { .. } => {
            (GenerationType::Presentation, json!({"topic": "Photosynthesis"}))
        }
        _ => (
            GenerationType::LessonPlan,
            json!({"subject": "Physics", "topic": "Optics"}),
        ),
    };
    let sub = harness.submit(generation_type, params).await.unwrap();
    harness
        .store
        .mark_completed(&sub.request_id, output)
        .await
        .unwrap();
    sub.request_id
}

async fn harness() -> TestHarness {
    TestHarness::builder()
        .with_balance(100)
        .with_cost(GenerationType::ImageGeneration, 1)
        .with_cost(GenerationType::Photosession, 1)
        .with_cost(GenerationType::Presentation, 1)
        .with_cost(GenerationType::LessonPlan, 1)
        .build()
        .await
        .unwrap()
}

fn dispatcher_with(
    harness: &TestHarness,
    channel: Arc<MockChannel>,
    renderer: Option<Arc<MockRenderer>>,
) -> DeliveryDispatcher {
    DeliveryDispatcher::new(
        harness.db.clone(),
        Some(channel as Arc<dyn DeliveryChannel>),
        renderer.map(|r| r as Arc<dyn DocumentRenderer>),
    )
}

#[tokio::test]
async fn repeated_deliver_sends_once() {
    let h = harness().await;
    let id = completed(&h, GenerationOutput::text("Lesson plan body")).await;

    let first = h.dispatcher.deliver(&id).await.unwrap();
    assert_eq!(first, DeliveryOutcome::Sent { messages: 1 });
    for _ in 0..3 {
        assert_eq!(
            h.dispatcher.deliver(&id).await.unwrap(),
            DeliveryOutcome::AlreadySent
        );
    }
    assert_eq!(h.channel.sent_count().await, 1);
    assert!(h.request(&id).await.unwrap().sent_to_telegram);
}

#[tokio::test]
async fn concurrent_deliver_sends_once() {
    let h = harness().await;
    let id = completed(&h, GenerationOutput::text("Lesson plan body")).await;

    let calls = (0..8).map(|_| h.dispatcher.deliver(&id));
    let outcomes = futures::future::join_all(calls).await;
    let sent = outcomes
        .iter()
        .filter(|o| matches!(o, Ok(DeliveryOutcome::Sent { .. })))
        .count();
    assert_eq!(sent, 1);
    assert_eq!(h.channel.sent_count().await, 1);
}

#[tokio::test]
async fn text_is_rendered_to_a_pdf_document() {
    let h = harness().await;
    let id = completed(&h, GenerationOutput::text("Intro to $E=mc^2$")).await;
    h.dispatcher.deliver(&id).await.unwrap();

    let sent = h.channel.sent().await;
    match &sent[0] {
        SentItem::Document {
            chat_id,
            source: DocumentSource::Bytes(bytes),
            filename,
            caption,
        } => {
            assert_eq!(*chat_id, TEST_CHAT_ID);
            assert!(bytes.starts_with(b"%PDF"));
            assert!(filename.starts_with("lesson_plan-"));
            assert!(filename.ends_with(".pdf"));
            assert_eq!(caption.as_deref(), Some("Lesson plan"));
        }
        other => panic!("expected a document, got {other:?}"),
    }
}

#[tokio::test]
async fn transient_failure_retries_then_sends_once() {
    let h = harness().await;
    let id = completed(&h, GenerationOutput::text("body")).await;
    h.channel.fail_next(Failure::Transient).await;

    let err = h.dispatcher.deliver(&id).await.unwrap_err();
    assert!(err.is_retryable());
    assert!(!h.request(&id).await.unwrap().sent_to_telegram);

    assert_eq!(
        h.dispatcher.deliver(&id).await.unwrap(),
        DeliveryOutcome::Sent { messages: 1 }
    );
    assert_eq!(
        h.dispatcher.deliver(&id).await.unwrap(),
        DeliveryOutcome::AlreadySent
    );
    assert_eq!(h.channel.attempts(), 2);
    assert_eq!(h.channel.sent_count().await, 1);
}

#[tokio::test]
async fn permanent_failure_marks_delivered_and_stops() {
    let h = harness().await;
    let id = completed(&h, GenerationOutput::text("body")).await;
    h.channel.fail_next(Failure::Permanent).await;

    let outcome = h.dispatcher.deliver(&id).await.unwrap();
    assert!(matches!(outcome, DeliveryOutcome::Skipped { .. }));
    assert!(h.request(&id).await.unwrap().sent_to_telegram);
    assert_eq!(
        h.dispatcher.deliver(&id).await.unwrap(),
        DeliveryOutcome::AlreadySent
    );
    assert_eq!(h.channel.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn render_timeout_falls_back_to_plain_text() {
    let h = harness().await;
    let id = completed(&h, GenerationOutput::text("Plan:\n1. Mirrors\n2. Lenses")).await;
    let renderer = Arc::new(MockRenderer::new(RenderMode::Hang {
        timeout: Duration::from_secs(8),
    }));
    let channel = Arc::new(MockChannel::new());
    let dispatcher = dispatcher_with(&h, channel.clone(), Some(renderer.clone()));

    let outcome = dispatcher.deliver(&id).await.unwrap();
    assert_eq!(outcome, DeliveryOutcome::Sent { messages: 1 });
    assert_eq!(renderer.calls(), 1);
    assert_eq!(
        channel.sent().await,
        vec![SentItem::Message {
            chat_id: TEST_CHAT_ID,
            text: "Plan:\n1. Mirrors\n2. Lenses".into()
        }]
    );
    assert!(h.request(&id).await.unwrap().sent_to_telegram);
}

#[tokio::test]
async fn without_renderer_long_text_is_split() {
    let h = harness().await;
    let body = "a".repeat(250);
    let id = completed(&h, GenerationOutput::text(body.clone())).await;
    let channel = Arc::new(MockChannel::new().with_max_message_length(100));
    let dispatcher = dispatcher_with(&h, channel.clone(), None);

    assert_eq!(
        dispatcher.deliver(&id).await.unwrap(),
        DeliveryOutcome::Sent { messages: 3 }
    );
    let texts: Vec<String> = channel
        .sent()
        .await
        .into_iter()
        .filter_map(|item| match item {
            SentItem::Message { text, .. } => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(texts.concat(), body);
}

#[tokio::test]
async fn html_failure_falls_back_to_stripped_text() {
    let h = harness().await;
    let id = completed(
        &h,
        GenerationOutput::Html {
            content: "<h1>Optics</h1><p>Light bends.</p>".into(),
        },
    )
    .await;
    let channel = Arc::new(MockChannel::new());
    let renderer = Arc::new(MockRenderer::new(RenderMode::Fail));
    let dispatcher = dispatcher_with(&h, channel.clone(), Some(renderer));

    dispatcher.deliver(&id).await.unwrap();
    match &channel.sent().await[0] {
        SentItem::Message { text, .. } => assert_eq!(text, "Optics\nLight bends."),
        other => panic!("expected a text message, got {other:?}"),
    }
}

#[tokio::test]
async fn image_is_sent_as_photo() {
    let h = harness().await;
    let id = completed(
        &h,
        GenerationOutput::Image {
            url: "https://cdn.example/volcano.png".into(),
        },
    )
    .await;
    h.dispatcher.deliver(&id).await.unwrap();
    assert_eq!(
        h.channel.sent().await,
        vec![SentItem::Photo {
            chat_id: TEST_CHAT_ID,
            url: "https://cdn.example/volcano.png".into(),
            caption: Some("Image generation".into()),
        }]
    );
}

#[tokio::test]
async fn photo_set_is_capped_and_captioned_once() {
    let h = harness().await;
    let urls: Vec<String> = (0..12)
        .map(|i| format!("https://cdn.example/p{i}.jpg"))
        .collect();
    let id = completed(&h, GenerationOutput::PhotoSet { urls }).await;

    assert_eq!(
        h.dispatcher.deliver(&id).await.unwrap(),
        DeliveryOutcome::Sent {
            messages: MAX_PHOTOS
        }
    );
    let sent = h.channel.sent().await;
    assert_eq!(sent.len(), MAX_PHOTOS);
    let captions: Vec<bool> = sent
        .iter()
        .map(|s| matches!(s, SentItem::Photo { caption: Some(_), .. }))
        .collect();
    assert!(captions[0]);
    assert!(captions[1..].iter().all(|c| !c));
}

#[tokio::test]
async fn photo_set_resumes_after_a_failed_photo() {
    let h = harness().await;
    let urls: Vec<String> = (0..3)
        .map(|i| format!("https://cdn.example/p{i}.jpg"))
        .collect();
    let id = completed(&h, GenerationOutput::PhotoSet { urls: urls.clone() }).await;
    h.channel.fail_attempt(2, Failure::Transient).await;

    let err = h.dispatcher.deliver(&id).await.unwrap_err();
    assert!(err.is_retryable());
    let req = h.request(&id).await.unwrap();
    assert!(!req.sent_to_telegram);
    assert_eq!(req.delivered_parts, 1);

    assert_eq!(
        h.dispatcher.deliver(&id).await.unwrap(),
        DeliveryOutcome::Sent { messages: 2 }
    );
    let sent: Vec<String> = h
        .channel
        .sent()
        .await
        .into_iter()
        .filter_map(|item| match item {
            SentItem::Photo { url, .. } => Some(url),
            _ => None,
        })
        .collect();
    assert_eq!(sent, urls);
    assert_eq!(
        h.dispatcher.deliver(&id).await.unwrap(),
        DeliveryOutcome::AlreadySent
    );
}

#[tokio::test]
async fn split_text_resumes_without_repeating_chunks() {
    let h = harness().await;
    let body = format!("{}{}{}", "a".repeat(100), "b".repeat(100), "c".repeat(50));
    let id = completed(&h, GenerationOutput::text(body.clone())).await;
    let channel = Arc::new(MockChannel::new().with_max_message_length(100));
    let renderer = Arc::new(MockRenderer::new(RenderMode::Fail));
    let dispatcher = dispatcher_with(&h, channel.clone(), Some(renderer.clone()));
    channel.fail_attempt(3, Failure::Transient).await;

    assert!(dispatcher.deliver(&id).await.is_err());
    assert_eq!(h.request(&id).await.unwrap().delivered_parts, 2);

    assert_eq!(
        dispatcher.deliver(&id).await.unwrap(),
        DeliveryOutcome::Sent { messages: 1 }
    );
    // The PDF is not retried once plain-text chunks went out.
    assert_eq!(renderer.calls(), 1);
    let texts: Vec<String> = channel
        .sent()
        .await
        .into_iter()
        .filter_map(|item| match item {
            SentItem::Message { text, .. } => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(texts.len(), 3);
    assert_eq!(texts.concat(), body);
}

#[tokio::test]
async fn presentation_is_sent_by_url() {
    let h = harness().await;
    let id = completed(
        &h,
        GenerationOutput::Presentation {
            url: "https://cdn.example/deck.pptx".into(),
            filename: None,
        },
    )
    .await;
    h.dispatcher.deliver(&id).await.unwrap();
    match &h.channel.sent().await[0] {
        SentItem::Document {
            source, filename, ..
        } => {
            assert_eq!(source, &DocumentSource::Url("https://cdn.example/deck.pptx".into()));
            assert_eq!(filename, "presentation.pptx");
        }
        other => panic!("expected a document, got {other:?}"),
    }
}

#[tokio::test]
async fn pending_request_is_not_ready() {
    let h = harness().await;
    let sub = h
        .submit(
            GenerationType::LessonPlan,
            json!({"subject": "Physics", "topic": "Waves"}),
        )
        .await
        .unwrap();
    assert_eq!(
        h.dispatcher.deliver(&sub.request_id).await.unwrap(),
        DeliveryOutcome::NotReady
    );
    assert_eq!(h.channel.attempts(), 0);
}

#[tokio::test]
async fn user_without_chat_is_skipped_and_flagged() {
    let h = TestHarness::builder()
        .with_cost(GenerationType::LessonPlan, 1)
        .without_chat()
        .build()
        .await
        .unwrap();
    let id = completed(&h, GenerationOutput::text("body")).await;

    assert!(matches!(
        h.dispatcher.deliver(&id).await.unwrap(),
        DeliveryOutcome::Skipped { .. }
    ));
    assert!(h.request(&id).await.unwrap().sent_to_telegram);
    assert_eq!(h.channel.attempts(), 0);
}

#[tokio::test]
async fn no_channel_leaves_flag_unset() {
    let h = harness().await;
    let id = completed(&h, GenerationOutput::text("body")).await;
    let dispatcher = DeliveryDispatcher::new(h.db.clone(), None, None);

    assert!(matches!(
        dispatcher.deliver(&id).await.unwrap(),
        DeliveryOutcome::Skipped { .. }
    ));
    assert!(!h.request(&id).await.unwrap().sent_to_telegram);
}

#[tokio::test]
async fn unknown_request_is_not_found() {
    let h = harness().await;
    let err = h.dispatcher.deliver("missing").await.unwrap_err();
    assert!(matches!(err, PrepodavaiError::NotFound { .. }));
}
