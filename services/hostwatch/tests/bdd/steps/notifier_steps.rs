//! BDD step definitions for notifier feature

use std::sync::Arc;

use cucumber::{given, then, when};

use hostwatch::config::ChannelConfig;
use hostwatch::markup::ALERT_MARKER;
use hostwatch::notifier::{Notifier, Payload};
use hostwatch::HostwatchError;

use crate::world::{HostwatchWorld, RecordingDelivery, ERRORS_WEBHOOK, STATS_WEBHOOK};

fn endpoint(channel: &str) -> &'static str {
    match channel {
        "error" | "errors" => ERRORS_WEBHOOK,
        "stats" => STATS_WEBHOOK,
        other => panic!("unknown channel '{}'", other),
    }
}

fn numbered_lines(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("line {}", i)).collect()
}

async fn last_payload(world: &mut HostwatchWorld, channel: &str) -> Payload {
    world
        .delivery()
        .sent_to(endpoint(channel))
        .await
        .pop()
        .unwrap_or_else(|| panic!("nothing delivered to the {} channel", channel))
}

#[given("an errors channel without a webhook")]
fn errors_without_webhook(world: &mut HostwatchWorld) {
    world.config.notifier.errors = ChannelConfig::default();
}

#[given("a notifier with errors and stats channels")]
fn notifier_with_both_channels(world: &mut HostwatchWorld) {
    world.configure_both_channels();
}

#[given("a notifier with only an errors channel")]
fn notifier_with_errors_only(world: &mut HostwatchWorld) {
    world.configure_both_channels();
    world.config.notifier.stats = None;
}

#[given("a notifier with a disabled stats channel")]
fn notifier_with_disabled_stats(world: &mut HostwatchWorld) {
    world.configure_both_channels();
    world.config.notifier.stats = Some(ChannelConfig {
        webhook: String::new(),
        enabled: false,
    });
}

#[given(expr = "an attachment cap of {int}")]
fn attachment_cap(world: &mut HostwatchWorld, cap: usize) {
    world.config.notifier.max_attachments = Some(cap);
}

#[given(expr = "the webhook fails with {string} and {string}")]
fn webhook_fails_twice(world: &mut HostwatchWorld, first: String, second: String) {
    world.delivery = Some(Arc::new(RecordingDelivery {
        failures: vec![first, second],
        ..RecordingDelivery::default()
    }));
}

#[when("the notifier is created")]
fn create_notifier(world: &mut HostwatchWorld) {
    let delivery = world.delivery();
    match Notifier::new(&world.config.notifier, delivery) {
        Ok(notifier) => world.notifier = Some(Arc::new(notifier)),
        Err(e) => world.construction_error = Some(e),
    }
}

#[when(expr = "a stats report {string} with {int} lines is delivered")]
async fn deliver_stats(world: &mut HostwatchWorld, headline: String, count: usize) {
    let notifier = world.build_notifier();
    world.delivery_result = Some(
        notifier
            .deliver_stats(&headline, numbered_lines(count))
            .await,
    );
}

#[when(expr = "an error report {string} with {int} lines is delivered")]
async fn deliver_error(world: &mut HostwatchWorld, headline: String, count: usize) {
    let notifier = world.build_notifier();
    world.delivery_result = Some(
        notifier
            .deliver_error(&headline, numbered_lines(count))
            .await,
    );
}

#[when(expr = "an error report {string} with the marked line {string} is delivered")]
async fn deliver_marked_error(world: &mut HostwatchWorld, headline: String, line: String) {
    let notifier = world.build_notifier();
    let lines = vec!["plain line".to_string(), format!("{}{}", ALERT_MARKER, line)];
    world.delivery_result = Some(notifier.deliver_error(&headline, lines).await);
}

#[then("construction fails with a configuration error")]
fn construction_fails(world: &mut HostwatchWorld) {
    let err = world
        .construction_error
        .as_ref()
        .expect("construction succeeded");
    assert!(matches!(err, HostwatchError::Config(_)), "{err:?}");
}

#[then("the delivery succeeds")]
fn delivery_succeeds(world: &mut HostwatchWorld) {
    let result = world.delivery_result.as_ref().expect("no result");
    result.as_ref().unwrap();
}

#[then(expr = "the delivery fails with a message containing {string}")]
fn delivery_fails_with(world: &mut HostwatchWorld, text: String) {
    let result = world.delivery_result.as_ref().expect("no result");
    let err = result.as_ref().unwrap_err();
    assert!(matches!(err, HostwatchError::Delivery(_)), "{err:?}");
    assert!(err.to_string().contains(&text), "{err}");
}

#[then(expr = "the delivery fails because channel {string} is unconfigured")]
fn delivery_unconfigured(world: &mut HostwatchWorld, channel: String) {
    let result = world.delivery_result.as_ref().expect("no result");
    match result {
        Err(HostwatchError::ChannelUnconfigured(c)) => assert_eq!(c.to_string(), channel),
        other => panic!("expected an unconfigured channel, got {other:?}"),
    }
}

#[then(expr = "the {word} channel receives {int} payload(s)")]
async fn channel_receives(world: &mut HostwatchWorld, channel: String, count: usize) {
    let sent = world.delivery().sent_to(endpoint(&channel)).await;
    assert_eq!(sent.len(), count);
}

#[then("nothing is delivered")]
async fn nothing_delivered(world: &mut HostwatchWorld) {
    assert!(world.delivery().sent.read().await.is_empty());
}

#[then(expr = "the last {word} payload has headline {string}")]
async fn last_headline(world: &mut HostwatchWorld, channel: String, headline: String) {
    assert_eq!(last_payload(world, &channel).await.headline, headline);
}

#[then(expr = "the last {word} payload has {int} attachments")]
async fn last_attachment_count(world: &mut HostwatchWorld, channel: String, count: usize) {
    assert_eq!(last_payload(world, &channel).await.attachments.len(), count);
}

#[then(expr = "the first attachment of the last {word} payload is {string}")]
async fn first_attachment(world: &mut HostwatchWorld, channel: String, text: String) {
    let payload = last_payload(world, &channel).await;
    assert_eq!(payload.attachments[0].text, text);
}

#[then(expr = "the last {word} payload has a highlighted attachment {string}")]
async fn highlighted_attachment(world: &mut HostwatchWorld, channel: String, text: String) {
    let payload = last_payload(world, &channel).await;
    let attachment = payload
        .attachments
        .iter()
        .find(|a| a.text == text)
        .unwrap_or_else(|| panic!("no attachment '{}' in {:?}", text, payload.attachments));
    assert!(attachment.highlighted);
    assert!(!payload.attachments[0].highlighted);
}
