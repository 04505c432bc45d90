use super::*;

fn report_items() -> Vec<Item> {
    vec![
        Item {
            id: "sku-black".to_string(),
            name: "Phone 17 Black".to_string(),
            price: dec("900.00"),
            delta: Decimal::ZERO,
            variant: "353839".to_string(),
        },
        Item {
            id: "sku-blue".to_string(),
            name: "Phone 17 Blue".to_string(),
            price: dec("920.00"),
            delta: dec("20.00"),
            variant: "96AED1".to_string(),
        },
    ]
}

fn both_channels() -> Recipient {
    Recipient {
        email: "both@example.com".to_string(),
        chat_id: Some(303),
    }
}

#[tokio::test]
async fn test_one_batch_and_one_message_per_chat() -> anyhow::Result<()> {
    let email = Arc::new(RecordingEmail::default());
    let chat = Arc::new(RecordingChat::default());
    let dispatcher = dispatcher(
        vec![
            Recipient::email_only("a@example.com"),
            Recipient::chat_only(101),
            both_channels(),
        ],
        email.clone(),
        chat.clone(),
    );

    dispatcher.send_report(&report_items()).await?;

    let batches = email.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(
        batches[0].recipients,
        vec!["a@example.com".to_string(), "both@example.com".to_string()]
    );

    let messages = chat.messages();
    let chats: Vec<i64> = messages.iter().map(|(chat_id, _)| *chat_id).collect();
    assert_eq!(chats, vec![101, 303]);
    // Every chat gets the same text
    assert_eq!(messages[0].1, messages[1].1);
    assert!(messages[0].1.contains("Phone 17 Black"));
    assert!(messages[0].1.contains("Phone 17 Blue"));

    Ok(())
}

#[tokio::test]
async fn test_one_failing_chat_yields_a_single_wrapped_error() -> anyhow::Result<()> {
    let email = Arc::new(RecordingEmail::default());
    let chat = Arc::new(RecordingChat::failing_for(&[202]));
    let dispatcher = dispatcher(
        vec![
            Recipient::email_only("a@example.com"),
            Recipient::chat_only(101),
            Recipient::chat_only(202),
            Recipient::chat_only(303),
        ],
        email.clone(),
        chat.clone(),
    );

    let err = dispatcher.send_report(&report_items()).await.unwrap_err();

    assert!(matches!(err, AppError::Dispatch { .. }));
    assert!(matches!(err.root(), AppError::Chat(_)));
    assert!(err.to_string().starts_with("ReportDispatcher::send_report"));
    assert!(err.to_string().contains("chat 202"));

    // The other deliveries still went out
    assert_eq!(email.batches().len(), 1);
    let chats: Vec<i64> = chat.messages().into_iter().map(|(chat_id, _)| chat_id).collect();
    assert_eq!(chats, vec![101, 303]);

    Ok(())
}

#[tokio::test]
async fn test_every_channel_failing_still_returns_one_error() -> anyhow::Result<()> {
    let dispatcher = dispatcher(
        vec![Recipient::email_only("a@example.com"), Recipient::chat_only(101)],
        Arc::new(RecordingEmail::failing()),
        Arc::new(RecordingChat::failing_for(&[101])),
    );

    let err = dispatcher.send_report(&report_items()).await.unwrap_err();

    assert!(matches!(err.root(), AppError::Email(_) | AppError::Chat(_)));
    // Not nested: exactly one dispatch wrapper around the first failure
    match err {
        AppError::Dispatch { source, .. } => assert!(!matches!(*source, AppError::Dispatch { .. })),
        other => panic!("expected a dispatch error, got {other}"),
    }

    Ok(())
}

#[tokio::test]
async fn test_no_recipients_sends_nothing() -> anyhow::Result<()> {
    let email = Arc::new(RecordingEmail::default());
    let chat = Arc::new(RecordingChat::default());

    dispatcher(vec![], email.clone(), chat.clone())
        .send_report(&report_items())
        .await?;

    assert!(email.batches().is_empty());
    assert!(chat.messages().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_chat_only_recipients_skip_email() -> anyhow::Result<()> {
    // A failing email transport proves the channel is never touched
    let email = Arc::new(RecordingEmail::failing());
    let chat = Arc::new(RecordingChat::default());

    dispatcher(
        vec![Recipient::chat_only(101), Recipient::chat_only(102)],
        email.clone(),
        chat.clone(),
    )
    .send_report(&report_items())
    .await?;

    assert_eq!(chat.messages().len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_blank_email_is_not_addressed() -> anyhow::Result<()> {
    let email = Arc::new(RecordingEmail::default());

    dispatcher(
        vec![Recipient::email_only("  "), Recipient::email_only("a@example.com")],
        email.clone(),
        Arc::new(RecordingChat::default()),
    )
    .send_report(&report_items())
    .await?;

    let batches = email.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].recipients, vec!["a@example.com".to_string()]);

    Ok(())
}
