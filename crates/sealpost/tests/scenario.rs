//! End-to-end flows through the Postbox API.

use anyhow::Result;

use sealpost::envelope::{wire, EnvelopeError, MessageContext, RecipientKey};
use sealpost::trust::{SqliteTrustStore, TrustError, TrustStore, TrustStoreExt};
use sealpost::{
    Attachment, EncryptedEnvelope, Fingerprint, KeyMaterial, PinOutcome, Postbox, PostboxConfig,
    PostboxError, Transition, TrustEvent, UNDISCLOSED_RECIPIENTS,
};
use sealpost_testkit::{bundle_from_seed, introduce, multi_party_fixtures};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[tokio::test]
async fn alice_sends_hello_to_bob() -> Result<()> {
    init_tracing();
    let parties = multi_party_fixtures(&["alice@x.com", "bob@x.com"]);
    let alice = parties[0].postbox(PostboxConfig::default());
    let bob = parties[1].postbox(PostboxConfig::default());
    introduce(&alice, &bob).await;

    let envelope = alice.seal("bob@x.com", "hi", b"hello", &[]).await?;
    let opened = bob.open("alice@x.com", "hi", &envelope).await?;
    assert_eq!(opened.body, b"hello");

    let err = bob.open("alice@x.com", "hi!", &envelope).await.unwrap_err();
    assert!(matches!(
        err,
        PostboxError::Envelope(EnvelopeError::SignatureInvalid)
    ));
    Ok(())
}

#[tokio::test]
async fn raw_envelope_with_literal_fingerprint() -> Result<()> {
    // The fingerprint is used verbatim as the wrap salt, so any label works.
    let alice = bundle_from_seed([0xa1; 32]);
    let bob = bundle_from_seed([0xb0; 32]);
    let bob_key = RecipientKey::new("fp-bob", bob.agreement_public_key());

    let ctx = MessageContext::new("alice@x.com", "bob@x.com", "hi");
    let envelope = EncryptedEnvelope::seal(&ctx, b"hello", &[], alice.signing(), &bob_key)?;
    assert_eq!(envelope.recipient_fingerprint, Fingerprint::new("fp-bob"));

    let opened = envelope.open(&ctx, bob.agreement(), &alice.signing_public_key())?;
    assert_eq!(opened.body, b"hello");

    let changed = MessageContext::new("alice@x.com", "bob@x.com", "hi!");
    assert!(envelope
        .open(&changed, bob.agreement(), &alice.signing_public_key())
        .is_err());
    Ok(())
}

#[tokio::test]
async fn distribution_keeps_bcc_private() -> Result<()> {
    init_tracing();
    let parties = multi_party_fixtures(&["alice@x.com", "bob@x.com", "carol@x.com", "dave@x.com"]);
    let boxes: Vec<_> = parties
        .iter()
        .map(|p| p.postbox(PostboxConfig::default()))
        .collect();
    let (alice, bob, carol, dave) = (&boxes[0], &boxes[1], &boxes[2], &boxes[3]);
    for other in [bob, carol, dave] {
        introduce(alice, other).await;
    }

    let files = [Attachment::new("agenda.txt", "text/plain", b"1. budget".to_vec())];
    let outgoing = alice
        .seal_distribution(
            &["Bob@X.com"],
            &["carol@x.com"],
            &["dave@x.com"],
            "offsite",
            b"see agenda",
            &files,
        )
        .await?;

    assert_eq!(outgoing.to_header, "bob@x.com, carol@x.com");
    assert!(!outgoing.to_header.contains("dave"));

    let visible = outgoing
        .distribution
        .visible
        .as_ref()
        .expect("visible envelope");
    assert!(visible.wrap_for(dave.fingerprint()).is_none());

    for reader in [bob, carol] {
        let opened = reader
            .open_multi("alice@x.com", &outgoing.to_header, "offsite", visible)
            .await?;
        assert_eq!(opened.body, b"see agenda");
        assert_eq!(opened.attachments, files.to_vec());
    }

    let copy = &outgoing.distribution.bcc[0];
    assert_eq!(&copy.recipient, dave.fingerprint());
    let opened = dave
        .open_multi("alice@x.com", &outgoing.to_header, "offsite", &copy.envelope)
        .await?;
    assert_eq!(opened.body, b"see agenda");

    assert!(matches!(
        dave.open_multi("alice@x.com", &outgoing.to_header, "offsite", visible)
            .await,
        Err(PostboxError::Envelope(EnvelopeError::NoWrapForRecipient(_)))
    ));
    assert!(matches!(
        bob.open_multi("alice@x.com", &outgoing.to_header, "offsite", &copy.envelope)
            .await,
        Err(PostboxError::Envelope(EnvelopeError::NoWrapForRecipient(_)))
    ));
    Ok(())
}

#[tokio::test]
async fn bcc_only_uses_undisclosed_header() -> Result<()> {
    let parties = multi_party_fixtures(&["alice@x.com", "dave@x.com"]);
    let alice = parties[0].postbox(PostboxConfig::default());
    let dave = parties[1].postbox(PostboxConfig::default());
    introduce(&alice, &dave).await;

    let outgoing = alice
        .seal_distribution(&[], &[], &["dave@x.com"], "quiet", b"psst", &[])
        .await?;
    assert_eq!(outgoing.to_header, UNDISCLOSED_RECIPIENTS);
    assert!(outgoing.distribution.visible.is_none());

    let opened = dave
        .open_multi(
            "alice@x.com",
            UNDISCLOSED_RECIPIENTS,
            "quiet",
            &outgoing.distribution.bcc[0].envelope,
        )
        .await?;
    assert_eq!(opened.body, b"psst");
    Ok(())
}

#[tokio::test]
async fn key_change_is_surfaced_not_applied() -> Result<()> {
    init_tracing();
    let parties = multi_party_fixtures(&["alice@x.com", "bob@x.com"]);
    let alice = parties[0].postbox(PostboxConfig::default());
    let bob = parties[1].postbox(PostboxConfig::default());
    introduce(&alice, &bob).await;

    // Bob reinstalls and comes back with a new identity.
    let rotated = bundle_from_seed([0x5e; 32]).public_material();
    let outcome = alice
        .apply_event(&TrustEvent::AcceptReceived {
            email: "bob@x.com".into(),
            keys: rotated.clone(),
        })
        .await?;
    assert_eq!(
        outcome,
        Transition::KeyChanged {
            previous: bob.fingerprint().clone(),
            offered: rotated.fingerprint.clone(),
        }
    );
    assert!(matches!(
        alice.store().pin("bob@x.com", rotated.clone()).await?,
        PinOutcome::KeyChanged { .. }
    ));

    // Still sealing to the old key.
    let envelope = alice.seal("bob@x.com", "hi", b"hello", &[]).await?;
    assert_eq!(&envelope.recipient_fingerprint, bob.fingerprint());

    let contact = alice.accept_key_change("bob@x.com", rotated.clone()).await?;
    assert_eq!(contact.keys, Some(rotated.clone()));
    let envelope = alice.seal("bob@x.com", "hi", b"hello", &[]).await?;
    assert_eq!(envelope.recipient_fingerprint, rotated.fingerprint);

    // The pre-rotation binding is recoverable.
    let history = alice.store().history("bob@x.com").await?;
    let last = history.last().expect("snapshot");
    assert_eq!(last.contact.fingerprint(), Some(bob.fingerprint()));
    alice.store().restore("bob@x.com", last.version).await?;
    let envelope = alice.seal("bob@x.com", "hi", b"hello", &[]).await?;
    assert_eq!(&envelope.recipient_fingerprint, bob.fingerprint());
    Ok(())
}

#[tokio::test]
async fn accept_with_borrowed_fingerprint_is_rejected() -> Result<()> {
    let parties = multi_party_fixtures(&["alice@x.com", "bob@x.com", "mallory@x.com"]);
    let alice = parties[0].postbox(PostboxConfig::default());
    let bob = parties[1].material();

    alice
        .apply_event(&TrustEvent::InviteReceived {
            email: "bob@x.com".into(),
            keys: bob.clone(),
        })
        .await?;

    // Bob's fingerprint wrapped around Mallory's keys.
    let forged = KeyMaterial {
        fingerprint: bob.fingerprint.clone(),
        ..parties[2].material()
    };
    let err = alice
        .apply_event(&TrustEvent::AcceptReceived {
            email: "bob@x.com".into(),
            keys: forged,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PostboxError::Trust(TrustError::InconsistentKeys { .. })
    ));

    assert!(alice.store().lookup("bob@x.com").await?.is_none());
    assert_eq!(alice.store().lookup_with("bob@x.com", true).await?, Some(bob));
    Ok(())
}

#[tokio::test]
async fn sqlite_trust_survives_restart() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db = dir.path().join("alice-trust.db");
    let parties = multi_party_fixtures(&["alice@x.com", "bob@x.com"]);
    let bob = parties[1].postbox(PostboxConfig::default());

    {
        let alice = Postbox::new(
            bundle_from_seed([1u8; 32]),
            "alice@x.com",
            SqliteTrustStore::open(&db)?,
            PostboxConfig::default(),
        );
        introduce(&alice, &bob).await;
    }

    let alice = Postbox::new(
        bundle_from_seed([1u8; 32]),
        "alice@x.com",
        SqliteTrustStore::open(&db)?,
        PostboxConfig::default(),
    );
    let envelope = alice.seal("bob@x.com", "hi", b"hello again", &[]).await?;
    let opened = bob.open("alice@x.com", "hi", &envelope).await?;
    assert_eq!(opened.body, b"hello again");
    Ok(())
}

#[tokio::test]
async fn header_transport_roundtrip() -> Result<()> {
    let parties = multi_party_fixtures(&["alice@x.com", "bob@x.com"]);
    let alice = parties[0].postbox(PostboxConfig::default());
    let bob = parties[1].postbox(PostboxConfig::default());
    introduce(&alice, &bob).await;

    let files = [Attachment::new("a.bin", "application/octet-stream", vec![7u8; 64])];
    let envelope = alice.seal("bob@x.com", "hi", b"hello", &files).await?;

    let fields = wire::to_headers(&envelope)?;
    let received = wire::from_headers(&fields)?;
    let opened = bob.open("alice@x.com", "hi", &received).await?;
    assert_eq!(opened.body, b"hello");
    assert_eq!(opened.attachments, files.to_vec());
    Ok(())
}
