//! Proptest generators for property-based testing.

use proptest::prelude::*;

use sealpost_core::KeyBundle;
use sealpost_envelope::{Attachment, EncryptedEnvelope, MessageContext, RecipientKey};

use crate::fixtures::bundle_from_seed;

/// Generate an email-like address.
pub fn address() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9.]{0,15}@[a-z]{1,10}\\.(com|org|net)".prop_map(String::from)
}

/// Generate a subject line, possibly empty, possibly non-ASCII.
pub fn subject() -> impl Strategy<Value = String> {
    "\\PC{0,40}".prop_map(String::from)
}

/// Generate a message context.
pub fn message_context() -> impl Strategy<Value = MessageContext> {
    (address(), address(), subject()).prop_map(|(from, to, subject)| {
        MessageContext::new(from, to, subject)
    })
}

/// Generate body bytes of at most `max_len`.
pub fn body(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a single attachment.
pub fn attachment() -> impl Strategy<Value = Attachment> {
    (
        "[a-z]{1,12}\\.(txt|pdf|png)",
        prop_oneof![
            Just("text/plain".to_string()),
            Just("application/pdf".to_string()),
            Just("image/png".to_string()),
        ],
        body(512),
    )
        .prop_map(|(name, content_type, data)| Attachment::new(name, content_type, data))
}

/// Parameters for sealing a single-recipient envelope.
#[derive(Debug, Clone)]
pub struct EnvelopeParams {
    pub sender_seed: [u8; 32],
    pub recipient_seed: [u8; 32],
    pub context: MessageContext,
    pub body: Vec<u8>,
    pub attachments: Vec<Attachment>,
}

impl Arbitrary for EnvelopeParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            any::<[u8; 32]>(),
            any::<[u8; 32]>(),
            message_context(),
            body(2048),
            prop::collection::vec(attachment(), 0..=3),
        )
            .prop_filter("sender and recipient differ", |(s, r, ..)| s != r)
            .prop_map(
                |(sender_seed, recipient_seed, context, body, attachments)| EnvelopeParams {
                    sender_seed,
                    recipient_seed,
                    context,
                    body,
                    attachments,
                },
            )
            .boxed()
    }
}

/// An envelope sealed from [`EnvelopeParams`], with both identities.
pub struct SealedCase {
    pub sender: KeyBundle,
    pub recipient: KeyBundle,
    pub envelope: EncryptedEnvelope,
}

/// Seal an envelope from parameters.
///
/// Panics if sealing fails, which only happens if the OS RNG is unavailable.
pub fn seal_from_params(params: &EnvelopeParams) -> SealedCase {
    let sender = bundle_from_seed(params.sender_seed);
    let recipient = bundle_from_seed(params.recipient_seed);

    let envelope = EncryptedEnvelope::seal(
        &params.context,
        &params.body,
        &params.attachments,
        sender.signing(),
        &RecipientKey::from(&recipient.public_material()),
    );

    match envelope {
        Ok(envelope) => SealedCase {
            sender,
            recipient,
            envelope,
        },
        Err(e) => panic!("sealing failed: {e}"),
    }
}

/// Envelope fields a tamper test can flip a bit in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TamperTarget {
    Ciphertext,
    Signature,
    WrappedKey,
    WrapNonce,
    MessageNonce,
    EphemeralKey,
}

/// Generate a tamper target.
pub fn tamper_target() -> impl Strategy<Value = TamperTarget> {
    prop_oneof![
        Just(TamperTarget::Ciphertext),
        Just(TamperTarget::Signature),
        Just(TamperTarget::WrappedKey),
        Just(TamperTarget::WrapNonce),
        Just(TamperTarget::MessageNonce),
        Just(TamperTarget::EphemeralKey),
    ]
}

/// Flip bit `bit` (taken modulo the field length in bits) of one field.
pub fn flip_bit(envelope: &mut EncryptedEnvelope, target: TamperTarget, bit: usize) {
    let field: &mut [u8] = match target {
        TamperTarget::Ciphertext => &mut envelope.ciphertext,
        TamperTarget::Signature => &mut envelope.signature.0,
        TamperTarget::WrappedKey => &mut envelope.wrapped_key,
        TamperTarget::WrapNonce => &mut envelope.wrap_nonce.0,
        TamperTarget::MessageNonce => &mut envelope.message_nonce.0,
        TamperTarget::EphemeralKey => &mut envelope.ephemeral_public.0,
    };
    let bit = bit % (field.len() * 8);
    field[bit / 8] ^= 1 << (bit % 8);
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealpost_envelope::{EnvelopeError, MultiRecipientEnvelope};

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn test_roundtrip(params: EnvelopeParams) {
            let case = seal_from_params(&params);
            let opened = case
                .envelope
                .open(
                    &params.context,
                    case.recipient.agreement(),
                    &case.sender.signing_public_key(),
                )
                .unwrap();

            prop_assert_eq!(opened.body, params.body);
            prop_assert_eq!(opened.attachments, params.attachments);
        }

        #[test]
        fn test_single_bit_flip_rejected(
            params: EnvelopeParams,
            target in tamper_target(),
            bit in any::<usize>(),
        ) {
            let case = seal_from_params(&params);
            let mut tampered = case.envelope.clone();
            flip_bit(&mut tampered, target, bit);

            let result = tampered.open(
                &params.context,
                case.recipient.agreement(),
                &case.sender.signing_public_key(),
            );
            prop_assert!(matches!(
                result,
                Err(EnvelopeError::SignatureInvalid | EnvelopeError::BodyDecryptFailed)
            ));
        }

        #[test]
        fn test_wrong_recipient_fails_at_unwrap(params: EnvelopeParams, other in any::<[u8; 32]>()) {
            prop_assume!(other != params.recipient_seed);
            let case = seal_from_params(&params);
            let stranger = bundle_from_seed(other);

            let result = case.envelope.open(
                &params.context,
                stranger.agreement(),
                &case.sender.signing_public_key(),
            );
            prop_assert!(matches!(result, Err(EnvelopeError::KeyUnwrapFailed)));
        }

        #[test]
        fn test_other_sender_key_rejected(params: EnvelopeParams, other in any::<[u8; 32]>()) {
            prop_assume!(other != params.sender_seed);
            let case = seal_from_params(&params);
            let impostor = bundle_from_seed(other);

            let result = case.envelope.open(
                &params.context,
                case.recipient.agreement(),
                &impostor.signing_public_key(),
            );
            prop_assert!(matches!(result, Err(EnvelopeError::SignatureInvalid)));
        }

        #[test]
        fn test_reseal_uses_fresh_nonces(params: EnvelopeParams) {
            let a = seal_from_params(&params).envelope;
            let b = seal_from_params(&params).envelope;

            prop_assert_ne!(a.message_nonce, b.message_nonce);
            prop_assert_ne!(a.wrap_nonce, b.wrap_nonce);
            prop_assert_ne!(a.ciphertext, b.ciphertext);
        }

        #[test]
        fn test_multi_recipient_isolation(
            context in message_context(),
            body in body(512),
            seeds in prop::collection::btree_set(any::<[u8; 32]>(), 3..=5),
        ) {
            let mut bundles = seeds.into_iter().map(bundle_from_seed);
            let sender = bundles.next().unwrap();
            let recipients: Vec<KeyBundle> = bundles.collect();
            let keys: Vec<RecipientKey> = recipients
                .iter()
                .map(|r| RecipientKey::from(&r.public_material()))
                .collect();

            let envelope =
                MultiRecipientEnvelope::seal(&context, &body, &[], sender.signing(), &keys)
                    .unwrap();

            for (i, recipient) in recipients.iter().enumerate() {
                let opened = envelope
                    .open(
                        &context,
                        recipient.fingerprint(),
                        recipient.agreement(),
                        &sender.signing_public_key(),
                    )
                    .unwrap();
                prop_assert_eq!(&opened.body, &body);

                let other = &recipients[(i + 1) % recipients.len()];
                let foreign = envelope.wrap_for(other.fingerprint()).unwrap();
                prop_assert!(matches!(
                    foreign.unwrap(recipient.agreement()),
                    Err(EnvelopeError::KeyUnwrapFailed)
                ));
            }
        }
    }

    #[test]
    fn test_nonce_pairs_unique_across_sample() {
        let params = EnvelopeParams {
            sender_seed: [1u8; 32],
            recipient_seed: [2u8; 32],
            context: MessageContext::new("alice@x.com", "bob@x.com", "hi"),
            body: b"same body".to_vec(),
            attachments: Vec::new(),
        };

        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            let envelope = seal_from_params(&params).envelope;
            assert!(seen.insert((envelope.message_nonce, envelope.wrap_nonce)));
        }
    }
}
