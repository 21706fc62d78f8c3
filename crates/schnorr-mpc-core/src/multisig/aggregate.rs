//! Relay-driven n-of-n ceremony

use super::{
    AggregationSession, NonceCommitmentMessage, NoncePointMessage, PartialSignatureMessage,
    PublicKeyMessage,
};
use crate::arith::{int_from_bytes, int_to_bytes};
use crate::mpc::Relay;
use crate::{Result, SessionId, Signature};
use tracing::{debug, info, instrument};

/// Drive one participant through a full aggregation.
///
/// Every peer value goes through the session setters, so a failed check ends
/// the ceremony with the error that names the offending participant.
#[instrument(skip(session, relay), fields(party_id = session.index()))]
pub async fn run_aggregation<R: Relay>(
    mut session: AggregationSession,
    session_id: &SessionId,
    relay: &R,
) -> Result<Signature> {
    let me = session.index();
    let participants = session.participants();
    info!(participants, "Starting aggregation");

    debug!("Round 1: public keys");
    let public_key = session.public_key();
    relay
        .broadcast(
            session_id,
            1,
            &PublicKeyMessage {
                party_id: me,
                public_key: public_key.to_bytes()?.to_vec(),
            },
        )
        .await?;
    let messages = relay
        .collect_broadcasts::<PublicKeyMessage>(session_id, 1, participants)
        .await?;
    for msg in messages.into_iter().filter(|m| m.party_id != me) {
        let point = session.curve().decode_point(&msg.public_key)?;
        session.set_public_key(msg.party_id, point)?;
    }

    debug!("Round 2: nonce commitments");
    let commitment = session.nonce_commitment()?;
    relay
        .broadcast(
            session_id,
            2,
            &NonceCommitmentMessage {
                party_id: me,
                commitment,
            },
        )
        .await?;
    let messages = relay
        .collect_broadcasts::<NonceCommitmentMessage>(session_id, 2, participants)
        .await?;
    for msg in messages.into_iter().filter(|m| m.party_id != me) {
        session.set_nonce_commitment(msg.party_id, msg.commitment)?;
    }

    debug!("Round 3: nonce reveal");
    let nonce_point = session.nonce_point()?;
    relay
        .broadcast(
            session_id,
            3,
            &NoncePointMessage {
                party_id: me,
                nonce_point: nonce_point.to_bytes()?.to_vec(),
            },
        )
        .await?;
    let messages = relay
        .collect_broadcasts::<NoncePointMessage>(session_id, 3, participants)
        .await?;
    for msg in messages.into_iter().filter(|m| m.party_id != me) {
        let point = session.curve().decode_point(&msg.nonce_point)?;
        session.set_nonce_point(msg.party_id, point)?;
    }
    session.check_commitments()?;

    debug!("Round 4: partial signatures");
    let partial = session.partial_signature()?;
    relay
        .broadcast(
            session_id,
            4,
            &PartialSignatureMessage {
                party_id: me,
                partial_signature: int_to_bytes(&partial),
            },
        )
        .await?;
    let messages = relay
        .collect_broadcasts::<PartialSignatureMessage>(session_id, 4, participants)
        .await?;
    for msg in messages.into_iter().filter(|m| m.party_id != me) {
        session.set_partial_signature(msg.party_id, int_from_bytes(&msg.partial_signature))?;
    }

    let signature = session.combine()?;
    info!("Aggregation complete");
    Ok(signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arith::{Curve, Point};
    use crate::mpc::MemoryRelay;
    use crate::schnorr;
    use crate::types::new_session_id;
    use futures_util::future::try_join_all;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[tokio::test]
    async fn test_run_aggregation() {
        crate::init_test_tracing();
        let curve = Curve::secp256k1();
        let mut rng = ChaCha20Rng::seed_from_u64(99);
        let relay = MemoryRelay::new();
        let session_id = new_session_id();
        let message = [0x42u8; 32];
        let participants = 4;

        let mut public_key = Point::Infinity;
        let mut sessions = Vec::new();
        for i in 1..=participants {
            let secret = curve.random_scalar(&mut rng);
            public_key = curve.point_add(&public_key, &curve.mul_base(&secret));
            sessions.push(
                AggregationSession::new(curve.clone(), i, participants, secret, &message).unwrap(),
            );
        }

        let signatures = try_join_all(
            sessions
                .into_iter()
                .map(|session| run_aggregation(session, &session_id, &relay)),
        )
        .await
        .unwrap();

        assert!(signatures.windows(2).all(|pair| pair[0] == pair[1]));
        assert!(schnorr::verify(&curve, &public_key, &message, &signatures[0].to_bytes()).is_ok());
    }
}
