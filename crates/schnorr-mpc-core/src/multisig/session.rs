//! Per-participant state of one n-of-n signing ceremony

use crate::arith::{hash, int_to_bytes, Curve, Point, Scalar};
use crate::schnorr::{self, derive_nonce, Keypair};
use crate::types::{message_from_slice, MESSAGE_LEN};
use crate::{Error, PartyId, Result, Signature, Value};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// What has been received from one other participant.
///
/// `None` means "not received yet"; a stored value has passed its check.
#[derive(Debug, Clone, Default)]
struct PeerRecord {
    public_key: Option<Point>,
    nonce_commitment: Option<[u8; 32]>,
    nonce_point: Option<Point>,
    partial_signature: Option<Scalar>,
}

/// One signer's view of an n-of-n aggregation.
///
/// Rounds, in order: exchange public keys, exchange nonce commitments, reveal
/// nonce points (checked against the commitments), exchange partial
/// signatures (checked against each sender's key and nonce), combine.
///
/// Any verification failure aborts the session; afterwards every mutating
/// call fails with [`Error::Aborted`] naming the offending participant.
pub struct AggregationSession {
    curve: Curve,
    index: PartyId,
    participants: usize,
    keypair: Keypair,
    message: [u8; MESSAGE_LEN],
    nonce: Scalar,
    nonce_point: Point,
    peers: BTreeMap<PartyId, PeerRecord>,
    aborted: Option<PartyId>,
}

impl AggregationSession {
    /// Create the session of participant `index` (1-based) out of `participants`.
    pub fn new(
        curve: Curve,
        index: PartyId,
        participants: usize,
        secret: Scalar,
        message: &[u8],
    ) -> Result<Self> {
        if participants == 0 {
            return Err(Error::InvalidConfig(
                "At least one participant is required".into(),
            ));
        }
        if index == 0 || index > participants {
            return Err(Error::InvalidPartyId(index));
        }
        let keypair = Keypair::new(&curve, secret)?;
        let message = message_from_slice(message)?;

        let nonce = derive_nonce(&curve, keypair.secret(), &message);
        let nonce_point = curve.mul_base(&nonce);
        if nonce_point.is_infinity() {
            return Err(Error::DegeneratePoint("nonce"));
        }

        let peers = (1..=participants)
            .filter(|&j| j != index)
            .map(|j| (j, PeerRecord::default()))
            .collect();

        debug!(party_id = index, participants, "Aggregation session created");

        Ok(Self {
            curve,
            index,
            participants,
            keypair,
            message,
            nonce,
            nonce_point,
            peers,
            aborted: None,
        })
    }

    pub fn curve(&self) -> &Curve {
        &self.curve
    }

    pub fn index(&self) -> PartyId {
        self.index
    }

    pub fn participants(&self) -> usize {
        self.participants
    }

    pub fn message(&self) -> &[u8; MESSAGE_LEN] {
        &self.message
    }

    /// Participant whose contribution aborted the session, if any
    pub fn aborted_by(&self) -> Option<PartyId> {
        self.aborted
    }

    /// Our public key P_i = d_i·G
    pub fn public_key(&self) -> Point {
        self.keypair.public_key(&self.curve)
    }

    /// hash(bytes(R_i)), published before the nonce point itself
    pub fn nonce_commitment(&self) -> Result<[u8; 32]> {
        Ok(hash(&[&self.nonce_point.to_bytes()?[..]]))
    }

    /// Our nonce point R_i.
    ///
    /// Only revealed once every other participant's public key and nonce
    /// commitment are stored.
    pub fn nonce_point(&self) -> Result<Point> {
        self.ensure_active()?;
        for (&party, peer) in &self.peers {
            if peer.public_key.is_none() {
                return Err(Error::Missing {
                    party,
                    value: Value::PublicKey,
                });
            }
            if peer.nonce_commitment.is_none() {
                return Err(Error::Missing {
                    party,
                    value: Value::NonceCommitment,
                });
            }
        }
        Ok(self.nonce_point.clone())
    }

    pub fn set_public_key(&mut self, party: PartyId, public_key: Point) -> Result<()> {
        self.ensure_active()?;
        if !self.curve.on_curve(&public_key) {
            return Err(Error::PointNotOnCurve);
        }
        let peer = self.peer_mut(party)?;
        if peer.public_key.is_some() {
            return Err(Error::AlreadyReceived {
                party,
                value: Value::PublicKey,
            });
        }
        peer.public_key = Some(public_key);
        Ok(())
    }

    pub fn set_nonce_commitment(&mut self, party: PartyId, commitment: [u8; 32]) -> Result<()> {
        self.ensure_active()?;
        let peer = self.peer_mut(party)?;
        if peer.nonce_commitment.is_some() {
            return Err(Error::AlreadyReceived {
                party,
                value: Value::NonceCommitment,
            });
        }
        peer.nonce_commitment = Some(commitment);
        Ok(())
    }

    /// Store a revealed nonce point after checking it against the commitment.
    pub fn set_nonce_point(&mut self, party: PartyId, nonce_point: Point) -> Result<()> {
        self.ensure_active()?;
        if !self.curve.on_curve(&nonce_point) {
            return Err(Error::PointNotOnCurve);
        }
        let encoded = nonce_point.to_bytes()?;
        let peer = self.peer_mut(party)?;
        if peer.nonce_point.is_some() {
            return Err(Error::AlreadyReceived {
                party,
                value: Value::NoncePoint,
            });
        }
        let commitment = peer.nonce_commitment.ok_or(Error::Missing {
            party,
            value: Value::NonceCommitment,
        })?;

        if hash(&[&encoded[..]]) != commitment {
            return Err(self.reject(Error::CommitmentMismatch { party }));
        }
        peer.nonce_point = Some(nonce_point);
        Ok(())
    }

    /// Every participant has committed and revealed a matching nonce point.
    pub fn check_commitments(&self) -> Result<()> {
        self.ensure_active()?;
        for (&party, peer) in &self.peers {
            let commitment = peer.nonce_commitment.ok_or(Error::Missing {
                party,
                value: Value::NonceCommitment,
            })?;
            let nonce_point = peer.nonce_point.as_ref().ok_or(Error::Missing {
                party,
                value: Value::NoncePoint,
            })?;
            if hash(&[&nonce_point.to_bytes()?[..]]) != commitment {
                return Err(Error::CommitmentMismatch { party });
            }
        }
        Ok(())
    }

    /// P = Σ P_j
    pub fn aggregate_public_key(&self) -> Result<Point> {
        let mut sum = self.public_key();
        for (&party, peer) in &self.peers {
            let public_key = peer.public_key.as_ref().ok_or(Error::Missing {
                party,
                value: Value::PublicKey,
            })?;
            sum = self.curve.point_add(&sum, public_key);
        }
        if sum.is_infinity() {
            return Err(Error::DegeneratePoint("aggregate public key"));
        }
        Ok(sum)
    }

    /// R = Σ R_j
    pub fn aggregate_nonce(&self) -> Result<Point> {
        let mut sum = self.nonce_point.clone();
        for (&party, peer) in &self.peers {
            let nonce_point = peer.nonce_point.as_ref().ok_or(Error::Missing {
                party,
                value: Value::NoncePoint,
            })?;
            sum = self.curve.point_add(&sum, nonce_point);
        }
        if sum.is_infinity() {
            return Err(Error::DegeneratePoint("aggregate nonce"));
        }
        Ok(sum)
    }

    /// e = int(hash(bytes(x(R)) || bytes(P) || m)) mod n
    pub fn challenge(&self) -> Result<Scalar> {
        let nonce = self.aggregate_nonce()?;
        let public_key = self.aggregate_public_key()?;
        let rx = nonce.x().ok_or(Error::DegeneratePoint("aggregate nonce"))?;
        schnorr::challenge(&self.curve, &int_to_bytes(rx), &public_key, &self.message)
    }

    /// s_i = k_i + e·d_i, with k_i negated when y(R) is not a quadratic residue.
    pub fn partial_signature(&self) -> Result<Scalar> {
        self.ensure_active()?;
        let nonce = self.aggregate_nonce()?;
        let e = self.challenge()?;

        let ry = nonce.y().ok_or(Error::DegeneratePoint("aggregate nonce"))?;
        let k = if self.curve.is_quadratic_residue(ry) {
            self.nonce.clone()
        } else {
            self.curve.scalar_neg(&self.nonce)
        };
        Ok(self
            .curve
            .scalar_add(&k, &self.curve.scalar_mul(&e, self.keypair.secret())))
    }

    /// Store a partial signature after checking s_j·G - e·P_j = ±R_j, the sign
    /// following the residuosity of y(R).
    pub fn set_partial_signature(&mut self, party: PartyId, partial: Scalar) -> Result<()> {
        self.ensure_active()?;
        if &partial >= self.curve.n() {
            return Err(Error::ScalarOutOfRange { party });
        }
        let e = self.challenge()?;
        let nonce = self.aggregate_nonce()?;
        let ry = nonce.y().ok_or(Error::DegeneratePoint("aggregate nonce"))?;
        let normalized = self.curve.is_quadratic_residue(ry);
        let peer = self.peers.get(&party).ok_or(Error::InvalidPartyId(party))?;
        if peer.partial_signature.is_some() {
            return Err(Error::AlreadyReceived {
                party,
                value: Value::PartialSignature,
            });
        }
        let public_key = peer.public_key.as_ref().ok_or(Error::Missing {
            party,
            value: Value::PublicKey,
        })?;
        let nonce_point = peer.nonce_point.as_ref().ok_or(Error::Missing {
            party,
            value: Value::NoncePoint,
        })?;

        let reconstructed = self.curve.point_add(
            &self.curve.mul_base(&partial),
            &self.curve.point_mul(&self.curve.scalar_neg(&e), public_key),
        );
        let expected = if normalized {
            nonce_point.clone()
        } else {
            self.curve.point_neg(nonce_point)
        };
        if reconstructed != expected {
            return Err(self.reject(Error::InvalidPartialSignature { party }));
        }

        self.peer_mut(party)?.partial_signature = Some(partial);
        Ok(())
    }

    /// Every other participant's partial signature has been verified.
    pub fn check_partial_signatures(&self) -> Result<()> {
        self.ensure_active()?;
        for (&party, peer) in &self.peers {
            if peer.partial_signature.is_none() {
                return Err(Error::Missing {
                    party,
                    value: Value::PartialSignature,
                });
            }
        }
        Ok(())
    }

    /// s = Σ s_j; the result is verified against P before it is returned.
    pub fn combine(&self) -> Result<Signature> {
        self.check_partial_signatures()?;
        let nonce = self.aggregate_nonce()?;
        let public_key = self.aggregate_public_key()?;

        let mut s = self.partial_signature()?;
        for peer in self.peers.values() {
            if let Some(partial) = &peer.partial_signature {
                s = self.curve.scalar_add(&s, partial);
            }
        }
        let rx = nonce.x().ok_or(Error::DegeneratePoint("aggregate nonce"))?;
        let signature = Signature::new(int_to_bytes(rx), int_to_bytes(&s));

        schnorr::verify(
            &self.curve,
            &public_key,
            &self.message,
            &signature.to_bytes(),
        )?;

        info!(
            party_id = self.index,
            signature = %hex::encode(signature.to_bytes()),
            "Aggregated signature produced"
        );
        Ok(signature)
    }

    fn ensure_active(&self) -> Result<()> {
        match self.aborted {
            Some(party) => Err(Error::Aborted { party }),
            None => Ok(()),
        }
    }

    fn peer_mut(&mut self, party: PartyId) -> Result<&mut PeerRecord> {
        self.peers
            .get_mut(&party)
            .ok_or(Error::InvalidPartyId(party))
    }

    /// Abort on a verification failure and hand the error back.
    fn reject(&mut self, error: Error) -> Error {
        if let Some(party) = error.culprit() {
            warn!(party_id = self.index, party, %error, "Rejected contribution");
            self.aborted = Some(party);
        }
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    fn sessions(participants: usize, seed: u64) -> Vec<AggregationSession> {
        let curve = Curve::secp256k1();
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mut message = [0u8; 32];
        rng.fill_bytes(&mut message);

        (1..=participants)
            .map(|i| {
                let secret = curve.random_scalar(&mut rng);
                AggregationSession::new(curve.clone(), i, participants, secret, &message).unwrap()
            })
            .collect()
    }

    /// Runs every round up to and including nonce reveal.
    fn exchange_nonces(users: &mut [AggregationSession]) {
        let public_keys: Vec<Point> = users.iter().map(|u| u.public_key()).collect();
        let commitments: Vec<[u8; 32]> = users
            .iter()
            .map(|u| u.nonce_commitment().unwrap())
            .collect();
        for user in users.iter_mut() {
            for j in 1..=public_keys.len() {
                if j == user.index() {
                    continue;
                }
                user.set_public_key(j, public_keys[j - 1].clone()).unwrap();
                user.set_nonce_commitment(j, commitments[j - 1]).unwrap();
            }
        }

        let nonce_points: Vec<Point> = users.iter().map(|u| u.nonce_point().unwrap()).collect();
        for user in users.iter_mut() {
            for j in 1..=nonce_points.len() {
                if j != user.index() {
                    user.set_nonce_point(j, nonce_points[j - 1].clone()).unwrap();
                }
            }
            user.check_commitments().unwrap();
        }
    }

    fn exchange_partials(users: &mut [AggregationSession]) {
        let partials: Vec<Scalar> = users
            .iter()
            .map(|u| u.partial_signature().unwrap())
            .collect();
        for user in users.iter_mut() {
            for j in 1..=partials.len() {
                if j != user.index() {
                    user.set_partial_signature(j, partials[j - 1].clone()).unwrap();
                }
            }
            user.check_partial_signatures().unwrap();
        }
    }

    #[test]
    fn test_aggregation_produces_valid_signature() {
        for (participants, seed) in [(2, 1), (3, 2), (5, 3), (12, 4)] {
            let mut users = sessions(participants, seed);
            exchange_nonces(&mut users);
            exchange_partials(&mut users);

            let curve = Curve::secp256k1();
            let public_key = users[0].aggregate_public_key().unwrap();
            let signature = users[participants - 1].combine().unwrap();
            assert_eq!(users[0].combine().unwrap(), signature);
            assert!(schnorr::verify(
                &curve,
                &public_key,
                users[0].message(),
                &signature.to_bytes()
            )
            .is_ok());
        }
    }

    #[test]
    fn test_single_participant_matches_single_key_signature() {
        let curve = Curve::secp256k1();
        let secret = Scalar::from(1u32);
        let message = [0u8; 32];
        let session =
            AggregationSession::new(curve.clone(), 1, 1, secret.clone(), &message).unwrap();

        assert_eq!(
            session.combine().unwrap(),
            schnorr::sign(&curve, &secret, &message).unwrap()
        );
    }

    #[test]
    fn test_commitment_mismatch_aborts() {
        let mut users = sessions(3, 10);
        let curve = Curve::secp256k1();
        for j in [2, 3] {
            let commitment = users[j - 1].nonce_commitment().unwrap();
            users[0].set_nonce_commitment(j, commitment).unwrap();
        }
        let wrong_point = curve.mul_base(&Scalar::from(1234u32));
        assert_eq!(
            users[0].set_nonce_point(2, wrong_point),
            Err(Error::CommitmentMismatch { party: 2 })
        );
        assert_eq!(users[0].aborted_by(), Some(2));

        let honest = users[2].nonce_point.clone();
        assert_eq!(
            users[0].set_nonce_point(3, honest),
            Err(Error::Aborted { party: 2 })
        );
    }

    #[test]
    fn test_nonce_reveal_waits_for_keys_and_commitments() {
        let mut users = sessions(3, 11);
        assert_eq!(
            users[0].nonce_point(),
            Err(Error::Missing {
                party: 2,
                value: Value::PublicKey
            })
        );

        for j in [2, 3] {
            let key = users[j - 1].public_key();
            users[0].set_public_key(j, key).unwrap();
        }
        assert_eq!(
            users[0].nonce_point(),
            Err(Error::Missing {
                party: 2,
                value: Value::NonceCommitment
            })
        );

        let commitment = users[1].nonce_commitment().unwrap();
        users[0].set_nonce_commitment(2, commitment).unwrap();
        assert_eq!(
            users[0].nonce_point(),
            Err(Error::Missing {
                party: 3,
                value: Value::NonceCommitment
            })
        );

        let commitment = users[2].nonce_commitment().unwrap();
        users[0].set_nonce_commitment(3, commitment).unwrap();
        assert_eq!(users[0].nonce_point().unwrap(), users[0].nonce_point);
    }

    #[test]
    fn test_missing_values_do_not_abort() {
        let mut users = sessions(3, 12);
        let err = users[0].set_nonce_point(2, Curve::secp256k1().generator().clone());
        assert!(err.unwrap_err().is_missing());
        assert!(users[0].aggregate_public_key().unwrap_err().is_missing());
        assert_eq!(users[0].aborted_by(), None);
    }

    #[test]
    fn test_bogus_partial_signature_rejected() {
        let mut users = sessions(4, 20);
        exchange_nonces(&mut users);

        let curve = Curve::secp256k1();
        let honest = users[2].partial_signature().unwrap();
        let bogus = curve.scalar_add(&honest, &Scalar::from(1u32));

        let err = users[0].set_partial_signature(3, bogus).unwrap_err();
        assert_eq!(err, Error::InvalidPartialSignature { party: 3 });
        assert_eq!(err.culprit(), Some(3));
        assert_eq!(users[0].combine(), Err(Error::Aborted { party: 3 }));

        assert_eq!(
            users[1].set_partial_signature(3, curve.n().clone()),
            Err(Error::ScalarOutOfRange { party: 3 })
        );
        assert_eq!(users[1].aborted_by(), None);
    }

    #[test]
    fn test_sign_flipped_partial_signature_rejected() {
        let curve = Curve::secp256k1();
        for seed in 0..8 {
            let mut users = sessions(3, 100 + seed);
            exchange_nonces(&mut users);

            // -k_3 + e·d_3 passes an x-only check since -R_3 shares x(R_3)
            let e = users[0].challenge().unwrap();
            let honest = users[2].partial_signature().unwrap();
            let e_d = curve.scalar_mul(&e, users[2].keypair.secret());
            let flipped = curve.scalar_sub(&curve.scalar_add(&e_d, &e_d), &honest);

            let err = users[0].set_partial_signature(3, flipped).unwrap_err();
            assert_eq!(err, Error::InvalidPartialSignature { party: 3 });
            assert_eq!(err.culprit(), Some(3));
            assert_eq!(users[0].aborted_by(), Some(3));

            assert!(users[1].set_partial_signature(3, honest).is_ok());
        }
    }

    #[test]
    fn test_unchecked_bogus_partial_corrupts_signature() {
        let mut users = sessions(3, 21);
        exchange_nonces(&mut users);

        let curve = Curve::secp256k1();
        let mut s = Scalar::from(0u32);
        for user in &users {
            s = curve.scalar_add(&s, &user.partial_signature().unwrap());
        }
        // What a combiner skipping the partial check would output
        let forged = curve.scalar_add(&s, &Scalar::from(7u32));

        let nonce = users[0].aggregate_nonce().unwrap();
        let public_key = users[0].aggregate_public_key().unwrap();
        let r = int_to_bytes(nonce.x().unwrap());
        let honest = Signature::new(r, int_to_bytes(&s));
        let corrupted = Signature::new(r, int_to_bytes(&forged));

        let message = users[0].message();
        assert!(schnorr::verify(&curve, &public_key, message, &honest.to_bytes()).is_ok());
        assert_eq!(
            schnorr::verify(&curve, &public_key, message, &corrupted.to_bytes()),
            Err(Error::InvalidSignature)
        );
    }

    #[test]
    fn test_constructor_validation() {
        let curve = Curve::secp256k1();
        let one = Scalar::from(1u32);
        assert_eq!(
            AggregationSession::new(curve.clone(), 0, 3, one.clone(), &[0u8; 32]).err(),
            Some(Error::InvalidPartyId(0))
        );
        assert_eq!(
            AggregationSession::new(curve.clone(), 4, 3, one.clone(), &[0u8; 32]).err(),
            Some(Error::InvalidPartyId(4))
        );
        assert_eq!(
            AggregationSession::new(curve.clone(), 1, 3, Scalar::from(0u32), &[0u8; 32]).err(),
            Some(Error::InvalidSecretKey)
        );
        assert_eq!(
            AggregationSession::new(curve, 1, 3, one, &[0u8; 31]).err(),
            Some(Error::InvalidMessageLength(31))
        );
    }

    #[test]
    fn test_duplicate_and_self_contributions() {
        let mut users = sessions(2, 30);
        let key = users[1].public_key();
        users[0].set_public_key(2, key.clone()).unwrap();
        assert_eq!(
            users[0].set_public_key(2, key.clone()),
            Err(Error::AlreadyReceived {
                party: 2,
                value: Value::PublicKey
            })
        );
        assert_eq!(users[0].set_public_key(1, key.clone()), Err(Error::InvalidPartyId(1)));
        assert_eq!(users[0].set_public_key(3, key), Err(Error::InvalidPartyId(3)));
    }
}
