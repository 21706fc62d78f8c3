//! Distributed key generation
//!
//! k holders run one VSS round over fresh secret polynomials. The shared key
//! is P = Σ_j A_j0; holder i keeps x_i = Σ_j f_j(i), a point on the joint
//! polynomial whose constant term nobody knows.

use super::polynomial::evaluate_commitments;
use super::vss::{self, VssRound};
use super::Phase;
use crate::arith::{Curve, Point, Scalar};
use crate::mpc::Relay;
use crate::{Error, PartyId, Result, SessionId, ThresholdConfig};
use rand_core::CryptoRngCore;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, instrument};

/// A holder's durable output of key generation
#[derive(Clone)]
pub struct KeyShare {
    index: PartyId,
    holders: usize,
    threshold: usize,
    secret_share: Scalar,
    public_key: Point,
    verification_points: BTreeMap<PartyId, Point>,
}

impl KeyShare {
    /// Holder index
    pub fn index(&self) -> PartyId {
        self.index
    }

    pub fn holders(&self) -> usize {
        self.holders
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// x_i, our point on the joint key polynomial
    pub fn secret_share(&self) -> &Scalar {
        &self.secret_share
    }

    /// Shared public key P
    pub fn public_key(&self) -> &Point {
        &self.public_key
    }

    pub fn public_key_bytes(&self) -> Result<[u8; 33]> {
        self.public_key.to_bytes()
    }

    /// Y_j = x_j·G for holder j
    pub fn verification_point(&self, party: PartyId) -> Result<&Point> {
        self.verification_points
            .get(&party)
            .ok_or(Error::InvalidPartyId(party))
    }
}

impl fmt::Debug for KeyShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyShare")
            .field("index", &self.index)
            .field("holders", &self.holders)
            .field("threshold", &self.threshold)
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// One holder's key generation state
pub struct DkgSession {
    config: ThresholdConfig,
    vss: VssRound,
    established: bool,
}

impl DkgSession {
    /// Start key generation as holder `index` of `config.holders`.
    pub fn new(
        curve: Curve,
        config: ThresholdConfig,
        index: PartyId,
        rng: &mut impl CryptoRngCore,
    ) -> Result<Self> {
        config.check_holder(index)?;
        let holders: Vec<PartyId> = (1..=config.holders).collect();
        let vss = VssRound::new(
            curve,
            config.blinding_generator.clone(),
            index,
            &holders,
            config.threshold,
            rng,
        )?;

        debug!(
            party_id = index,
            holders = config.holders,
            threshold = config.threshold,
            "DKG session created"
        );

        Ok(Self {
            config,
            vss,
            established: false,
        })
    }

    pub fn index(&self) -> PartyId {
        self.vss.me()
    }

    pub fn config(&self) -> &ThresholdConfig {
        &self.config
    }

    pub fn curve(&self) -> &Curve {
        self.vss.curve()
    }

    /// Once every coefficient point is verified the key is ready to finish.
    pub fn phase(&self) -> Phase {
        if self.established {
            return Phase::KeyEstablished;
        }
        match self.vss.phase() {
            Phase::PointsVerified => Phase::Ready,
            phase => phase,
        }
    }

    pub fn commitments(&self) -> &[Point] {
        self.vss.commitments()
    }

    pub fn set_commitments(&mut self, party: PartyId, commitments: Vec<Point>) -> Result<()> {
        self.ensure_open()?;
        self.vss.set_commitments(party, commitments)
    }

    /// (s, s') dealt to holder `party`
    pub fn share_for(&self, party: PartyId) -> Result<(Scalar, Scalar)> {
        self.vss.share_for(party)
    }

    pub fn relayed_commitments(&self, party: PartyId) -> Result<BTreeMap<PartyId, Vec<Point>>> {
        self.vss.relayed_commitments(party)
    }

    pub fn set_share(
        &mut self,
        party: PartyId,
        share: Scalar,
        blinding_share: Scalar,
        relayed: &BTreeMap<PartyId, Vec<Point>>,
    ) -> Result<()> {
        self.ensure_open()?;
        self.vss.set_share(party, share, blinding_share, relayed)
    }

    pub fn points(&self) -> &[Point] {
        self.vss.points()
    }

    pub fn set_points(&mut self, party: PartyId, points: Vec<Point>) -> Result<()> {
        self.ensure_open()?;
        self.vss.set_points(party, points)
    }

    /// P = Σ_j A_j0
    pub fn public_key(&self) -> Result<Point> {
        let joint = self.vss.joint_points()?;
        match joint.into_iter().next() {
            Some(Point::Infinity) | None => Err(Error::DegeneratePoint("shared public key")),
            Some(point) => Ok(point),
        }
    }

    /// Produce the key share; only possible once.
    pub fn finish(&mut self) -> Result<KeyShare> {
        self.ensure_open()?;
        let secret_share = self.vss.secret_share()?;
        let public_key = self.public_key()?;
        let joint = self.vss.joint_points()?;

        let curve = self.vss.curve();
        let verification_points = (1..=self.config.holders)
            .map(|j| (j, evaluate_commitments(curve, &joint, j)))
            .collect();

        self.established = true;
        info!(
            party_id = self.index(),
            public_key = %hex::encode(public_key.to_bytes()?),
            "Key established"
        );

        Ok(KeyShare {
            index: self.index(),
            holders: self.config.holders,
            threshold: self.config.threshold,
            secret_share,
            public_key,
            verification_points,
        })
    }

    pub(crate) fn vss_mut(&mut self) -> &mut VssRound {
        &mut self.vss
    }

    fn ensure_open(&self) -> Result<()> {
        if self.established {
            return Err(Error::KeyAlreadyEstablished);
        }
        self.vss.ensure_active()
    }
}

/// Run the DKG protocol for one holder over the relay.
///
/// Rounds 1-3 carry commitments, direct shares and coefficient points.
#[instrument(skip(session, relay), fields(party_id = session.index()))]
pub async fn run_dkg<R: Relay>(
    mut session: DkgSession,
    session_id: &SessionId,
    relay: &R,
) -> Result<KeyShare> {
    info!(
        holders = session.config().holders,
        threshold = session.config().threshold,
        "Starting DKG"
    );

    vss::exchange(session.vss_mut(), session_id, 1, relay).await?;

    let key_share = session.finish()?;
    info!("DKG complete");
    Ok(key_share)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::mpc::MemoryRelay;
    use crate::threshold::polynomial::lagrange_coefficient_at_zero;
    use crate::types::new_session_id;
    use crate::Value;
    use futures_util::future::try_join_all;
    use num_traits::Zero;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    pub(crate) fn run_local_dkg(holders: usize, threshold: usize, seed: u64) -> Vec<KeyShare> {
        let curve = Curve::secp256k1();
        let config = ThresholdConfig::with_derived_generator(&curve, holders, threshold).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mut sessions: Vec<DkgSession> = (1..=holders)
            .map(|i| DkgSession::new(curve.clone(), config.clone(), i, &mut rng).unwrap())
            .collect();

        let commitments: Vec<Vec<Point>> =
            sessions.iter().map(|s| s.commitments().to_vec()).collect();
        for session in sessions.iter_mut() {
            for j in 1..=holders {
                if j != session.index() {
                    session.set_commitments(j, commitments[j - 1].clone()).unwrap();
                }
            }
            assert_eq!(session.phase(), Phase::CommitmentsCollected);
        }

        for dealer in 0..holders {
            for receiver in 0..holders {
                if dealer == receiver {
                    continue;
                }
                let (s, s_blind) = sessions[dealer].share_for(receiver + 1).unwrap();
                let relayed = sessions[dealer].relayed_commitments(receiver + 1).unwrap();
                sessions[receiver]
                    .set_share(dealer + 1, s, s_blind, &relayed)
                    .unwrap();
            }
        }

        let points: Vec<Vec<Point>> = sessions.iter().map(|s| s.points().to_vec()).collect();
        for session in sessions.iter_mut() {
            for j in 1..=holders {
                if j != session.index() {
                    session.set_points(j, points[j - 1].clone()).unwrap();
                }
            }
            assert_eq!(session.phase(), Phase::Ready);
        }

        sessions
            .iter_mut()
            .map(|session| {
                let share = session.finish().unwrap();
                assert_eq!(session.phase(), Phase::KeyEstablished);
                share
            })
            .collect()
    }

    #[test]
    fn test_dkg_agrees_on_public_key() {
        let curve = Curve::secp256k1();
        for (holders, threshold) in [(2, 1), (3, 2), (5, 3)] {
            let shares = run_local_dkg(holders, threshold, holders as u64);
            let public_key = shares[0].public_key().clone();

            for share in &shares {
                assert_eq!(share.public_key(), &public_key);
                assert_eq!(
                    &curve.mul_base(share.secret_share()),
                    share.verification_point(share.index()).unwrap()
                );
            }

            // Any t shares interpolate to the secret behind P
            let signers: Vec<PartyId> = (1..=threshold).collect();
            let mut secret = Scalar::zero();
            for &i in &signers {
                let weight = lagrange_coefficient_at_zero(&curve, i, &signers).unwrap();
                let weighted = curve.scalar_mul(&weight, shares[i - 1].secret_share());
                secret = curve.scalar_add(&secret, &weighted);
            }
            assert_eq!(curve.mul_base(&secret), public_key);
        }
    }

    #[test]
    fn test_finish_only_once() {
        let curve = Curve::secp256k1();
        let config = ThresholdConfig::with_derived_generator(&curve, 1, 1).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(8);
        let mut session = DkgSession::new(curve, config, 1, &mut rng).unwrap();

        assert_eq!(session.phase(), Phase::Ready);
        let share = session.finish().unwrap();
        assert!(share.verification_point(2).is_err());
        assert_eq!(session.finish().err(), Some(Error::KeyAlreadyEstablished));
    }

    #[test]
    fn test_finish_requires_all_points() {
        let curve = Curve::secp256k1();
        let config = ThresholdConfig::with_derived_generator(&curve, 3, 2).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        let mut session = DkgSession::new(curve, config.clone(), 2, &mut rng).unwrap();

        assert_eq!(session.phase(), Phase::Init);
        assert_eq!(
            session.finish().err(),
            Some(Error::Missing {
                party: 1,
                value: Value::Share
            })
        );
        assert_eq!(
            DkgSession::new(Curve::secp256k1(), config, 4, &mut rng).err(),
            Some(Error::InvalidPartyId(4))
        );
    }

    #[test]
    fn test_dishonest_dealer_rejected_by_every_receiver() {
        let curve = Curve::secp256k1();
        let config = ThresholdConfig::with_derived_generator(&curve, 4, 2).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(10);
        let mut sessions: Vec<DkgSession> = (1..=4)
            .map(|i| DkgSession::new(curve.clone(), config.clone(), i, &mut rng).unwrap())
            .collect();

        let commitments: Vec<Vec<Point>> =
            sessions.iter().map(|s| s.commitments().to_vec()).collect();
        for session in sessions.iter_mut() {
            for j in 1..=4 {
                if j != session.index() {
                    session.set_commitments(j, commitments[j - 1].clone()).unwrap();
                }
            }
        }

        // Holder 3 deals shares off its committed polynomial
        for receiver in [1, 2, 4] {
            let (s, s_blind) = sessions[2].share_for(receiver).unwrap();
            let relayed = sessions[2].relayed_commitments(receiver).unwrap();
            let bad = curve.scalar_add(&s, &Scalar::from(receiver as u32));
            let err = sessions[receiver - 1]
                .set_share(3, bad, s_blind, &relayed)
                .unwrap_err();
            assert_eq!(err.culprit(), Some(3));
            assert_eq!(sessions[receiver - 1].phase(), Phase::Aborted { party: 3 });
        }
    }

    #[tokio::test]
    async fn test_run_dkg_over_relay() {
        crate::init_test_tracing();
        let curve = Curve::secp256k1();
        let config = ThresholdConfig::with_derived_generator(
            &curve,
            crate::DEFAULT_HOLDERS,
            crate::DEFAULT_THRESHOLD,
        )
        .unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let relay = MemoryRelay::new();
        let session_id = new_session_id();

        let sessions: Vec<DkgSession> = (1..=config.holders)
            .map(|i| DkgSession::new(curve.clone(), config.clone(), i, &mut rng).unwrap())
            .collect();
        let shares = try_join_all(
            sessions
                .into_iter()
                .map(|session| run_dkg(session, &session_id, &relay)),
        )
        .await
        .unwrap();

        assert_eq!(shares.len(), 3);
        assert!(shares
            .iter()
            .all(|share| share.public_key() == shares[0].public_key()));
        let indices: Vec<PartyId> = shares.iter().map(KeyShare::index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
    }
}
