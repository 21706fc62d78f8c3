//! Two-polynomial Pedersen VSS round
//!
//! The same round shares the long-term secret during key generation and the
//! one-time nonce during signing. Each member deals f and a blinding f',
//! publishes C_l = a_l·G + a'_l·H, sends (f(j), f'(j)) to every member j and
//! finally reveals A_l = a_l·G.
//!
//! Received values are only stored after they pass their check:
//! - shares against the dealer's commitments, s·G + s'·H = Σ i^l·C_l
//! - commitments the dealer relays for third parties against our own copies
//! - coefficient points against the stored share, s·G = Σ i^l·A_l

use super::messages::{decode_points, encode_points, CommitmentsMessage, PointsMessage};
use super::messages::{RelayedCommitments, ShareMessage};
use super::polynomial::{evaluate_commitments, Polynomial};
use super::Phase;
use crate::arith::{int_from_bytes, int_to_bytes, Curve, Point, Scalar};
use crate::mpc::Relay;
use crate::{Error, PartyId, Result, SessionId, Value};
use rand_core::CryptoRngCore;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// One member's state in a VSS round.
pub struct VssRound {
    curve: Curve,
    blinding_generator: Point,
    me: PartyId,
    members: Vec<PartyId>,
    threshold: usize,
    secret: Polynomial,
    blinding: Polynomial,
    commitments: BTreeMap<PartyId, Vec<Point>>,
    shares: BTreeMap<PartyId, Scalar>,
    points: BTreeMap<PartyId, Vec<Point>>,
    aborted: Option<PartyId>,
}

impl VssRound {
    /// Deal fresh polynomials with `threshold` coefficients among `members`.
    pub fn new(
        curve: Curve,
        blinding_generator: Point,
        me: PartyId,
        members: &[PartyId],
        threshold: usize,
        rng: &mut impl CryptoRngCore,
    ) -> Result<Self> {
        let mut members = members.to_vec();
        members.sort_unstable();
        members.dedup();
        if threshold == 0 || members.len() < threshold {
            return Err(Error::ThresholdNotMet {
                required: threshold.max(1),
                actual: members.len(),
            });
        }
        if members.first() == Some(&0) {
            return Err(Error::InvalidPartyId(0));
        }
        if !members.contains(&me) {
            return Err(Error::InvalidPartyId(me));
        }

        let secret = Polynomial::random(&curve, threshold, rng);
        let blinding = Polynomial::random(&curve, threshold, rng);

        let own_commitments: Vec<Point> = secret
            .coefficients()
            .iter()
            .zip(blinding.coefficients())
            .map(|(a, a_blind)| {
                curve.point_add(
                    &curve.mul_base(a),
                    &curve.point_mul(a_blind, &blinding_generator),
                )
            })
            .collect();
        let own_share = secret.evaluate(&curve, me);
        let own_points = secret.points(&curve);

        Ok(Self {
            commitments: BTreeMap::from([(me, own_commitments)]),
            shares: BTreeMap::from([(me, own_share)]),
            points: BTreeMap::from([(me, own_points)]),
            curve,
            blinding_generator,
            me,
            members,
            threshold,
            secret,
            blinding,
            aborted: None,
        })
    }

    pub fn curve(&self) -> &Curve {
        &self.curve
    }

    pub fn me(&self) -> PartyId {
        self.me
    }

    /// Sorted member indices, ourselves included
    pub fn members(&self) -> &[PartyId] {
        &self.members
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn aborted_by(&self) -> Option<PartyId> {
        self.aborted
    }

    /// Our Pedersen commitments C_0..C_(t-1)
    pub fn commitments(&self) -> &[Point] {
        self.commitments
            .get(&self.me)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Our coefficient points A_0..A_(t-1)
    pub fn points(&self) -> &[Point] {
        self.points
            .get(&self.me)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn set_commitments(&mut self, party: PartyId, commitments: Vec<Point>) -> Result<()> {
        self.ensure_active()?;
        self.check_peer(party)?;
        self.check_points(party, &commitments)?;
        if self.commitments.contains_key(&party) {
            return Err(Error::AlreadyReceived {
                party,
                value: Value::Commitments,
            });
        }
        self.commitments.insert(party, commitments);
        Ok(())
    }

    /// (f(j), f'(j)) for member `party`
    pub fn share_for(&self, party: PartyId) -> Result<(Scalar, Scalar)> {
        self.ensure_active()?;
        self.check_peer(party)?;
        Ok((
            self.secret.evaluate(&self.curve, party),
            self.blinding.evaluate(&self.curve, party),
        ))
    }

    /// The commitments we hold for every member other than us and `party`.
    ///
    /// `party` compares them with its own copies when it receives our share.
    pub fn relayed_commitments(&self, party: PartyId) -> Result<BTreeMap<PartyId, Vec<Point>>> {
        self.check_peer(party)?;
        let mut relayed = BTreeMap::new();
        for h in self.others(party) {
            let commitments = self.commitments.get(&h).ok_or(Error::Missing {
                party: h,
                value: Value::Commitments,
            })?;
            relayed.insert(h, commitments.clone());
        }
        Ok(relayed)
    }

    /// Verify and store the share dealt to us by `party`.
    pub fn set_share(
        &mut self,
        party: PartyId,
        share: Scalar,
        blinding_share: Scalar,
        relayed: &BTreeMap<PartyId, Vec<Point>>,
    ) -> Result<()> {
        self.ensure_active()?;
        self.check_peer(party)?;
        if self.shares.contains_key(&party) {
            return Err(Error::AlreadyReceived {
                party,
                value: Value::Share,
            });
        }
        if &share >= self.curve.n() || &blinding_share >= self.curve.n() {
            return Err(Error::ScalarOutOfRange { party });
        }
        let commitments = self.commitments.get(&party).ok_or(Error::Missing {
            party,
            value: Value::Commitments,
        })?;

        let lhs = self.curve.point_add(
            &self.curve.mul_base(&share),
            &self.curve.point_mul(&blinding_share, &self.blinding_generator),
        );
        if lhs != evaluate_commitments(&self.curve, commitments, self.me) {
            return Err(self.reject(Error::InvalidShare { party }));
        }

        for h in self.others(party) {
            let ours = self.commitments.get(&h).ok_or(Error::Missing {
                party: h,
                value: Value::Commitments,
            })?;
            if relayed.get(&h) != Some(ours) {
                return Err(self.reject(Error::InconsistentCommitments { party, subject: h }));
            }
        }
        let extra = relayed
            .keys()
            .copied()
            .find(|&h| h == self.me || h == party || !self.members.contains(&h));
        if let Some(extra) = extra {
            return Err(self.reject(Error::InconsistentCommitments {
                party,
                subject: extra,
            }));
        }

        self.shares.insert(party, share);
        Ok(())
    }

    /// Verify and store `party`'s coefficient points against its share.
    pub fn set_points(&mut self, party: PartyId, points: Vec<Point>) -> Result<()> {
        self.ensure_active()?;
        self.check_peer(party)?;
        self.check_points(party, &points)?;
        if self.points.contains_key(&party) {
            return Err(Error::AlreadyReceived {
                party,
                value: Value::Points,
            });
        }
        let share = self.shares.get(&party).ok_or(Error::Missing {
            party,
            value: Value::Share,
        })?;

        if self.curve.mul_base(share) != evaluate_commitments(&self.curve, &points, self.me) {
            return Err(self.reject(Error::InvalidPoints { party }));
        }
        self.points.insert(party, points);
        Ok(())
    }

    /// Where the round stands, ignoring any later protocol steps.
    pub fn phase(&self) -> Phase {
        if let Some(party) = self.aborted {
            return Phase::Aborted { party };
        }
        let complete = |received: usize| received == self.members.len();
        if complete(self.points.len()) {
            Phase::PointsVerified
        } else if complete(self.shares.len()) {
            Phase::SharesVerified
        } else if complete(self.commitments.len()) {
            Phase::CommitmentsCollected
        } else {
            Phase::Init
        }
    }

    /// Σ_j f_j(me): our share of the jointly dealt secret
    pub fn secret_share(&self) -> Result<Scalar> {
        self.ensure_active()?;
        let mut sum = Scalar::default();
        for &party in &self.members {
            let share = self.shares.get(&party).ok_or(Error::Missing {
                party,
                value: Value::Share,
            })?;
            sum = self.curve.scalar_add(&sum, share);
        }
        Ok(sum)
    }

    /// Σ_j A_jl for each l: coefficient points of the jointly dealt polynomial
    pub fn joint_points(&self) -> Result<Vec<Point>> {
        self.ensure_active()?;
        let mut joint = vec![Point::Infinity; self.threshold];
        for &party in &self.members {
            let points = self.points.get(&party).ok_or(Error::Missing {
                party,
                value: Value::Points,
            })?;
            for (sum, point) in joint.iter_mut().zip(points) {
                *sum = self.curve.point_add(sum, point);
            }
        }
        Ok(joint)
    }

    /// Abort because of a failure detected outside the round itself.
    pub(crate) fn abort(&mut self, error: Error) -> Error {
        self.reject(error)
    }

    pub(crate) fn ensure_active(&self) -> Result<()> {
        match self.aborted {
            Some(party) => Err(Error::Aborted { party }),
            None => Ok(()),
        }
    }

    /// Members other than us and `party`
    fn others(&self, party: PartyId) -> Vec<PartyId> {
        self.members
            .iter()
            .copied()
            .filter(|&h| h != self.me && h != party)
            .collect()
    }

    fn check_peer(&self, party: PartyId) -> Result<()> {
        if party == self.me || !self.members.contains(&party) {
            return Err(Error::InvalidPartyId(party));
        }
        Ok(())
    }

    fn check_points(&self, party: PartyId, points: &[Point]) -> Result<()> {
        if points.len() != self.threshold {
            return Err(Error::CommitmentCount {
                party,
                expected: self.threshold,
                actual: points.len(),
            });
        }
        if !points.iter().all(|point| self.curve.on_curve(point)) {
            return Err(Error::PointNotOnCurve);
        }
        Ok(())
    }

    fn reject(&mut self, error: Error) -> Error {
        if let Some(party) = error.culprit() {
            warn!(party_id = self.me, party, %error, "Rejected contribution");
            self.aborted = Some(party);
        }
        error
    }
}

/// Run the three VSS rounds over the relay, starting at round `first_round`.
pub(crate) async fn exchange<R: Relay>(
    vss: &mut VssRound,
    session_id: &SessionId,
    first_round: u32,
    relay: &R,
) -> Result<()> {
    let me = vss.me();
    let members = vss.members().to_vec();

    debug!(round = first_round, "VSS commitments");
    let message = CommitmentsMessage {
        party_id: me,
        commitments: encode_points(vss.commitments())?,
    };
    relay.broadcast(session_id, first_round, &message).await?;
    let messages = relay
        .collect_broadcasts::<CommitmentsMessage>(session_id, first_round, members.len())
        .await?;
    for msg in messages.into_iter().filter(|m| m.party_id != me) {
        let commitments = decode_points(vss.curve(), &msg.commitments)?;
        vss.set_commitments(msg.party_id, commitments)?;
    }

    debug!(round = first_round + 1, "VSS shares");
    for &to in members.iter().filter(|&&j| j != me) {
        let (share, blinding_share) = vss.share_for(to)?;
        let relayed = vss
            .relayed_commitments(to)?
            .into_iter()
            .map(|(party_id, commitments)| -> Result<RelayedCommitments> {
                Ok(RelayedCommitments {
                    party_id,
                    commitments: encode_points(&commitments)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let message = ShareMessage {
            from: me,
            to,
            share: int_to_bytes(&share),
            blinding_share: int_to_bytes(&blinding_share),
            relayed,
        };
        relay
            .send_direct(session_id, first_round + 1, to, &message)
            .await?;
    }
    let messages = relay
        .collect_direct::<ShareMessage>(session_id, first_round + 1, me, members.len() - 1)
        .await?;
    for msg in messages {
        if msg.to != me {
            return Err(Error::Relay(format!(
                "share for party {} delivered to party {}",
                msg.to, me
            )));
        }
        let mut relayed = BTreeMap::new();
        for entry in &msg.relayed {
            relayed.insert(entry.party_id, decode_points(vss.curve(), &entry.commitments)?);
        }
        vss.set_share(
            msg.from,
            int_from_bytes(&msg.share),
            int_from_bytes(&msg.blinding_share),
            &relayed,
        )?;
    }

    debug!(round = first_round + 2, "VSS coefficient points");
    let message = PointsMessage {
        party_id: me,
        points: encode_points(vss.points())?,
    };
    relay.broadcast(session_id, first_round + 2, &message).await?;
    let messages = relay
        .collect_broadcasts::<PointsMessage>(session_id, first_round + 2, members.len())
        .await?;
    for msg in messages.into_iter().filter(|m| m.party_id != me) {
        let points = decode_points(vss.curve(), &msg.points)?;
        vss.set_points(msg.party_id, points)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn deal(members: &[PartyId], threshold: usize, seed: u64) -> Vec<VssRound> {
        let curve = Curve::secp256k1();
        let h = curve.derive_generator(b"vss test generator");
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        members
            .iter()
            .map(|&me| {
                VssRound::new(curve.clone(), h.clone(), me, members, threshold, &mut rng).unwrap()
            })
            .collect()
    }

    fn exchange_commitments(rounds: &mut [VssRound]) {
        let all: Vec<(PartyId, Vec<Point>)> = rounds
            .iter()
            .map(|r| (r.me(), r.commitments().to_vec()))
            .collect();
        for round in rounds.iter_mut() {
            for (party, commitments) in &all {
                if *party != round.me() {
                    round.set_commitments(*party, commitments.clone()).unwrap();
                }
            }
        }
    }

    fn exchange_shares(rounds: &mut [VssRound]) {
        let members = rounds[0].members().to_vec();
        for dealer in 0..rounds.len() {
            for receiver in 0..rounds.len() {
                if dealer == receiver {
                    continue;
                }
                let to = members[receiver];
                let (s, s_blind) = rounds[dealer].share_for(to).unwrap();
                let relayed = rounds[dealer].relayed_commitments(to).unwrap();
                let from = members[dealer];
                rounds[receiver].set_share(from, s, s_blind, &relayed).unwrap();
            }
        }
    }

    #[test]
    fn test_round_reconstructs_joint_secret() {
        let members = [2, 3, 5];
        let mut rounds = deal(&members, 2, 1);
        exchange_commitments(&mut rounds);
        assert_eq!(rounds[0].phase(), Phase::CommitmentsCollected);
        exchange_shares(&mut rounds);
        assert_eq!(rounds[1].phase(), Phase::SharesVerified);

        let all: Vec<(PartyId, Vec<Point>)> =
            rounds.iter().map(|r| (r.me(), r.points().to_vec())).collect();
        for round in rounds.iter_mut() {
            for (party, points) in &all {
                if *party != round.me() {
                    round.set_points(*party, points.clone()).unwrap();
                }
            }
            assert_eq!(round.phase(), Phase::PointsVerified);
        }

        let curve = Curve::secp256k1();
        let joint = rounds[0].joint_points().unwrap();
        for round in &rounds {
            assert_eq!(round.joint_points().unwrap(), joint);
            assert_eq!(
                curve.mul_base(&round.secret_share().unwrap()),
                evaluate_commitments(&curve, &joint, round.me())
            );
        }
    }

    #[test]
    fn test_share_inconsistent_with_commitments_rejected() {
        let mut rounds = deal(&[1, 2, 3], 2, 2);
        exchange_commitments(&mut rounds);

        let curve = Curve::secp256k1();
        let (s, s_blind) = rounds[0].share_for(2).unwrap();
        let relayed = rounds[0].relayed_commitments(2).unwrap();
        let tampered = curve.scalar_add(&s, &Scalar::from(1u32));

        assert_eq!(
            rounds[1].set_share(1, tampered, s_blind.clone(), &relayed),
            Err(Error::InvalidShare { party: 1 })
        );
        assert_eq!(rounds[1].phase(), Phase::Aborted { party: 1 });
        assert_eq!(
            rounds[1].set_share(1, s, s_blind, &relayed),
            Err(Error::Aborted { party: 1 })
        );
    }

    #[test]
    fn test_equivocated_commitments_rejected() {
        let mut rounds = deal(&[1, 2, 3], 2, 3);
        exchange_commitments(&mut rounds);

        let curve = Curve::secp256k1();
        let (s, s_blind) = rounds[0].share_for(2).unwrap();
        let mut relayed = rounds[0].relayed_commitments(2).unwrap();
        relayed.insert(3, vec![curve.generator().clone(); 2]);

        assert_eq!(
            rounds[1].set_share(1, s.clone(), s_blind.clone(), &relayed),
            Err(Error::InconsistentCommitments {
                party: 1,
                subject: 3
            })
        );

        let mut rounds = deal(&[1, 2, 3], 2, 3);
        exchange_commitments(&mut rounds);
        let (s, s_blind) = rounds[0].share_for(2).unwrap();
        assert_eq!(
            rounds[1].set_share(1, s, s_blind, &BTreeMap::new()),
            Err(Error::InconsistentCommitments {
                party: 1,
                subject: 3
            })
        );
    }

    #[test]
    fn test_points_inconsistent_with_share_rejected() {
        let mut rounds = deal(&[1, 2], 2, 4);
        exchange_commitments(&mut rounds);
        exchange_shares(&mut rounds);

        let curve = Curve::secp256k1();
        let mut points = rounds[0].points().to_vec();
        points[1] = curve.point_add(&points[1], curve.generator());
        assert_eq!(
            rounds[1].set_points(1, points),
            Err(Error::InvalidPoints { party: 1 })
        );
        assert_eq!(rounds[1].aborted_by(), Some(1));
    }

    #[test]
    fn test_input_validation_does_not_abort() {
        let mut rounds = deal(&[1, 2, 3], 2, 5);
        let commitments = rounds[1].commitments().to_vec();

        assert_eq!(
            rounds[0].set_commitments(2, commitments[..1].to_vec()),
            Err(Error::CommitmentCount {
                party: 2,
                expected: 2,
                actual: 1
            })
        );
        assert_eq!(
            rounds[0].set_commitments(4, commitments.clone()),
            Err(Error::InvalidPartyId(4))
        );
        assert_eq!(
            rounds[0].set_commitments(1, commitments.clone()),
            Err(Error::InvalidPartyId(1))
        );
        let (s, s_blind) = rounds[1].share_for(1).unwrap();
        assert_eq!(
            rounds[0].set_share(2, s, s_blind, &BTreeMap::new()),
            Err(Error::Missing {
                party: 2,
                value: Value::Commitments
            })
        );
        rounds[0].set_commitments(2, commitments.clone()).unwrap();
        assert_eq!(
            rounds[0].set_commitments(2, commitments),
            Err(Error::AlreadyReceived {
                party: 2,
                value: Value::Commitments
            })
        );
        assert_eq!(rounds[0].phase(), Phase::Init);
        assert!(rounds[0].secret_share().unwrap_err().is_missing());
    }

    #[test]
    fn test_member_validation() {
        let curve = Curve::secp256k1();
        let h = curve.derive_generator(b"vss test generator");
        let mut rng = ChaCha20Rng::seed_from_u64(6);
        assert_eq!(
            VssRound::new(curve.clone(), h.clone(), 4, &[1, 2, 3], 2, &mut rng).err(),
            Some(Error::InvalidPartyId(4))
        );
        assert_eq!(
            VssRound::new(curve, h, 1, &[1, 2, 2], 3, &mut rng).err(),
            Some(Error::ThresholdNotMet {
                required: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn test_index_zero_rejected() {
        let curve = Curve::secp256k1();
        let h = curve.derive_generator(b"vss test generator");
        let mut rng = ChaCha20Rng::seed_from_u64(77);
        assert!(matches!(
            VssRound::new(curve.clone(), h.clone(), 1, &[0, 1, 2], 2, &mut rng),
            Err(Error::InvalidPartyId(0))
        ));
        assert!(matches!(
            VssRound::new(curve, h, 0, &[0, 1], 1, &mut rng),
            Err(Error::InvalidPartyId(0))
        ));
    }
}
